//! Control of the probe processes: the server on the remote host and the
//! client on this one.

pub mod iperf;
pub mod ssh;

use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::TransportError;

pub use iperf::IperfClient;
pub use ssh::SshRemote;

/// Traffic direction of a measurement pass, seen from the remote server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Client sends, server receives: the server's inbound rate.
    Forward,
    /// Server sends (`-R`): the server's outbound rate.
    Reverse,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Forward => write!(f, "NORMAL"),
            Direction::Reverse => write!(f, "REVERSE"),
        }
    }
}

/// Process id of a server started on the remote host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerPid(String);

impl ServerPid {
    pub fn parse(raw: &str) -> Result<Self, TransportError> {
        let pid = raw.trim();
        if pid.is_empty() || !pid.bytes().all(|b| b.is_ascii_digit()) {
            return Err(TransportError::InvalidPid(raw.to_string()));
        }
        Ok(Self(pid.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServerPid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The remote half: a probe server we start, stop and collect a report from.
#[async_trait]
pub trait RemoteControl: Send + Sync {
    async fn start_server(&self) -> Result<ServerPid, TransportError>;

    async fn stop_server(&self, pid: &ServerPid) -> Result<(), TransportError>;

    /// Copy the server's report to `dest` on this host.
    async fn fetch_report(&self, dest: &Path) -> Result<(), TransportError>;
}

/// The local half: a probe client that runs one pass to completion.
#[async_trait]
pub trait ProbeRunner: Send + Sync {
    /// Run a full pass in `direction`, saving the client report to `report`.
    async fn run(&self, direction: Direction, report: &Path) -> Result<(), TransportError>;
}

/// Run a command to completion, returning stdout or a `CommandFailed` error.
pub(crate) async fn run_command(program: &str, args: &[String]) -> Result<String, TransportError> {
    debug!("Running {} {}", program, args.join(" "));
    let output = Command::new(program)
        .args(args)
        .output()
        .await
        .map_err(|source| TransportError::Spawn {
            program: program.to_string(),
            source,
        })?;

    if !output.status.success() {
        return Err(TransportError::CommandFailed {
            program: program.to_string(),
            status: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
