use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::info;

use super::{RemoteControl, ServerPid, run_command};
use crate::config::Config;
use crate::error::TransportError;

/// Probe server on a remote host, driven over ssh and scp with key auth.
#[derive(Debug, Clone)]
pub struct SshRemote {
    user: String,
    host: String,
    key: PathBuf,
    report_path: String,
    probe_binary: String,
    interval_secs: u64,
    ssh: String,
    scp: String,
}

impl SshRemote {
    pub fn from_config(config: &Config) -> Self {
        Self {
            user: config.remote.user.clone(),
            host: config.remote.host.clone(),
            key: config.ssh_key_path(),
            report_path: config.remote.report_path.clone(),
            probe_binary: config.probe.binary.clone(),
            interval_secs: config.probe.interval_secs,
            ssh: config.remote.ssh_binary.clone(),
            scp: config.remote.scp_binary.clone(),
        }
    }

    fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }

    /// Shell line that backgrounds the server and echoes its pid.
    pub fn server_command(&self) -> String {
        format!(
            "nohup {} -s -i {} -J > {} 2>&1 & echo $!",
            self.probe_binary, self.interval_secs, self.report_path
        )
    }

    async fn ssh(&self, remote_command: String) -> Result<String, TransportError> {
        let args = vec![
            "-i".to_string(),
            self.key.display().to_string(),
            self.destination(),
            remote_command,
        ];
        Ok(run_command(&self.ssh, &args).await?.trim().to_string())
    }
}

#[async_trait]
impl RemoteControl for SshRemote {
    async fn start_server(&self) -> Result<ServerPid, TransportError> {
        let stdout = self.ssh(self.server_command()).await?;
        let pid = ServerPid::parse(&stdout)?;
        info!("Started remote {} server PID {}", self.probe_binary, pid);
        Ok(pid)
    }

    async fn stop_server(&self, pid: &ServerPid) -> Result<(), TransportError> {
        self.ssh(format!("kill {}", pid)).await?;
        info!("Stopped remote {} server", self.probe_binary);
        Ok(())
    }

    async fn fetch_report(&self, dest: &Path) -> Result<(), TransportError> {
        let args = vec![
            "-i".to_string(),
            self.key.display().to_string(),
            format!("{}:{}", self.destination(), self.report_path),
            dest.display().to_string(),
        ];
        run_command(&self.scp, &args).await?;
        info!("Copied server report to {}", dest.display());
        Ok(())
    }
}
