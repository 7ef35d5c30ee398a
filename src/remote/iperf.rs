use std::path::Path;

use async_trait::async_trait;
use tracing::info;

use super::{Direction, ProbeRunner, run_command};
use crate::config::Config;
use crate::error::TransportError;

/// Local iperf3 client pointed at the remote server.
#[derive(Debug, Clone)]
pub struct IperfClient {
    binary: String,
    host: String,
    bandwidth: String,
    duration_secs: u64,
    interval_secs: u64,
    udp: bool,
}

impl IperfClient {
    pub fn from_config(config: &Config) -> Self {
        Self {
            binary: config.probe.binary.clone(),
            host: config.remote.host.clone(),
            bandwidth: config.probe.bandwidth.clone(),
            duration_secs: config.probe.duration_secs,
            interval_secs: config.probe.interval_secs,
            udp: config.probe.udp,
        }
    }

    pub fn args(&self, direction: Direction) -> Vec<String> {
        let mut args = vec!["-c".to_string(), self.host.clone()];
        if self.udp {
            args.push("-u".to_string());
        }
        args.extend([
            "-b".to_string(),
            self.bandwidth.clone(),
            "-t".to_string(),
            self.duration_secs.to_string(),
            "-i".to_string(),
            self.interval_secs.to_string(),
            "-J".to_string(),
            "--get-server-output".to_string(),
        ]);
        if direction == Direction::Reverse {
            args.push("-R".to_string());
        }
        args
    }
}

#[async_trait]
impl ProbeRunner for IperfClient {
    async fn run(&self, direction: Direction, report: &Path) -> Result<(), TransportError> {
        info!("Running {} {} for {}s...", self.binary, direction, self.duration_secs);
        let stdout = run_command(&self.binary, &self.args(direction)).await?;
        tokio::fs::write(report, stdout).await?;
        info!("Client JSON saved: {}", report.display());
        Ok(())
    }
}
