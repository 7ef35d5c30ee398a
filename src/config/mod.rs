use std::path::{Path, PathBuf};
use std::time::Duration;
use std::fs;

use anyhow::{Context, Result};
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::align::Resolution;
use crate::error::ConfigError;
use crate::merge::{COUNTER_IN, COUNTER_OUT, MergeSchema};
use crate::store::{SeriesSpec, Unit};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub remote: RemoteConfig,
    pub probe: ProbeConfig,
    pub store: StoreConfig,
    pub output: OutputConfig,
    /// Auxiliary series fetched over the same window, in column order
    pub overhead: Vec<SeriesSpec>,
}

/// The host running the probe server, reached over ssh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub user: String,
    pub host: String,
    pub ssh_key: String,
    /// Where the server writes its JSON report on the remote host
    pub report_path: String,
    pub ssh_binary: String,
    pub scp_binary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub binary: String,
    pub duration_secs: u64,
    pub bandwidth: String,
    pub interval_secs: u64,
    pub udp: bool,
    /// Pause between starting the server and starting the client
    pub startup_delay_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub rrd_binary: String,
    pub counter_in: String,
    pub counter_out: String,
    /// Grid resolution in seconds; must match the polling interval
    pub resolution_secs: u64,
    /// Settling delay after the last pass, in multiples of the resolution
    pub settle_steps: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub report_dir: PathBuf,
    pub csv_path: PathBuf,
    /// Empty disables the log file
    pub log_file: PathBuf,
}

impl OutputConfig {
    pub fn log_file(&self) -> Option<&Path> {
        (!self.log_file.as_os_str().is_empty()).then_some(self.log_file.as_path())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            remote: RemoteConfig::default(),
            probe: ProbeConfig::default(),
            store: StoreConfig::default(),
            output: OutputConfig::default(),
            overhead: default_overhead(),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            user: "opennms".to_string(),
            host: "127.0.0.1".to_string(),
            ssh_key: "~/.ssh/id_ed25519_opennms".to_string(),
            report_path: "/tmp/iperf3_server.json".to_string(),
            ssh_binary: "ssh".to_string(),
            scp_binary: "scp".to_string(),
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            binary: "iperf3".to_string(),
            duration_secs: 1800,
            bandwidth: "10M".to_string(),
            interval_secs: 1,
            udp: true,
            startup_delay_secs: 3,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            rrd_binary: "rrdtool".to_string(),
            counter_in: "/var/lib/opennms/rrd/snmp/5/ifHCInOctets.rrd".to_string(),
            counter_out: "/var/lib/opennms/rrd/snmp/5/ifHCOutOctets.rrd".to_string(),
            resolution_secs: 30,
            settle_steps: 2,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            report_dir: PathBuf::from("json_data"),
            csv_path: PathBuf::from("merged_bits_dual.csv"),
            log_file: PathBuf::from("data_fetcher.log"),
        }
    }
}

/// The overhead series collected when the config file has no `overhead` list.
pub fn default_overhead() -> Vec<SeriesSpec> {
    vec![
        SeriesSpec::new("cpu_load", "/var/lib/opennms/rrd/snmp/1/loadavg1.rrd", Unit::Raw),
        SeriesSpec::new("mem_avail", "/var/lib/opennms/rrd/snmp/1/memAvailReal.rrd", Unit::Raw),
        SeriesSpec::new("swap_out", "/var/lib/opennms/rrd/snmp/1/SwapOut.rrd", Unit::Raw),
        SeriesSpec::new("io_sent", "/var/lib/opennms/rrd/snmp/1/IORawSent.rrd", Unit::Raw),
    ]
}

fn parse_bool(value: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid(format!(
            "invalid boolean value: '{}'. Use 'true' or 'false'",
            value
        ))),
    }
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value
        .parse::<u64>()
        .map_err(|_| ConfigError::Invalid(format!("{} must be a non-negative integer (got '{}')", key, value)))
}

impl Config {
    /// Get the configuration file path
    pub fn config_file_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("org", "probealign", "probealign")
            .context("Unable to determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.toml"))
    }

    /// Load an explicit config file. It must exist and parse.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load `path` if given, otherwise the per-user config file, falling back
    /// to defaults when that file is absent or unreadable.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from(path).map_err(Into::into);
        }

        let config_path = Self::config_file_path()?;
        if !config_path.exists() {
            return Ok(Self::default());
        }
        match Self::load_from(&config_path) {
            Ok(config) => Ok(config),
            Err(e) => {
                eprintln!("⚠️  Warning: {}. Using defaults.", e);
                Ok(Self::default())
            }
        }
    }

    /// Save configuration to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content).context("Failed to write config file")?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.resolution()?;
        if self.remote.host.trim().is_empty() {
            return Err(ConfigError::Invalid("remote.host must not be empty".into()));
        }
        if self.probe.duration_secs == 0 {
            return Err(ConfigError::Invalid("probe.duration_secs must be at least 1".into()));
        }
        if self.probe.interval_secs == 0 {
            return Err(ConfigError::Invalid("probe.interval_secs must be at least 1".into()));
        }

        let schema = self.schema();
        let mut seen = std::collections::HashSet::new();
        for column in schema.columns() {
            if !seen.insert(column.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate column name: {}", column)));
            }
        }
        Ok(())
    }

    pub fn resolution(&self) -> Result<Resolution, ConfigError> {
        Resolution::new(self.store.resolution_secs)
            .map_err(|_| ConfigError::Invalid("store.resolution_secs must be at least 1".into()))
    }

    /// Wait after the last pass before the fetch window is closed.
    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.store.resolution_secs.saturating_mul(self.store.settle_steps))
    }

    pub fn counter_specs(&self) -> [SeriesSpec; 2] {
        [
            SeriesSpec::new(COUNTER_IN, &self.store.counter_in, Unit::Octets),
            SeriesSpec::new(COUNTER_OUT, &self.store.counter_out, Unit::Octets),
        ]
    }

    pub fn schema(&self) -> MergeSchema {
        MergeSchema::standard(self.overhead.iter().map(|spec| spec.name.clone()))
    }

    /// ssh key path with a leading `~` expanded.
    pub fn ssh_key_path(&self) -> PathBuf {
        expand_home(&self.remote.ssh_key)
    }

    /// Set a scalar configuration value using dot notation
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "remote.user" => self.remote.user = value.to_string(),
            "remote.host" => self.remote.host = value.to_string(),
            "remote.ssh_key" => self.remote.ssh_key = value.to_string(),
            "remote.report_path" => self.remote.report_path = value.to_string(),
            "probe.duration_secs" => {
                let secs = parse_u64(key, value)?;
                if secs == 0 {
                    return Err(ConfigError::Invalid("probe.duration_secs must be at least 1".into()));
                }
                self.probe.duration_secs = secs;
            }
            "probe.bandwidth" => self.probe.bandwidth = value.to_string(),
            "probe.interval_secs" => self.probe.interval_secs = parse_u64(key, value)?,
            "probe.udp" => self.probe.udp = parse_bool(value)?,
            "probe.startup_delay_secs" => self.probe.startup_delay_secs = parse_u64(key, value)?,
            "store.counter_in" => self.store.counter_in = value.to_string(),
            "store.counter_out" => self.store.counter_out = value.to_string(),
            "store.resolution_secs" => {
                let secs = parse_u64(key, value)?;
                Resolution::new(secs).map_err(|_| {
                    ConfigError::Invalid("store.resolution_secs must be at least 1".into())
                })?;
                self.store.resolution_secs = secs;
            }
            "store.settle_steps" => self.store.settle_steps = parse_u64(key, value)?,
            "output.report_dir" => self.output.report_dir = PathBuf::from(value),
            "output.csv_path" => self.output.csv_path = PathBuf::from(value),
            "output.log_file" => {
                self.output.log_file = if value == "none" {
                    PathBuf::new()
                } else {
                    PathBuf::from(value)
                };
            }
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }

    pub fn get_all_keys(&self) -> Vec<&'static str> {
        vec![
            "remote.user",
            "remote.host",
            "remote.ssh_key",
            "remote.report_path",
            "probe.duration_secs",
            "probe.bandwidth",
            "probe.interval_secs",
            "probe.udp",
            "probe.startup_delay_secs",
            "store.counter_in",
            "store.counter_out",
            "store.resolution_secs",
            "store.settle_steps",
            "output.report_dir",
            "output.csv_path",
            "output.log_file",
        ]
    }

    /// Get a scalar configuration value using dot notation
    pub fn get_value(&self, key: &str) -> Result<String, ConfigError> {
        let value = match key {
            "remote.user" => self.remote.user.clone(),
            "remote.host" => self.remote.host.clone(),
            "remote.ssh_key" => self.remote.ssh_key.clone(),
            "remote.report_path" => self.remote.report_path.clone(),
            "probe.duration_secs" => self.probe.duration_secs.to_string(),
            "probe.bandwidth" => self.probe.bandwidth.clone(),
            "probe.interval_secs" => self.probe.interval_secs.to_string(),
            "probe.udp" => self.probe.udp.to_string(),
            "probe.startup_delay_secs" => self.probe.startup_delay_secs.to_string(),
            "store.counter_in" => self.store.counter_in.clone(),
            "store.counter_out" => self.store.counter_out.clone(),
            "store.resolution_secs" => self.store.resolution_secs.to_string(),
            "store.settle_steps" => self.store.settle_steps.to_string(),
            "output.report_dir" => self.output.report_dir.display().to_string(),
            "output.csv_path" => self.output.csv_path.display().to_string(),
            "output.log_file" => self
                .output
                .log_file()
                .map_or_else(|| "none".to_string(), |p| p.display().to_string()),
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        };
        Ok(value)
    }

    /// Current configuration as a two-column table
    pub fn display(&self) -> String {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec!["Setting", "Value"]);
        for key in self.get_all_keys() {
            if let Ok(value) = self.get_value(key) {
                table.add_row(vec![key.to_string(), value]);
            }
        }
        for spec in &self.overhead {
            table.add_row(vec![
                format!("overhead.{}", spec.name),
                format!("{} ({:?})", spec.source, spec.unit),
            ]);
        }
        table.to_string()
    }
}

fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => directories::BaseDirs::new()
            .map(|dirs| dirs.home_dir().join(rest))
            .unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}
