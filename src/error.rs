use std::path::PathBuf;

use thiserror::Error;

/// Failures talking to the remote probe server or the local probe client.
///
/// These abort the pass they occur in; the session still tries to stop a
/// server it started before propagating them.
#[derive(Error, Debug)]
pub enum TransportError {
    /// A command could not be spawned at all
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// A command ran but exited unsuccessfully
    #[error("`{program}` exited with status {status}: {stderr}")]
    CommandFailed {
        program: String,
        status: i32,
        stderr: String,
    },

    /// The remote server did not report a usable process id
    #[error("remote server returned an invalid pid: {0:?}")]
    InvalidPid(String),

    /// A saved probe report could not be read
    #[error("failed to read probe report {path}: {source}")]
    Report {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures fetching one named series from the counter store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("counter store command failed for {series}: {reason}")]
    Command { series: String, reason: String },

    #[error("unparseable counter store output for {series} at line {line}: {text:?}")]
    Parse {
        series: String,
        line: usize,
        text: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Invalid grid parameters.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum AlignError {
    #[error("resolution must be greater than zero")]
    ZeroStep,

    #[error("interval start {start} is after its end {end}")]
    Inverted { start: u64, end: u64 },
}

/// Invalid or unreadable configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("unknown configuration key: '{0}'")]
    UnknownKey(String),
}
