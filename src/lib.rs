// Re-export modules so they can be used from tests
pub mod align;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod merge;
pub mod metrics;
pub mod output;
pub mod probe;
pub mod remote;
pub mod session;
pub mod store;
