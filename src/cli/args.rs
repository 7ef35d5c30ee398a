use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(
    author,
    version,
    about = "Reconcile active throughput probes with passive interface counters",
    long_about = "probealign runs an iperf3 measurement in both directions against a remote host,\n\
then fetches the interface counters an RRD store recorded over the same period and merges\n\
both onto one time grid.\n\
---\n\
Examples:\n\
  probealign run                                    # Two passes, fetch, merge, write CSV\n\
  probealign merge --output rerun.csv               # Re-merge saved server reports\n\
  probealign config set remote.host 192.168.1.20    # Point at another server\n\
  probealign config set store.resolution_secs 60    # Match a 60s polling interval\n\
  probealign config show                            # Show effective configuration"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (defaults to the per-user config file)
    #[arg(short, long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run both probe passes, fetch the counters and write the merged table
    Run {
        /// CSV output path (overrides output.csv_path)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,

        /// Duration of each pass in seconds (overrides probe.duration_secs)
        #[arg(short, long, value_name = "SECS")]
        duration: Option<u64>,
    },

    /// Merge previously saved server reports with the counter store
    Merge {
        /// Server report of the forward pass
        #[arg(long = "in-report", value_name = "PATH")]
        in_report: Option<PathBuf>,

        /// Server report of the reverse pass
        #[arg(long = "out-report", value_name = "PATH")]
        out_report: Option<PathBuf>,

        /// Fetch window start (epoch seconds); derived from the reports if omitted
        #[arg(long, requires = "end")]
        start: Option<u64>,

        /// Fetch window end (epoch seconds)
        #[arg(long, requires = "start")]
        end: Option<u64>,

        /// CSV output path (overrides output.csv_path)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },

    /// Show or change configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
    /// Display the effective configuration
    Show {
        /// Print raw TOML instead of a table
        #[arg(long)]
        toml: bool,
    },
    /// Print one value (e.g. store.resolution_secs)
    Get { key: String },
    /// Set one value and save the configuration file
    Set { key: String, value: String },
}

pub fn parse_args() -> Args {
    Args::parse()
}
