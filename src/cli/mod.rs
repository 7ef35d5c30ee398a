mod args;

pub use args::{Args, Commands, ConfigAction, parse_args};

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use crate::align::MeasurementWindow;
use crate::config::Config;
use crate::output::{render_summary, save_csv};
use crate::probe::{ProbeSide, extract_file};
use crate::remote::{IperfClient, SshRemote};
use crate::session::{
    INBOUND_REPORT, OUTBOUND_REPORT, Session, Sources, probe_window, run_blocking,
};
use crate::store::{RrdTool, SeriesFetcher};

/// Configuration for this invocation. `config set` may name a file that does
/// not exist yet; it then starts from defaults and creates that file.
pub fn load_config(args: &Args) -> Result<Config> {
    match (&args.command, args.config.as_deref()) {
        (Commands::Config { action: ConfigAction::Set { .. } }, Some(path)) if !path.exists() => {
            Ok(Config::default())
        }
        (_, explicit) => Config::load(explicit),
    }
}

/// Log file to open for this invocation; config commands never write one.
pub fn log_file_for<'a>(args: &Args, config: &'a Config) -> Option<&'a Path> {
    match args.command {
        Commands::Config { .. } => None,
        _ => config.output.log_file(),
    }
}

pub async fn run(args: Args, config: Config) -> Result<()> {
    match args.command {
        Commands::Run { output, duration } => run_session(config, output, duration).await,
        Commands::Merge {
            in_report,
            out_report,
            start,
            end,
            output,
        } => {
            let window = start.zip(end);
            run_blocking(|| merge_saved(&config, in_report, out_report, window, output))
        }
        Commands::Config { action } => handle_config(args.config.as_deref(), config, action),
    }
}

async fn run_session(mut config: Config, output: Option<PathBuf>, duration: Option<u64>) -> Result<()> {
    if let Some(secs) = duration {
        config.probe.duration_secs = secs;
    }

    let remote = SshRemote::from_config(&config);
    let client = IperfClient::from_config(&config);
    let store = RrdTool::with_binary(&config.store.rrd_binary);

    let mut session = Session::new(&config, &remote, &client, &store);
    let report = session.run().await?;

    let path = output.unwrap_or_else(|| config.output.csv_path.clone());
    save_csv(&report.table, &path)?;
    println!("{}", render_summary(&report.table, report.overlap));
    Ok(())
}

/// Re-run fetch and merge against server reports saved by an earlier run.
fn merge_saved(
    config: &Config,
    in_report: Option<PathBuf>,
    out_report: Option<PathBuf>,
    window: Option<(u64, u64)>,
    output: Option<PathBuf>,
) -> Result<()> {
    config.validate()?;
    let resolution = config.resolution()?;
    let in_report = in_report.unwrap_or_else(|| config.output.report_dir.join(INBOUND_REPORT));
    let out_report = out_report.unwrap_or_else(|| config.output.report_dir.join(OUTBOUND_REPORT));

    let inbound = extract_file(&in_report, ProbeSide::Server)?;
    let outbound = extract_file(&out_report, ProbeSide::Server)?;

    let window = match window {
        Some((start, end)) => MeasurementWindow::enclosing(start, end, resolution)
            .context("Invalid fetch window")?,
        None => probe_window(&inbound, &outbound, resolution)?,
    };
    info!("Fetch window: {}", window);

    let store = RrdTool::with_binary(&config.store.rrd_binary);
    SeriesFetcher::new(&store, resolution).log_last_updates(&config.counter_specs());
    let sources = Sources::collect(config, &store, &inbound, &outbound, &window);
    let overlap = sources.overlap();
    let table = sources.merge(&config.schema());

    let path = output.unwrap_or_else(|| config.output.csv_path.clone());
    save_csv(&table, &path)?;
    println!("{}", render_summary(&table, overlap));
    Ok(())
}

fn handle_config(explicit: Option<&Path>, mut config: Config, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show { toml } => {
            if toml {
                print!("{}", config.to_toml()?);
            } else {
                println!("{}", config.display());
            }
        }
        ConfigAction::Get { key } => {
            println!("{}", config.get_value(&key)?);
        }
        ConfigAction::Set { key, value } => {
            config.set_value(&key, &value)?;
            config.validate()?;
            let path = match explicit {
                Some(path) => path.to_path_buf(),
                None => Config::config_file_path()?,
            };
            config.save(&path)?;
            println!("✅ {} = {} (saved to {})", key, value, path.display());
        }
    }
    Ok(())
}
