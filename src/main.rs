use anyhow::Result;

use probealign::cli;
use probealign::logging;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::parse_args();
    let config = cli::load_config(&args)?;

    let log_level = logging::get_log_level(args.verbose, args.quiet);
    // Held for the whole run so the file writer flushes on exit
    let _guard = logging::setup_logger(log_level, cli::log_file_for(&args, &config))?;

    cli::run(args, config).await
}
