mod cli;
mod report;

use clap::Parser;
use eyre::Result;
use flashfill_core::{FillConfig, FillOptions, FillOrchestrator, SystemSpaceProbe};

use crate::cli::Cli;

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = FillConfig::from_env()?;
    log::debug!("configuration: {config:?}");

    let options = FillOptions {
        skip_capacity_check: cli.skip_size_check,
        clear_destination: !cli.keep_existing,
        show_progress: !cli.no_progress && !cli.json,
    };
    let probe = SystemSpaceProbe;
    let summary = FillOrchestrator::new(&config, &probe).run(&options)?;

    report::print_summary(&summary, cli.json, cli.verbose)
}
