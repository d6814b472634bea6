use clap::Parser;
use tracing_subscriber::EnvFilter;

use ticknote::cli::commands::Cli;
use ticknote::cli::handlers;
use ticknote::io::config_io::{read_config, resolve_data_dir};

/// `-v` wins, then `TICKNOTE_LOG`, then `log.level` from config.toml
fn init_logging(config_level: &str, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("TICKNOTE_LOG")
            .or_else(|_| EnvFilter::try_new(config_level))
            .unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();

    let Some(dir) = resolve_data_dir(cli.data_dir.as_deref()) else {
        eprintln!("error: no data directory (set TICKNOTE_DIR or HOME, or pass --data-dir)");
        std::process::exit(1);
    };

    let (config, config_err) = match read_config(&dir) {
        Ok(config) => (config, None),
        Err(e) => (Default::default(), Some(e)),
    };
    init_logging(&config.log.level, cli.verbose);
    if let Some(e) = config_err {
        tracing::warn!(error = %e, "using default configuration");
    }

    if let Err(e) = handlers::dispatch(cli, dir, config) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
