use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use herald_common::observability::{LogConfig, init_logging};
use herald_config::{HeraldConfig, HeraldConfigLoader};
use tokio_util::sync::CancellationToken;
use tracing::info;

use commands::Command;
mod commands;

const DEFAULT_CONFIG_FILE: &str = "herald.yaml";

/// Watch package indexes and code hosts for new releases and announce them.
#[derive(Parser, Debug)]
#[command(name = "herald", author, version, about, long_about = None)]
struct Cli {
    /// YAML configuration file; `herald.yaml` in the working directory when omitted.
    #[arg(short, long, global = true, env = "HERALD_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

fn load_config(path: Option<&PathBuf>) -> Result<HeraldConfig> {
    let loader = match path {
        Some(path) => HeraldConfigLoader::new().with_file(path),
        None => HeraldConfigLoader::new().with_optional_file(DEFAULT_CONFIG_FILE),
    };
    loader.load().context("loading configuration")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Env wins over the file.
    let cfg = load_config(cli.config.as_ref())?;

    let log_path = init_logging(LogConfig {
        log_dir: cfg.logging.dir.clone(),
        emit_stderr: cfg.logging.stderr,
        format: cfg.logging.format,
        default_filter: cfg.logging.filter.clone(),
        ..LogConfig::default()
    })?;
    info!(log = %log_path.display(), command = cli.command.name(), "herald.start");

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });

    tokio::select! {
        res = commands::run(cli.command, &cfg, cancel.clone()) => res,
        _ = cancel.cancelled() => {
            info!("herald.interrupted");
            Ok(())
        }
    }
}
