//! Entry point for the audiobook player.
//!
//! Responsibilities here are intentionally minimal:
//! - Parse command-line arguments.
//! - Load user configuration from `conf/config.toml`.
//! - Launch the player for the requested audiobook.

mod app;
mod audio;
mod cache;
mod config;

use crate::app::{LaunchOptions, run_app};
use crate::config::load_config;
use anyhow::{Context, Result, anyhow, bail};
use glowtalk_core::WorkId;
use std::env;
use std::path::Path;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*, reload};

type ReloadHandle = reload::Handle<EnvFilter, tracing_subscriber::Registry>;

const USAGE: &str = "Usage: glowtalk-player <audiobook-id> [--total <units>]";

fn main() {
    let reload_handle = init_tracing();
    if let Err(err) = run(&reload_handle) {
        error!("{err:?}");
        std::process::exit(1);
    }
}

fn run(reload_handle: &ReloadHandle) -> Result<()> {
    let options = parse_args(env::args().skip(1))?;
    let config = load_config(Path::new("conf/config.toml"));
    set_log_level(reload_handle, config.log_level.as_filter_str());
    info!(
        work = %options.work,
        server = %config.server_url,
        level = %config.log_level,
        "Starting audiobook player"
    );
    info!(
        cache_dir = %config.cache_dir,
        volume = config.volume,
        autoplay = config.autoplay,
        status_poll_secs = config.status_poll_secs,
        "Active playback configuration"
    );
    run_app(config, options).context("Player exited with an error")?;
    Ok(())
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<LaunchOptions> {
    let mut work = None;
    let mut total_units = None;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--total" => {
                let value = args.next().ok_or_else(|| anyhow!(USAGE))?;
                let total = value
                    .parse::<usize>()
                    .with_context(|| format!("Invalid --total value `{value}`"))?;
                total_units = Some(total);
            }
            "-h" | "--help" => bail!(USAGE),
            other if work.is_none() => {
                let id = other
                    .parse::<u64>()
                    .with_context(|| format!("Invalid audiobook id `{other}`"))?;
                work = Some(WorkId(id));
            }
            other => bail!("Unexpected argument `{other}`\n{USAGE}"),
        }
    }
    let work = work.ok_or_else(|| anyhow!(USAGE))?;
    Ok(LaunchOptions { work, total_units })
}

fn init_tracing() -> ReloadHandle {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let (filter_layer, handle) = reload::Layer::new(env_filter);
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_filter(filter_layer),
        )
        .init();
    warn!("Logging initialized; override level with config.log_level or RUST_LOG");
    handle
}

fn set_log_level(handle: &ReloadHandle, level: &str) {
    let parsed = EnvFilter::builder()
        .parse(level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    if let Err(err) = handle.modify(|filter| *filter = parsed) {
        warn!(%level, "Failed to update log level from config: {err}");
    } else {
        info!(%level, "Applied log level from config");
    }
}
