use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use rotalog::destination::is_rotated_sibling;
use rotalog::{log_debug, log_error, Config, Registry, RotationTicker};

/// Exercise rotalog from several threads at once
#[derive(Debug, Parser)]
#[command(name = "rotalog", version, about)]
struct Args {
    /// Config file (default: ~/.rotalog/config.toml, or the default logger if absent)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of logging threads
    #[arg(short, long, default_value_t = 6)]
    threads: usize,

    /// Message pairs each thread writes
    #[arg(short, long, default_value_t = 1000)]
    messages: usize,

    /// Seconds to keep the ticker running after the threads finish
    #[arg(long, default_value_t = 0)]
    hold_secs: u64,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rotalog=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    config
        .install_diagnostics()
        .context("Failed to configure diagnostics path")?;

    let mut registry = config.build_registry().context("Invalid logger configuration")?;
    if registry.is_empty() {
        let logger = registry
            .default_logger()
            .context("Failed to create the default logger")?;
        tracing::info!(logger = logger.name(), "no loggers configured, using the default logger");
    }
    let registry = Arc::new(registry);

    let ticker = RotationTicker::start(Arc::clone(&registry), config.ticker_config())?;

    let started = Instant::now();
    thread::scope(|s| {
        for _ in 0..args.threads {
            let registry = &registry;
            s.spawn(move || write_messages(registry, args.messages));
        }
    });
    let elapsed = started.elapsed();
    println!(
        "{} threads x {} messages in {:.3}s",
        args.threads,
        args.messages * 2,
        elapsed.as_secs_f64()
    );

    if args.hold_secs > 0 {
        tracing::info!(secs = args.hold_secs, "holding for rotation");
        thread::sleep(Duration::from_secs(args.hold_secs));
    }

    let stats = ticker.shutdown();
    tracing::info!(passes = stats.passes, failures = stats.failures, "ticker stopped");

    let failures = registry.close_all();
    if failures > 0 {
        tracing::warn!(failures, "some destinations failed to close");
    }

    print_log_files(&registry)?;
    Ok(())
}

/// Write `count` DEBUG/ERROR pairs to every registered logger
fn write_messages(registry: &Registry, count: usize) {
    for i in 0..count {
        for logger in registry.loggers() {
            log_debug!(logger, "message {} of {}", i, count);
            log_error!(logger, "message {} of {}", i, count);
        }
    }
}

/// Print each file destination's current and rotated files
fn print_log_files(registry: &Registry) -> Result<()> {
    for logger in registry.loggers() {
        for dest in logger.destinations() {
            let Some(path) = dest.path() else {
                continue;
            };
            println!("{}/{}: {}", logger.name(), dest.name(), path.display());

            let Some(dir) = path.parent() else {
                continue;
            };
            let entries = std::fs::read_dir(dir)
                .with_context(|| format!("Failed to list {}", dir.display()))?;
            let mut rotated: Vec<PathBuf> = entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| is_rotated_sibling(&path, p))
                .collect();
            rotated.sort();
            for file in rotated {
                println!("  rotated: {}", file.display());
            }
        }
    }
    Ok(())
}
