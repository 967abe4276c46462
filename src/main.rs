//! slotgate: stress a bounded-concurrency gate
//!
//! Launches more workers than the gate has slots and reports whether the
//! number of simultaneous holders ever exceeded the configured capacity.

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, Level};

use slotgate::cli::Args;
use slotgate::stress;

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging based on verbosity and quiet mode
    if args.quiet {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(Level::ERROR)
            .with_target(false)
            .finish();

        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(match args.verbose {
                0 => Level::WARN,
                1 => Level::INFO,
                2 => Level::DEBUG,
                _ => Level::TRACE,
            })
            .with_target(false)
            .with_thread_names(args.verbose > 1)
            .finish();

        tracing::subscriber::set_global_default(subscriber)?;
    }

    info!("Starting slotgate v{}", env!("CARGO_PKG_VERSION"));
    info!("Capacity: {}", args.capacity);
    info!("Workers: {}", args.workers);
    info!("Max hold: {} ms", args.max_hold_ms);
    info!("Mode: {:?}", args.mode);

    // Validate arguments
    args.validate().context("Invalid arguments")?;

    let report = stress::run(&args.stress_config()).context("Stress run failed")?;

    if !args.quiet {
        println!(
            "capacity={} workers={} completed={} peak={} elapsed={:?}",
            report.capacity,
            report.workers,
            report.completed,
            report.peak_holders,
            report.elapsed
        );
    }

    if let Err(e) = report.check() {
        error!("{e}");
        return Err(e).context("Concurrency ceiling check failed");
    }

    info!("Concurrency ceiling held");
    Ok(())
}
