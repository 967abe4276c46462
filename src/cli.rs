//! Command-line interface definitions

use anyhow::Result;
use clap::Parser;
use std::time::Duration;

use crate::stress::{StressConfig, WorkerMode};

/// Longest hold time a worker may be asked to sleep for
const MAX_HOLD_MS: u64 = 60_000;

/// Stress a bounded-concurrency gate and verify its ceiling is never exceeded
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Maximum number of workers allowed to hold a slot at once
    #[arg(short, long, default_value = "5")]
    pub capacity: usize,

    /// Number of concurrent workers competing for slots
    ///
    /// Should exceed the capacity, otherwise nothing ever waits.
    #[arg(short, long, default_value = "10")]
    pub workers: usize,

    /// Upper bound in milliseconds of the random time each worker holds its slot
    #[arg(long, default_value = "500")]
    pub max_hold_ms: u64,

    /// Run workers as OS threads or as async tasks
    #[arg(long, value_enum, default_value = "threads")]
    pub mode: WorkerMode,

    /// Verbose output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress all output except errors)
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Validate command-line arguments
    ///
    /// # Errors
    ///
    /// Fails on a zero capacity, zero workers, or an oversized hold time.
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            anyhow::bail!("Capacity must be at least 1, got: {}", self.capacity);
        }

        if self.workers == 0 {
            anyhow::bail!("Workers must be at least 1, got: {}", self.workers);
        }

        if self.max_hold_ms > MAX_HOLD_MS {
            anyhow::bail!(
                "Max hold must be at most {MAX_HOLD_MS} ms, got: {}",
                self.max_hold_ms
            );
        }

        Ok(())
    }

    /// Build the stress configuration these arguments describe
    #[must_use]
    pub fn stress_config(&self) -> StressConfig {
        StressConfig {
            capacity: self.capacity,
            workers: self.workers,
            max_hold: Duration::from_millis(self.max_hold_ms),
            mode: self.mode,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("slotgate").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults() {
        let args = parse(&[]);
        assert_eq!(args.capacity, 5);
        assert_eq!(args.workers, 10);
        assert_eq!(args.max_hold_ms, 500);
        assert_eq!(args.mode, WorkerMode::Threads);
        assert_eq!(args.verbose, 0);
        assert!(!args.quiet);
        args.validate().unwrap();
    }

    #[test]
    fn test_stress_config_mapping() {
        let args = parse(&[
            "--capacity",
            "3",
            "--workers",
            "12",
            "--max-hold-ms",
            "25",
            "--mode",
            "tasks",
        ]);
        let config = args.stress_config();
        assert_eq!(config.capacity, 3);
        assert_eq!(config.workers, 12);
        assert_eq!(config.max_hold, Duration::from_millis(25));
        assert_eq!(config.mode, WorkerMode::Tasks);
    }

    #[test]
    fn test_verbosity_count() {
        assert_eq!(parse(&["-vvv"]).verbose, 3);
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let err = parse(&["--capacity", "0"]).validate().unwrap_err();
        assert!(err.to_string().contains("Capacity must be at least 1"));
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let err = parse(&["--workers", "0"]).validate().unwrap_err();
        assert!(err.to_string().contains("Workers must be at least 1"));
    }

    #[test]
    fn test_validate_rejects_long_hold() {
        let err = parse(&["--max-hold-ms", "60001"]).validate().unwrap_err();
        assert!(err.to_string().contains("Max hold must be at most 60000 ms"));
    }

    #[test]
    fn test_rejects_unknown_mode() {
        assert!(Args::try_parse_from(["slotgate", "--mode", "fibers"]).is_err());
    }
}
