//! Stress harness for the concurrency gate
//!
//! Launches more workers than the gate has slots. Each worker acquires a
//! permit, marks itself active, holds the slot for a random time, then leaves
//! and releases. The highest number of simultaneously active workers is
//! recorded so the run can be checked against the gate's capacity.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use rand::Rng;
use slotgate_sync::ConcurrencyGate;
use tracing::{debug, info, warn};

use crate::error::{Result, StressError};

/// How workers are scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum WorkerMode {
    /// One OS thread per worker, blocking acquire
    Threads,
    /// One compio task per worker on a single runtime, async acquire
    Tasks,
}

/// Parameters of a stress run
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Gate capacity
    pub capacity: usize,
    /// Number of concurrent workers to launch
    pub workers: usize,
    /// Upper bound of the random time each worker holds its slot
    pub max_hold: Duration,
    /// Threads or async tasks
    pub mode: WorkerMode,
}

impl StressConfig {
    /// Reject configurations that cannot produce a meaningful run
    ///
    /// # Errors
    ///
    /// Returns [`StressError::InvalidConfig`] if there are no workers.
    /// A zero capacity is left to the gate, which rejects it itself.
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(StressError::InvalidConfig(
                "at least one worker is required".to_string(),
            ));
        }
        Ok(())
    }
}

/// Outcome of a stress run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StressReport {
    /// Gate capacity used for the run
    pub capacity: usize,
    /// Number of workers launched
    pub workers: usize,
    /// Number of workers that finished
    pub completed: usize,
    /// Highest number of workers seen holding a slot at once
    pub peak_holders: usize,
    /// Wall-clock duration of the run
    pub elapsed: Duration,
}

impl StressReport {
    /// Verify the capacity ceiling held and every worker finished
    ///
    /// # Errors
    ///
    /// [`StressError::CapacityExceeded`] if the peak went above capacity,
    /// [`StressError::Incomplete`] if any worker did not finish.
    pub fn check(&self) -> Result<()> {
        if self.peak_holders > self.capacity {
            return Err(StressError::CapacityExceeded {
                peak: self.peak_holders,
                capacity: self.capacity,
            });
        }
        if self.completed != self.workers {
            return Err(StressError::Incomplete {
                completed: self.completed,
                workers: self.workers,
            });
        }
        Ok(())
    }
}

/// Shared counters updated by every worker
#[derive(Debug, Default)]
struct HolderStats {
    active: AtomicUsize,
    peak: AtomicUsize,
    completed: AtomicUsize,
}

impl HolderStats {
    fn enter(&self, capacity: usize) {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if now > capacity {
            warn!(now, capacity, "more holders than the gate allows");
        }
    }

    fn leave(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
        self.completed.fetch_add(1, Ordering::SeqCst);
    }
}

fn random_hold(max: Duration) -> Duration {
    if max.is_zero() {
        return Duration::ZERO;
    }
    rand::thread_rng().gen_range(Duration::ZERO..=max)
}

/// Run the stress workload described by `config`
///
/// # Errors
///
/// Fails if the configuration or gate is invalid, a worker could not be
/// started, or a worker panicked. A capacity breach is not an error here;
/// call [`StressReport::check`] on the result.
pub fn run(config: &StressConfig) -> Result<StressReport> {
    config.validate()?;
    let gate = ConcurrencyGate::new(config.capacity)?;
    let stats = Arc::new(HolderStats::default());

    info!(
        capacity = config.capacity,
        workers = config.workers,
        mode = ?config.mode,
        "starting stress run"
    );
    let started = Instant::now();

    match config.mode {
        WorkerMode::Threads => run_threads(&gate, &stats, config)?,
        WorkerMode::Tasks => run_tasks(&gate, &stats, config)?,
    }

    let report = StressReport {
        capacity: config.capacity,
        workers: config.workers,
        completed: stats.completed.load(Ordering::SeqCst),
        peak_holders: stats.peak.load(Ordering::SeqCst),
        elapsed: started.elapsed(),
    };
    info!(
        peak = report.peak_holders,
        completed = report.completed,
        elapsed = ?report.elapsed,
        "stress run finished"
    );
    Ok(report)
}

fn run_threads(
    gate: &ConcurrencyGate,
    stats: &Arc<HolderStats>,
    config: &StressConfig,
) -> Result<()> {
    let mut handles = Vec::with_capacity(config.workers);
    for id in 0..config.workers {
        let gate = gate.clone();
        let stats = stats.clone();
        let capacity = config.capacity;
        let hold = random_hold(config.max_hold);
        let handle = thread::Builder::new()
            .name(format!("worker-{id}"))
            .spawn(move || {
                let permit = gate.acquire();
                stats.enter(capacity);
                debug!(id, ?hold, "worker holding slot");
                thread::sleep(hold);
                stats.leave();
                permit.release();
            })?;
        handles.push(handle);
    }

    for (id, handle) in handles.into_iter().enumerate() {
        handle.join().map_err(|_| StressError::WorkerPanicked(id))?;
    }
    Ok(())
}

fn run_tasks(
    gate: &ConcurrencyGate,
    stats: &Arc<HolderStats>,
    config: &StressConfig,
) -> Result<()> {
    let runtime = compio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let mut handles = Vec::with_capacity(config.workers);
        for id in 0..config.workers {
            let gate = gate.clone();
            let stats = stats.clone();
            let capacity = config.capacity;
            let hold = random_hold(config.max_hold);
            handles.push(compio::runtime::spawn(async move {
                let permit = gate.acquire_async().await;
                stats.enter(capacity);
                debug!(id, ?hold, "task holding slot");
                compio::time::sleep(hold).await;
                stats.leave();
                permit.release();
            }));
        }

        for (id, handle) in handles.into_iter().enumerate() {
            handle.await.map_err(|_| StressError::WorkerPanicked(id))?;
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use rstest::rstest;

    fn config(capacity: usize, workers: usize, mode: WorkerMode) -> StressConfig {
        StressConfig {
            capacity,
            workers,
            max_hold: Duration::from_millis(20),
            mode,
        }
    }

    #[rstest]
    #[case(WorkerMode::Threads)]
    #[case(WorkerMode::Tasks)]
    fn test_run_stays_within_capacity(#[case] mode: WorkerMode) {
        let report = run(&config(5, 10, mode)).unwrap();
        assert_eq!(report.capacity, 5);
        assert_eq!(report.workers, 10);
        assert_eq!(report.completed, 10);
        assert!(report.peak_holders >= 1);
        assert!(report.peak_holders <= 5);
        report.check().unwrap();
    }

    #[test]
    fn test_run_single_slot_serializes_workers() {
        let report = run(&config(1, 6, WorkerMode::Threads)).unwrap();
        assert_eq!(report.peak_holders, 1);
        assert_eq!(report.completed, 6);
    }

    #[test]
    fn test_run_zero_hold() {
        let cfg = StressConfig {
            max_hold: Duration::ZERO,
            ..config(3, 30, WorkerMode::Threads)
        };
        run(&cfg).unwrap().check().unwrap();
    }

    #[test]
    fn test_run_rejects_zero_capacity() {
        let err = run(&config(0, 4, WorkerMode::Threads)).unwrap_err();
        assert!(matches!(
            err,
            StressError::Gate(slotgate_sync::GateError::ZeroCapacity)
        ));
    }

    #[test]
    fn test_run_rejects_zero_workers() {
        let err = run(&config(2, 0, WorkerMode::Threads)).unwrap_err();
        assert!(matches!(err, StressError::InvalidConfig(_)));
    }

    #[test]
    fn test_random_hold_bounds() {
        assert_eq!(random_hold(Duration::ZERO), Duration::ZERO);
        let max = Duration::from_millis(7);
        for _ in 0..100 {
            assert!(random_hold(max) <= max);
        }
    }

    #[test]
    fn test_check_flags_capacity_breach() {
        let report = StressReport {
            capacity: 2,
            workers: 4,
            completed: 4,
            peak_holders: 3,
            elapsed: Duration::ZERO,
        };
        assert!(matches!(
            report.check(),
            Err(StressError::CapacityExceeded { peak: 3, capacity: 2 })
        ));
    }

    #[test]
    fn test_check_flags_incomplete_run() {
        let report = StressReport {
            capacity: 2,
            workers: 4,
            completed: 3,
            peak_holders: 2,
            elapsed: Duration::ZERO,
        };
        assert!(matches!(
            report.check(),
            Err(StressError::Incomplete { completed: 3, workers: 4 })
        ));
    }
}
