//! slotgate: bounded-concurrency gate and stress harness
//!
//! The gate primitive lives in the `slotgate-sync` crate and is re-exported
//! here. This crate adds a harness that drives a gate with many concurrent
//! workers, records the peak number of simultaneous holders, and checks it
//! against the configured capacity.

pub mod cli;
pub mod error;
pub mod stress;

// Re-export commonly used types
pub use error::{Result, StressError};
pub use slotgate_sync::{ConcurrencyGate, GateError, Permit};
pub use stress::{StressConfig, StressReport, WorkerMode};
