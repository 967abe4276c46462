//! Error handling and types

use thiserror::Error;

/// Errors raised while running or checking a stress run
#[derive(Error, Debug)]
pub enum StressError {
    /// The gate could not be built
    #[error("Gate error: {0}")]
    Gate(#[from] slotgate_sync::GateError),

    /// Standard I/O error (thread spawn, runtime startup)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration error
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A worker panicked before it finished
    #[error("Worker {0} panicked")]
    WorkerPanicked(usize),

    /// More workers held a slot at once than the gate allows
    #[error("Observed {peak} concurrent holders, capacity is {capacity}")]
    CapacityExceeded { peak: usize, capacity: usize },

    /// Some workers never finished
    #[error("Only {completed} of {workers} workers completed")]
    Incomplete { completed: usize, workers: usize },
}

pub type Result<T> = std::result::Result<T, StressError>;
