//! Error types for gate construction

use thiserror::Error;

/// Errors raised while building a [`ConcurrencyGate`](crate::ConcurrencyGate)
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateError {
    /// A gate needs at least one slot, otherwise every acquire would block forever
    #[error("gate capacity must be at least 1, got 0")]
    ZeroCapacity,
}

pub type Result<T> = std::result::Result<T, GateError>;
