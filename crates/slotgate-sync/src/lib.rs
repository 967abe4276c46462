//! Bounded-concurrency gate
//!
//! This crate provides [`ConcurrencyGate`], a counting semaphore that caps the
//! number of simultaneously active workers at a fixed ceiling. Excess callers
//! wait until a slot frees up, which gives natural backpressure to whatever is
//! producing the work.
//!
//! The same gate can be shared by OS threads (blocking [`ConcurrencyGate::acquire`])
//! and async tasks ([`ConcurrencyGate::acquire_async`]).
//!
//! # Example
//!
//! ```rust
//! use slotgate_sync::ConcurrencyGate;
//! use std::thread;
//!
//! let gate = ConcurrencyGate::new(4).unwrap();
//!
//! // Spawn many threads, but only 4 do work at once
//! let handles: Vec<_> = (0..16)
//!     .map(|i| {
//!         let gate = gate.clone();
//!         thread::spawn(move || {
//!             let permit = gate.acquire();
//!             let out = i * 2;
//!             permit.release();
//!             out
//!         })
//!     })
//!     .collect();
//!
//! for handle in handles {
//!     handle.join().unwrap();
//! }
//! assert_eq!(gate.available_permits(), 4);
//! ```

mod error;
mod gate;

pub use error::{GateError, Result};
pub use gate::{Acquire, ConcurrencyGate, Permit};
