//! Counting gate shared by threads and async tasks
//!
//! A [`ConcurrencyGate`] owns a fixed number of slots. Callers claim a slot
//! with [`ConcurrencyGate::acquire`] (parks the thread) or
//! [`ConcurrencyGate::acquire_async`] (suspends the task) and give it back by
//! releasing or dropping the returned [`Permit`].
//!
//! # Example
//!
//! ```rust
//! use slotgate_sync::ConcurrencyGate;
//!
//! let gate = ConcurrencyGate::new(2).unwrap();
//!
//! let first = gate.acquire();
//! let second = gate.acquire();
//! assert!(gate.try_acquire().is_none());
//!
//! first.release();
//! assert_eq!(gate.available_permits(), 1);
//! drop(second);
//! assert_eq!(gate.available_permits(), 2);
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, Waker};

use tracing::{debug, trace};

use crate::error::{GateError, Result};

/// A bounded-concurrency gate
///
/// At most [`capacity`](Self::capacity) permits are outstanding at any instant.
/// Clones are cheap and share the same pool of slots, so a gate can be handed
/// to any number of threads or tasks.
///
/// # Design
///
/// - **Single lock**: the free-slot count and the waiter queue live behind one
///   `Mutex`, so taking a slot and registering as a waiter are atomic with
///   respect to each other and no wakeup can be missed
/// - **Wake one**: a release wakes at most one waiter, oldest first
/// - **Barging allowed**: a caller arriving while a woken waiter is still on its
///   way back may take the slot first. The waiter that lost the race is put back
///   at the head of the queue. Strict FIFO is not promised
/// - **RAII permits**: [`Permit`] releases its slot when dropped, including
///   during unwinding
///
/// There is no shutdown. A teardown feature would turn the acquire return
/// type into `Result<Permit>` with a dedicated [`GateError`] variant.
#[derive(Clone)]
pub struct ConcurrencyGate {
    inner: Arc<GateInner>,
}

struct GateInner {
    /// Fixed at construction
    capacity: usize,
    state: Mutex<GateState>,
}

#[derive(Debug)]
struct GateState {
    /// Unclaimed slots, always `<= capacity`
    available: usize,
    /// Tasks and threads parked until a slot frees up
    waiters: VecDeque<Waiter>,
    next_waiter_id: u64,
}

#[derive(Debug)]
struct Waiter {
    id: u64,
    waker: Waker,
}

impl GateState {
    fn enqueue(&mut self, waker: Waker, at_front: bool) -> u64 {
        let id = self.next_waiter_id;
        self.next_waiter_id = self.next_waiter_id.wrapping_add(1);
        let waiter = Waiter { id, waker };
        if at_front {
            self.waiters.push_front(waiter);
        } else {
            self.waiters.push_back(waiter);
        }
        id
    }

    fn find_mut(&mut self, id: u64) -> Option<&mut Waiter> {
        self.waiters.iter_mut().find(|w| w.id == id)
    }

    /// Returns false if the waiter was already dequeued by a release
    fn remove(&mut self, id: u64) -> bool {
        match self.waiters.iter().position(|w| w.id == id) {
            Some(index) => {
                self.waiters.remove(index);
                true
            }
            None => false,
        }
    }

    /// Dequeue the next waiter to wake, but only if there is a slot for it
    fn next_to_wake(&mut self) -> Option<Waker> {
        if self.available == 0 {
            return None;
        }
        self.waiters.pop_front().map(|w| w.waker)
    }
}

impl ConcurrencyGate {
    /// Create a gate with `capacity` slots, all immediately available
    ///
    /// # Errors
    ///
    /// Returns [`GateError::ZeroCapacity`] if `capacity` is 0.
    ///
    /// # Example
    ///
    /// ```rust
    /// use slotgate_sync::{ConcurrencyGate, GateError};
    ///
    /// let gate = ConcurrencyGate::new(8).unwrap();
    /// assert_eq!(gate.capacity(), 8);
    ///
    /// assert_eq!(ConcurrencyGate::new(0).unwrap_err(), GateError::ZeroCapacity);
    /// ```
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(GateError::ZeroCapacity);
        }
        debug!(capacity, "created concurrency gate");
        Ok(Self {
            inner: Arc::new(GateInner {
                capacity,
                state: Mutex::new(GateState {
                    available: capacity,
                    waiters: VecDeque::new(),
                    next_waiter_id: 0,
                }),
            }),
        })
    }

    /// Claim a slot, parking the calling thread until one is free
    ///
    /// Must not be called from inside an async task: it blocks the executor
    /// thread. Use [`acquire_async`](Self::acquire_async) there instead.
    pub fn acquire(&self) -> Permit {
        futures::executor::block_on(self.acquire_async())
    }

    /// Claim a slot, suspending the current task until one is free
    ///
    /// The returned future may be dropped before it completes. Doing so leaves
    /// the queue, and a wakeup it had already received is handed on to the
    /// next waiter.
    ///
    /// # Example
    ///
    /// ```rust
    /// use slotgate_sync::ConcurrencyGate;
    ///
    /// let gate = ConcurrencyGate::new(1).unwrap();
    /// let permit = futures::executor::block_on(gate.acquire_async());
    /// assert_eq!(gate.in_use(), 1);
    /// permit.release();
    /// ```
    pub fn acquire_async(&self) -> Acquire<'_> {
        Acquire {
            gate: self,
            waiter: None,
        }
    }

    /// Claim a slot only if one is free right now
    ///
    /// This does not queue and may take a slot ahead of callers that are
    /// already waiting.
    ///
    /// ```rust
    /// use slotgate_sync::ConcurrencyGate;
    ///
    /// let gate = ConcurrencyGate::new(1).unwrap();
    /// let permit = gate.try_acquire();
    /// assert!(permit.is_some());
    /// assert!(gate.try_acquire().is_none());
    /// ```
    #[must_use]
    pub fn try_acquire(&self) -> Option<Permit> {
        let mut state = self.lock();
        if state.available == 0 {
            return None;
        }
        state.available -= 1;
        trace!(available = state.available, "permit acquired without waiting");
        drop(state);
        Some(Permit { gate: self.clone() })
    }

    /// Maximum number of simultaneously held permits
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Number of unclaimed slots
    ///
    /// Only a snapshot; another caller may change it right after it is read.
    #[must_use]
    pub fn available_permits(&self) -> usize {
        self.lock().available
    }

    /// Number of permits currently held (capacity - available)
    #[must_use]
    pub fn in_use(&self) -> usize {
        self.inner.capacity - self.available_permits()
    }

    /// Number of callers queued for a slot
    #[must_use]
    pub fn waiting(&self) -> usize {
        self.lock().waiters.len()
    }

    fn same_gate(&self, other: &ConcurrencyGate) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    // The guarded state is two counters and a queue that are never left
    // half-updated, so a poisoned lock is still consistent.
    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Return one slot and wake the oldest waiter, if any
    fn release_slot(&self) {
        let waker = {
            let mut state = self.lock();
            debug_assert!(
                state.available < self.inner.capacity,
                "permit released to a gate that has no slots outstanding"
            );
            state.available += 1;
            trace!(
                available = state.available,
                waiting = state.waiters.len(),
                "permit released"
            );
            state.next_to_wake()
        };

        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

impl fmt::Debug for ConcurrencyGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("ConcurrencyGate")
            .field("capacity", &self.inner.capacity)
            .field("available", &state.available)
            .field("waiting", &state.waiters.len())
            .finish()
    }
}

/// Ownership of one gate slot
///
/// Returned by [`ConcurrencyGate::acquire`], [`ConcurrencyGate::acquire_async`]
/// and [`ConcurrencyGate::try_acquire`]. The slot goes back to the gate exactly
/// once: either through [`release`](Self::release), which consumes the permit,
/// or when the permit is dropped. A permit may be sent to and released from a
/// different thread than the one that acquired it.
///
/// ```rust
/// use slotgate_sync::ConcurrencyGate;
///
/// let gate = ConcurrencyGate::new(1).unwrap();
/// {
///     let _permit = gate.acquire();
///     assert_eq!(gate.available_permits(), 0);
/// } // released here
/// assert_eq!(gate.available_permits(), 1);
/// ```
#[must_use = "dropping a permit releases its slot immediately"]
pub struct Permit {
    /// Only used to route the release back to the issuing gate
    gate: ConcurrencyGate,
}

impl Permit {
    /// Give the slot back to the gate
    pub fn release(self) {
        drop(self);
    }

    /// Whether this permit was issued by `gate` (or a clone of it)
    #[must_use]
    pub fn is_from(&self, gate: &ConcurrencyGate) -> bool {
        self.gate.same_gate(gate)
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        self.gate.release_slot();
    }
}

impl fmt::Debug for Permit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Permit")
            .field("capacity", &self.gate.capacity())
            .finish_non_exhaustive()
    }
}

/// Future returned by [`ConcurrencyGate::acquire_async`]
///
/// Each poll either takes a free slot or makes sure this future's waker is in
/// the gate's queue. Both happen under the gate lock, so a release can never
/// slip in between the check and the registration.
#[must_use = "futures do nothing unless polled"]
pub struct Acquire<'a> {
    gate: &'a ConcurrencyGate,
    /// Queue id while registered as a waiter
    waiter: Option<u64>,
}

impl Future for Acquire<'_> {
    type Output = Permit;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let gate = self.gate;
        let mut state = gate.lock();

        if state.available > 0 {
            state.available -= 1;
            if let Some(id) = self.waiter.take() {
                state.remove(id);
            }
            trace!(available = state.available, "permit acquired");
            drop(state);
            return Poll::Ready(Permit { gate: gate.clone() });
        }

        let registered = self.waiter;
        match registered {
            Some(id) => match state.find_mut(id) {
                Some(waiter) => {
                    if !waiter.waker.will_wake(cx.waker()) {
                        waiter.waker = cx.waker().clone();
                    }
                }
                None => {
                    // Woken, but another caller took the slot first
                    let id = state.enqueue(cx.waker().clone(), true);
                    self.waiter = Some(id);
                    trace!(waiting = state.waiters.len(), "lost slot race, requeued");
                }
            },
            None => {
                let id = state.enqueue(cx.waker().clone(), false);
                self.waiter = Some(id);
                trace!(waiting = state.waiters.len(), "no free slot, waiting");
            }
        }

        Poll::Pending
    }
}

impl Drop for Acquire<'_> {
    fn drop(&mut self) {
        let Some(id) = self.waiter.take() else {
            return;
        };

        let waker = {
            let mut state = self.gate.lock();
            if state.remove(id) {
                None
            } else {
                // Already dequeued by a release that meant to wake us
                state.next_to_wake()
            }
        };

        if let Some(waker) = waker {
            waker.wake();
        }
    }
}
