//! Single-slot completion handle for dispatched jobs and file transfers
//!
//! A [`ResultFuture`] is created empty together with its [`Completer`]. The
//! completer is consumed by [`Completer::complete`], so a slot can be filled at
//! most once; every [`ResultFuture::take`] afterwards returns a clone of the
//! same value. An absent value (`Ok(None)` for job outcomes) is a valid
//! completion like any other.
//!
//! # Example
//!
//! ```rust
//! use searchmesh::job::future::ResultFuture;
//!
//! # tokio_test::block_on(async {
//! let (completer, future) = ResultFuture::<u32>::pending();
//! completer.complete(7).unwrap();
//! assert_eq!(future.take().await.unwrap(), 7);
//! assert_eq!(future.take().await.unwrap(), 7);
//! # });
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

/// State of the slot shared between producer and consumers
#[derive(Debug, Clone)]
enum Slot<T> {
    Pending,
    Done(T),
    Cancelled,
    Abandoned,
}

impl<T> Slot<T> {
    fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

/// Reasons a wait on a [`ResultFuture`] did not yield a value
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum WaitError {
    /// No completion arrived within the bounded wait
    #[error("no result within {0:?}")]
    Timeout(Duration),

    /// The future was cancelled before the producer completed it
    #[error("result was cancelled")]
    Cancelled,

    /// The producer was dropped without completing the slot
    #[error("result producer went away without completing")]
    Abandoned,
}

/// Consumer side of a single-slot result
pub struct ResultFuture<T> {
    slot: Arc<watch::Sender<Slot<T>>>,
}

/// Producer side of a single-slot result
pub struct Completer<T> {
    slot: Arc<watch::Sender<Slot<T>>>,
    finished: bool,
}

impl<T> Clone for ResultFuture<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T> fmt::Debug for ResultFuture<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &*self.slot.borrow() {
            Slot::Pending => "pending",
            Slot::Done(_) => "done",
            Slot::Cancelled => "cancelled",
            Slot::Abandoned => "abandoned",
        };
        f.debug_struct("ResultFuture").field("state", &state).finish()
    }
}

impl<T: Clone> ResultFuture<T> {
    /// Create an empty slot and the completer that fills it
    pub fn pending() -> (Completer<T>, ResultFuture<T>) {
        let (tx, _rx) = watch::channel(Slot::Pending);
        let slot = Arc::new(tx);
        (
            Completer {
                slot: Arc::clone(&slot),
                finished: false,
            },
            ResultFuture { slot },
        )
    }

    /// Create a future that is already completed with `value`
    pub fn ready(value: T) -> Self {
        let (tx, _rx) = watch::channel(Slot::Done(value));
        Self { slot: Arc::new(tx) }
    }

    /// Whether the slot has reached a terminal state
    pub fn is_done(&self) -> bool {
        !self.slot.borrow().is_pending()
    }

    /// Non-blocking read; `None` while still pending
    pub fn try_take(&self) -> Option<Result<T, WaitError>> {
        let slot = self.slot.borrow();
        if slot.is_pending() {
            None
        } else {
            Some(Self::resolve(&slot))
        }
    }

    /// Wait until the slot is completed and return its value
    ///
    /// Returns immediately once completed, and keeps returning the same value.
    pub async fn take(&self) -> Result<T, WaitError> {
        let mut rx = self.slot.subscribe();
        let result = match rx.wait_for(|slot| !slot.is_pending()).await {
            Ok(slot) => Self::resolve(&slot),
            // The sender lives as long as `self`, so this only happens on teardown.
            Err(_) => Err(WaitError::Abandoned),
        };
        result
    }

    /// Wait at most `timeout` for the slot to complete
    pub async fn take_timeout(&self, timeout: Duration) -> Result<T, WaitError> {
        tokio::time::timeout(timeout, self.take())
            .await
            .map_err(|_| WaitError::Timeout(timeout))?
    }

    /// Best-effort cancellation
    ///
    /// Succeeds only while the slot is still pending; the cancellation then
    /// counts as the single completion and a later `complete` is rejected.
    pub fn cancel(&self) -> bool {
        self.slot.send_if_modified(|slot| {
            if slot.is_pending() {
                *slot = Slot::Cancelled;
                true
            } else {
                false
            }
        })
    }

    fn resolve(slot: &Slot<T>) -> Result<T, WaitError> {
        match slot {
            Slot::Done(value) => Ok(value.clone()),
            Slot::Cancelled => Err(WaitError::Cancelled),
            Slot::Abandoned | Slot::Pending => Err(WaitError::Abandoned),
        }
    }
}

impl<T> Completer<T> {
    /// Fill the slot
    ///
    /// Hands the value back if the consumer cancelled first.
    pub fn complete(mut self, value: T) -> Result<(), T> {
        let mut value = Some(value);
        self.slot.send_if_modified(|slot| {
            if slot.is_pending() {
                if let Some(value) = value.take() {
                    *slot = Slot::Done(value);
                    return true;
                }
            }
            false
        });
        self.finished = true;

        match value {
            None => Ok(()),
            Some(rejected) => Err(rejected),
        }
    }

    /// Whether the consumer has already cancelled
    pub fn is_cancelled(&self) -> bool {
        matches!(*self.slot.borrow(), Slot::Cancelled)
    }
}

impl<T> Drop for Completer<T> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        self.slot.send_if_modified(|slot| {
            if slot.is_pending() {
                *slot = Slot::Abandoned;
                true
            } else {
                false
            }
        });
    }
}

impl<T> fmt::Debug for Completer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completer")
            .field("finished", &self.finished)
            .finish()
    }
}
