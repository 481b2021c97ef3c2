//! Request/response correlation.
//!
//! A device answers on the same mux address it was asked on and carries no
//! request identifier, so a reply is matched to "whoever is waiting right now".
//!
//! - [`Correlator`] holds at most one pending wait. Arm it *before* writing the
//!   request, otherwise a fast reply can land before anybody is listening.
//! - [`OnceSlot`] is resolved at most once and never reset, for values that do
//!   not change for the lifetime of the tool (the device serial number).

use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{oneshot, watch};

/// Single-slot correlator for replies on one channel.
///
/// Arming replaces any previous wait. After a timeout the sender stays in the
/// slot, so a late reply is delivered into a dropped receiver and lost. If the
/// late reply arrives after the *next* arm it will satisfy that wait instead;
/// callers that need stronger guarantees must pace their requests.
pub struct Correlator<T> {
    pending: Mutex<Option<oneshot::Sender<T>>>,
}

impl<T> Correlator<T> {
    /// Create an unarmed correlator.
    pub fn new() -> Self {
        Correlator {
            pending: Mutex::new(None),
        }
    }

    /// Register a fresh wait.
    pub fn arm(&self) -> PendingResponse<T> {
        let (tx, rx) = oneshot::channel();
        *self.pending.lock() = Some(tx);
        PendingResponse { rx }
    }

    /// Hand `value` to the current waiter.
    ///
    /// Returns false when nobody is waiting or the waiter has given up.
    pub fn fulfill(&self, value: T) -> bool {
        match self.pending.lock().take() {
            Some(tx) => tx.send(value).is_ok(),
            None => false,
        }
    }

    /// Whether a wait is armed and not yet fulfilled.
    pub fn is_armed(&self) -> bool {
        self.pending.lock().is_some()
    }
}

impl<T> Default for Correlator<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// The receiving side of an armed [`Correlator`].
pub struct PendingResponse<T> {
    rx: oneshot::Receiver<T>,
}

impl<T> PendingResponse<T> {
    /// Wait up to `timeout` for the reply.
    ///
    /// Returns `None` on timeout or when the wait was superseded by a newer arm.
    pub async fn wait(self, timeout: Duration) -> Option<T> {
        match tokio::time::timeout(timeout, self.rx).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(_)) => None,
            Err(_) => None,
        }
    }
}

/// A value that is set at most once and can be awaited any number of times.
pub struct OnceSlot<T> {
    tx: watch::Sender<Option<T>>,
}

impl<T: Clone> OnceSlot<T> {
    /// Create an empty slot.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        OnceSlot { tx }
    }

    /// Set the value if it is not already set.
    ///
    /// Returns false (and drops `value`) if the slot was already resolved.
    pub fn fulfill(&self, value: T) -> bool {
        self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(value);
            true
        })
    }

    /// Current value, if resolved.
    pub fn get(&self) -> Option<T> {
        self.tx.borrow().clone()
    }

    /// Whether the slot has been resolved.
    pub fn is_resolved(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// Wait up to `timeout` for the value.
    ///
    /// Resolves immediately if the slot is already set. A timeout leaves the
    /// slot untouched, so a later call can still observe a late value.
    pub async fn wait(&self, timeout: Duration) -> Option<T> {
        let mut rx = self.tx.subscribe();
        let value = match tokio::time::timeout(timeout, rx.wait_for(Option::is_some)).await {
            Ok(Ok(value)) => value.clone(),
            _ => None,
        };
        value
    }
}

impl<T: Clone> Default for OnceSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}
