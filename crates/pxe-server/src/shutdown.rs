//! Per-service closing state.
//!
//! A receive error that arrives after `close()` is the expected result of
//! tearing the socket down; the loops check `is_closing()` to tell that
//! apart from a real failure.

use std::sync::{Arc, Mutex};
use tokio::sync::watch;

/// Closing flag shared between a service and whoever stops it.
///
/// Clones share the same state.
#[derive(Debug, Clone)]
pub struct Closing {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    closing: Mutex<bool>,
    signal: watch::Sender<bool>,
}

impl Default for Closing {
    fn default() -> Self {
        Self::new()
    }
}

impl Closing {
    /// Creates a new, open closing flag.
    pub fn new() -> Self {
        let (signal, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                closing: Mutex::new(false),
                signal,
            }),
        }
    }

    /// Marks the service as closing and wakes its loop. Returns `false` if
    /// it was already closing.
    pub fn close(&self) -> bool {
        {
            let mut closing = match self.inner.closing.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if *closing {
                return false;
            }
            *closing = true;
        }
        self.inner.signal.send_replace(true);
        true
    }

    /// True once `close()` has been called.
    pub fn is_closing(&self) -> bool {
        match self.inner.closing.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Resolves once `close()` has been called.
    pub async fn closed(&self) {
        let mut rx = self.inner.signal.subscribe();
        // The sender lives in `inner`, so this only errors if it is dropped
        let _ = rx.wait_for(|closing| *closing).await;
    }
}
