//! Shutdown signal for the listener task
//!
//! A [`ShutdownSwitch`] is held by the lifecycle controller, every clone of
//! the paired [`ShutdownSignal`] observes it. Once tripped it stays tripped.
//!
//! ## Usage
//!
//! ```
//! use keynote_core::resilience::ShutdownSwitch;
//!
//! let switch = ShutdownSwitch::new();
//! let signal = switch.signal();
//! assert!(!signal.is_shutdown());
//!
//! switch.shutdown("operator stop");
//! assert!(signal.is_shutdown());
//! assert_eq!(switch.reason().as_deref(), Some("operator stop"));
//! ```

use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// Owner side of the shutdown signal
#[derive(Debug, Clone)]
pub struct ShutdownSwitch {
    tx: Arc<watch::Sender<bool>>,
    reason: Arc<Mutex<Option<String>>>,
}

impl ShutdownSwitch {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            reason: Arc::new(Mutex::new(None)),
        }
    }

    /// Observer for the listener task
    pub fn signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.tx.subscribe(),
        }
    }

    /// Trip the switch; later calls keep the first reason
    pub fn shutdown(&self, reason: &str) {
        {
            let mut current = self.reason.lock();
            if current.is_some() {
                return;
            }
            *current = Some(reason.to_string());
        }
        info!(reason, "Shutdown requested");
        self.tx.send_replace(true);
    }

    pub fn is_shutdown(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn reason(&self) -> Option<String> {
        self.reason.lock().clone()
    }
}

impl Default for ShutdownSwitch {
    fn default() -> Self {
        Self::new()
    }
}

/// Observer side of the shutdown signal
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    pub fn is_shutdown(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once shutdown is requested
    ///
    /// Also resolves if the switch was dropped, since nobody can trip it
    /// any more and the owner is gone.
    pub async fn wait(&mut self) {
        let _ = self.rx.wait_for(|stopped| *stopped).await;
    }

    /// Run `fut` unless shutdown comes first
    ///
    /// Returns `None` when shutdown won. Shutdown is checked first, so a
    /// tripped switch never lets a ready future through.
    pub async fn guard<F: Future>(&mut self, fut: F) -> Option<F::Output> {
        if self.is_shutdown() {
            return None;
        }
        tokio::select! {
            biased;
            _ = self.wait() => None,
            output = fut => Some(output),
        }
    }
}
