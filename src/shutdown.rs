//! Cooperative cancellation for a crawl run.
//!
//! The Ctrl+C handler flips a [`ShutdownCoordinator`]; the acquisition
//! executor checks it before starting each unit. Units already in flight are
//! never interrupted, so every dataset on disk is either complete or absent.

use once_cell::sync::OnceCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Handle shared between the signal task and the executor
pub type SharedShutdown = Arc<ShutdownCoordinator>;

static GLOBAL_SHUTDOWN: OnceCell<SharedShutdown> = OnceCell::new();

/// Install the process-wide handle. Only the first call takes effect.
pub fn set_global_shutdown(handle: SharedShutdown) {
    let _ = GLOBAL_SHUTDOWN.set(handle);
}

/// Process-wide handle, if the binary installed one
pub fn get_global_shutdown() -> Option<SharedShutdown> {
    GLOBAL_SHUTDOWN.get().cloned()
}

/// Sticky "stop starting new units" flag
#[derive(Debug, Default)]
pub struct ShutdownCoordinator {
    requested: AtomicBool,
}

impl ShutdownCoordinator {
    /// Coordinator in the running state
    pub fn new() -> Self {
        Self::default()
    }

    /// New coordinator behind an [`Arc`]
    pub fn shared() -> SharedShutdown {
        Arc::new(Self::new())
    }

    /// Request shutdown.
    ///
    /// Returns `true` for the first request and `false` if one was already
    /// pending, which lets a signal handler escalate on a repeated Ctrl+C.
    pub fn request_shutdown(&self) -> bool {
        !self.requested.swap(true, Ordering::SeqCst)
    }

    /// Whether shutdown has been requested
    pub fn is_shutdown_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}
