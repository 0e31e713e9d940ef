//! Run cancellation.
//!
//! One `InterruptToken` is constructed per run and threaded through
//! `BackendOptions` into the blocking `run_tests` call. The orchestrator does
//! not interpret the token itself; a backend that observes a triggered token
//! returns promptly with no results, which the orchestrator already grades as
//! an execution failure.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared cancellation flag for an in-progress run.
///
/// Clones share the same flag, so an embedder can keep one handle and hand
/// another to the backend.
#[derive(Debug, Clone, Default)]
pub struct InterruptToken {
    triggered: Arc<AtomicBool>,
}

impl InterruptToken {
    /// Create an untriggered token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of the run.
    pub fn trigger(&self) {
        self.triggered.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }
}
