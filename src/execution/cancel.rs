//! Cooperative Cancellation
//!
//! A shared atomic flag passed into the worker at start time and checked
//! at defined suspension points: before each step, and inside the
//! per-line read loop of the active step. Setting the flag guarantees no
//! new step starts and that the active process is asked to terminate; it
//! does not guarantee the OS process dies instantly.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cloneable cancellation token shared between caller and worker.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a token in the not-cancelled state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Returns true once cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_starts_not_cancelled() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let token = CancelToken::new();
        token.cancel();
        token.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_clones_share_state() {
        let token = CancelToken::new();
        let clone = token.clone();

        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_visible_across_threads() {
        let token = CancelToken::new();
        let worker_token = token.clone();

        let handle = thread::spawn(move || {
            while !worker_token.is_cancelled() {
                thread::yield_now();
            }
            true
        });

        token.cancel();
        assert!(handle.join().unwrap());
    }
}
