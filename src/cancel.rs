//! Cooperative cancellation shared between the driver and whoever feeds it jobs.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

/// A cloneable flag signalling that the current job has been superseded.
///
/// Fills observe it between sync points, searches between nonces. Work in flight
/// is never interrupted halfway through a segment.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests that the current job be abandoned.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Whether cancellation was requested.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Clears the flag for the next job.
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_state() {
        let token = CancelToken::new();
        let remote = token.clone();
        assert!(!token.is_cancelled());

        remote.cancel();
        assert!(token.is_cancelled());

        token.reset();
        assert!(!remote.is_cancelled());
    }
}
