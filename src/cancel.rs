//! Cooperative cancellation for in-flight resolutions.
//!
//! The flag is checked at the pipeline's suspension points: before each
//! delta-buffer refill and before each base-stream read. An aborted
//! resolution drops all owned streams and buffers on unwind of the `?`
//! chain; nothing is cached across calls, so retrying the same descriptor
//! starts from scratch.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::errors::ResolveError;

/// Shared cancellation signal.
///
/// Clones observe the same flag. The default flag is never set, so
/// resolutions constructed without a caller-provided flag run to
/// completion.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Creates an unset flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation of every resolution holding a clone.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Returns whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Fails with `Aborted` if cancellation has been requested.
    #[inline]
    pub fn check(&self) -> Result<(), ResolveError> {
        if self.is_cancelled() {
            Err(ResolveError::Aborted)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_observe_cancellation() {
        let flag = CancelFlag::new();
        let clone = flag.clone();
        assert!(flag.check().is_ok());

        clone.cancel();
        assert!(flag.is_cancelled());
        assert!(matches!(flag.check(), Err(ResolveError::Aborted)));
    }
}
