/*!
 * Wait Deadline
 * Tracks the time budget of a blocking call across repeated suspensions
 */

use crate::core::errors::PipeError;
use std::time::{Duration, Instant};

/// Time budget for one blocking operation
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    start: Instant,
    timeout: Option<Duration>,
}

impl Deadline {
    /// Start the clock; `None` means wait forever
    pub fn start(timeout: Option<Duration>) -> Self {
        Self {
            start: Instant::now(),
            timeout,
        }
    }

    /// Absolute instant at which the budget runs out
    ///
    /// `None` when unbounded, or when the budget reaches past what an
    /// `Instant` can represent.
    #[inline]
    pub fn instant(&self) -> Option<Instant> {
        self.timeout.and_then(|t| self.start.checked_add(t))
    }

    /// Time left, `None` if unbounded
    pub fn remaining(&self) -> Option<Duration> {
        self.timeout
            .map(|t| t.saturating_sub(self.start.elapsed()))
    }

    pub fn expired(&self) -> bool {
        self.remaining() == Some(Duration::ZERO)
    }

    /// `Timeout` error describing this budget
    pub fn error(&self) -> PipeError {
        PipeError::Timeout {
            elapsed_ms: self.start.elapsed().as_millis() as u64,
            timeout_ms: self.timeout.map(|d| d.as_millis() as u64),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_huge_budget_has_no_instant() {
        let deadline = Deadline::start(Some(Duration::MAX));
        assert!(deadline.instant().is_none());
        assert!(!deadline.expired());
        assert!(deadline.remaining().is_some());
    }

    #[test]
    fn test_unbounded_never_expires() {
        let deadline = Deadline::start(None);
        assert!(!deadline.expired());
        assert!(deadline.remaining().is_none());
        assert!(deadline.instant().is_none());
    }

    #[test]
    fn test_zero_timeout_expires_immediately() {
        let deadline = Deadline::start(Some(Duration::ZERO));
        assert!(deadline.expired());
        assert!(matches!(
            deadline.error(),
            PipeError::Timeout {
                timeout_ms: Some(0),
                ..
            }
        ));
    }
}
