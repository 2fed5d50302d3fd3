/*!
 * Cancellation Token
 *
 * Interrupts blocked pipe operations from another thread, the way a pending
 * signal interrupts an interruptible sleep.
 */

use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

type Waker = Arc<dyn Fn() + Send + Sync>;

struct Inner {
    cancelled: AtomicBool,
    next_waker: AtomicU64,
    wakers: Mutex<Vec<(u64, Waker)>>,
}

/// Cloneable cancellation signal
///
/// A suspended operation registers a waker for the duration of its sleep;
/// [`CancelToken::cancel`] sets the flag first and then runs every registered
/// waker, so a waiter that checks the flag under its own lock before sleeping
/// cannot miss the cancellation.
///
/// # Example
///
/// ```
/// use scull_pipe::CancelToken;
///
/// let token = CancelToken::new();
/// let for_reader = token.clone();
/// assert!(!for_reader.is_cancelled());
/// token.cancel();
/// assert!(for_reader.is_cancelled());
/// ```
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                next_waker: AtomicU64::new(1),
                wakers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Request cancellation and wake every registered waiter
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);

        // Snapshot so wakers run without holding our list lock
        let wakers: Vec<Waker> = self
            .inner
            .wakers
            .lock()
            .iter()
            .map(|(_, waker)| Arc::clone(waker))
            .collect();

        debug!(waiters = wakers.len(), "cancellation requested");
        for waker in wakers {
            waker();
        }
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Clear the cancellation flag so the token can be reused for a retry
    pub fn reset(&self) {
        self.inner.cancelled.store(false, Ordering::SeqCst);
    }

    /// Register a waker that runs on [`cancel`](Self::cancel)
    ///
    /// The waker stays registered until the returned guard is dropped.
    pub fn register_waker<F>(&self, waker: F) -> WakerRegistration<'_>
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = self.inner.next_waker.fetch_add(1, Ordering::Relaxed);
        self.inner.wakers.lock().push((id, Arc::new(waker)));
        WakerRegistration { token: self, id }
    }

    /// Number of wakers currently registered
    pub fn waiter_count(&self) -> usize {
        self.inner.wakers.lock().len()
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .field("waiters", &self.waiter_count())
            .finish()
    }
}

/// Guard that deregisters a waker when dropped
#[must_use = "the waker is removed as soon as the registration is dropped"]
pub struct WakerRegistration<'a> {
    token: &'a CancelToken,
    id: u64,
}

impl Drop for WakerRegistration<'_> {
    fn drop(&mut self) {
        self.token
            .inner
            .wakers
            .lock()
            .retain(|(id, _)| *id != self.id);
    }
}
