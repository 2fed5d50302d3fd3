/*!
 * Synchronization Primitive Tests
 * Cancellation tokens and waker registration
 */

use pretty_assertions::assert_eq;
use scull_pipe::CancelToken;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

#[test]
fn test_cancel_runs_every_waker() {
    let token = CancelToken::new();
    let hits = Arc::new(AtomicUsize::new(0));

    let registrations: Vec<_> = (0..3)
        .map(|_| {
            let hits = Arc::clone(&hits);
            token.register_waker(move || {
                hits.fetch_add(1, Ordering::SeqCst);
            })
        })
        .collect();
    assert_eq!(token.waiter_count(), 3);

    token.cancel();
    assert!(token.is_cancelled());
    assert_eq!(hits.load(Ordering::SeqCst), 3);

    drop(registrations);
    assert_eq!(token.waiter_count(), 0);
}

#[test]
fn test_dropped_registration_is_not_called() {
    let token = CancelToken::new();
    let hits = Arc::new(AtomicUsize::new(0));

    {
        let hits = Arc::clone(&hits);
        let _registration = token.register_waker(move || {
            hits.fetch_add(1, Ordering::SeqCst);
        });
    }

    token.cancel();
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[test]
fn test_clones_share_state() {
    let token = CancelToken::new();
    let clone = token.clone();

    let handle = thread::spawn(move || clone.cancel());
    handle.join().unwrap();
    assert!(token.is_cancelled());

    token.reset();
    assert!(!token.is_cancelled());
}

#[test]
fn test_waker_may_register_during_cancel() {
    let token = CancelToken::new();
    let inner = token.clone();
    let _registration = token.register_waker(move || {
        // Wakers run without the token's list lock held
        let _nested = inner.register_waker(|| {});
    });

    token.cancel();
    assert_eq!(token.waiter_count(), 1);
}
