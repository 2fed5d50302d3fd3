/*!
 * Structured Tracing
 * Subscriber setup and timed spans around device sessions
 */

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info_span, warn};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::EnvFilter;

/// Output format of the global subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Single-line human readable events
    Compact,
    /// One JSON object per event, with the enclosing span list
    Json,
}

impl LogFormat {
    /// `SCULL_TRACE_JSON=1|true` selects JSON, anything else compact output
    pub fn from_env() -> Self {
        match std::env::var("SCULL_TRACE_JSON").as_deref() {
            Ok("1") | Ok("true") => LogFormat::Json,
            _ => LogFormat::Compact,
        }
    }
}

/// Install the global subscriber
///
/// Environment variables:
/// - RUST_LOG: filter directives (default: info)
/// - SCULL_TRACE_JSON: JSON output (default: false)
///
/// A second call is a no-op.
pub fn init_tracing() {
    if try_init_tracing().is_ok() {
        tracing::info!(format = ?LogFormat::from_env(), "tracing initialized");
    }
}

/// Like [`init_tracing`], but reports an already installed subscriber
pub fn try_init_tracing() -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let base = tracing_subscriber::registry().with(filter);

    match LogFormat::from_env() {
        LogFormat::Json => base
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_thread_names(true)
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init(),
        LogFormat::Compact => base
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_thread_names(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init(),
    }
}

static NEXT_SESSION: AtomicU64 = AtomicU64::new(1);

/// Span covering one session on a device
///
/// Records the bytes moved and the outcome; on drop it logs the duration,
/// as a warning once it exceeds the slow threshold.
pub struct OperationSpan {
    span: tracing::Span,
    id: u64,
    started: Instant,
    slow_after: Duration,
}

impl OperationSpan {
    pub fn new(operation: &str, slow_ms: u64) -> Self {
        let id = NEXT_SESSION.fetch_add(1, Ordering::Relaxed);
        Self {
            span: info_span!(
                "session",
                session = id,
                operation,
                bytes = tracing::field::Empty,
                outcome = tracing::field::Empty,
            ),
            id,
            started: Instant::now(),
            slow_after: Duration::from_millis(slow_ms),
        }
    }

    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn record_bytes(&self, bytes: usize) {
        self.span.record("bytes", bytes as u64);
    }

    pub fn record_result(&self, success: bool) {
        let outcome = if success { "ok" } else { "failed" };
        self.span.record("outcome", outcome);
    }

    /// Make this the current span on the calling thread
    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }
}

impl Drop for OperationSpan {
    fn drop(&mut self) {
        let elapsed = self.started.elapsed();
        let _guard = self.span.enter();
        if elapsed > self.slow_after {
            warn!(session = self.id, elapsed_ms = elapsed.as_millis() as u64, "slow session");
        } else {
            debug!(session = self.id, elapsed_us = elapsed.as_micros() as u64, "session closed");
        }
    }
}
