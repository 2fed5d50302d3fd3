/*!
 * Pipe Module
 * Blocking byte pipes over a fixed-capacity ring buffer
 */

pub mod channel;
pub mod handle;
pub mod notify;
pub mod ring;
pub mod types;

// Re-export public API
pub use channel::PipeChannel;
pub use handle::PipeHandle;
pub use notify::{AsyncNotifier, AsyncQueue, NotifyBand, NotifyEvent};
pub use ring::{RingBuffer, Span};
pub use types::{IoOptions, OpenFlags, OpenMode, PipeStats, PollMask};
