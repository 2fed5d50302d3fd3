/*!
 * Synchronization Primitives
 *
 * Cancellation and deadline helpers used by the blocking pipe operations.
 *
 * # Use Cases
 *
 * - **Interruptible waits**: abort a sleeping read/write/open from another thread
 * - **Bounded waits**: give up on a blocking call after a time budget
 */

mod cancel;
mod deadline;

pub use cancel::{CancelToken, WakerRegistration};
pub use deadline::Deadline;
