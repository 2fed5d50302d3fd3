/*!
 * Scull Pipe Library
 * Blocking in-memory byte pipes modelled on character devices
 */

pub mod core;
pub mod device;
pub mod monitoring;
pub mod pipe;

// Re-exports
pub use crate::core::sync::CancelToken;
pub use crate::core::{PipeConfig, PipeError, PipeResult};
pub use device::{Caller, DevNum, DeviceRegistry, IoctlArg};
pub use monitoring::{init_tracing, OperationSpan};
pub use pipe::{
    AsyncNotifier, IoOptions, NotifyBand, NotifyEvent, OpenFlags, OpenMode, PipeChannel,
    PipeHandle, PipeStats, PollMask, RingBuffer,
};
