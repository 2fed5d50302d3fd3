/*!
 * Device Module
 * Device numbers, registration lifecycle and the command interface
 */

pub mod ioctl;
pub mod number;
pub mod registry;

pub use ioctl::{Caller, IoctlArg, TunableValues, Tunables};
pub use number::{major_in_use, DevNum};
pub use registry::DeviceRegistry;
