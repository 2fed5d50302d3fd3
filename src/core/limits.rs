/*!
 * System Limits and Constants
 *
 * Centralized location for device limits, module parameter defaults and
 * magic numbers.
 *
 * - Performance-critical constants are marked with [PERF]
 * - Linux-compatible values are marked with [LINUX-COMPAT]
 */

use std::time::Duration;

// =============================================================================
// DEVICE NUMBERS
// =============================================================================

/// Requested major number; 0 asks for dynamic allocation
pub const SCULL_MAJOR: u32 = 0;

/// First minor number handed to the devices
pub const SCULL_MINOR: u32 = 0;

/// Number of pipe devices registered by default
pub const SCULL_NR_DEVS: usize = 4;

/// Width of the minor field inside a packed device number
/// [LINUX-COMPAT] Matches MINORBITS
pub const MINOR_BITS: u32 = 20;

/// Largest major number that can be requested or allocated
/// [LINUX-COMPAT] CHRDEV_MAJOR_MAX
pub const MAX_MAJOR: u32 = 511;

/// Dynamic majors are handed out from this value downwards
/// [LINUX-COMPAT] CHRDEV_MAJOR_DYN_END..=254
pub const DYNAMIC_MAJOR_HIGH: u32 = 254;

/// Lowest dynamically allocated major
pub const DYNAMIC_MAJOR_LOW: u32 = 234;

// =============================================================================
// PIPE BUFFER
// =============================================================================

/// Default ring buffer size in bytes (one slot is always kept free)
pub const SCULL_BUFFER: usize = 2048;

/// Smallest buffer that can hold at least one byte
pub const MIN_PIPE_BUFFER: usize = 2;

/// Largest buffer accepted from configuration (1MB)
pub const MAX_PIPE_BUFFER: usize = 1024 * 1024;

/// Interval between cancellation checks while waiting for the device lock
/// [PERF] Short enough for prompt interruption, long enough to avoid spinning
pub const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(10);

// =============================================================================
// COMMAND DISPATCH
// =============================================================================

/// Magic number identifying scull commands
pub const SCULL_IOC_MAGIC: u8 = 0xF7;

/// Highest command number accepted
pub const SCULL_IOC_MAXNR: u8 = 14;

/// Default quantum size reported by the command interface
pub const SCULL_QUANTUM: i32 = 4000;

/// Default quantum-set size reported by the command interface
pub const SCULL_QSET: i32 = 1000;
