/*!
 * Pipe Types
 * Open flags, per-call options, readiness masks and statistics
 */

use crate::core::errors::{PipeError, PipeResult};
use crate::core::sync::CancelToken;
use crate::core::types::Size;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Access mode mask of the open flags
pub const O_ACCMODE: u32 = 0o3;
pub const O_RDONLY: u32 = 0o0;
pub const O_WRONLY: u32 = 0o1;
pub const O_RDWR: u32 = 0o2;
pub const O_NONBLOCK: u32 = 0o4000;

/// Direction a handle is attached in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpenMode {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl OpenMode {
    #[inline]
    pub fn can_read(self) -> bool {
        matches!(self, OpenMode::ReadOnly | OpenMode::ReadWrite)
    }

    #[inline]
    pub fn can_write(self) -> bool {
        matches!(self, OpenMode::WriteOnly | OpenMode::ReadWrite)
    }
}

/// Flags passed to `open`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenFlags {
    pub mode: OpenMode,
    pub nonblocking: bool,
}

impl OpenFlags {
    pub const fn read_only() -> Self {
        Self {
            mode: OpenMode::ReadOnly,
            nonblocking: false,
        }
    }

    pub const fn write_only() -> Self {
        Self {
            mode: OpenMode::WriteOnly,
            nonblocking: false,
        }
    }

    pub const fn read_write() -> Self {
        Self {
            mode: OpenMode::ReadWrite,
            nonblocking: false,
        }
    }

    pub const fn nonblocking(mut self) -> Self {
        self.nonblocking = true;
        self
    }

    /// Decode POSIX-style `O_*` bits
    pub fn from_bits(bits: u32) -> PipeResult<Self> {
        let mode = match bits & O_ACCMODE {
            O_RDONLY => OpenMode::ReadOnly,
            O_WRONLY => OpenMode::WriteOnly,
            O_RDWR => OpenMode::ReadWrite,
            other => {
                return Err(PipeError::InvalidArgument(format!(
                    "access mode {:#o} is not valid",
                    other
                )))
            }
        };
        Ok(Self {
            mode,
            nonblocking: bits & O_NONBLOCK != 0,
        })
    }

    /// Encode back into `O_*` bits
    pub fn bits(&self) -> u32 {
        let mode = match self.mode {
            OpenMode::ReadOnly => O_RDONLY,
            OpenMode::WriteOnly => O_WRONLY,
            OpenMode::ReadWrite => O_RDWR,
        };
        if self.nonblocking {
            mode | O_NONBLOCK
        } else {
            mode
        }
    }
}

/// Per-call behavior of a read, write or open
///
/// `nonblocking` turns every suspension point into an immediate
/// `WouldBlock`. A `cancel` token interrupts lock acquisition and
/// suspension with `Interrupted`; a `timeout` bounds the total time spent
/// suspended.
#[derive(Debug, Clone, Default)]
pub struct IoOptions {
    pub nonblocking: bool,
    pub cancel: Option<CancelToken>,
    pub timeout: Option<Duration>,
}

impl IoOptions {
    pub fn blocking() -> Self {
        Self::default()
    }

    pub fn nonblocking() -> Self {
        Self {
            nonblocking: true,
            ..Default::default()
        }
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[inline]
    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
    }
}

/// Readiness bits reported by `poll`
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PollMask(u32);

impl PollMask {
    pub const POLLIN: PollMask = PollMask(0x0001);
    pub const POLLOUT: PollMask = PollMask(0x0004);
    pub const POLLHUP: PollMask = PollMask(0x0010);
    pub const POLLRDNORM: PollMask = PollMask(0x0040);
    pub const POLLWRNORM: PollMask = PollMask(0x0100);

    pub const fn empty() -> Self {
        PollMask(0)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: PollMask) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub fn readable(self) -> bool {
        self.contains(Self::POLLIN)
    }

    #[inline]
    pub fn writable(self) -> bool {
        self.contains(Self::POLLOUT)
    }

    #[inline]
    pub fn hung_up(self) -> bool {
        self.contains(Self::POLLHUP)
    }
}

impl std::ops::BitOr for PollMask {
    type Output = PollMask;

    fn bitor(self, rhs: PollMask) -> PollMask {
        PollMask(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for PollMask {
    fn bitor_assign(&mut self, rhs: PollMask) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for PollMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(PollMask, &str); 5] = [
            (PollMask::POLLIN, "POLLIN"),
            (PollMask::POLLOUT, "POLLOUT"),
            (PollMask::POLLHUP, "POLLHUP"),
            (PollMask::POLLRDNORM, "POLLRDNORM"),
            (PollMask::POLLWRNORM, "POLLWRNORM"),
        ];
        let names: Vec<&str> = NAMES
            .iter()
            .filter(|(bit, _)| self.contains(*bit))
            .map(|(_, name)| *name)
            .collect();
        if names.is_empty() {
            write!(f, "PollMask(empty)")
        } else {
            write!(f, "PollMask({})", names.join(" | "))
        }
    }
}

fn is_zero_usize(value: &usize) -> bool {
    *value == 0
}

fn is_zero_u64(value: &u64) -> bool {
    *value == 0
}

/// Pipe statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PipeStats {
    pub capacity: Size,
    #[serde(default, skip_serializing_if = "is_zero_usize")]
    pub buffered: Size,
    pub free: Size,
    #[serde(default, skip_serializing_if = "is_zero_usize")]
    pub readers: usize,
    #[serde(default, skip_serializing_if = "is_zero_usize")]
    pub writers: usize,
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub bytes_read: u64,
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub bytes_written: u64,
    #[serde(default, skip_serializing_if = "is_zero_usize")]
    pub async_subscribers: usize,
}
