/*!
 * Command Dispatch
 *
 * ioctl-style command interface over the device-wide tunables. Commands use
 * the Linux `_IOC` encoding:
 *
 * - S means "Set" through a pointer
 * - T means "Tell" directly with the argument value
 * - G means "Get": reply by setting through a pointer
 * - Q means "Query": response is on the return value
 * - X means "eXchange": switch G and S atomically
 * - H means "sHift": switch T and Q atomically
 */

use crate::core::errors::{PipeError, PipeResult};
use crate::core::limits::{SCULL_IOC_MAGIC, SCULL_IOC_MAXNR, SCULL_QSET, SCULL_QUANTUM};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

const IOC_NRBITS: u32 = 8;
const IOC_TYPEBITS: u32 = 8;
const IOC_SIZEBITS: u32 = 14;
const IOC_DIRBITS: u32 = 2;

const IOC_NRSHIFT: u32 = 0;
const IOC_TYPESHIFT: u32 = IOC_NRSHIFT + IOC_NRBITS;
const IOC_SIZESHIFT: u32 = IOC_TYPESHIFT + IOC_TYPEBITS;
const IOC_DIRSHIFT: u32 = IOC_SIZESHIFT + IOC_SIZEBITS;

pub const IOC_NONE: u32 = 0;
pub const IOC_WRITE: u32 = 1;
pub const IOC_READ: u32 = 2;

pub const fn ioc(dir: u32, ty: u8, nr: u8, size: u32) -> u32 {
    (dir << IOC_DIRSHIFT)
        | ((ty as u32) << IOC_TYPESHIFT)
        | ((nr as u32) << IOC_NRSHIFT)
        | (size << IOC_SIZESHIFT)
}

pub const fn io(ty: u8, nr: u8) -> u32 {
    ioc(IOC_NONE, ty, nr, 0)
}

pub const fn ior(ty: u8, nr: u8, size: u32) -> u32 {
    ioc(IOC_READ, ty, nr, size)
}

pub const fn iow(ty: u8, nr: u8, size: u32) -> u32 {
    ioc(IOC_WRITE, ty, nr, size)
}

pub const fn iowr(ty: u8, nr: u8, size: u32) -> u32 {
    ioc(IOC_READ | IOC_WRITE, ty, nr, size)
}

pub const fn ioc_dir(cmd: u32) -> u32 {
    (cmd >> IOC_DIRSHIFT) & ((1 << IOC_DIRBITS) - 1)
}

pub const fn ioc_type(cmd: u32) -> u8 {
    ((cmd >> IOC_TYPESHIFT) & ((1 << IOC_TYPEBITS) - 1)) as u8
}

pub const fn ioc_nr(cmd: u32) -> u8 {
    ((cmd >> IOC_NRSHIFT) & ((1 << IOC_NRBITS) - 1)) as u8
}

pub const fn ioc_size(cmd: u32) -> u32 {
    (cmd >> IOC_SIZESHIFT) & ((1 << IOC_SIZEBITS) - 1)
}

const INT: u32 = std::mem::size_of::<i32>() as u32;

pub const SCULL_IOCRESET: u32 = io(SCULL_IOC_MAGIC, 0);
pub const SCULL_IOCSQUANTUM: u32 = iow(SCULL_IOC_MAGIC, 1, INT);
pub const SCULL_IOCSQSET: u32 = iow(SCULL_IOC_MAGIC, 2, INT);
pub const SCULL_IOCTQUANTUM: u32 = io(SCULL_IOC_MAGIC, 3);
pub const SCULL_IOCTQSET: u32 = io(SCULL_IOC_MAGIC, 4);
pub const SCULL_IOCGQUANTUM: u32 = ior(SCULL_IOC_MAGIC, 5, INT);
pub const SCULL_IOCGQSET: u32 = ior(SCULL_IOC_MAGIC, 6, INT);
pub const SCULL_IOCQQUANTUM: u32 = io(SCULL_IOC_MAGIC, 7);
pub const SCULL_IOCQQSET: u32 = io(SCULL_IOC_MAGIC, 8);
pub const SCULL_IOCXQUANTUM: u32 = iowr(SCULL_IOC_MAGIC, 9, INT);
pub const SCULL_IOCXQSET: u32 = iowr(SCULL_IOC_MAGIC, 10, INT);
pub const SCULL_IOCHQUANTUM: u32 = io(SCULL_IOC_MAGIC, 11);
pub const SCULL_IOCHQSET: u32 = io(SCULL_IOC_MAGIC, 12);

/// Argument of a command
///
/// `Ptr(None)` stands for a caller pointer that failed the access check.
#[derive(Debug)]
pub enum IoctlArg<'a> {
    None,
    Value(i32),
    Ptr(Option<&'a mut i32>),
}

/// Credentials of the caller issuing a command
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub sys_admin: bool,
}

impl Caller {
    pub const fn admin() -> Self {
        Self { sys_admin: true }
    }

    pub const fn user() -> Self {
        Self { sys_admin: false }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Param {
    Quantum,
    Qset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Set,
    Tell,
    Get,
    Query,
    Exchange,
    Shift,
}

fn decode(cmd: u32) -> Option<(Op, Param)> {
    let decoded = match cmd {
        SCULL_IOCSQUANTUM => (Op::Set, Param::Quantum),
        SCULL_IOCSQSET => (Op::Set, Param::Qset),
        SCULL_IOCTQUANTUM => (Op::Tell, Param::Quantum),
        SCULL_IOCTQSET => (Op::Tell, Param::Qset),
        SCULL_IOCGQUANTUM => (Op::Get, Param::Quantum),
        SCULL_IOCGQSET => (Op::Get, Param::Qset),
        SCULL_IOCQQUANTUM => (Op::Query, Param::Quantum),
        SCULL_IOCQQSET => (Op::Query, Param::Qset),
        SCULL_IOCXQUANTUM => (Op::Exchange, Param::Quantum),
        SCULL_IOCXQSET => (Op::Exchange, Param::Qset),
        SCULL_IOCHQUANTUM => (Op::Shift, Param::Quantum),
        SCULL_IOCHQSET => (Op::Shift, Param::Qset),
        _ => return None,
    };
    Some(decoded)
}

/// Snapshot of the tunables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TunableValues {
    pub quantum: i32,
    pub qset: i32,
}

impl Default for TunableValues {
    fn default() -> Self {
        Self {
            quantum: SCULL_QUANTUM,
            qset: SCULL_QSET,
        }
    }
}

/// Device-wide parameters reachable through commands
#[derive(Debug, Default)]
pub struct Tunables {
    values: Mutex<TunableValues>,
}

impl Tunables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn values(&self) -> TunableValues {
        *self.values.lock()
    }

    /// Execute `cmd`; the returned value is the command's return value
    pub fn dispatch(&self, cmd: u32, arg: IoctlArg<'_>, caller: Caller) -> PipeResult<i64> {
        if ioc_type(cmd) != SCULL_IOC_MAGIC || ioc_nr(cmd) > SCULL_IOC_MAXNR {
            return Err(PipeError::NotTty(cmd));
        }

        // Pointer-carrying commands need a usable pointer before anything runs
        let mut arg = arg;
        if ioc_dir(cmd) & (IOC_READ | IOC_WRITE) != 0 && !matches!(arg, IoctlArg::Ptr(Some(_))) {
            return Err(PipeError::Fault(format!(
                "command 0x{:08x} needs a valid user pointer",
                cmd
            )));
        }

        if cmd == SCULL_IOCRESET {
            *self.values.lock() = TunableValues::default();
            debug!("tunables reset");
            return Ok(0);
        }

        let (op, param) = decode(cmd).ok_or(PipeError::NotTty(cmd))?;
        if matches!(op, Op::Set | Op::Tell | Op::Exchange | Op::Shift) && !caller.sys_admin {
            return Err(PipeError::PermissionDenied(format!(
                "{:?} {:?} requires sys_admin",
                op, param
            )));
        }

        let mut values = self.values.lock();
        let slot = match param {
            Param::Quantum => &mut values.quantum,
            Param::Qset => &mut values.qset,
        };

        let ret = match (op, &mut arg) {
            (Op::Set, IoctlArg::Ptr(Some(ptr))) => {
                *slot = **ptr;
                0
            }
            (Op::Get, IoctlArg::Ptr(Some(ptr))) => {
                **ptr = *slot;
                0
            }
            (Op::Exchange, IoctlArg::Ptr(Some(ptr))) => {
                let previous = *slot;
                *slot = **ptr;
                **ptr = previous;
                0
            }
            (Op::Tell, IoctlArg::Value(value)) => {
                *slot = *value;
                0
            }
            (Op::Shift, IoctlArg::Value(value)) => {
                let previous = *slot;
                *slot = *value;
                i64::from(previous)
            }
            (Op::Query, _) => i64::from(*slot),
            (op, _) => {
                return Err(PipeError::InvalidArgument(format!(
                    "{:?} {:?} needs a value argument",
                    op, param
                )))
            }
        };

        debug!(op = ?op, param = ?param, quantum = values.quantum, qset = values.qset, "command");
        Ok(ret)
    }
}
