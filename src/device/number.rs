/*!
 * Device Numbers
 * Packed major/minor numbers and the process-wide major table
 */

use crate::core::errors::{PipeError, PipeResult};
use crate::core::limits::{DYNAMIC_MAJOR_HIGH, DYNAMIC_MAJOR_LOW, MAX_MAJOR, MINOR_BITS};
use crate::core::types::{Major, Minor};
use parking_lot::{const_mutex, Mutex};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

const MINOR_MASK: u32 = (1 << MINOR_BITS) - 1;

/// Character device number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DevNum {
    pub major: Major,
    pub minor: Minor,
}

impl DevNum {
    pub const fn new(major: Major, minor: Minor) -> Self {
        Self { major, minor }
    }

    /// Pack into a single `u32` (major in the high bits)
    pub const fn encode(self) -> u32 {
        (self.major << MINOR_BITS) | (self.minor & MINOR_MASK)
    }

    pub const fn decode(raw: u32) -> Self {
        Self {
            major: raw >> MINOR_BITS,
            minor: raw & MINOR_MASK,
        }
    }
}

impl fmt::Display for DevNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.major, self.minor)
    }
}

/// Majors currently registered in this process
static MAJORS: Mutex<BTreeSet<Major>> = const_mutex(BTreeSet::new());

/// Reserve `requested`, or the highest free dynamic major when it is 0
pub(crate) fn reserve_major(requested: Major) -> PipeResult<Major> {
    let mut majors = MAJORS.lock();

    if requested != 0 {
        if requested > MAX_MAJOR {
            return Err(PipeError::InvalidArgument(format!(
                "major {} exceeds {}",
                requested, MAX_MAJOR
            )));
        }
        if !majors.insert(requested) {
            return Err(PipeError::Busy(format!("major {} already registered", requested)));
        }
        return Ok(requested);
    }

    let major = (DYNAMIC_MAJOR_LOW..=DYNAMIC_MAJOR_HIGH)
        .rev()
        .find(|m| !majors.contains(m))
        .ok_or_else(|| PipeError::Busy("no free dynamic major".to_string()))?;
    majors.insert(major);
    Ok(major)
}

pub(crate) fn release_major(major: Major) {
    MAJORS.lock().remove(&major);
}

/// Whether `major` is currently registered
pub fn major_in_use(major: Major) -> bool {
    MAJORS.lock().contains(&major)
}
