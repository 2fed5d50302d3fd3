/*!
 * Device Configuration
 *
 * Module parameters for the pipe devices, loadable from the environment
 */

use super::errors::{PipeError, PipeResult};
use super::limits::{
    LOCK_POLL_INTERVAL, MAX_MAJOR, MAX_PIPE_BUFFER, MINOR_BITS, MIN_PIPE_BUFFER, SCULL_BUFFER,
    SCULL_MAJOR, SCULL_MINOR, SCULL_NR_DEVS,
};
use super::types::{Major, Minor, Size};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Pipe device configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipeConfig {
    /// Requested major number (0 = allocate dynamically)
    pub major: Major,
    /// First minor number
    pub minor: Minor,
    /// Number of devices to register
    pub nr_devs: usize,
    /// Ring buffer size per device in bytes
    pub buffer_size: Size,
    /// How often a waiter for the device lock checks for cancellation
    #[serde(with = "duration_millis")]
    pub lock_poll_interval: Duration,
}

impl Default for PipeConfig {
    fn default() -> Self {
        Self {
            major: SCULL_MAJOR,
            minor: SCULL_MINOR,
            nr_devs: SCULL_NR_DEVS,
            buffer_size: SCULL_BUFFER,
            lock_poll_interval: LOCK_POLL_INTERVAL,
        }
    }
}

impl PipeConfig {
    /// Configuration with a single device of the given buffer size
    pub fn single(buffer_size: Size) -> Self {
        Self {
            nr_devs: 1,
            buffer_size,
            ..Default::default()
        }
    }

    /// Load configuration from the environment
    ///
    /// Environment variables:
    /// - SCULL_MAJOR: requested major number (default: dynamic)
    /// - SCULL_MINOR: first minor number (default: 0)
    /// - SCULL_NR_DEVS: number of devices (default: 4)
    /// - SCULL_BUFFER: buffer size in bytes (default: 2048)
    pub fn from_env() -> PipeResult<Self> {
        let defaults = Self::default();
        let config = Self {
            major: env_or("SCULL_MAJOR", defaults.major)?,
            minor: env_or("SCULL_MINOR", defaults.minor)?,
            nr_devs: env_or("SCULL_NR_DEVS", defaults.nr_devs)?,
            buffer_size: env_or("SCULL_BUFFER", defaults.buffer_size)?,
            lock_poll_interval: defaults.lock_poll_interval,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check parameter ranges
    pub fn validate(&self) -> PipeResult<()> {
        if self.buffer_size < MIN_PIPE_BUFFER || self.buffer_size > MAX_PIPE_BUFFER {
            return Err(PipeError::InvalidArgument(format!(
                "buffer_size {} outside {}..={}",
                self.buffer_size, MIN_PIPE_BUFFER, MAX_PIPE_BUFFER
            )));
        }
        if self.nr_devs == 0 {
            return Err(PipeError::InvalidArgument("nr_devs must be at least 1".to_string()));
        }
        if self.major > MAX_MAJOR {
            return Err(PipeError::InvalidArgument(format!(
                "major {} exceeds {}",
                self.major, MAX_MAJOR
            )));
        }
        let last_minor = self.minor as u64 + self.nr_devs as u64 - 1;
        if last_minor >= 1u64 << MINOR_BITS {
            return Err(PipeError::InvalidArgument(format!(
                "minor range {}..={} does not fit in {} bits",
                self.minor, last_minor, MINOR_BITS
            )));
        }
        if self.lock_poll_interval.is_zero() {
            return Err(PipeError::InvalidArgument(
                "lock_poll_interval must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> PipeResult<T> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| PipeError::InvalidArgument(format!("{}={:?} is not a valid value", key, raw))),
        Err(_) => Ok(default),
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = PipeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.buffer_size, 2048);
        assert_eq!(config.nr_devs, 4);
    }

    #[test]
    fn test_rejects_tiny_buffer() {
        let config = PipeConfig::single(1);
        assert!(matches!(config.validate(), Err(PipeError::InvalidArgument(_))));
    }

    #[test]
    fn test_rejects_minor_overflow() {
        let config = PipeConfig {
            minor: (1 << MINOR_BITS) - 1,
            nr_devs: 2,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserialize_partial() {
        let config: PipeConfig =
            serde_json::from_str(r#"{"buffer_size": 64, "lock_poll_interval": 5}"#).unwrap();
        assert_eq!(config.buffer_size, 64);
        assert_eq!(config.nr_devs, SCULL_NR_DEVS);
        assert_eq!(config.lock_poll_interval, Duration::from_millis(5));
    }
}
