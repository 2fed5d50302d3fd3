/*!
 * Device Registry
 * Registration and lookup of the pipe devices
 */

use super::ioctl::{Caller, IoctlArg, TunableValues, Tunables};
use super::number::{release_major, reserve_major, DevNum};
use crate::core::config::PipeConfig;
use crate::core::errors::{PipeError, PipeResult};
use crate::core::types::Major;
use crate::pipe::{IoOptions, OpenFlags, PipeChannel, PipeHandle, PipeStats};
use ahash::RandomState;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{error, info};

/// Registered set of pipe devices under one major number
///
/// Construction is all-or-nothing: either every device is created and
/// reachable, or the major is released and an error is returned. Dropping
/// the registry unregisters the devices; channels live on only while open
/// handles still reference them.
pub struct DeviceRegistry {
    major: Major,
    config: PipeConfig,
    devices: DashMap<DevNum, Arc<PipeChannel>, RandomState>,
    tunables: Tunables,
}

impl std::fmt::Debug for DeviceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceRegistry")
            .field("major", &self.major)
            .field("first_minor", &self.config.minor)
            .field("devices", &self.devices.len())
            .field("buffer_size", &self.config.buffer_size)
            .finish()
    }
}

impl DeviceRegistry {
    /// Reserve a major number and create every device
    pub fn register(config: PipeConfig) -> PipeResult<Self> {
        config.validate()?;
        let major = reserve_major(config.major)?;

        let devices = DashMap::with_capacity_and_hasher(config.nr_devs, RandomState::new());
        for index in 0..config.nr_devs {
            let devnum = DevNum::new(major, config.minor + index as u32);
            let channel = PipeChannel::named(
                format!("scullpipe{}", index),
                config.buffer_size,
                config.lock_poll_interval,
            );
            match channel {
                Ok(channel) => {
                    devices.insert(devnum, channel);
                }
                Err(e) => {
                    error!(device = %devnum, error = %e, "failed to set up device");
                    release_major(major);
                    return Err(e);
                }
            }
        }

        info!(
            major,
            first_minor = config.minor,
            nr_devs = config.nr_devs,
            buffer_size = config.buffer_size,
            "pipe devices registered"
        );

        Ok(Self {
            major,
            config,
            devices,
            tunables: Tunables::new(),
        })
    }

    #[inline]
    pub fn major(&self) -> Major {
        self.major
    }

    pub fn config(&self) -> &PipeConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Device numbers in minor order
    pub fn devnums(&self) -> Vec<DevNum> {
        let mut numbers: Vec<DevNum> = self.devices.iter().map(|entry| *entry.key()).collect();
        numbers.sort();
        numbers
    }

    /// Device number of the `index`-th device
    pub fn devnum(&self, index: usize) -> PipeResult<DevNum> {
        if index >= self.config.nr_devs {
            return Err(PipeError::NoDevice(format!("index {}", index)));
        }
        Ok(DevNum::new(self.major, self.config.minor + index as u32))
    }

    pub fn channel(&self, devnum: DevNum) -> PipeResult<Arc<PipeChannel>> {
        self.devices
            .get(&devnum)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| PipeError::NoDevice(devnum.to_string()))
    }

    /// Open the device `devnum`
    pub fn open(&self, devnum: DevNum, flags: OpenFlags) -> PipeResult<PipeHandle> {
        self.channel(devnum)?.open(flags)
    }

    /// Open with cancellation and timeout support
    pub fn open_with(
        &self,
        devnum: DevNum,
        flags: OpenFlags,
        opts: &IoOptions,
    ) -> PipeResult<PipeHandle> {
        self.channel(devnum)?.open_with(flags, opts)
    }

    /// Run a control command against the device-wide tunables
    pub fn ioctl(
        &self,
        devnum: DevNum,
        cmd: u32,
        arg: IoctlArg<'_>,
        caller: Caller,
    ) -> PipeResult<i64> {
        // Command must target a registered device
        self.channel(devnum)?;
        self.tunables.dispatch(cmd, arg, caller)
    }

    pub fn tunables(&self) -> TunableValues {
        self.tunables.values()
    }

    /// Statistics of every device in minor order
    pub fn stats(&self) -> Vec<(DevNum, PipeStats)> {
        self.devnums()
            .into_iter()
            .filter_map(|devnum| {
                self.devices
                    .get(&devnum)
                    .map(|entry| (devnum, entry.value().stats()))
            })
            .collect()
    }

    /// Tear down the devices and release the major number
    pub fn unregister(self) {
        drop(self);
    }
}

impl Drop for DeviceRegistry {
    fn drop(&mut self) {
        self.devices.clear();
        release_major(self.major);
        info!(major = self.major, "pipe devices unregistered");
    }
}
