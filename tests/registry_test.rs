/*!
 * Device Registry Tests
 * Registration lifecycle, major allocation and device lookup
 */

use pretty_assertions::assert_eq;
use scull_pipe::device::major_in_use;
use scull_pipe::{DevNum, DeviceRegistry, OpenFlags, PipeConfig, PipeError};
use serial_test::serial;
use std::time::Duration;

fn config(nr_devs: usize, buffer_size: usize) -> PipeConfig {
    PipeConfig {
        nr_devs,
        buffer_size,
        ..Default::default()
    }
}

#[test]
#[serial]
fn test_register_default_devices() {
    let registry = DeviceRegistry::register(PipeConfig::default()).unwrap();

    assert_eq!(registry.major(), 254);
    assert_eq!(registry.len(), 4);
    assert_eq!(
        registry.devnums(),
        (0..4).map(|minor| DevNum::new(254, minor)).collect::<Vec<_>>()
    );

    for (index, devnum) in registry.devnums().into_iter().enumerate() {
        let channel = registry.channel(devnum).unwrap();
        assert_eq!(channel.name(), format!("scullpipe{}", index));
        assert_eq!(channel.capacity(), 2048);
    }
}

#[test]
#[serial]
fn test_dynamic_majors_count_down() {
    let first = DeviceRegistry::register(config(1, 16)).unwrap();
    let second = DeviceRegistry::register(config(1, 16)).unwrap();
    assert_eq!(first.major(), 254);
    assert_eq!(second.major(), 253);

    drop(first);
    let third = DeviceRegistry::register(config(1, 16)).unwrap();
    assert_eq!(third.major(), 254);
}

#[test]
#[serial]
fn test_static_major_busy() {
    let fixed = PipeConfig {
        major: 300,
        ..config(2, 16)
    };
    let registry = DeviceRegistry::register(fixed.clone()).unwrap();
    assert_eq!(registry.major(), 300);

    let err = DeviceRegistry::register(fixed.clone()).unwrap_err();
    assert!(matches!(err, PipeError::Busy(_)));
    assert_eq!(err.errno(), -16);

    registry.unregister();
    assert!(!major_in_use(300));
    assert!(DeviceRegistry::register(fixed).is_ok());
}

#[test]
#[serial]
fn test_invalid_config_reserves_nothing() {
    let bad = PipeConfig {
        major: 301,
        ..config(2, 1)
    };
    assert!(matches!(
        DeviceRegistry::register(bad),
        Err(PipeError::InvalidArgument(_))
    ));
    assert!(!major_in_use(301));

    let no_devices = PipeConfig {
        major: 301,
        ..config(0, 16)
    };
    assert!(DeviceRegistry::register(no_devices).is_err());
    assert!(!major_in_use(301));
}

#[test]
#[serial]
fn test_unknown_device() {
    let registry = DeviceRegistry::register(config(2, 16)).unwrap();
    let missing = DevNum::new(registry.major(), 7);

    let err = registry.open(missing, OpenFlags::write_only()).unwrap_err();
    assert_eq!(err, PipeError::NoDevice(missing.to_string()));
    assert_eq!(err.errno(), -19);
    assert!(registry.devnum(2).is_err());
}

#[test]
#[serial]
fn test_devices_are_independent() {
    let registry = DeviceRegistry::register(config(2, 16)).unwrap();
    let dev0 = registry.devnum(0).unwrap();
    let dev1 = registry.devnum(1).unwrap();

    let writer = registry.open(dev0, OpenFlags::write_only()).unwrap();
    writer.write(b"only on zero").unwrap();

    let stats = registry.stats();
    assert_eq!(stats.len(), 2);
    assert_eq!(stats[0], (dev0, registry.channel(dev0).unwrap().stats()));
    assert_eq!(stats[0].1.buffered, 12);
    assert_eq!(stats[1].0, dev1);
    assert_eq!(stats[1].1.buffered, 0);
}

#[test]
#[serial]
fn test_handles_outlive_registry() {
    let registry = DeviceRegistry::register(config(1, 16)).unwrap();
    let major = registry.major();
    let devnum = registry.devnum(0).unwrap();

    let writer = registry.open(devnum, OpenFlags::write_only()).unwrap();
    let reader = registry.open(devnum, OpenFlags::read_only()).unwrap();
    drop(registry);
    assert!(!major_in_use(major));

    writer.write(b"still here").unwrap();
    let mut buf = [0u8; 16];
    assert_eq!(reader.read(&mut buf).unwrap(), 10);
}

#[test]
#[serial]
fn test_minor_offset_and_poll_interval() {
    let registry = DeviceRegistry::register(PipeConfig {
        minor: 8,
        lock_poll_interval: Duration::from_millis(2),
        ..config(3, 32)
    })
    .unwrap();

    let devnums = registry.devnums();
    assert_eq!(devnums.first().map(|d| d.minor), Some(8));
    assert_eq!(devnums.last().map(|d| d.minor), Some(10));
    assert_eq!(DevNum::decode(devnums[1].encode()), devnums[1]);
}

#[test]
fn test_config_roundtrip_json() {
    let json = r#"{"nr_devs": 2, "buffer_size": 64, "lock_poll_interval": 5}"#;
    let config: PipeConfig = serde_json::from_str(json).unwrap();
    assert_eq!(config.nr_devs, 2);
    assert_eq!(config.buffer_size, 64);
    assert_eq!(config.lock_poll_interval, Duration::from_millis(5));
    assert_eq!(config.major, 0);
}
