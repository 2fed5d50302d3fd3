/*!
 * Scull Pipe - Main Entry Point
 *
 * Registers the pipe devices and streams messages from a writer thread to a
 * reader thread through the first device:
 * - Device parameters come from SCULL_* environment variables
 * - SCULL_DEMO_MESSAGES sets how many messages are sent (default: 16)
 * - Ctrl+C interrupts the blocked reader and writer
 */

use anyhow::Context;
use scull_pipe::{
    init_tracing, CancelToken, DeviceRegistry, IoOptions, OpenFlags, OperationSpan, PipeConfig,
    PipeError,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const MESSAGE_INTERVAL: Duration = Duration::from_millis(100);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    info!("Starting scull pipe devices...");
    let config = PipeConfig::from_env().context("invalid SCULL_* configuration")?;
    let registry = Arc::new(DeviceRegistry::register(config).context("device registration failed")?);
    let devnum = registry.devnum(0)?;
    info!(device = %devnum, devices = registry.len(), "Devices ready");

    let messages: usize = std::env::var("SCULL_DEMO_MESSAGES")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(16);

    let cancel = CancelToken::new();
    let opts = IoOptions::blocking().with_cancel(cancel.clone());

    let reader_registry = Arc::clone(&registry);
    let reader_opts = opts.clone();
    let mut reader = tokio::task::spawn_blocking(move || -> Result<usize, PipeError> {
        let span = OperationSpan::new("reader", 60_000);
        let handle = reader_registry.open_with(devnum, OpenFlags::read_only(), &reader_opts)?;

        let mut total = 0;
        let mut buf = [0u8; 256];
        loop {
            let n = handle.read(&mut buf)?;
            if n == 0 {
                break;
            }
            total += n;
            debug!(bytes = n, text = %String::from_utf8_lossy(&buf[..n]).trim_end(), "received");
        }

        span.record_bytes(total);
        span.record_result(true);
        Ok(total)
    });

    let writer_registry = Arc::clone(&registry);
    let writer_opts = opts.clone();
    let writer = tokio::task::spawn_blocking(move || -> Result<usize, PipeError> {
        let handle = writer_registry.open_with(devnum, OpenFlags::write_only(), &writer_opts)?;

        let mut total = 0;
        for i in 0..messages {
            if writer_opts.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
                return Err(PipeError::Interrupted);
            }
            total += handle.write_all(format!("message {}\n", i).as_bytes())?;
            std::thread::sleep(MESSAGE_INTERVAL);
        }

        // Readers report end-of-stream as soon as the last writer leaves,
        // so let them drain first.
        while handle.poll().readable() {
            if writer_opts.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        Ok(total)
    });

    let finished = tokio::select! {
        joined = &mut reader => Some(joined),
        _ = tokio::signal::ctrl_c() => None,
    };

    let received = match finished {
        Some(joined) => joined.context("reader task panicked")?,
        None => {
            warn!("Interrupt received, cancelling blocked operations");
            cancel.cancel();
            reader.await.context("reader task panicked")?
        }
    };

    match received {
        Ok(bytes) => info!(bytes, "Reader reached end of stream"),
        Err(PipeError::Interrupted) => warn!("Reader interrupted"),
        Err(e) => return Err(e.into()),
    }

    cancel.cancel();
    match writer.await.context("writer task panicked")? {
        Ok(bytes) => info!(bytes, "Writer finished"),
        Err(PipeError::Interrupted) => warn!("Writer interrupted"),
        Err(e) => return Err(e.into()),
    }

    let stats = serde_json::to_string_pretty(&registry.stats())?;
    println!("{}", stats);

    info!("Unloading scull pipe devices...");
    Ok(())
}
