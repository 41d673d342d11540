// Logging module for structured logging using the tracing crate

use std::error::Error;
use std::sync::{Arc, Mutex};
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Registry};

/// Initialize the tracing subscriber for structured logging
///
/// The subscriber is configured with:
/// - JSON formatting for easy parsing by log aggregation systems
/// - Level filtering from `RUST_LOG`, defaulting to `info`
/// - Output to stdout for container/cloud-native deployments
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_subscriber() -> Result<(), Box<dyn Error>> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json_layer = fmt::layer().json();

    Registry::default()
        .with(env_filter)
        .with(json_layer)
        .try_init()
        .map_err(|e| Box::new(e) as Box<dyn Error>)?;

    Ok(())
}

/// Build a subscriber that captures JSON log output into a buffer
///
/// Used in tests to assert on emitted log lines without touching the
/// global default.
pub fn create_test_subscriber(buffer: Arc<Mutex<Vec<u8>>>) -> impl tracing::Subscriber {
    let test_writer = TestWriter::new(buffer);

    let json_layer = fmt::layer().json().with_writer(move || test_writer.clone());

    Registry::default().with(json_layer)
}

/// A writer that writes to a shared buffer for testing
#[derive(Clone)]
struct TestWriter {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl TestWriter {
    fn new(buffer: Arc<Mutex<Vec<u8>>>) -> Self {
        Self { buffer }
    }
}

impl std::io::Write for TestWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut buffer = self.buffer.lock().unwrap();
        buffer.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let mut buffer = self.buffer.lock().unwrap();
        buffer.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_test_subscriber_captures_structured_fields() {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let subscriber = create_test_subscriber(buffer.clone());

        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(path = "/shop/items", status = 401, "Gateway error");
        });

        let output = buffer.lock().unwrap();
        let log_line = String::from_utf8_lossy(&output);
        assert!(
            log_line.contains("Gateway error"),
            "log should contain the message: {}",
            log_line
        );
        assert!(
            log_line.contains("\"path\":\"/shop/items\""),
            "log should contain the path field: {}",
            log_line
        );
        assert!(
            log_line.contains("\"status\":401"),
            "log should contain the status field: {}",
            log_line
        );
    }
}
