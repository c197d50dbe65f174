//! Logging setup.
//!
//! Two sinks per test: a [`LogCapture`] buffer owned by that test (its tail
//! is attached to the report) and the shared `artifacts/test.log` file that
//! every test appends to. The per-test subscriber is installed with
//! `WithSubscriber` around the test future, so concurrent harnesses never
//! see each other's lines in their buffers.

use crate::result::{ShopError, ShopResult};
use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

/// Name of the shared log file inside the artifacts directory
pub const LOG_FILE_NAME: &str = "test.log";

/// In-memory log sink for one test
#[derive(Debug, Clone, Default)]
pub struct LogCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far
    #[must_use]
    pub fn contents(&self) -> String {
        self.buffer
            .lock()
            .map(|b| String::from_utf8_lossy(&b).into_owned())
            .unwrap_or_default()
    }

    /// Last `n` lines written
    #[must_use]
    pub fn tail(&self, n: usize) -> String {
        tail_lines(&self.contents(), n)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.lock().map(|b| b.is_empty()).unwrap_or(true)
    }
}

/// Writer handed out by [`LogCapture`]
#[derive(Debug)]
pub struct CaptureWriter {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl io::Write for CaptureWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer
            .lock()
            .map_err(|_| io::Error::other("log buffer poisoned"))?
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = CaptureWriter;

    fn make_writer(&'a self) -> Self::Writer {
        CaptureWriter {
            buffer: Arc::clone(&self.buffer),
        }
    }
}

/// Last `n` lines of `text`, line endings kept as written
#[must_use]
pub fn tail_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.split_inclusive('\n').collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].concat()
}

/// Last `n` lines of a log file; a missing file reads as empty
pub async fn read_log_tail(path: &Path, n: usize) -> io::Result<String> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => Ok(tail_lines(&text, n)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(e),
    }
}

/// Open the shared log file for appending, creating directories as needed
pub fn open_log_file(path: &Path) -> io::Result<Arc<File>> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(Arc::new(file))
}

fn env_filter(directive: &str) -> ShopResult<EnvFilter> {
    EnvFilter::try_new(directive).map_err(|e| ShopError::Config {
        message: format!("invalid log filter {directive:?}: {e}"),
    })
}

/// Subscriber for one test: its capture buffer plus, optionally, the shared file
pub fn test_subscriber(
    capture: &LogCapture,
    shared_file: Option<Arc<File>>,
    directive: &str,
) -> ShopResult<impl tracing::Subscriber + Send + Sync + 'static> {
    let buffer_layer = fmt::layer()
        .with_writer(capture.clone())
        .with_ansi(false)
        .with_target(true);
    let file_layer = shared_file.map(|file| fmt::layer().with_writer(file).with_ansi(false).with_target(true));
    Ok(Registry::default()
        .with(env_filter(directive)?)
        .with(buffer_layer)
        .with(file_layer))
}

/// Install the process-wide stderr subscriber. `RUST_LOG` wins over
/// `default_directive`. Returns `false` when a subscriber was already set.
pub fn init_global(default_directive: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init()
        .is_ok()
}
