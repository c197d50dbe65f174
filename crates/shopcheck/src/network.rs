//! Per-test network request logging.
//!
//! A [`NetworkLogger`] subscribes to the page's outgoing requests when the
//! test starts and records `{url, method}` pairs in arrival order. At
//! teardown it unsubscribes and writes the records as a pretty-printed JSON
//! array. The logger is owned by one test and never shared.

use crate::driver::{ListenerId, PageDriver, RequestEvent};
use crate::result::ShopResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// File name of the network dump inside the network log directory
pub const NETWORK_LOG_FILE: &str = "network_logs.json";

/// One observed request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkRecord {
    /// Request URL
    pub url: String,
    /// HTTP method
    pub method: String,
}

impl From<&RequestEvent> for NetworkRecord {
    fn from(event: &RequestEvent) -> Self {
        Self {
            url: event.url.clone(),
            method: event.method.to_ascii_uppercase(),
        }
    }
}

/// Records every request a page issues while attached
pub struct NetworkLogger {
    page: Arc<dyn PageDriver>,
    records: Arc<Mutex<Vec<NetworkRecord>>>,
    listener: Option<ListenerId>,
}

impl fmt::Debug for NetworkLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkLogger")
            .field("records", &self.len())
            .field("attached", &self.is_attached())
            .finish()
    }
}

impl NetworkLogger {
    /// Subscribe to the page's requests
    pub fn attach(page: Arc<dyn PageDriver>) -> Self {
        let records = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&records);
        let listener = page.on_request(Arc::new(move |event: &RequestEvent| {
            if let Ok(mut records) = sink.lock() {
                records.push(NetworkRecord::from(event));
            }
        }));
        tracing::debug!(listener, "Network logger attached");
        Self {
            page,
            records,
            listener: Some(listener),
        }
    }

    /// Snapshot of the records so far
    #[must_use]
    pub fn records(&self) -> Vec<NetworkRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub const fn is_attached(&self) -> bool {
        self.listener.is_some()
    }

    /// Pretty-printed JSON array of the records
    pub fn to_pretty_json(&self) -> ShopResult<String> {
        Ok(serde_json::to_string_pretty(&self.records())?)
    }

    /// Stop recording; later requests are ignored. Safe to call twice.
    pub fn detach(&mut self) {
        if let Some(id) = self.listener.take() {
            self.page.remove_request_listener(id);
            tracing::debug!(listener = id, records = self.len(), "Network logger detached");
        }
    }

    /// Detach and write the dump to `path`, creating parent directories.
    /// An existing file is overwritten.
    pub fn flush(&mut self, path: &Path) -> ShopResult<PathBuf> {
        self.detach();
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(path, self.to_pretty_json()?)?;
        tracing::info!(path = %path.display(), records = self.len(), "Network logs saved");
        Ok(path.to_path_buf())
    }
}

impl Drop for NetworkLogger {
    fn drop(&mut self) {
        self.detach();
    }
}
