//! Browser driver abstraction.
//!
//! Page objects never talk to a browser directly. Every element operation
//! goes through [`PageDriver`] with a [`Query`] describing how to find the
//! element, so the same sections run against the offline
//! [`FakeShop`](crate::fake::FakeShop) and against chromium over CDP.
//!
//! Element operations resolve the query once. Zero matches is a
//! [`ShopError::NotFound`](crate::result::ShopError::NotFound) and is never
//! retried here; waiting is the caller's job (see [`crate::wait`]). When a
//! query matches several elements, actions apply to the first one.

use crate::dialog::DialogHandlerFn;
use crate::locator::Query;
use crate::result::ShopResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Identifier returned when subscribing to request events
pub type ListenerId = u64;

/// An outgoing request observed by the page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestEvent {
    /// Request URL
    pub url: String,
    /// HTTP method
    pub method: String,
    /// Resource type reported by the browser (document, script, fetch, ...)
    pub resource_type: Option<String>,
}

impl RequestEvent {
    /// Create a request event
    #[must_use]
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: method.into(),
            resource_type: None,
        }
    }

    /// Attach a resource type
    #[must_use]
    pub fn with_resource_type(mut self, resource_type: impl Into<String>) -> Self {
        self.resource_type = Some(resource_type.into());
        self
    }
}

/// Callback invoked for every request the page issues
pub type RequestListener = Arc<dyn Fn(&RequestEvent) + Send + Sync>;

/// Snapshot of the first matched element's interactive state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementState {
    /// Rendered with a non-empty box and not hidden by style
    pub visible: bool,
    /// Not disabled
    pub enabled: bool,
    /// Checkbox/radio checked state
    pub checked: bool,
}

/// A single page the harness can drive
#[async_trait]
pub trait PageDriver: Send + Sync + fmt::Debug {
    /// Navigate to a URL and wait for the load event
    async fn goto(&self, url: &str) -> ShopResult<()>;

    /// Current URL
    async fn url(&self) -> ShopResult<String>;

    /// Document title
    async fn title(&self) -> ShopResult<String>;

    /// Number of elements the query matches
    async fn count(&self, query: &Query) -> ShopResult<usize>;

    /// Click the first match
    async fn click(&self, query: &Query) -> ShopResult<()>;

    /// Replace the value of the first matched input
    async fn fill(&self, query: &Query, text: &str) -> ShopResult<()>;

    /// Move the pointer over the first match
    async fn hover(&self, query: &Query) -> ShopResult<()>;

    /// Rendered text of the first match
    async fn inner_text(&self, query: &Query) -> ShopResult<String>;

    /// Attribute of the first match
    async fn attribute(&self, query: &Query, name: &str) -> ShopResult<Option<String>>;

    /// Computed style property (CSS name, e.g. `background-image`) of the first match
    async fn computed_style(&self, query: &Query, property: &str) -> ShopResult<String>;

    /// Interactive state of the first match
    async fn state(&self, query: &Query) -> ShopResult<ElementState>;

    /// Check or uncheck the first matched checkbox; no-op when already in that state
    async fn set_checked(&self, query: &Query, checked: bool) -> ShopResult<()>;

    /// PNG screenshot of the page
    async fn screenshot(&self, full_page: bool) -> ShopResult<Vec<u8>>;

    /// Click `trigger` and save the resulting download at `dest`
    async fn download(&self, trigger: &Query, dest: &Path) -> ShopResult<PathBuf>;

    /// Path of this page's screen recording, if one is being made
    async fn video_path(&self) -> ShopResult<Option<PathBuf>>;

    /// Subscribe to outgoing requests
    fn on_request(&self, listener: RequestListener) -> ListenerId;

    /// Drop a request subscription
    fn remove_request_listener(&self, id: ListenerId);

    /// Handle the next dialog only; later dialogs are dismissed
    fn once_dialog(&self, handler: DialogHandlerFn);

    /// Close the page
    async fn close(&self) -> ShopResult<()> {
        Ok(())
    }
}

/// A browsing context (isolated session) owning one or more pages
#[async_trait]
pub trait BrowsingContext: Send + Sync + fmt::Debug {
    /// Pages opened in this context, in creation order
    fn pages(&self) -> Vec<Arc<dyn PageDriver>>;

    /// Close the context and all its pages
    async fn close(&self) -> ShopResult<()>;
}

/// A fresh page plus the context that owns it, created per test
#[derive(Debug, Clone)]
pub struct BrowserSession {
    /// Page handed to the test body
    pub page: Arc<dyn PageDriver>,
    /// Owning context, when the backend has one
    pub context: Option<Arc<dyn BrowsingContext>>,
}

/// Creates one isolated session per test
#[async_trait]
pub trait SessionFactory: Send + Sync + fmt::Debug {
    /// Open a session for the given test node id
    async fn open(&self, node_id: &str) -> ShopResult<BrowserSession>;

    /// Backend name for reports
    fn backend(&self) -> &'static str;
}
