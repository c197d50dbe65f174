//! In-memory stand-in for the shopping application.
//!
//! [`FakeShop`] implements [`PageDriver`] over a small re-rendered element
//! tree with the same class names, attributes and roles as the production
//! app, so every page object and scenario runs offline. It also plays the
//! linked repository page (code menu, ZIP download), raises the checkout
//! alert, reports requests and can fake a screen recording.

mod app;
mod css;
mod dom;

pub use app::{sample_catalog, CartLine, CatalogItem, SIZES};
pub use css::SelectorList;

use crate::config::HarnessConfig;
use crate::dialog::{resolve_dialog, Dialog, DialogHandlerFn};
use crate::driver::{
    BrowserSession, BrowsingContext, ElementState, ListenerId, PageDriver, RequestEvent, RequestListener,
    SessionFactory,
};
use crate::locator::Query;
use crate::result::{ShopError, ShopResult};
use app::{AppSettings, Effect, ShopApp};
use async_trait::async_trait;
use base64::Engine;
use dom::{Action, NodeId};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// 1x1 transparent PNG returned as the page screenshot
const PLACEHOLDER_PNG: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

/// Bytes written as the fake screen recording
const PLACEHOLDER_WEBM: &[u8] = &[0x1a, 0x45, 0xdf, 0xa3, 0x9f, 0x42, 0x86, 0x81, 0x01];

/// Knobs for the fake application
#[derive(Debug, Clone)]
pub struct FakeOptions {
    /// URL the shop answers on
    pub base_url: String,
    /// URL of the linked repository page
    pub repo_url: String,
    /// Target of the work-abroad link
    pub linkedin_url: String,
    /// Document title of the shop
    pub title: String,
    /// Products on offer
    pub catalog: Vec<CatalogItem>,
    /// Lowest quantity the `-` control allows; 0 lets a line drop out of the cart
    pub min_quantity: u32,
    /// Error banner text rendered at the top of the shop
    pub error_banner: Option<String>,
    /// Directory to write a fake recording into
    pub video_dir: Option<PathBuf>,
    /// Make `screenshot` fail
    pub fail_screenshot: bool,
    /// Make `video_path` fail
    pub fail_video: bool,
}

impl Default for FakeOptions {
    fn default() -> Self {
        Self {
            base_url: crate::config::DEFAULT_BASE_URL.to_string(),
            repo_url: crate::config::DEFAULT_REPO_URL.to_string(),
            linkedin_url: "https://www.linkedin.com/in/jeremy-soares/".to_string(),
            title: crate::config::DEFAULT_TITLE.to_string(),
            catalog: sample_catalog(),
            min_quantity: 1,
            error_banner: None,
            video_dir: None,
            fail_screenshot: false,
            fail_video: false,
        }
    }
}

impl FakeOptions {
    /// Options matching a harness configuration
    #[must_use]
    pub fn from_config(config: &HarnessConfig) -> Self {
        let mut options = Self {
            base_url: config.base_url.clone(),
            repo_url: config.repo_url.clone(),
            title: config.expected_title.clone(),
            ..Self::default()
        };
        if config.browser.record_video {
            options.video_dir = Some(config.artifacts_dir.join("recordings"));
        }
        options
    }

    #[must_use]
    pub fn with_catalog(mut self, catalog: Vec<CatalogItem>) -> Self {
        self.catalog = catalog;
        self
    }

    #[must_use]
    pub const fn with_min_quantity(mut self, min: u32) -> Self {
        self.min_quantity = min;
        self
    }

    #[must_use]
    pub fn with_error_banner(mut self, message: impl Into<String>) -> Self {
        self.error_banner = Some(message.into());
        self
    }

    #[must_use]
    pub fn with_video_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.video_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub const fn with_failing_screenshot(mut self) -> Self {
        self.fail_screenshot = true;
        self
    }

    #[must_use]
    pub const fn with_failing_video(mut self) -> Self {
        self.fail_video = true;
        self
    }
}

/// Offline page driver playing the shop
pub struct FakeShop {
    options: FakeOptions,
    app: Mutex<ShopApp>,
    listeners: Mutex<Vec<(ListenerId, RequestListener)>>,
    next_listener: AtomicU64,
    dialog_handler: Mutex<Option<DialogHandlerFn>>,
    dialogs: Mutex<Vec<Dialog>>,
    actions: Mutex<Vec<String>>,
    video: Option<PathBuf>,
    closed: AtomicBool,
}

impl fmt::Debug for FakeShop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FakeShop")
            .field("base_url", &self.options.base_url)
            .field("url", &self.lock_app().url())
            .finish()
    }
}

impl Default for FakeShop {
    fn default() -> Self {
        Self::new(FakeOptions::default())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

impl FakeShop {
    #[must_use]
    pub fn new(options: FakeOptions) -> Self {
        let settings = AppSettings {
            base_url: options.base_url.clone(),
            repo_url: options.repo_url.clone(),
            linkedin_url: options.linkedin_url.clone(),
            title: options.title.clone(),
            min_quantity: options.min_quantity,
            error_banner: options.error_banner.clone(),
        };
        let video = options
            .video_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.webm", uuid::Uuid::new_v4())));
        Self {
            app: Mutex::new(ShopApp::new(settings, options.catalog.clone())),
            options,
            listeners: Mutex::new(Vec::new()),
            next_listener: AtomicU64::new(1),
            dialog_handler: Mutex::new(None),
            dialogs: Mutex::new(Vec::new()),
            actions: Mutex::new(Vec::new()),
            video,
            closed: AtomicBool::new(false),
        }
    }

    fn lock_app(&self) -> MutexGuard<'_, ShopApp> {
        lock(&self.app)
    }

    /// Navigate to the shop's base URL
    pub async fn open_home(&self) -> ShopResult<()> {
        self.goto(&self.options.base_url).await
    }

    #[must_use]
    pub const fn options(&self) -> &FakeOptions {
        &self.options
    }

    /// Every dialog raised so far, with the action taken
    #[must_use]
    pub fn dialogs(&self) -> Vec<Dialog> {
        lock(&self.dialogs).clone()
    }

    /// Current cart as `(title, quantity)`, straight from application state
    #[must_use]
    pub fn cart_lines(&self) -> Vec<(String, u32)> {
        let app = self.lock_app();
        app.cart()
            .iter()
            .filter_map(|line| {
                app.catalog()
                    .iter()
                    .find(|p| p.id == line.product)
                    .map(|p| (p.title.clone(), line.quantity))
            })
            .collect()
    }

    /// Sum of cart quantities from application state
    #[must_use]
    pub fn badge_total(&self) -> u32 {
        self.lock_app().badge_total()
    }

    /// Sizes currently selected in application state
    #[must_use]
    pub fn selected_sizes(&self) -> Vec<String> {
        self.lock_app().selected_sizes().to_vec()
    }

    #[must_use]
    pub fn is_cart_open(&self) -> bool {
        self.lock_app().is_cart_open()
    }

    /// Number of live request subscriptions
    #[must_use]
    pub fn listener_count(&self) -> usize {
        lock(&self.listeners).len()
    }

    /// Log of driver calls, e.g. `click sc-... >> nth=0`
    #[must_use]
    pub fn action_log(&self) -> Vec<String> {
        lock(&self.actions).clone()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn record(&self, entry: String) {
        lock(&self.actions).push(entry);
    }

    fn first(&self, app: &ShopApp, query: &Query) -> ShopResult<NodeId> {
        css::resolve(app.dom(), query)?
            .first()
            .copied()
            .ok_or_else(|| ShopError::NotFound {
                selector: query.to_string(),
            })
    }

    fn emit(&self, requests: &[RequestEvent]) {
        let listeners: Vec<RequestListener> = lock(&self.listeners).iter().map(|(_, l)| Arc::clone(l)).collect();
        for request in requests {
            for listener in &listeners {
                listener(request);
            }
        }
    }

    fn raise_dialog(&self, message: String) {
        let handler = lock(&self.dialog_handler).take();
        let dialog = resolve_dialog(Dialog::alert(message), handler);
        lock(&self.dialogs).push(dialog);
    }

    fn run_effect(&self, effect: Effect) {
        match effect {
            Effect::None | Effect::Download => {}
            Effect::Requests(requests) => self.emit(&requests),
            Effect::Alert(message) => self.raise_dialog(message),
        }
    }

    fn actionable(&self, app: &ShopApp, query: &Query) -> ShopResult<NodeId> {
        let node = self.first(app, query)?;
        let dom = app.dom();
        if !dom.is_visible(node) {
            return Err(ShopError::NotActionable {
                selector: query.to_string(),
                reason: "element is not visible".to_string(),
            });
        }
        if !dom.is_enabled(node) {
            return Err(ShopError::NotActionable {
                selector: query.to_string(),
                reason: "element is disabled".to_string(),
            });
        }
        Ok(node)
    }

    fn write_zip(dest: &Path) -> ShopResult<()> {
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::File::create(dest)?;
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        zip.add_directory("react-shopping-cart-main/", options)?;
        zip.start_file("react-shopping-cart-main/README.md", options)?;
        zip.write_all(b"# Typescript React Shopping cart\n")?;
        zip.start_file("react-shopping-cart-main/package.json", options)?;
        zip.write_all(br#"{"name":"react-shopping-cart"}"#)?;
        zip.finish()?;
        Ok(())
    }
}

#[async_trait]
impl PageDriver for FakeShop {
    async fn goto(&self, url: &str) -> ShopResult<()> {
        self.record(format!("goto {url}"));
        let requests = self.lock_app().navigate(url);
        self.emit(&requests);
        Ok(())
    }

    async fn url(&self) -> ShopResult<String> {
        Ok(self.lock_app().url())
    }

    async fn title(&self) -> ShopResult<String> {
        Ok(self.lock_app().title())
    }

    async fn count(&self, query: &Query) -> ShopResult<usize> {
        Ok(css::resolve(self.lock_app().dom(), query)?.len())
    }

    async fn click(&self, query: &Query) -> ShopResult<()> {
        self.record(format!("click {query}"));
        let effect = {
            let mut app = self.lock_app();
            let node = self.actionable(&app, query)?;
            match app.dom().action_target(node) {
                Some((_, Action::DownloadZip)) | None => Effect::None,
                Some((_, action)) => app.apply(&action),
            }
        };
        self.run_effect(effect);
        Ok(())
    }

    async fn fill(&self, query: &Query, text: &str) -> ShopResult<()> {
        self.record(format!("fill {query}"));
        let mut app = self.lock_app();
        let node = self.actionable(&app, query)?;
        if app.fill(node, text) {
            Ok(())
        } else {
            Err(ShopError::NotActionable {
                selector: query.to_string(),
                reason: "element is not a text input".to_string(),
            })
        }
    }

    async fn hover(&self, query: &Query) -> ShopResult<()> {
        self.record(format!("hover {query}"));
        let mut app = self.lock_app();
        let node = self.first(&app, query)?;
        app.hover(node);
        Ok(())
    }

    async fn inner_text(&self, query: &Query) -> ShopResult<String> {
        let app = self.lock_app();
        let node = self.first(&app, query)?;
        Ok(app.dom().inner_text(node))
    }

    async fn attribute(&self, query: &Query, name: &str) -> ShopResult<Option<String>> {
        let app = self.lock_app();
        let node = self.first(&app, query)?;
        Ok(app.dom().get(node).attrs.get(name).cloned())
    }

    async fn computed_style(&self, query: &Query, property: &str) -> ShopResult<String> {
        let app = self.lock_app();
        let node = self.first(&app, query)?;
        let el = app.dom().get(node);
        Ok(el.style.get(property).cloned().unwrap_or_else(|| match property {
            "background-image" => "none".to_string(),
            "display" if el.hidden => "none".to_string(),
            "display" => "block".to_string(),
            _ => String::new(),
        }))
    }

    async fn state(&self, query: &Query) -> ShopResult<ElementState> {
        let app = self.lock_app();
        let node = self.first(&app, query)?;
        let dom = app.dom();
        Ok(ElementState {
            visible: dom.is_visible(node),
            enabled: dom.is_enabled(node),
            checked: dom.get(node).checked,
        })
    }

    async fn set_checked(&self, query: &Query, checked: bool) -> ShopResult<()> {
        self.record(format!("set_checked({checked}) {query}"));
        let mut app = self.lock_app();
        let node = self.first(&app, query)?;
        let el = app.dom().get(node);
        if el.attrs.get("type").map(String::as_str) != Some("checkbox") {
            return Err(ShopError::NotActionable {
                selector: query.to_string(),
                reason: "element is not a checkbox".to_string(),
            });
        }
        if el.checked != checked {
            if let Some(action) = el.action.clone() {
                app.apply(&action);
            }
        }
        Ok(())
    }

    async fn screenshot(&self, full_page: bool) -> ShopResult<Vec<u8>> {
        self.record(format!("screenshot full_page={full_page}"));
        if self.options.fail_screenshot {
            return Err(ShopError::Screenshot {
                message: "page crashed".to_string(),
            });
        }
        base64::engine::general_purpose::STANDARD
            .decode(PLACEHOLDER_PNG)
            .map_err(|e| ShopError::Screenshot {
                message: e.to_string(),
            })
    }

    async fn download(&self, trigger: &Query, dest: &Path) -> ShopResult<PathBuf> {
        self.record(format!("download {trigger}"));
        {
            let app = self.lock_app();
            let node = self.actionable(&app, trigger)?;
            if !matches!(app.dom().action_target(node), Some((_, Action::DownloadZip))) {
                return Err(ShopError::Download {
                    message: format!("clicking {trigger} did not start a download"),
                });
            }
        }
        Self::write_zip(dest)?;
        Ok(dest.to_path_buf())
    }

    async fn video_path(&self) -> ShopResult<Option<PathBuf>> {
        if self.options.fail_video {
            return Err(ShopError::Video {
                message: "recorder crashed".to_string(),
            });
        }
        let Some(path) = &self.video else {
            return Ok(None);
        };
        if !path.exists() {
            if let Some(dir) = path.parent() {
                std::fs::create_dir_all(dir)?;
            }
            std::fs::write(path, PLACEHOLDER_WEBM)?;
        }
        Ok(Some(path.clone()))
    }

    fn on_request(&self, listener: RequestListener) -> ListenerId {
        let id = self.next_listener.fetch_add(1, Ordering::SeqCst);
        lock(&self.listeners).push((id, listener));
        id
    }

    fn remove_request_listener(&self, id: ListenerId) {
        lock(&self.listeners).retain(|(lid, _)| *lid != id);
    }

    fn once_dialog(&self, handler: DialogHandlerFn) {
        *lock(&self.dialog_handler) = Some(handler);
    }

    async fn close(&self) -> ShopResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Browsing context owning fake pages
#[derive(Debug, Default)]
pub struct FakeContext {
    pages: Mutex<Vec<Arc<FakeShop>>>,
}

impl FakeContext {
    #[must_use]
    pub fn with_page(page: Arc<FakeShop>) -> Self {
        Self {
            pages: Mutex::new(vec![page]),
        }
    }
}

#[async_trait]
impl BrowsingContext for FakeContext {
    fn pages(&self) -> Vec<Arc<dyn PageDriver>> {
        lock(&self.pages)
            .iter()
            .map(|p| Arc::clone(p) as Arc<dyn PageDriver>)
            .collect()
    }

    async fn close(&self) -> ShopResult<()> {
        let pages: Vec<Arc<FakeShop>> = lock(&self.pages).drain(..).collect();
        for page in pages {
            page.close().await?;
        }
        Ok(())
    }
}

/// Session factory handing each test a fresh fake shop
#[derive(Debug, Clone, Default)]
pub struct FakeSessionFactory {
    options: FakeOptions,
}

impl FakeSessionFactory {
    #[must_use]
    pub const fn new(options: FakeOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl SessionFactory for FakeSessionFactory {
    async fn open(&self, node_id: &str) -> ShopResult<BrowserSession> {
        tracing::debug!(node_id, "Opening fake browser session");
        let page = Arc::new(FakeShop::new(self.options.clone()));
        let context = Arc::new(FakeContext::with_page(Arc::clone(&page)));
        Ok(BrowserSession {
            page,
            context: Some(context),
        })
    }

    fn backend(&self) -> &'static str {
        "fake"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialog::DialogAction;
    use crate::locator::Selector;

    async fn home() -> FakeShop {
        let shop = FakeShop::default();
        shop.open_home().await.unwrap();
        shop
    }

    mod driver_tests {
        use super::*;

        #[tokio::test]
        async fn test_home_renders_catalog() {
            let shop = home().await;
            assert_eq!(shop.count(&Query::css("div.sc-124al1g-2")).await.unwrap(), 8);
            assert_eq!(shop.title().await.unwrap(), "Shopping Page");
        }

        #[tokio::test]
        async fn test_click_missing_is_not_found() {
            let shop = home().await;
            let err = shop.click(&Query::css("button.nope")).await.unwrap_err();
            assert!(err.is_not_found());
        }

        #[tokio::test]
        async fn test_disabled_click_is_not_actionable() {
            let shop = home().await;
            shop.click(&Query::css("button.sc-124al1g-0")).await.unwrap();
            let minus = Query::css("button.sc-11uohgb-7").then(Selector::has_text("-"));
            assert!(!shop.state(&minus).await.unwrap().enabled);
            let err = shop.click(&minus).await.unwrap_err();
            assert!(matches!(err, ShopError::NotActionable { .. }));
        }

        #[tokio::test]
        async fn test_unhandled_alert_is_dismissed() {
            let shop = home().await;
            shop.click(&Query::css("button.sc-124al1g-0")).await.unwrap();
            shop.click(&Query::css("div.sc-1h98xa9-4").then(Selector::role("button", Some("Checkout"))))
                .await
                .unwrap();
            let dialogs = shop.dialogs();
            assert_eq!(dialogs.len(), 1);
            assert_eq!(dialogs[0].action(), &DialogAction::Dismiss);
            assert_eq!(dialogs[0].message(), "Checkout - Subtotal: $ 20.00");
        }

        #[tokio::test]
        async fn test_request_listener_lifecycle() {
            let shop = FakeShop::default();
            let seen = Arc::new(Mutex::new(Vec::new()));
            let sink = Arc::clone(&seen);
            let id = shop.on_request(Arc::new(move |r: &RequestEvent| sink.lock().unwrap().push(r.url.clone())));
            shop.open_home().await.unwrap();
            assert_eq!(seen.lock().unwrap().len(), 4);
            shop.remove_request_listener(id);
            assert_eq!(shop.listener_count(), 0);
            shop.open_home().await.unwrap();
            assert_eq!(seen.lock().unwrap().len(), 4);
        }

        #[tokio::test]
        async fn test_screenshot_is_png() {
            let shop = home().await;
            let png = shop.screenshot(true).await.unwrap();
            assert_eq!(&png[..4], &[0x89, b'P', b'N', b'G']);
            let failing = FakeShop::new(FakeOptions::default().with_failing_screenshot());
            assert!(failing.screenshot(true).await.is_err());
        }

        #[tokio::test]
        async fn test_hover_swaps_background_image() {
            let shop = home().await;
            let image = Query::css("div.sc-124al1g-1").then(Selector::Nth(0));
            let before = shop.computed_style(&image, "background-image").await.unwrap();
            shop.hover(&image).await.unwrap();
            let after = shop.computed_style(&image, "background-image").await.unwrap();
            assert_ne!(before, after);
            assert!(after.contains("-2-product"));
        }
    }

    mod video_tests {
        use super::*;

        #[tokio::test]
        async fn test_video_written_on_request() {
            let dir = tempfile::tempdir().unwrap();
            let shop = FakeShop::new(FakeOptions::default().with_video_dir(dir.path()));
            let path = shop.video_path().await.unwrap().unwrap();
            assert!(path.exists());
            assert_eq!(path.extension().and_then(|e| e.to_str()), Some("webm"));
        }

        #[tokio::test]
        async fn test_no_video_dir_means_no_video() {
            assert!(FakeShop::default().video_path().await.unwrap().is_none());
        }
    }

    mod session_tests {
        use super::*;

        #[tokio::test]
        async fn test_factory_opens_isolated_sessions() {
            let factory = FakeSessionFactory::default();
            let a = factory.open("a").await.unwrap();
            let b = factory.open("b").await.unwrap();
            a.page.goto(crate::config::DEFAULT_BASE_URL).await.unwrap();
            assert_eq!(b.page.url().await.unwrap(), "about:blank");
            let ctx = a.context.unwrap();
            assert_eq!(ctx.pages().len(), 1);
            ctx.close().await.unwrap();
            assert!(ctx.pages().is_empty());
        }
    }
}
