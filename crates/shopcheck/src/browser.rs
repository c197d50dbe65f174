//! Chromium backend over the DevTools protocol.
//!
//! Compiled with the `browser` feature. Locator chains are serialized to
//! JSON and resolved in the page by a small script, so the same [`Query`]
//! semantics hold here and in the offline fake. Request and dialog events
//! are pumped from CDP event streams into the registered listeners.
//!
//! This backend does not record video; `video_path` is always `None`.

use crate::config::BrowserSettings;
use crate::dialog::{resolve_dialog, Dialog, DialogHandlerFn, DialogType};
use crate::driver::{
    BrowserSession, BrowsingContext, ElementState, ListenerId, PageDriver, RequestEvent, RequestListener,
    SessionFactory,
};
use crate::locator::Query;
use crate::result::{ShopError, ShopResult};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::browser::{SetDownloadBehaviorBehavior, SetDownloadBehaviorParams};
use chromiumoxide::cdp::browser_protocol::network::EventRequestWillBeSent;
use chromiumoxide::cdp::browser_protocol::page::{EventJavascriptDialogOpening, HandleJavaScriptDialogParams};
use chromiumoxide::layout::Point;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{Mutex, OnceCell};
use tokio::task::JoinHandle;

/// Resolves a serialized selector chain to an array of elements
const RESOLVER: &str = r"
(steps) => {
  const norm = (s) => (s || '').replace(/\s+/g, ' ').trim().toLowerCase();
  const roleOf = (el) => {
    const explicit = el.getAttribute && el.getAttribute('role');
    if (explicit) return explicit;
    const tag = el.tagName.toLowerCase();
    if (tag === 'button') return 'button';
    if (tag === 'a' && el.hasAttribute('href')) return 'link';
    if (/^h[1-6]$/.test(tag)) return 'heading';
    if (tag === 'img') return 'img';
    if (tag === 'input') {
      const type = (el.getAttribute('type') || 'text').toLowerCase();
      if (type === 'checkbox') return 'checkbox';
      if (type === 'radio') return 'radio';
      if (type === 'button' || type === 'submit') return 'button';
      return 'textbox';
    }
    return null;
  };
  const nameOf = (el) => el.getAttribute('aria-label') || el.innerText || el.value || el.getAttribute('title') || '';
  const ordered = (els) => els.sort((a, b) => (a.compareDocumentPosition(b) & Node.DOCUMENT_POSITION_FOLLOWING) ? -1 : 1);
  let set = [document];
  for (const step of steps) {
    switch (step.kind) {
      case 'css': {
        const out = new Set();
        for (const root of set) for (const el of root.querySelectorAll(step.value)) out.add(el);
        set = ordered([...out]);
        break;
      }
      case 'has_text':
        set = set.filter((el) => norm(el.innerText ?? el.textContent).includes(norm(step.value)));
        break;
      case 'parent': {
        const out = new Set();
        for (const el of set) if (el.parentElement) out.add(el.parentElement);
        set = ordered([...out]);
        break;
      }
      case 'nth':
        set = step.value < set.length ? [set[step.value]] : [];
        break;
      case 'last':
        set = set.length ? [set[set.length - 1]] : [];
        break;
      case 'role': {
        const out = new Set();
        for (const root of set) for (const el of root.querySelectorAll('*')) {
          if (roleOf(el) !== step.value.role) continue;
          if (step.value.name && !norm(nameOf(el)).includes(norm(step.value.name))) continue;
          out.add(el);
        }
        set = ordered([...out]);
        break;
      }
    }
  }
  return set;
}
";

/// Visibility test shared by the element scripts
const VISIBLE: &str = r"
(el) => {
  if (!el.isConnected) return false;
  const style = getComputedStyle(el);
  if (style.visibility === 'hidden' || style.display === 'none') return false;
  const rect = el.getBoundingClientRect();
  return rect.width > 0 && rect.height > 0;
}
";

/// Element script result: `missing` when the chain matched nothing
#[derive(Debug, Deserialize)]
struct Outcome<T> {
    #[serde(default)]
    missing: bool,
    value: Option<T>,
}

fn cdp_error(e: impl fmt::Display) -> ShopError {
    ShopError::driver(e)
}

/// One chromium tab
pub struct CdpPage {
    page: Page,
    browser: Arc<Mutex<Browser>>,
    listeners: Arc<StdMutex<Vec<(ListenerId, RequestListener)>>>,
    next_listener: AtomicU64,
    dialog_handler: Arc<StdMutex<Option<DialogHandlerFn>>>,
    pumps: StdMutex<Vec<JoinHandle<()>>>,
}

impl fmt::Debug for CdpPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CdpPage").finish_non_exhaustive()
    }
}

impl CdpPage {
    /// Wrap a page and start pumping its request and dialog events
    pub async fn new(page: Page, browser: Arc<Mutex<Browser>>) -> ShopResult<Self> {
        let this = Self {
            page,
            browser,
            listeners: Arc::default(),
            next_listener: AtomicU64::new(1),
            dialog_handler: Arc::default(),
            pumps: StdMutex::default(),
        };
        this.start_request_pump().await?;
        this.start_dialog_pump().await?;
        Ok(this)
    }

    async fn start_request_pump(&self) -> ShopResult<()> {
        let mut events = self
            .page
            .event_listener::<EventRequestWillBeSent>()
            .await
            .map_err(cdp_error)?;
        let listeners = Arc::clone(&self.listeners);
        let pump = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                let mut request = RequestEvent::new(event.request.method.clone(), event.request.url.clone());
                if let Some(kind) = &event.r#type {
                    request = request.with_resource_type(format!("{kind:?}").to_ascii_lowercase());
                }
                let snapshot: Vec<RequestListener> = listeners
                    .lock()
                    .map(|l| l.iter().map(|(_, f)| Arc::clone(f)).collect())
                    .unwrap_or_default();
                for listener in snapshot {
                    listener(&request);
                }
            }
        });
        self.track(pump);
        Ok(())
    }

    async fn start_dialog_pump(&self) -> ShopResult<()> {
        let mut events = self
            .page
            .event_listener::<EventJavascriptDialogOpening>()
            .await
            .map_err(cdp_error)?;
        let handler = Arc::clone(&self.dialog_handler);
        let page = self.page.clone();
        let pump = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                let kind = DialogType::from_name(&format!("{:?}", event.r#type));
                let dialog = Dialog::new(kind, event.message.clone());
                let once = handler.lock().ok().and_then(|mut h| h.take());
                let dialog = resolve_dialog(dialog, once);
                let params = HandleJavaScriptDialogParams::new(dialog.is_accepted());
                if let Err(e) = page.execute(params).await {
                    tracing::warn!("Could not answer dialog: {e}");
                }
            }
        });
        self.track(pump);
        Ok(())
    }

    fn track(&self, pump: JoinHandle<()>) {
        if let Ok(mut pumps) = self.pumps.lock() {
            pumps.push(pump);
        }
    }

    /// Run `body` against the elements the query resolves to. `body` sees
    /// `els` and `visible`, and returns the value to send back.
    async fn run<T: DeserializeOwned>(&self, query: &Query, body: &str) -> ShopResult<Outcome<T>> {
        let steps = serde_json::to_string(query.steps())?;
        let script = format!(
            "(() => {{ const els = ({RESOLVER})({steps}); const visible = {VISIBLE}; {body} }})()"
        );
        self.page
            .evaluate_expression(script)
            .await
            .map_err(cdp_error)?
            .into_value::<Outcome<T>>()
            .map_err(cdp_error)
    }

    /// Like [`Self::run`] but zero matches is `NotFound`
    async fn on_first<T: DeserializeOwned>(&self, query: &Query, body: &str) -> ShopResult<T> {
        let script = format!("if (!els.length) return {{ missing: true }}; const el = els[0]; {body}");
        let outcome = self.run::<T>(query, &script).await?;
        if outcome.missing {
            return Err(ShopError::NotFound {
                selector: query.to_string(),
            });
        }
        outcome.value.ok_or_else(|| ShopError::driver(format!("no value for {query}")))
    }

    async fn eval<T: DeserializeOwned>(&self, expression: &str) -> ShopResult<T> {
        self.page
            .evaluate_expression(expression)
            .await
            .map_err(cdp_error)?
            .into_value::<T>()
            .map_err(cdp_error)
    }

    async fn require_actionable(&self, query: &Query) -> ShopResult<()> {
        let state = self.state(query).await?;
        let reason = if !state.visible {
            "not visible"
        } else if !state.enabled {
            "disabled"
        } else {
            return Ok(());
        };
        Err(ShopError::NotActionable {
            selector: query.to_string(),
            reason: reason.to_string(),
        })
    }
}

#[async_trait]
impl PageDriver for CdpPage {
    async fn goto(&self, url: &str) -> ShopResult<()> {
        tracing::debug!(url, "CDP navigate");
        self.page.goto(url).await.map_err(|e| ShopError::Navigation {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        Ok(())
    }

    async fn url(&self) -> ShopResult<String> {
        Ok(self.page.url().await.map_err(cdp_error)?.unwrap_or_default())
    }

    async fn title(&self) -> ShopResult<String> {
        Ok(self.page.get_title().await.map_err(cdp_error)?.unwrap_or_default())
    }

    async fn count(&self, query: &Query) -> ShopResult<usize> {
        let outcome = self.run::<usize>(query, "return { value: els.length };").await?;
        Ok(outcome.value.unwrap_or(0))
    }

    async fn click(&self, query: &Query) -> ShopResult<()> {
        self.require_actionable(query).await?;
        self.on_first::<bool>(query, "el.scrollIntoView({ block: 'center' }); el.click(); return { value: true };")
            .await
            .map(drop)
    }

    async fn fill(&self, query: &Query, text: &str) -> ShopResult<()> {
        self.require_actionable(query).await?;
        let value = serde_json::to_string(text)?;
        let body = format!(
            "const proto = el instanceof HTMLTextAreaElement ? HTMLTextAreaElement.prototype : HTMLInputElement.prototype; \
             Object.getOwnPropertyDescriptor(proto, 'value').set.call(el, {value}); \
             el.dispatchEvent(new Event('input', {{ bubbles: true }})); \
             el.dispatchEvent(new Event('change', {{ bubbles: true }})); \
             return {{ value: true }};"
        );
        self.on_first::<bool>(query, &body).await.map(drop)
    }

    async fn hover(&self, query: &Query) -> ShopResult<()> {
        let [x, y]: [f64; 2] = self
            .on_first(
                query,
                "el.scrollIntoView({ block: 'center' }); const r = el.getBoundingClientRect(); \
                 return { value: [r.left + r.width / 2, r.top + r.height / 2] };",
            )
            .await?;
        self.page.move_mouse(Point::new(x, y)).await.map_err(cdp_error)?;
        Ok(())
    }

    async fn inner_text(&self, query: &Query) -> ShopResult<String> {
        self.on_first(query, "return { value: el.innerText ?? el.textContent ?? '' };")
            .await
    }

    async fn attribute(&self, query: &Query, name: &str) -> ShopResult<Option<String>> {
        let name = serde_json::to_string(name)?;
        let outcome = self
            .run::<String>(
                query,
                &format!("if (!els.length) return {{ missing: true }}; return {{ value: els[0].getAttribute({name}) }};"),
            )
            .await?;
        if outcome.missing {
            return Err(ShopError::NotFound {
                selector: query.to_string(),
            });
        }
        Ok(outcome.value)
    }

    async fn computed_style(&self, query: &Query, property: &str) -> ShopResult<String> {
        let property = serde_json::to_string(property)?;
        self.on_first(
            query,
            &format!("return {{ value: getComputedStyle(el).getPropertyValue({property}) }};"),
        )
        .await
    }

    async fn state(&self, query: &Query) -> ShopResult<ElementState> {
        let outcome = self
            .run::<ElementState>(
                query,
                "if (!els.length) return { value: { visible: false, enabled: false, checked: false } }; \
                 const el = els[0]; \
                 return { value: { visible: visible(el), enabled: !el.disabled && el.getAttribute('aria-disabled') !== 'true', checked: !!el.checked } };",
            )
            .await?;
        Ok(outcome.value.unwrap_or_default())
    }

    async fn set_checked(&self, query: &Query, checked: bool) -> ShopResult<()> {
        let state = self.state(query).await?;
        if state.checked != checked {
            self.on_first::<bool>(query, "el.click(); return { value: true };").await?;
        }
        Ok(())
    }

    async fn screenshot(&self, full_page: bool) -> ShopResult<Vec<u8>> {
        self.page
            .screenshot(ScreenshotParams::builder().full_page(full_page).build())
            .await
            .map_err(|e| ShopError::Screenshot {
                message: e.to_string(),
            })
    }

    async fn download(&self, trigger: &Query, dest: &Path) -> ShopResult<PathBuf> {
        let staging = dest
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(format!(".download-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&staging)?;
        let mut params = SetDownloadBehaviorParams::new(SetDownloadBehaviorBehavior::Allow);
        params.download_path = Some(staging.display().to_string());
        self.browser.lock().await.execute(params).await.map_err(|e| ShopError::Download {
            message: e.to_string(),
        })?;

        self.click(trigger).await?;
        let saved = wait_for_download(&staging, Duration::from_secs(60)).await?;
        std::fs::rename(&saved, dest)?;
        let _ = std::fs::remove_dir_all(&staging);
        Ok(dest.to_path_buf())
    }

    async fn video_path(&self) -> ShopResult<Option<PathBuf>> {
        Ok(None)
    }

    fn on_request(&self, listener: RequestListener) -> ListenerId {
        let id = self.next_listener.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.push((id, listener));
        }
        id
    }

    fn remove_request_listener(&self, id: ListenerId) {
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.retain(|(existing, _)| *existing != id);
        }
    }

    fn once_dialog(&self, handler: DialogHandlerFn) {
        if let Ok(mut slot) = self.dialog_handler.lock() {
            *slot = Some(handler);
        }
    }

    async fn close(&self) -> ShopResult<()> {
        if let Ok(mut pumps) = self.pumps.lock() {
            for pump in pumps.drain(..) {
                pump.abort();
            }
        }
        self.page.clone().close().await.map_err(cdp_error)
    }
}

/// Wait for the first finished file in `dir`
async fn wait_for_download(dir: &Path, timeout: Duration) -> ShopResult<PathBuf> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let finished = std::fs::read_dir(dir)?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .find(|path| path.extension().map_or(true, |ext| ext != "crdownload"));
        if let Some(path) = finished {
            return Ok(path);
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(ShopError::Download {
                message: format!("nothing finished downloading into {}", dir.display()),
            });
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

/// Pages opened for one test
#[derive(Debug, Default)]
pub struct CdpContext {
    pages: StdMutex<Vec<Arc<CdpPage>>>,
}

#[async_trait]
impl BrowsingContext for CdpContext {
    fn pages(&self) -> Vec<Arc<dyn PageDriver>> {
        self.pages
            .lock()
            .map(|pages| pages.iter().map(|p| Arc::clone(p) as Arc<dyn PageDriver>).collect())
            .unwrap_or_default()
    }

    async fn close(&self) -> ShopResult<()> {
        let pages: Vec<Arc<CdpPage>> = self
            .pages
            .lock()
            .map(|mut pages| pages.drain(..).collect())
            .unwrap_or_default();
        for page in pages {
            page.close().await?;
        }
        Ok(())
    }
}

/// Launches chromium once and opens a fresh tab per test
pub struct CdpSessionFactory {
    settings: BrowserSettings,
    browser: OnceCell<(Arc<Mutex<Browser>>, JoinHandle<()>)>,
}

impl fmt::Debug for CdpSessionFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CdpSessionFactory")
            .field("settings", &self.settings)
            .field("launched", &self.browser.initialized())
            .finish()
    }
}

impl CdpSessionFactory {
    #[must_use]
    pub fn new(settings: BrowserSettings) -> Self {
        Self {
            settings,
            browser: OnceCell::new(),
        }
    }

    async fn browser(&self) -> ShopResult<Arc<Mutex<Browser>>> {
        let (browser, _) = self
            .browser
            .get_or_try_init(|| launch(&self.settings))
            .await?;
        Ok(Arc::clone(browser))
    }

    /// Close chromium if it was launched
    pub async fn shutdown(&self) -> ShopResult<()> {
        if let Some((browser, handler)) = self.browser.get() {
            browser.lock().await.close().await.map_err(cdp_error)?;
            handler.abort();
        }
        Ok(())
    }
}

async fn launch(settings: &BrowserSettings) -> ShopResult<(Arc<Mutex<Browser>>, JoinHandle<()>)> {
    let mut builder = BrowserConfig::builder().window_size(settings.viewport_width, settings.viewport_height);
    if !settings.headless {
        builder = builder.with_head();
    }
    if !settings.sandbox {
        builder = builder.no_sandbox();
    }
    if let Some(path) = &settings.chromium_path {
        builder = builder.chrome_executable(path);
    }
    let config = builder.build().map_err(|message| ShopError::Config { message })?;

    let (browser, mut handler) = Browser::launch(config).await.map_err(cdp_error)?;
    let handle = tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if event.is_err() {
                break;
            }
        }
    });
    tracing::info!(headless = settings.headless, "Chromium launched");
    Ok((Arc::new(Mutex::new(browser)), handle))
}

#[async_trait]
impl SessionFactory for CdpSessionFactory {
    async fn open(&self, node_id: &str) -> ShopResult<BrowserSession> {
        let browser = self.browser().await?;
        let page = browser.lock().await.new_page("about:blank").await.map_err(cdp_error)?;
        tracing::debug!(node_id, "Opened chromium tab");
        let page = Arc::new(CdpPage::new(page, browser).await?);
        let context = CdpContext {
            pages: StdMutex::new(vec![Arc::clone(&page)]),
        };
        Ok(BrowserSession {
            page,
            context: Some(Arc::new(context)),
        })
    }

    fn backend(&self) -> &'static str {
        "chromium"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::Selector;

    #[test]
    fn test_steps_serialize_for_resolver() {
        let query = Query::css("div.card")
            .then(Selector::has_text("Shirt"))
            .then(Selector::Parent)
            .then(Selector::Nth(1))
            .then(Selector::role("button", Some("Add")));
        let json: serde_json::Value = serde_json::to_value(query.steps()).unwrap();
        assert_eq!(json[0]["kind"], "css");
        assert_eq!(json[1]["value"], "Shirt");
        assert_eq!(json[2]["kind"], "parent");
        assert_eq!(json[3]["value"], 1);
        assert_eq!(json[4]["value"]["role"], "button");
    }

    #[test]
    fn test_outcome_missing() {
        let outcome: Outcome<String> = serde_json::from_str(r#"{"missing": true}"#).unwrap();
        assert!(outcome.missing);
        assert!(outcome.value.is_none());
    }

    #[tokio::test]
    async fn test_wait_for_download_ignores_partial_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("repo.zip.crdownload"), b"x").unwrap();
        let err = wait_for_download(dir.path(), Duration::from_millis(150)).await.unwrap_err();
        assert!(matches!(err, ShopError::Download { .. }));
        std::fs::write(dir.path().join("repo.zip"), b"x").unwrap();
        let found = wait_for_download(dir.path(), Duration::from_millis(150)).await.unwrap();
        assert_eq!(found.file_name().unwrap(), "repo.zip");
    }
}
