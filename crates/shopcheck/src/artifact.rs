//! Post-test artifact capture.
//!
//! After a test's call phase the [`ArtifactHook`] attaches, in order:
//!
//! 1. the log tail (`Test Logs`), whenever it is non-empty
//! 2. a full-page screenshot (`Failure Screenshot`), on failure with a page
//! 3. the page's screen recording (`Failure Video`), on failure with a context
//! 4. the captured requests (`Network Logs`), when a logger recorded any
//!
//! Each capture is independent. A capture that fails is logged at `warn`
//! and skipped; the hook itself never fails.

use crate::config::{HarnessConfig, LogSource};
use crate::driver::{BrowsingContext, PageDriver};
use crate::logging::{read_log_tail, LogCapture, LOG_FILE_NAME};
use crate::network::{NetworkLogger, NETWORK_LOG_FILE};
use crate::reporter::{TestPhase, TestReport};
use crate::result::ShopResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

pub const TEST_LOGS: &str = "Test Logs";
pub const FAILURE_SCREENSHOT: &str = "Failure Screenshot";
pub const FAILURE_VIDEO: &str = "Failure Video";
pub const NETWORK_LOGS: &str = "Network Logs";

/// Kind of evidence attached to a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentKind {
    Text,
    Image,
    Video,
}

impl fmt::Display for AttachmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Image => write!(f, "image"),
            Self::Video => write!(f, "video"),
        }
    }
}

/// A named piece of evidence: inline text or a file on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Attachment {
    Text { name: String, content: String },
    Image { name: String, path: PathBuf },
    Video { name: String, path: PathBuf },
}

impl Attachment {
    pub fn text(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self::Text {
            name: name.into(),
            content: content.into(),
        }
    }

    pub fn image(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::Image {
            name: name.into(),
            path: path.into(),
        }
    }

    pub fn video(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::Video {
            name: name.into(),
            path: path.into(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Text { name, .. } | Self::Image { name, .. } | Self::Video { name, .. } => name,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> AttachmentKind {
        match self {
            Self::Text { .. } => AttachmentKind::Text,
            Self::Image { .. } => AttachmentKind::Image,
            Self::Video { .. } => AttachmentKind::Video,
        }
    }

    /// File backing an image or video attachment
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Text { .. } => None,
            Self::Image { path, .. } | Self::Video { path, .. } => Some(path),
        }
    }
}

/// File-name-safe form of a test node id: `/` and `:` become `_`
#[must_use]
pub fn sanitize_node_id(node_id: &str) -> String {
    node_id.replace(['/', ':'], "_")
}

/// Directory layout under the artifacts root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub root: PathBuf,
    pub screenshots: PathBuf,
    pub videos: PathBuf,
    pub network_logs: PathBuf,
    /// Shared rolling log file
    pub log_file: PathBuf,
}

impl ArtifactPaths {
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        Self {
            screenshots: root.join("screenshots"),
            videos: root.join("videos"),
            network_logs: root.join("network_logs"),
            log_file: root.join(LOG_FILE_NAME),
            root,
        }
    }

    /// Create every artifact directory
    pub fn ensure_dirs(&self) -> ShopResult<()> {
        for dir in [&self.root, &self.screenshots, &self.videos, &self.network_logs] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    #[must_use]
    pub fn screenshot_for(&self, node_id: &str) -> PathBuf {
        self.screenshots.join(format!("{}.png", sanitize_node_id(node_id)))
    }

    #[must_use]
    pub fn video_for(&self, node_id: &str) -> PathBuf {
        self.videos.join(format!("{}.webm", sanitize_node_id(node_id)))
    }

    /// Network dump path shared by all tests
    #[must_use]
    pub fn network_log_file(&self) -> PathBuf {
        self.network_logs.join(NETWORK_LOG_FILE)
    }
}

/// What the finished test leaves behind for the hook
#[derive(Default, Clone, Copy)]
pub struct HookInputs<'a> {
    pub page: Option<&'a Arc<dyn PageDriver>>,
    pub context: Option<&'a Arc<dyn BrowsingContext>>,
    pub network: Option<&'a NetworkLogger>,
    pub log: Option<&'a LogCapture>,
}

impl fmt::Debug for HookInputs<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookInputs")
            .field("page", &self.page.is_some())
            .field("context", &self.context.is_some())
            .field("network", &self.network.map(NetworkLogger::len))
            .field("log", &self.log.is_some())
            .finish()
    }
}

/// Attaches evidence to a finished test's report
#[derive(Debug, Clone)]
pub struct ArtifactHook {
    paths: ArtifactPaths,
    log_tail_lines: usize,
    log_source: LogSource,
}

impl ArtifactHook {
    #[must_use]
    pub fn new(paths: ArtifactPaths) -> Self {
        Self {
            paths,
            log_tail_lines: crate::config::DEFAULT_LOG_TAIL_LINES,
            log_source: LogSource::Buffer,
        }
    }

    #[must_use]
    pub fn from_config(config: &HarnessConfig) -> Self {
        Self {
            paths: config.artifact_paths(),
            log_tail_lines: config.log_tail_lines,
            log_source: config.log_source,
        }
    }

    #[must_use]
    pub const fn with_log_source(mut self, source: LogSource) -> Self {
        self.log_source = source;
        self
    }

    #[must_use]
    pub const fn with_log_tail_lines(mut self, lines: usize) -> Self {
        self.log_tail_lines = lines;
        self
    }

    #[must_use]
    pub const fn paths(&self) -> &ArtifactPaths {
        &self.paths
    }

    /// Attach artifacts to `report`. Only the call phase is handled.
    pub async fn on_report(&self, report: &mut TestReport, inputs: HookInputs<'_>) {
        if report.phase != TestPhase::Call {
            return;
        }
        let node_id = report.node_id.clone();

        match self.log_tail(inputs.log).await {
            Ok(tail) if !tail.is_empty() => report.attach(Attachment::text(TEST_LOGS, tail)),
            Ok(_) => {}
            Err(e) => warn!(node_id = %node_id, "Could not read log tail: {e}"),
        }

        if report.is_failed() {
            if let Some(page) = inputs.page {
                match self.capture_screenshot(page.as_ref(), &node_id).await {
                    Ok(path) => report.attach(Attachment::image(FAILURE_SCREENSHOT, path)),
                    Err(e) => warn!(node_id = %node_id, "Could not capture screenshot: {e}"),
                }
            }
            if let Some(context) = inputs.context {
                match self.capture_video(context.as_ref(), &node_id).await {
                    Ok(Some(path)) => report.attach(Attachment::video(FAILURE_VIDEO, path)),
                    Ok(None) => debug!(node_id = %node_id, "No recording to attach"),
                    Err(e) => warn!(node_id = %node_id, "Could not attach video: {e}"),
                }
            }
        }

        if let Some(network) = inputs.network.filter(|n| !n.is_empty()) {
            match network.to_pretty_json() {
                Ok(dump) => report.attach(Attachment::text(NETWORK_LOGS, dump)),
                Err(e) => warn!(node_id = %node_id, "Could not attach network logs: {e}"),
            }
        }
    }

    async fn log_tail(&self, capture: Option<&LogCapture>) -> std::io::Result<String> {
        match self.log_source {
            LogSource::Buffer => Ok(capture.map(|c| c.tail(self.log_tail_lines)).unwrap_or_default()),
            LogSource::File => read_log_tail(&self.paths.log_file, self.log_tail_lines).await,
        }
    }

    async fn capture_screenshot(&self, page: &dyn PageDriver, node_id: &str) -> ShopResult<PathBuf> {
        let png = page.screenshot(true).await?;
        let path = self.paths.screenshot_for(node_id);
        tokio::fs::create_dir_all(&self.paths.screenshots).await?;
        tokio::fs::write(&path, png).await?;
        debug!(path = %path.display(), "Saved failure screenshot");
        Ok(path)
    }

    /// Move the first existing recording among the context's pages
    async fn capture_video(&self, context: &dyn BrowsingContext, node_id: &str) -> ShopResult<Option<PathBuf>> {
        for page in context.pages() {
            let Some(source) = page.video_path().await? else {
                continue;
            };
            if !tokio::fs::try_exists(&source).await.unwrap_or(false) {
                continue;
            }
            let dest = self.paths.video_for(node_id);
            tokio::fs::create_dir_all(&self.paths.videos).await?;
            move_file(&source, &dest).await?;
            debug!(path = %dest.display(), "Saved failure video");
            return Ok(Some(dest));
        }
        Ok(None)
    }
}

/// Rename, falling back to copy and delete across filesystems
async fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    if tokio::fs::rename(from, to).await.is_ok() {
        return Ok(());
    }
    tokio::fs::copy(from, to).await?;
    tokio::fs::remove_file(from).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{FakeContext, FakeOptions, FakeShop};

    struct Setup {
        _dir: tempfile::TempDir,
        hook: ArtifactHook,
        page: Arc<dyn PageDriver>,
        context: Arc<dyn BrowsingContext>,
        shop: Arc<FakeShop>,
    }

    async fn setup(options: FakeOptions) -> Setup {
        let dir = tempfile::tempdir().unwrap();
        let options = options.with_video_dir(dir.path().join("recordings"));
        let shop = Arc::new(FakeShop::new(options));
        shop.open_home().await.unwrap();
        let context: Arc<dyn BrowsingContext> = Arc::new(FakeContext::with_page(shop.clone()));
        Setup {
            hook: ArtifactHook::new(ArtifactPaths::new(dir.path().join("artifacts"))),
            page: shop.clone(),
            context,
            shop,
            _dir: dir,
        }
    }

    fn names(report: &TestReport) -> Vec<&str> {
        report.attachments.iter().map(Attachment::name).collect()
    }

    mod naming_tests {
        use super::*;

        #[test]
        fn test_sanitize_node_id() {
            assert_eq!(
                sanitize_node_id("tests/cart_test.py::test_cart_dynamic_flow"),
                "tests_cart_test.py__test_cart_dynamic_flow"
            );
            assert_eq!(sanitize_node_id("plain"), "plain");
        }

        #[test]
        fn test_paths_layout() {
            let paths = ArtifactPaths::new("artifacts");
            assert_eq!(paths.screenshot_for("a/b::c"), PathBuf::from("artifacts/screenshots/a_b__c.png"));
            assert_eq!(paths.video_for("a:b"), PathBuf::from("artifacts/videos/a_b.webm"));
            assert_eq!(
                paths.network_log_file(),
                PathBuf::from("artifacts/network_logs/network_logs.json")
            );
            assert_eq!(paths.log_file, PathBuf::from("artifacts/test.log"));
        }

        #[test]
        fn test_attachment_json_shape() {
            let a = Attachment::image(FAILURE_SCREENSHOT, "x.png");
            let json = serde_json::to_value(&a).unwrap();
            assert_eq!(json["kind"], "image");
            assert_eq!(json["name"], "Failure Screenshot");
            assert_eq!(a.kind(), AttachmentKind::Image);
        }
    }

    mod hook_tests {
        use super::*;

        #[tokio::test]
        async fn test_passing_test_gets_logs_and_network_only() {
            let s = setup(FakeOptions::default()).await;
            let log = LogCapture::new();
            std::io::Write::write_all(&mut tracing_subscriber::fmt::MakeWriter::make_writer(&log), b"hello\n").unwrap();
            let network = NetworkLogger::attach(s.page.clone());
            s.shop.open_home().await.unwrap();

            let mut report = TestReport::new("tests/a::pass", TestPhase::Call);
            let inputs = HookInputs {
                page: Some(&s.page),
                context: Some(&s.context),
                network: Some(&network),
                log: Some(&log),
            };
            s.hook.on_report(&mut report, inputs).await;
            assert_eq!(names(&report), [TEST_LOGS, NETWORK_LOGS]);
        }

        #[tokio::test]
        async fn test_failure_attaches_screenshot_and_video() {
            let s = setup(FakeOptions::default()).await;
            let mut report = TestReport::new("tests/a.rs::fails", TestPhase::Call);
            report.fail("boom");
            let inputs = HookInputs {
                page: Some(&s.page),
                context: Some(&s.context),
                ..HookInputs::default()
            };
            s.hook.on_report(&mut report, inputs).await;
            assert_eq!(names(&report), [FAILURE_SCREENSHOT, FAILURE_VIDEO]);
            let shot = report.attachments[0].path().unwrap();
            assert_eq!(shot.file_name().unwrap(), "tests_a.rs__fails.png");
            assert!(shot.exists());
            assert!(report.attachments[1].path().unwrap().exists());
        }

        #[tokio::test]
        async fn test_screenshot_survives_video_failure() {
            let s = setup(FakeOptions::default().with_failing_video()).await;
            let mut report = TestReport::new("suite::broken", TestPhase::Call);
            report.fail("boom");
            let inputs = HookInputs {
                page: Some(&s.page),
                context: Some(&s.context),
                ..HookInputs::default()
            };
            s.hook.on_report(&mut report, inputs).await;
            let shots: Vec<_> = report
                .attachments
                .iter()
                .filter(|a| a.kind() == AttachmentKind::Image)
                .collect();
            assert_eq!(shots.len(), 1);
            assert_eq!(shots[0].path().unwrap().file_name().unwrap(), "suite__broken.png");
            assert!(!names(&report).contains(&FAILURE_VIDEO));
        }

        #[tokio::test]
        async fn test_screenshot_failure_is_swallowed() {
            let s = setup(FakeOptions::default().with_failing_screenshot()).await;
            let mut report = TestReport::new("x", TestPhase::Call);
            report.fail("boom");
            let inputs = HookInputs {
                page: Some(&s.page),
                ..HookInputs::default()
            };
            s.hook.on_report(&mut report, inputs).await;
            assert!(report.attachments.is_empty());
            assert!(report.is_failed());
        }

        #[tokio::test]
        async fn test_setup_phase_is_ignored() {
            let s = setup(FakeOptions::default()).await;
            let mut report = TestReport::new("x", TestPhase::Setup);
            report.fail("fixture broke");
            let inputs = HookInputs {
                page: Some(&s.page),
                ..HookInputs::default()
            };
            s.hook.on_report(&mut report, inputs).await;
            assert!(report.attachments.is_empty());
        }

        #[tokio::test]
        async fn test_file_log_source_tails_shared_file() {
            let s = setup(FakeOptions::default()).await;
            let hook = s.hook.clone().with_log_source(LogSource::File).with_log_tail_lines(2);
            std::fs::create_dir_all(&hook.paths().root).unwrap();
            std::fs::write(&hook.paths().log_file, "one\ntwo\nthree\n").unwrap();
            let mut report = TestReport::new("x", TestPhase::Call);
            hook.on_report(&mut report, HookInputs::default()).await;
            assert_eq!(report.attachments, vec![Attachment::text(TEST_LOGS, "two\nthree\n")]);
        }

        #[tokio::test]
        async fn test_move_file_replaces_source() {
            let dir = tempfile::tempdir().unwrap();
            let from = dir.path().join("page@1.webm");
            let to = dir.path().join("videos").join("suite__t.webm");
            tokio::fs::write(&from, b"webm").await.unwrap();
            tokio::fs::create_dir_all(to.parent().unwrap()).await.unwrap();
            move_file(&from, &to).await.unwrap();
            assert!(!from.exists());
            assert_eq!(tokio::fs::read(&to).await.unwrap(), b"webm");
        }

        #[tokio::test]
        async fn test_empty_network_log_not_attached() {
            let s = setup(FakeOptions::default()).await;
            let network = NetworkLogger::attach(s.page.clone());
            let mut report = TestReport::new("x", TestPhase::Call);
            let inputs = HookInputs {
                network: Some(&network),
                ..HookInputs::default()
            };
            s.hook.on_report(&mut report, inputs).await;
            assert!(report.attachments.is_empty());
        }
    }
}
