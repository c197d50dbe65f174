//! Per-test lifecycle: open a session, run the body, capture artifacts, tear down.
//!
//! Each [`TestCase`] gets a fresh [`BrowserSession`] from the
//! [`SessionFactory`], an optional [`NetworkLogger`] and its own log buffer.
//! The body runs under a scoped `tracing` subscriber with the whole-test
//! timeout applied and panics caught. The [`ArtifactHook`] then sees the
//! call-phase report, after which the network dump is flushed and the
//! session closed. Teardown errors are recorded on the report and never
//! change its outcome.

use crate::artifact::{ArtifactHook, HookInputs};
use crate::config::HarnessConfig;
use crate::driver::{BrowserSession, BrowsingContext, PageDriver, SessionFactory};
use crate::logging::{open_log_file, test_subscriber, LogCapture};
use crate::network::NetworkLogger;
use crate::pages::{RepoPage, ShoppingPage};
use crate::reporter::{Reporter, TestPhase, TestReport};
use crate::result::{ShopError, ShopResult};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::fmt;
use std::fs::File;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument::WithSubscriber;
use tracing::{info, warn, Dispatch};

/// Body of a scenario
pub type TestBody = for<'a> fn(&'a TestContext) -> BoxFuture<'a, ShopResult<()>>;

/// A named scenario with its markers
#[derive(Clone, Copy)]
pub struct TestCase {
    /// `module::test_name`
    pub node_id: &'static str,
    pub markers: &'static [&'static str],
    /// Attach a [`NetworkLogger`] for the duration of the test
    pub uses_network_logger: bool,
    pub body: TestBody,
}

impl fmt::Debug for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestCase")
            .field("node_id", &self.node_id)
            .field("markers", &self.markers)
            .field("uses_network_logger", &self.uses_network_logger)
            .finish_non_exhaustive()
    }
}

impl TestCase {
    #[must_use]
    pub fn has_marker(&self, marker: &str) -> bool {
        self.markers.iter().any(|m| *m == marker)
    }

    /// Test name without the module prefix
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.node_id.rsplit("::").next().unwrap_or(self.node_id)
    }
}

/// Which cases of a suite to run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    /// Substring of the node id
    pub filter: Option<String>,
    /// Case must carry every one of these markers
    pub markers: Vec<String>,
}

impl Selection {
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    #[must_use]
    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.markers.push(marker.into());
        self
    }

    #[must_use]
    pub fn matches(&self, case: &TestCase) -> bool {
        let by_name = self.filter.as_deref().map_or(true, |f| case.node_id.contains(f));
        by_name && self.markers.iter().all(|m| case.has_marker(m))
    }
}

/// Everything a scenario body can reach
pub struct TestContext {
    node_id: String,
    page: Arc<dyn PageDriver>,
    context: Option<Arc<dyn BrowsingContext>>,
    network: Option<NetworkLogger>,
    config: HarnessConfig,
    log: LogCapture,
}

impl fmt::Debug for TestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestContext")
            .field("node_id", &self.node_id)
            .field("page", &self.page)
            .field("network", &self.network)
            .finish_non_exhaustive()
    }
}

impl TestContext {
    /// Context over an already-open session
    #[must_use]
    pub fn new(node_id: impl Into<String>, session: BrowserSession, config: HarnessConfig) -> Self {
        Self {
            node_id: node_id.into(),
            page: session.page,
            context: session.context,
            network: None,
            config,
            log: LogCapture::new(),
        }
    }

    /// Start recording the page's requests
    #[must_use]
    pub fn with_network_logger(mut self) -> Self {
        self.network = Some(NetworkLogger::attach(Arc::clone(&self.page)));
        self
    }

    #[must_use]
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    #[must_use]
    pub const fn page(&self) -> &Arc<dyn PageDriver> {
        &self.page
    }

    #[must_use]
    pub const fn config(&self) -> &HarnessConfig {
        &self.config
    }

    #[must_use]
    pub const fn network(&self) -> Option<&NetworkLogger> {
        self.network.as_ref()
    }

    #[must_use]
    pub const fn log(&self) -> &LogCapture {
        &self.log
    }

    /// Shopping page over this test's page, configured from the harness config
    #[must_use]
    pub fn shopping_page(&self) -> ShoppingPage {
        ShoppingPage::from_config(Arc::clone(&self.page), &self.config)
    }

    #[must_use]
    pub fn repo_page(&self) -> RepoPage {
        RepoPage::new(Arc::clone(&self.page), self.config.locator_options())
    }

    fn hook_inputs(&self) -> HookInputs<'_> {
        HookInputs {
            page: Some(&self.page),
            context: self.context.as_ref(),
            network: self.network.as_ref(),
            log: Some(&self.log),
        }
    }

    /// Flush the network dump and close the session
    async fn teardown(mut self, network_log: &Path) -> Vec<String> {
        let mut errors = Vec::new();
        if let Some(mut network) = self.network.take() {
            if let Err(e) = network.flush(network_log) {
                errors.push(format!("network log: {e}"));
            }
        }
        let closed = match &self.context {
            Some(context) => context.close().await,
            None => self.page.close().await,
        };
        if let Err(e) = closed {
            errors.push(format!("close: {e}"));
        }
        errors
    }
}

/// Runs test cases against sessions from a [`SessionFactory`]
#[derive(Debug)]
pub struct TestHarness {
    config: HarnessConfig,
    factory: Arc<dyn SessionFactory>,
    hook: ArtifactHook,
    shared_log: Option<Arc<File>>,
}

impl TestHarness {
    /// Create the artifact directories and open the shared log file
    pub fn new(config: HarnessConfig, factory: Arc<dyn SessionFactory>) -> ShopResult<Self> {
        let paths = config.artifact_paths();
        paths.ensure_dirs()?;
        let shared_log = Some(open_log_file(&paths.log_file)?);
        Ok(Self {
            hook: ArtifactHook::from_config(&config),
            config,
            factory,
            shared_log,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &HarnessConfig {
        &self.config
    }

    #[must_use]
    pub fn backend(&self) -> &'static str {
        self.factory.backend()
    }

    /// Run one case and return its call-phase report
    pub async fn run_test(&self, case: &TestCase) -> TestReport {
        let started = Instant::now();
        let markers = case.markers.to_vec();
        let finish = |mut report: TestReport| {
            report.duration = started.elapsed();
            report.with_markers(&markers)
        };

        let log = LogCapture::new();
        let dispatch = match test_subscriber(&log, self.shared_log.clone(), &self.config.log_level) {
            Ok(subscriber) => Dispatch::new(subscriber),
            Err(e) => return finish(setup_failure(case, &e)),
        };

        let session = match self.factory.open(case.node_id).with_subscriber(dispatch.clone()).await {
            Ok(session) => session,
            Err(e) => {
                warn!(node_id = case.node_id, "Session setup failed: {e}");
                return finish(setup_failure(case, &e));
            }
        };

        let mut ctx = TestContext::new(case.node_id, session, self.config.clone());
        ctx.log = log;
        if case.uses_network_logger {
            ctx = ctx.with_network_logger();
        }

        let mut report = TestReport::new(case.node_id, TestPhase::Call);
        let outcome = {
            let body = AssertUnwindSafe(async {
                info!(node_id = case.node_id, backend = self.backend(), "Starting test");
                (case.body)(&ctx).await
            })
            .catch_unwind();
            tokio::time::timeout(self.config.test_timeout(), body)
                .with_subscriber(dispatch.clone())
                .await
        };
        match outcome {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => report.fail(e.to_string()),
            Ok(Err(panic)) => report.fail(format!("panicked: {}", panic_message(panic.as_ref()))),
            Err(_) => report.fail(
                ShopError::Timeout {
                    ms: self.config.test_timeout_ms,
                    waiting_for: format!("{} to finish", case.node_id),
                }
                .to_string(),
            ),
        }

        async {
            match report.error.as_deref() {
                None => info!(node_id = case.node_id, "Test passed"),
                Some(error) => warn!(node_id = case.node_id, "Test failed: {error}"),
            }
        }
        .with_subscriber(dispatch.clone())
        .await;

        self.hook
            .on_report(&mut report, ctx.hook_inputs())
            .with_subscriber(dispatch.clone())
            .await;

        let network_log = self.hook.paths().network_log_file();
        let errors = ctx.teardown(&network_log).with_subscriber(dispatch).await;
        if !errors.is_empty() {
            report.teardown_error = Some(errors.join("; "));
        }
        finish(report)
    }

    /// Run every selected case, recording reports in order. Once the
    /// reporter stops the run, the remaining cases are recorded as skipped.
    pub async fn run_suite(&self, cases: &[TestCase], selection: &Selection, reporter: &mut Reporter) {
        let mut stopped = false;
        for case in cases.iter().filter(|c| selection.matches(c)) {
            if stopped {
                let skipped = TestReport::skipped(case.node_id, "run stopped after failure");
                let _ = reporter.record(skipped.with_markers(case.markers));
                continue;
            }
            let report = self.run_test(case).await;
            if let Err(e) = reporter.record(report) {
                warn!("{e}");
                stopped = true;
            }
        }
    }
}

fn setup_failure(case: &TestCase, error: &ShopError) -> TestReport {
    let mut report = TestReport::new(case.node_id, TestPhase::Setup);
    report.fail(error.to_string());
    report
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{FAILURE_SCREENSHOT, FAILURE_VIDEO, NETWORK_LOGS, TEST_LOGS};
    use crate::fake::{FakeOptions, FakeSessionFactory};
    use crate::reporter::TestOutcome;
    use async_trait::async_trait;

    fn passing(ctx: &TestContext) -> BoxFuture<'_, ShopResult<()>> {
        async move {
            let page = ctx.shopping_page();
            page.goto(&ctx.config().base_url).await?;
            page.verify_default_title().await
        }
        .boxed()
    }

    fn failing(ctx: &TestContext) -> BoxFuture<'_, ShopResult<()>> {
        async move {
            let page = ctx.shopping_page();
            page.goto(&ctx.config().base_url).await?;
            page.verify_page_loaded("Some Other Title").await
        }
        .boxed()
    }

    fn panicking(_ctx: &TestContext) -> BoxFuture<'_, ShopResult<()>> {
        async move { panic!("kaboom") }.boxed()
    }

    fn sleepy(_ctx: &TestContext) -> BoxFuture<'_, ShopResult<()>> {
        async move {
            tokio::time::sleep(std::time::Duration::from_secs(5)).await;
            Ok(())
        }
        .boxed()
    }

    const fn case(node_id: &'static str, body: TestBody) -> TestCase {
        TestCase {
            node_id,
            markers: &["smoke"],
            uses_network_logger: true,
            body,
        }
    }

    fn harness(dir: &tempfile::TempDir, options: FakeOptions) -> TestHarness {
        let config = HarnessConfig {
            artifacts_dir: dir.path().join("artifacts"),
            ..HarnessConfig::default()
        };
        let options = options.with_video_dir(dir.path().join("recordings"));
        TestHarness::new(config, Arc::new(FakeSessionFactory::new(options))).unwrap()
    }

    mod selection_tests {
        use super::*;

        #[test]
        fn test_filter_and_markers() {
            let c = case("shop::test_title", passing);
            assert!(Selection::all().matches(&c));
            assert!(Selection::all().with_filter("title").matches(&c));
            assert!(!Selection::all().with_filter("cart").matches(&c));
            assert!(Selection::all().with_marker("smoke").matches(&c));
            assert!(!Selection::all().with_marker("slow").matches(&c));
            assert_eq!(c.name(), "test_title");
        }
    }

    mod run_tests {
        use super::*;

        #[tokio::test]
        async fn test_passing_case() {
            let dir = tempfile::tempdir().unwrap();
            let harness = harness(&dir, FakeOptions::default());
            let report = harness.run_test(&case("shop::test_title", passing)).await;
            assert!(report.is_passed(), "{:?}", report.error);
            assert_eq!(report.markers, ["smoke"]);
            assert!(report.attachment(TEST_LOGS).is_some());
            assert!(report.attachment(NETWORK_LOGS).is_some());
            assert!(report.attachment(FAILURE_SCREENSHOT).is_none());
            assert!(dir.path().join("artifacts/network_logs/network_logs.json").exists());
            assert!(report.teardown_error.is_none());
        }

        #[tokio::test]
        async fn test_failing_case_gets_all_artifacts() {
            let dir = tempfile::tempdir().unwrap();
            let harness = harness(&dir, FakeOptions::default());
            let report = harness.run_test(&case("shop::test_wrong_title", failing)).await;
            assert!(report.is_failed());
            assert!(report.error.as_deref().unwrap().contains("Some Other Title"));
            let names: Vec<&str> = report.attachments.iter().map(|a| a.name()).collect();
            assert_eq!(names, [TEST_LOGS, FAILURE_SCREENSHOT, FAILURE_VIDEO, NETWORK_LOGS]);
            assert!(dir
                .path()
                .join("artifacts/screenshots/shop__test_wrong_title.png")
                .exists());
        }

        #[tokio::test]
        async fn test_log_tail_holds_only_this_test() {
            let dir = tempfile::tempdir().unwrap();
            let harness = harness(&dir, FakeOptions::default());
            harness.run_test(&case("shop::first", passing)).await;
            let report = harness.run_test(&case("shop::second", passing)).await;
            let Some(crate::artifact::Attachment::Text { content, .. }) = report.attachment(TEST_LOGS) else {
                panic!("no log tail");
            };
            assert!(content.contains("shop::second"));
            assert!(!content.contains("shop::first"));
        }

        #[tokio::test]
        async fn test_panic_is_a_failure() {
            let dir = tempfile::tempdir().unwrap();
            let harness = harness(&dir, FakeOptions::default());
            let report = harness.run_test(&case("shop::test_panic", panicking)).await;
            assert!(report.is_failed());
            assert!(report.error.as_deref().unwrap().contains("kaboom"));
        }

        #[tokio::test]
        async fn test_whole_test_timeout() {
            let dir = tempfile::tempdir().unwrap();
            let config = HarnessConfig {
                artifacts_dir: dir.path().join("artifacts"),
                test_timeout_ms: 50,
                ..HarnessConfig::default()
            };
            let harness = TestHarness::new(config, Arc::new(FakeSessionFactory::default())).unwrap();
            let report = harness.run_test(&case("shop::test_sleepy", sleepy)).await;
            assert!(report.is_failed());
            assert!(report.error.as_deref().unwrap().contains("Timed out after 50ms"));
        }

        #[derive(Debug)]
        struct BrokenFactory;

        #[async_trait]
        impl SessionFactory for BrokenFactory {
            async fn open(&self, _node_id: &str) -> ShopResult<BrowserSession> {
                Err(ShopError::driver("no browser"))
            }

            fn backend(&self) -> &'static str {
                "broken"
            }
        }

        #[tokio::test]
        async fn test_setup_failure_skips_hook() {
            let dir = tempfile::tempdir().unwrap();
            let config = HarnessConfig {
                artifacts_dir: dir.path().join("artifacts"),
                ..HarnessConfig::default()
            };
            let harness = TestHarness::new(config, Arc::new(BrokenFactory)).unwrap();
            let report = harness.run_test(&case("shop::test_title", passing)).await;
            assert_eq!(report.phase, TestPhase::Setup);
            assert!(report.is_failed());
            assert!(report.attachments.is_empty());
        }
    }

    mod suite_tests {
        use super::*;

        const CASES: [TestCase; 3] = [
            case("shop::a", passing),
            case("shop::b", failing),
            case("shop::c", passing),
        ];

        #[tokio::test]
        async fn test_collect_all_runs_everything() {
            let dir = tempfile::tempdir().unwrap();
            let harness = harness(&dir, FakeOptions::default());
            let mut reporter = Reporter::new();
            harness.run_suite(&CASES, &Selection::all(), &mut reporter).await;
            assert_eq!(reporter.passed_count(), 2);
            assert_eq!(reporter.failed_count(), 1);
        }

        #[tokio::test]
        async fn test_andon_skips_rest() {
            let dir = tempfile::tempdir().unwrap();
            let harness = harness(&dir, FakeOptions::default());
            let mut reporter = Reporter::andon();
            harness.run_suite(&CASES, &Selection::all(), &mut reporter).await;
            let outcomes: Vec<TestOutcome> = reporter.reports().iter().map(|r| r.outcome).collect();
            assert_eq!(outcomes, [TestOutcome::Passed, TestOutcome::Failed, TestOutcome::Skipped]);
        }

        #[tokio::test]
        async fn test_selection_limits_run() {
            let dir = tempfile::tempdir().unwrap();
            let harness = harness(&dir, FakeOptions::default());
            let mut reporter = Reporter::new();
            harness
                .run_suite(&CASES, &Selection::all().with_filter("::c"), &mut reporter)
                .await;
            assert_eq!(reporter.total_count(), 1);
        }
    }
}
