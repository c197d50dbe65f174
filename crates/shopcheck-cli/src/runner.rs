//! Suite runner: resolves configuration, picks a backend and writes reports

use crate::commands::{BackendArg, ConfigSource, ReportFormat, RunArgs, SelectArgs};
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::output::ProgressReporter;
use shopcheck::fake::{FakeOptions, FakeSessionFactory};
use shopcheck::suites::all_cases;
use shopcheck::{FailureMode, HarnessConfig, Reporter, Selection, SessionFactory, TestCase, TestHarness};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Layer file, environment and flags into one harness configuration
pub fn resolve_config(source: &ConfigSource) -> CliResult<HarnessConfig> {
    let config = match &source.config {
        Some(path) => HarnessConfig::load(path)?,
        None => HarnessConfig::default(),
    };
    let mut config = config.with_env_overrides()?;
    if let Some(url) = &source.base_url {
        config.base_url.clone_from(url);
    }
    if let Some(dir) = &source.artifacts {
        config.artifacts_dir.clone_from(dir);
    }
    config.validate()?;
    Ok(config)
}

#[must_use]
pub fn selection(args: &SelectArgs) -> Selection {
    let mut selection = Selection::all();
    if let Some(filter) = &args.filter {
        selection = selection.with_filter(filter.clone());
    }
    for marker in &args.markers {
        selection = selection.with_marker(marker.clone());
    }
    selection
}

/// Scenarios matching a selection, in run order
#[must_use]
pub fn selected_cases(selection: &Selection) -> Vec<TestCase> {
    all_cases().into_iter().filter(|c| selection.matches(c)).collect()
}

enum Backend {
    Fake(Arc<FakeSessionFactory>),
    #[cfg(feature = "browser")]
    Chromium(Arc<shopcheck::browser::CdpSessionFactory>),
}

impl Backend {
    fn for_arg(arg: BackendArg, config: &HarnessConfig) -> CliResult<Self> {
        match arg {
            BackendArg::Fake => Ok(Self::Fake(Arc::new(FakeSessionFactory::new(FakeOptions::from_config(
                config,
            ))))),
            #[cfg(feature = "browser")]
            BackendArg::Chromium => Ok(Self::Chromium(Arc::new(shopcheck::browser::CdpSessionFactory::new(
                config.browser.clone(),
            )))),
            #[cfg(not(feature = "browser"))]
            BackendArg::Chromium => Err(CliError::invalid_argument(
                "chromium backend not enabled. Rebuild with --features browser",
            )),
        }
    }

    fn factory(&self) -> Arc<dyn SessionFactory> {
        match self {
            Self::Fake(factory) => Arc::clone(factory) as Arc<dyn SessionFactory>,
            #[cfg(feature = "browser")]
            Self::Chromium(factory) => Arc::clone(factory) as Arc<dyn SessionFactory>,
        }
    }

    async fn shutdown(&self) -> CliResult<()> {
        match self {
            Self::Fake(_) => Ok(()),
            #[cfg(feature = "browser")]
            Self::Chromium(factory) => factory.shutdown().await.map_err(CliError::from),
        }
    }
}

/// Runs the selected scenarios and renders their outcome
#[derive(Debug)]
pub struct SuiteRunner {
    reporter: ProgressReporter,
}

impl SuiteRunner {
    #[must_use]
    pub fn new(config: &CliConfig) -> Self {
        Self {
            reporter: ProgressReporter::new(config.color.should_color(), config.verbosity.is_quiet()),
        }
    }

    /// Run the suite described by `args`. Test failures are reported in the
    /// returned [`Reporter`], not as an error.
    pub async fn run(&mut self, args: &RunArgs) -> CliResult<Reporter> {
        let config = resolve_config(&args.source)?;
        let selection = selection(&args.select);
        let cases = selected_cases(&selection);
        let mode = if args.fail_fast {
            FailureMode::AndonCord
        } else {
            FailureMode::CollectAll
        };
        let mut reporter = Reporter::new().with_name("shopcheck").with_failure_mode(mode);

        if cases.is_empty() {
            self.reporter.warning("No scenarios match the selection");
            return Ok(reporter);
        }

        let backend = Backend::for_arg(args.backend, &config)?;
        let harness = TestHarness::new(config.clone(), backend.factory())?;
        info!(backend = harness.backend(), cases = cases.len(), "Starting run");

        self.reporter.header(&format!(
            "Running {} scenario(s) on {} against {}",
            cases.len(),
            harness.backend(),
            config.base_url
        ));
        self.reporter.start_spinner("Running scenarios");
        harness.run_suite(&cases, &selection, &mut reporter).await;
        self.reporter.finish_spinner();

        if let Err(e) = backend.shutdown().await {
            warn!("Backend shutdown failed: {e}");
        }

        for report in reporter.reports() {
            self.reporter.report(report);
        }
        self.reporter.summary(
            reporter.passed_count(),
            reporter.failed_count(),
            reporter.skipped_count(),
            reporter.total_duration(),
        );

        let written = write_reports(&reporter, &args.reports, &config.artifacts_dir.join("reports"))?;
        for path in written {
            self.reporter.info(&format!("Report written to {}", path.display()));
        }
        Ok(reporter)
    }

    #[must_use]
    pub const fn reporter(&self) -> &ProgressReporter {
        &self.reporter
    }
}

/// Write each requested format into `dir`, returning the paths written
pub fn write_reports(reporter: &Reporter, formats: &[ReportFormat], dir: &Path) -> CliResult<Vec<PathBuf>> {
    if formats.is_empty() {
        return Ok(Vec::new());
    }
    std::fs::create_dir_all(dir)?;
    let mut written = Vec::with_capacity(formats.len());
    for format in formats {
        let path = dir.join(format.file_name());
        let result = match format {
            ReportFormat::Html => reporter.generate_html(&path),
            ReportFormat::Junit => reporter.generate_junit(&path),
            ReportFormat::Json => reporter.generate_json(&path),
        };
        result.map_err(|e| CliError::report_generation(format!("{}: {e}", path.display())))?;
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shopcheck::{TestPhase, TestReport};

    fn run_args(dir: &Path) -> RunArgs {
        RunArgs {
            select: SelectArgs::default(),
            source: ConfigSource {
                config: None,
                base_url: None,
                artifacts: Some(dir.join("artifacts")),
            },
            backend: BackendArg::Fake,
            fail_fast: false,
            reports: Vec::new(),
        }
    }

    mod config_tests {
        use super::*;

        #[test]
        fn test_flags_override_file() {
            let dir = tempfile::tempdir().unwrap();
            let file = dir.path().join("shopcheck.yaml");
            std::fs::write(&file, "base_url: http://file.test/\nlog_tail_lines: 7\n").unwrap();

            let from_file = resolve_config(&ConfigSource {
                config: Some(file.clone()),
                ..ConfigSource::default()
            })
            .unwrap();
            assert_eq!(from_file.log_tail_lines, 7);

            let overridden = resolve_config(&ConfigSource {
                config: Some(file),
                base_url: Some("http://flag.test/".to_string()),
                artifacts: Some(dir.path().join("out")),
            })
            .unwrap();
            assert_eq!(overridden.base_url, "http://flag.test/");
            assert_eq!(overridden.artifacts_dir, dir.path().join("out"));
            assert_eq!(overridden.log_tail_lines, 7);
        }

        #[test]
        fn test_missing_file_is_error() {
            let result = resolve_config(&ConfigSource {
                config: Some(PathBuf::from("/nonexistent/shopcheck.yaml")),
                ..ConfigSource::default()
            });
            assert!(matches!(result, Err(CliError::Shop(_))));
        }

        #[test]
        fn test_empty_base_url_rejected() {
            let result = resolve_config(&ConfigSource {
                base_url: Some("  ".to_string()),
                ..ConfigSource::default()
            });
            assert!(result.is_err());
        }
    }

    mod selection_tests {
        use super::*;

        #[test]
        fn test_marker_and_filter_combine() {
            let args = SelectArgs {
                filter: Some("repo_page".to_string()),
                markers: vec!["download".to_string()],
            };
            let cases = selected_cases(&selection(&args));
            assert_eq!(cases.len(), 1);
            assert_eq!(cases[0].node_id, shopcheck::suites::REPO_DOWNLOAD.node_id);
        }

        #[test]
        fn test_default_selects_everything() {
            assert_eq!(selected_cases(&selection(&SelectArgs::default())).len(), all_cases().len());
        }
    }

    mod run_tests {
        use super::*;

        #[tokio::test]
        async fn test_fake_run_passes_and_writes_reports() {
            let dir = tempfile::tempdir().unwrap();
            let mut args = run_args(dir.path());
            args.select.markers = vec!["smoke".to_string()];
            args.reports = vec![ReportFormat::Html, ReportFormat::Junit, ReportFormat::Json];

            let mut runner = SuiteRunner::new(&CliConfig::new().with_color(crate::config::ColorChoice::Never));
            let reporter = runner.run(&args).await.unwrap();
            assert_eq!(reporter.total_count(), 1);
            assert!(reporter.all_passed());

            let reports = dir.path().join("artifacts/reports");
            assert!(reports.join("report.html").exists());
            assert!(reports.join("junit.xml").exists());
            let json = std::fs::read_to_string(reports.join("report.json")).unwrap();
            assert!(json.contains("test_shopping_flow_happy_path"));
        }

        #[tokio::test]
        async fn test_empty_selection_runs_nothing() {
            let dir = tempfile::tempdir().unwrap();
            let mut args = run_args(dir.path());
            args.select.filter = Some("no_such_scenario".to_string());
            let mut runner = SuiteRunner::new(&CliConfig::new());
            let reporter = runner.run(&args).await.unwrap();
            assert_eq!(reporter.total_count(), 0);
            assert!(!dir.path().join("artifacts").exists());
        }

        #[cfg(not(feature = "browser"))]
        #[tokio::test]
        async fn test_chromium_requires_feature() {
            let dir = tempfile::tempdir().unwrap();
            let mut args = run_args(dir.path());
            args.backend = BackendArg::Chromium;
            let mut runner = SuiteRunner::new(&CliConfig::new());
            let err = runner.run(&args).await.unwrap_err();
            assert!(err.to_string().contains("--features browser"));
        }
    }

    #[test]
    fn test_write_reports_skips_when_none_requested() {
        let dir = tempfile::tempdir().unwrap();
        let mut reporter = Reporter::new();
        reporter.record(TestReport::new("a::b", TestPhase::Call)).unwrap();
        let written = write_reports(&reporter, &[], &dir.path().join("reports")).unwrap();
        assert!(written.is_empty());
        assert!(!dir.path().join("reports").exists());
    }
}
