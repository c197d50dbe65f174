//! Test reports and run summaries.
//!
//! A [`TestReport`] describes one phase of one test and carries the
//! attachments the artifact hook adds. The [`Reporter`] collects reports for
//! a run and renders them as a summary line, HTML, JUnit XML or JSON.
//!
//! Failure handling follows one of two modes:
//!
//! - [`FailureMode::AndonCord`] stops the run on the first failure
//! - [`FailureMode::CollectAll`] records every test

use crate::artifact::Attachment;
use crate::result::{ShopError, ShopResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::Path;
use std::time::Duration;
use uuid::Uuid;

/// Failure mode for a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailureMode {
    /// Stop on first failure
    AndonCord,
    /// Run every test
    #[default]
    CollectAll,
}

/// Test lifecycle phase a report describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestPhase {
    Setup,
    Call,
    Teardown,
}

/// Test outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestOutcome {
    Passed,
    Failed,
    Skipped,
}

impl TestOutcome {
    #[must_use]
    pub const fn is_passed(&self) -> bool {
        matches!(self, Self::Passed)
    }

    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed)
    }
}

/// Result of one test phase plus its attachments
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestReport {
    pub node_id: String,
    pub markers: Vec<String>,
    pub phase: TestPhase,
    pub outcome: TestOutcome,
    #[serde(with = "duration_ms")]
    pub duration: Duration,
    pub error: Option<String>,
    /// Error raised while tearing the test down; does not change the outcome
    pub teardown_error: Option<String>,
    pub attachments: Vec<Attachment>,
    pub started_at: DateTime<Utc>,
}

impl TestReport {
    /// A passing report for `node_id`
    #[must_use]
    pub fn new(node_id: impl Into<String>, phase: TestPhase) -> Self {
        Self {
            node_id: node_id.into(),
            markers: Vec::new(),
            phase,
            outcome: TestOutcome::Passed,
            duration: Duration::ZERO,
            error: None,
            teardown_error: None,
            attachments: Vec::new(),
            started_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn skipped(node_id: impl Into<String>, reason: impl Into<String>) -> Self {
        let mut report = Self::new(node_id, TestPhase::Setup);
        report.outcome = TestOutcome::Skipped;
        report.error = Some(reason.into());
        report
    }

    #[must_use]
    pub fn with_markers(mut self, markers: &[&str]) -> Self {
        self.markers = markers.iter().map(ToString::to_string).collect();
        self
    }

    /// Mark the report failed with `error`
    pub fn fail(&mut self, error: impl Into<String>) {
        self.outcome = TestOutcome::Failed;
        self.error = Some(error.into());
    }

    pub fn attach(&mut self, attachment: Attachment) {
        self.attachments.push(attachment);
    }

    #[must_use]
    pub const fn is_failed(&self) -> bool {
        self.outcome.is_failed()
    }

    #[must_use]
    pub const fn is_passed(&self) -> bool {
        self.outcome.is_passed()
    }

    /// First attachment called `name`
    #[must_use]
    pub fn attachment(&self, name: &str) -> Option<&Attachment> {
        self.attachments.iter().find(|a| a.name() == name)
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    #[allow(clippy::cast_possible_truncation)]
    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

/// Collects test reports for one run
#[derive(Debug)]
pub struct Reporter {
    run_id: Uuid,
    suite_name: String,
    failure_mode: FailureMode,
    reports: Vec<TestReport>,
    started_at: DateTime<Utc>,
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Reporter {
    /// Collect-all reporter
    #[must_use]
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            suite_name: "shopcheck".to_string(),
            failure_mode: FailureMode::CollectAll,
            reports: Vec::new(),
            started_at: Utc::now(),
        }
    }

    /// Fail-fast reporter
    #[must_use]
    pub fn andon() -> Self {
        Self::new().with_failure_mode(FailureMode::AndonCord)
    }

    #[must_use]
    pub const fn with_failure_mode(mut self, mode: FailureMode) -> Self {
        self.failure_mode = mode;
        self
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.suite_name = name.into();
        self
    }

    #[must_use]
    pub const fn failure_mode(&self) -> FailureMode {
        self.failure_mode
    }

    #[must_use]
    pub const fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Record a report
    ///
    /// # Errors
    ///
    /// In `AndonCord` mode, returns an error once a failed report is recorded
    pub fn record(&mut self, report: TestReport) -> ShopResult<()> {
        let failure = report
            .is_failed()
            .then(|| (report.node_id.clone(), report.error.clone().unwrap_or_default()));
        self.reports.push(report);

        if self.failure_mode == FailureMode::AndonCord {
            if let Some((node_id, error)) = failure {
                return Err(ShopError::AssertionFailed {
                    message: format!("stopping run: '{node_id}' failed: {error}"),
                    expected: "pass".to_string(),
                    actual: "fail".to_string(),
                });
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn reports(&self) -> &[TestReport] {
        &self.reports
    }

    #[must_use]
    pub fn passed_count(&self) -> usize {
        self.reports.iter().filter(|r| r.is_passed()).count()
    }

    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.reports.iter().filter(|r| r.is_failed()).count()
    }

    #[must_use]
    pub fn skipped_count(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| r.outcome == TestOutcome::Skipped)
            .count()
    }

    #[must_use]
    pub fn total_count(&self) -> usize {
        self.reports.len()
    }

    /// Pass rate over executed tests (0.0 to 1.0)
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn pass_rate(&self) -> f64 {
        let executed = self.total_count() - self.skipped_count();
        if executed == 0 {
            return 1.0;
        }
        self.passed_count() as f64 / executed as f64
    }

    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failed_count() == 0
    }

    #[must_use]
    pub fn total_duration(&self) -> Duration {
        self.reports.iter().map(|r| r.duration).sum()
    }

    #[must_use]
    pub fn failures(&self) -> Vec<&TestReport> {
        self.reports.iter().filter(|r| r.is_failed()).collect()
    }

    #[must_use]
    pub fn summary(&self) -> String {
        let mut line = format!(
            "{}: {}/{} passed ({:.1}%)",
            self.suite_name,
            self.passed_count(),
            self.total_count(),
            self.pass_rate() * 100.0
        );
        let skipped = self.skipped_count();
        if skipped > 0 {
            let _ = write!(line, ", {skipped} skipped");
        }
        line
    }

    /// Write the HTML report
    pub fn generate_html(&self, output_path: &Path) -> ShopResult<()> {
        std::fs::write(output_path, self.render_html())?;
        Ok(())
    }

    #[must_use]
    pub fn render_html(&self) -> String {
        let mut html = String::new();
        html.push_str(
            r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <title>shopcheck report</title>
    <style>
        body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; margin: 20px; }
        .summary { background: #f5f5f5; padding: 20px; border-radius: 8px; margin-bottom: 20px; }
        .progress-bar { background: #ddd; height: 20px; border-radius: 10px; overflow: hidden; }
        .passed { background: #4caf50; height: 100%; }
        .test { padding: 10px; margin: 5px 0; border-radius: 4px; }
        .test.pass { background: #e8f5e9; border-left: 4px solid #4caf50; }
        .test.fail { background: #ffebee; border-left: 4px solid #f44336; }
        .test.skip { background: #fff3e0; border-left: 4px solid #ff9800; }
        .error { color: #d32f2f; font-family: monospace; white-space: pre-wrap; }
        .attachment pre { background: #fafafa; padding: 8px; max-height: 300px; overflow: auto; }
        .attachment img, .attachment video { max-width: 640px; border: 1px solid #ddd; }
    </style>
</head>
<body>
"#,
        );

        let _ = write!(
            html,
            r#"<div class="summary">
    <h1>{}</h1>
    <h2>Results: {}/{} passed ({:.1}%)</h2>
    <div class="progress-bar">
        <div class="passed" style="width: {:.1}%"></div>
    </div>
    <p>Run {} started {}</p>
    <p>Duration: {:.2}s</p>
</div>
"#,
            escape_xml(&self.suite_name),
            self.passed_count(),
            self.total_count(),
            self.pass_rate() * 100.0,
            self.pass_rate() * 100.0,
            self.run_id,
            self.started_at.to_rfc3339(),
            self.total_duration().as_secs_f64()
        );

        html.push_str("<h2>Test Results</h2>\n");
        for report in &self.reports {
            let class = match report.outcome {
                TestOutcome::Passed => "pass",
                TestOutcome::Failed => "fail",
                TestOutcome::Skipped => "skip",
            };
            let _ = writeln!(
                html,
                r#"<div class="test {class}">
    <strong>{}</strong> - {:?} ({:.2}ms)"#,
                escape_xml(&report.node_id),
                report.outcome,
                report.duration.as_secs_f64() * 1000.0
            );
            if let Some(error) = &report.error {
                let _ = writeln!(html, r#"    <div class="error">{}</div>"#, escape_xml(error));
            }
            if let Some(error) = &report.teardown_error {
                let _ = writeln!(
                    html,
                    r#"    <div class="error">teardown: {}</div>"#,
                    escape_xml(error)
                );
            }
            for attachment in &report.attachments {
                html.push_str(&render_attachment(attachment));
            }
            html.push_str("</div>\n");
        }

        html.push_str(
            r"
<footer>
    <p>Generated by shopcheck</p>
</footer>
</body>
</html>
",
        );
        html
    }

    /// Write JUnit XML for CI
    pub fn generate_junit(&self, output_path: &Path) -> ShopResult<()> {
        std::fs::write(output_path, self.render_junit())?;
        Ok(())
    }

    #[must_use]
    pub fn render_junit(&self) -> String {
        let mut xml = String::new();
        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
        xml.push('\n');
        let _ = writeln!(
            xml,
            r#"<testsuite name="{}" tests="{}" failures="{}" skipped="{}" time="{:.3}" timestamp="{}">"#,
            escape_xml(&self.suite_name),
            self.total_count(),
            self.failed_count(),
            self.skipped_count(),
            self.total_duration().as_secs_f64(),
            self.started_at.to_rfc3339()
        );

        for report in &self.reports {
            let _ = writeln!(
                xml,
                r#"  <testcase name="{}" time="{:.3}">"#,
                escape_xml(&report.node_id),
                report.duration.as_secs_f64()
            );
            match (report.outcome, &report.error) {
                (TestOutcome::Failed, Some(error)) => {
                    let _ = writeln!(
                        xml,
                        r#"    <failure message="{0}">{0}</failure>"#,
                        escape_xml(error)
                    );
                }
                (TestOutcome::Skipped, reason) => {
                    let _ = writeln!(
                        xml,
                        r#"    <skipped message="{}"/>"#,
                        escape_xml(reason.as_deref().unwrap_or_default())
                    );
                }
                _ => {}
            }
            for attachment in &report.attachments {
                if let Some(path) = attachment.path() {
                    let _ = writeln!(
                        xml,
                        "    <system-out>[[ATTACHMENT|{}]]</system-out>",
                        escape_xml(&path.display().to_string())
                    );
                }
            }
            xml.push_str("  </testcase>\n");
        }

        xml.push_str("</testsuite>\n");
        xml
    }

    /// Write the JSON report
    pub fn generate_json(&self, output_path: &Path) -> ShopResult<()> {
        std::fs::write(output_path, self.render_json()?)?;
        Ok(())
    }

    pub fn render_json(&self) -> ShopResult<String> {
        let doc = serde_json::json!({
            "run_id": self.run_id,
            "suite": self.suite_name,
            "started_at": self.started_at,
            "summary": {
                "total": self.total_count(),
                "passed": self.passed_count(),
                "failed": self.failed_count(),
                "skipped": self.skipped_count(),
            },
            "tests": self.reports,
        });
        Ok(serde_json::to_string_pretty(&doc)?)
    }
}

fn render_attachment(attachment: &Attachment) -> String {
    let name = escape_xml(attachment.name());
    match attachment {
        Attachment::Text { content, .. } => format!(
            "    <details class=\"attachment\"><summary>{name}</summary><pre>{}</pre></details>\n",
            escape_xml(content)
        ),
        Attachment::Image { path, .. } => format!(
            "    <div class=\"attachment\"><p>{name}</p><img src=\"{}\" alt=\"{name}\"></div>\n",
            escape_xml(&path.display().to_string())
        ),
        Attachment::Video { path, .. } => format!(
            "    <div class=\"attachment\"><p>{name}</p><video controls src=\"{}\"></video></div>\n",
            escape_xml(&path.display().to_string())
        ),
    }
}

/// Escape XML special characters
fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{FAILURE_SCREENSHOT, TEST_LOGS};

    fn passed(id: &str, ms: u64) -> TestReport {
        let mut report = TestReport::new(id, TestPhase::Call);
        report.duration = Duration::from_millis(ms);
        report
    }

    fn failed(id: &str, error: &str) -> TestReport {
        let mut report = TestReport::new(id, TestPhase::Call);
        report.fail(error);
        report
    }

    mod report_tests {
        use super::*;

        #[test]
        fn test_new_report_passes() {
            let report = TestReport::new("a::b", TestPhase::Call);
            assert!(report.is_passed());
            assert!(report.attachments.is_empty());
        }

        #[test]
        fn test_fail_sets_error() {
            let report = failed("a", "boom");
            assert!(report.is_failed());
            assert_eq!(report.error.as_deref(), Some("boom"));
        }

        #[test]
        fn test_skipped_keeps_reason() {
            let report = TestReport::skipped("a", "deselected");
            assert_eq!(report.outcome, TestOutcome::Skipped);
            assert_eq!(report.error.as_deref(), Some("deselected"));
        }

        #[test]
        fn test_attachment_lookup() {
            let mut report = passed("a", 1);
            report.attach(Attachment::text(TEST_LOGS, "line"));
            assert!(report.attachment(TEST_LOGS).is_some());
            assert!(report.attachment(FAILURE_SCREENSHOT).is_none());
        }

        #[test]
        fn test_json_duration_in_millis() {
            let json = serde_json::to_value(passed("a", 1500)).unwrap();
            assert_eq!(json["duration"], 1500);
            assert_eq!(json["phase"], "call");
            assert_eq!(json["outcome"], "passed");
        }
    }

    mod reporter_tests {
        use super::*;

        #[test]
        fn test_default_collects_all() {
            let mut reporter = Reporter::new();
            assert_eq!(reporter.failure_mode(), FailureMode::CollectAll);
            assert!(reporter.record(failed("t1", "err")).is_ok());
            assert!(reporter.record(passed("t2", 0)).is_ok());
            assert_eq!(reporter.failed_count(), 1);
            assert_eq!(reporter.passed_count(), 1);
        }

        #[test]
        fn test_andon_stops_on_failure() {
            let mut reporter = Reporter::andon();
            assert!(reporter.record(passed("t1", 0)).is_ok());
            let err = reporter.record(failed("t2", "broken")).unwrap_err();
            assert!(err.to_string().contains("t2"));
            assert_eq!(reporter.total_count(), 2);
        }

        #[test]
        fn test_pass_rate_ignores_skipped() {
            let mut reporter = Reporter::new();
            reporter.record(passed("t1", 0)).unwrap();
            reporter.record(failed("t2", "e")).unwrap();
            reporter.record(TestReport::skipped("t3", "marker")).unwrap();
            assert!((reporter.pass_rate() - 0.5).abs() < f64::EPSILON);
            assert!(reporter.summary().contains("1 skipped"));
        }

        #[test]
        fn test_pass_rate_empty() {
            assert!((Reporter::new().pass_rate() - 1.0).abs() < f64::EPSILON);
        }

        #[test]
        fn test_total_duration() {
            let mut reporter = Reporter::new();
            reporter.record(passed("t1", 100)).unwrap();
            reporter.record(passed("t2", 200)).unwrap();
            assert_eq!(reporter.total_duration(), Duration::from_millis(300));
        }

        #[test]
        fn test_summary() {
            let mut reporter = Reporter::new().with_name("Shop Tests");
            reporter.record(passed("t1", 0)).unwrap();
            reporter.record(passed("t2", 0)).unwrap();
            let summary = reporter.summary();
            assert!(summary.contains("Shop Tests"));
            assert!(summary.contains("2/2"));
            assert!(summary.contains("100.0%"));
        }
    }

    mod render_tests {
        use super::*;

        fn reporter() -> Reporter {
            let mut reporter = Reporter::new().with_name("Render");
            reporter.record(passed("ok_test", 50)).unwrap();
            let mut bad = failed("bad_test", "expected <1> got <2>");
            bad.attach(Attachment::text(TEST_LOGS, "INFO step & more"));
            bad.attach(Attachment::image(FAILURE_SCREENSHOT, "artifacts/screenshots/bad_test.png"));
            reporter.record(bad).unwrap();
            reporter
        }

        #[test]
        fn test_render_html_escapes_and_inlines() {
            let html = reporter().render_html();
            assert!(html.contains("Render"));
            assert!(html.contains("ok_test"));
            assert!(html.contains("expected &lt;1&gt; got &lt;2&gt;"));
            assert!(html.contains("<pre>INFO step &amp; more</pre>"));
            assert!(html.contains(r#"<img src="artifacts/screenshots/bad_test.png""#));
        }

        #[test]
        fn test_render_junit() {
            let xml = reporter().render_junit();
            assert!(xml.contains(r#"tests="2" failures="1""#));
            assert!(xml.contains(r#"<testcase name="bad_test""#));
            assert!(xml.contains("[[ATTACHMENT|artifacts/screenshots/bad_test.png]]"));
        }

        #[test]
        fn test_render_json() {
            let reporter = reporter();
            let json: serde_json::Value = serde_json::from_str(&reporter.render_json().unwrap()).unwrap();
            assert_eq!(json["summary"]["failed"], 1);
            assert_eq!(json["tests"][1]["attachments"][1]["kind"], "image");
            assert_eq!(json["run_id"], reporter.run_id().to_string());
        }

        #[test]
        fn test_generate_files() {
            let dir = tempfile::tempdir().unwrap();
            let reporter = reporter();
            reporter.generate_html(&dir.path().join("r.html")).unwrap();
            reporter.generate_junit(&dir.path().join("r.xml")).unwrap();
            reporter.generate_json(&dir.path().join("r.json")).unwrap();
            assert!(dir.path().join("r.json").exists());
        }
    }

    mod escape_xml_tests {
        use super::*;

        #[test]
        fn test_escape_special_chars() {
            assert_eq!(escape_xml("a & b"), "a &amp; b");
            assert_eq!(escape_xml("<tag>"), "&lt;tag&gt;");
            assert_eq!(escape_xml("\"quoted\""), "&quot;quoted&quot;");
            assert_eq!(escape_xml("it's"), "it&apos;s");
        }
    }
}
