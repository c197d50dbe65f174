//! Output formatting and progress reporting

use console::{style, Style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use shopcheck::{TestOutcome, TestReport};
use std::time::Duration;

/// Writes run progress and per-test results to stderr
#[derive(Debug)]
pub struct ProgressReporter {
    term: Term,
    spinner: Option<ProgressBar>,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}

impl ProgressReporter {
    #[must_use]
    pub fn new(use_color: bool, quiet: bool) -> Self {
        Self {
            term: Term::stderr(),
            spinner: None,
            use_color,
            quiet,
        }
    }

    /// Spin while the suite runs
    pub fn start_spinner(&mut self, message: &str) {
        if self.quiet || !self.term.is_term() {
            return;
        }
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg} [{elapsed}]")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(Duration::from_millis(100));
        self.spinner = Some(spinner);
    }

    pub fn finish_spinner(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
    }

    fn line(&self, prefix: (&str, &str, Style), message: &str) {
        let (symbol, plain, paint) = prefix;
        let prefix = if self.use_color {
            paint.apply_to(symbol).to_string()
        } else {
            plain.to_string()
        };
        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    pub fn success(&self, message: &str) {
        if !self.quiet {
            self.line(("✓", "PASS", Style::new().green().bold()), message);
        }
    }

    /// Failures print even in quiet mode
    pub fn failure(&self, message: &str) {
        self.line(("✗", "FAIL", Style::new().red().bold()), message);
    }

    pub fn skipped(&self, message: &str) {
        if !self.quiet {
            self.line(("-", "SKIP", Style::new().yellow()), message);
        }
    }

    pub fn warning(&self, message: &str) {
        if !self.quiet {
            self.line(("⚠", "WARN", Style::new().yellow().bold()), message);
        }
    }

    pub fn info(&self, message: &str) {
        if !self.quiet {
            self.line(("ℹ", "INFO", Style::new().blue().bold()), message);
        }
    }

    pub fn header(&self, title: &str) {
        if self.quiet {
            return;
        }
        let styled = if self.use_color {
            style(title).bold().underlined().to_string()
        } else {
            format!("=== {title} ===")
        };
        let _ = self.term.write_line("");
        let _ = self.term.write_line(&styled);
    }

    /// One line per report; failures list their error and attachments
    pub fn report(&self, report: &TestReport) {
        let label = format!("{} ({:.2}s)", report.node_id, report.duration.as_secs_f64());
        match report.outcome {
            TestOutcome::Passed => self.success(&label),
            TestOutcome::Skipped => {
                self.skipped(&format!("{label}: {}", report.error.as_deref().unwrap_or("skipped")));
            }
            TestOutcome::Failed => {
                self.failure(&format!(
                    "{label}: {}",
                    report.error.as_deref().unwrap_or("unknown error")
                ));
                for attachment in &report.attachments {
                    let location = attachment
                        .path()
                        .map_or_else(|| "inline".to_string(), |p| p.display().to_string());
                    let _ = self
                        .term
                        .write_line(&format!("    {}: {location}", attachment.name()));
                }
            }
        }
        if let Some(teardown) = &report.teardown_error {
            self.warning(&format!("{}: teardown: {teardown}", report.node_id));
        }
    }

    pub fn summary(&self, passed: usize, failed: usize, skipped: usize, duration: Duration) {
        if self.quiet && failed == 0 {
            return;
        }

        let _ = self.term.write_line("");
        let total = passed + failed + skipped;
        let duration_secs = duration.as_secs_f64();

        if self.use_color {
            let passed_style = Style::new().green().bold();
            let failed_style = Style::new().red().bold();
            let skipped_style = Style::new().yellow();

            let status = if failed > 0 {
                failed_style.apply_to("FAILED")
            } else {
                passed_style.apply_to("PASSED")
            };
            let failed_text = if failed > 0 {
                failed_style.apply_to(failed).to_string()
            } else {
                failed.to_string()
            };
            let _ = self.term.write_line(&format!(
                "{status} {total} tests in {duration_secs:.2}s ({} passed, {failed_text} failed, {} skipped)",
                passed_style.apply_to(passed),
                skipped_style.apply_to(skipped)
            ));
        } else {
            let status = if failed > 0 { "FAILED" } else { "PASSED" };
            let _ = self.term.write_line(&format!(
                "{status} {total} tests in {duration_secs:.2}s ({passed} passed, {failed} failed, {skipped} skipped)"
            ));
        }
    }
}
