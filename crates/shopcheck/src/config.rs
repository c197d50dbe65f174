//! Harness configuration.
//!
//! Loaded from YAML (`shopcheck.yaml`), then overridden by `SHOPCHECK_*`
//! environment variables, then by command-line flags. Every field has a
//! default so an empty file is a valid configuration.

use crate::artifact::ArtifactPaths;
use crate::locator::LocatorOptions;
use crate::result::{ShopError, ShopResult};
use crate::sections::cart::QuantityFloor;
use crate::wait::{WaitOptions, DEFAULT_POLL_INTERVAL_MS, DEFAULT_TIMEOUT_MS};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Production URL of the shop under test
pub const DEFAULT_BASE_URL: &str = "https://automated-test-evaluation.web.app/";

/// Source repository linked from the shop
pub const DEFAULT_REPO_URL: &str = "https://github.com/jeffersonRibeiro/react-shopping-cart";

/// Document title the shop is expected to render
pub const DEFAULT_TITLE: &str = "Shopping Page";

/// Lines of log attached to every test report
pub const DEFAULT_LOG_TAIL_LINES: usize = 50;

/// Where the per-test log tail is read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogSource {
    /// In-memory buffer scoped to the test
    #[default]
    Buffer,
    /// Tail of the shared rolling log file
    File,
}

/// Browser launch settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    /// Run in headless mode
    pub headless: bool,
    /// Viewport width
    pub viewport_width: u32,
    /// Viewport height
    pub viewport_height: u32,
    /// Path to chromium binary (None = auto-detect)
    pub chromium_path: Option<String>,
    /// Sandbox mode (disable for containers)
    pub sandbox: bool,
    /// Record a video of each test where the backend supports it
    pub record_video: bool,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
            chromium_path: None,
            sandbox: true,
            record_video: false,
        }
    }
}

/// Harness configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Shop URL
    pub base_url: String,
    /// Linked repository URL
    pub repo_url: String,
    /// Title `verify_page_loaded` expects
    pub expected_title: String,
    /// Root of all artifacts
    pub artifacts_dir: PathBuf,
    /// Where downloads are saved; defaults to `<artifacts_dir>/downloads`
    pub downloads_dir: Option<PathBuf>,
    /// Element wait timeout
    pub timeout_ms: u64,
    /// Wait polling interval
    pub poll_interval_ms: u64,
    /// Whole-test timeout
    pub test_timeout_ms: u64,
    /// Log lines attached per test
    pub log_tail_lines: usize,
    /// Log tail source
    pub log_source: LogSource,
    /// `tracing` filter directive for the per-test subscriber
    pub log_level: String,
    /// Decrement floor policy for cart quantities
    pub quantity_floor: QuantityFloor,
    /// Browser launch settings
    pub browser: BrowserSettings,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            repo_url: DEFAULT_REPO_URL.to_string(),
            expected_title: DEFAULT_TITLE.to_string(),
            artifacts_dir: PathBuf::from("artifacts"),
            downloads_dir: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            test_timeout_ms: 60_000,
            log_tail_lines: DEFAULT_LOG_TAIL_LINES,
            log_source: LogSource::Buffer,
            log_level: "info".to_string(),
            quantity_floor: QuantityFloor::ReportedByUi,
            browser: BrowserSettings::default(),
        }
    }
}

impl HarnessConfig {
    /// Parse YAML; missing fields take their defaults
    pub fn from_yaml_str(yaml: &str) -> ShopResult<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml_ng::from_str(yaml).map_err(|e| ShopError::Config {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a YAML file
    pub fn load(path: &Path) -> ShopResult<Self> {
        let yaml = std::fs::read_to_string(path).map_err(|e| ShopError::Config {
            message: format!("{}: {e}", path.display()),
        })?;
        Self::from_yaml_str(&yaml)
    }

    /// Serialize to YAML
    pub fn to_yaml(&self) -> ShopResult<String> {
        serde_yaml_ng::to_string(self).map_err(|e| ShopError::Config {
            message: e.to_string(),
        })
    }

    /// Apply `SHOPCHECK_*` variables from the process environment
    pub fn with_env_overrides(self) -> ShopResult<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup
    pub fn with_overrides<F>(mut self, lookup: F) -> ShopResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("SHOPCHECK_BASE_URL") {
            self.base_url = url;
        }
        if let Some(dir) = lookup("SHOPCHECK_ARTIFACTS_DIR") {
            self.artifacts_dir = PathBuf::from(dir);
        }
        if let Some(level) = lookup("SHOPCHECK_LOG") {
            self.log_level = level;
        }
        if let Some(ms) = lookup("SHOPCHECK_TIMEOUT_MS") {
            self.timeout_ms = ms.parse().map_err(|_| ShopError::Config {
                message: format!("SHOPCHECK_TIMEOUT_MS is not a number: {ms:?}"),
            })?;
        }
        if let Some(flag) = lookup("SHOPCHECK_HEADLESS") {
            self.browser.headless = !matches!(flag.to_ascii_lowercase().as_str(), "0" | "false" | "no");
        }
        self.validate()?;
        Ok(self)
    }

    /// Reject configurations no test could run under
    pub fn validate(&self) -> ShopResult<()> {
        let invalid = |message: &str| {
            Err(ShopError::Config {
                message: message.to_string(),
            })
        };
        if self.base_url.trim().is_empty() {
            return invalid("base_url must not be empty");
        }
        if self.timeout_ms == 0 || self.test_timeout_ms == 0 {
            return invalid("timeouts must be positive");
        }
        if self.poll_interval_ms == 0 || self.poll_interval_ms > self.timeout_ms {
            return invalid("poll_interval_ms must be positive and not exceed timeout_ms");
        }
        Ok(())
    }

    #[must_use]
    pub const fn wait_options(&self) -> WaitOptions {
        WaitOptions {
            timeout: Duration::from_millis(self.timeout_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
        }
    }

    #[must_use]
    pub const fn locator_options(&self) -> LocatorOptions {
        LocatorOptions {
            timeout: Duration::from_millis(self.timeout_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
        }
    }

    #[must_use]
    pub const fn test_timeout(&self) -> Duration {
        Duration::from_millis(self.test_timeout_ms)
    }

    /// Artifact directory layout under `artifacts_dir`
    #[must_use]
    pub fn artifact_paths(&self) -> ArtifactPaths {
        ArtifactPaths::new(&self.artifacts_dir)
    }

    /// Directory downloads are saved into
    #[must_use]
    pub fn downloads_dir(&self) -> PathBuf {
        self.downloads_dir
            .clone()
            .unwrap_or_else(|| self.artifacts_dir.join("downloads"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    mod yaml_tests {
        use super::*;

        #[test]
        fn test_empty_yaml_is_default() {
            assert_eq!(HarnessConfig::from_yaml_str("").unwrap(), HarnessConfig::default());
        }

        #[test]
        fn test_partial_yaml_keeps_defaults() {
            let yaml = "timeout_ms: 2000\nquantity_floor:\n  fixed: 1\nbrowser:\n  headless: false\n";
            let config = HarnessConfig::from_yaml_str(yaml).unwrap();
            assert_eq!(config.timeout_ms, 2000);
            assert_eq!(config.quantity_floor, QuantityFloor::Fixed(1));
            assert!(!config.browser.headless);
            assert_eq!(config.base_url, DEFAULT_BASE_URL);
            assert_eq!(config.log_tail_lines, 50);
        }

        #[test]
        fn test_yaml_round_trip() {
            let mut config = HarnessConfig::default();
            config.log_source = LogSource::File;
            let back = HarnessConfig::from_yaml_str(&config.to_yaml().unwrap()).unwrap();
            assert_eq!(back, config);
        }

        #[test]
        fn test_invalid_yaml_is_config_error() {
            let err = HarnessConfig::from_yaml_str("timeout_ms: [1, 2]").unwrap_err();
            assert!(matches!(err, ShopError::Config { .. }));
        }

        #[test]
        fn test_zero_timeout_rejected() {
            assert!(HarnessConfig::from_yaml_str("timeout_ms: 0").is_err());
        }

        #[test]
        fn test_load_missing_file() {
            let err = HarnessConfig::load(Path::new("/definitely/not/here.yaml")).unwrap_err();
            assert!(err.to_string().contains("here.yaml"));
        }
    }

    mod override_tests {
        use super::*;

        fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
            let map: HashMap<String, String> = pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect();
            move |key| map.get(key).cloned()
        }

        #[test]
        fn test_env_overrides() {
            let config = HarnessConfig::default()
                .with_overrides(env(&[
                    ("SHOPCHECK_BASE_URL", "http://localhost:3000/"),
                    ("SHOPCHECK_TIMEOUT_MS", "750"),
                    ("SHOPCHECK_HEADLESS", "false"),
                ]))
                .unwrap();
            assert_eq!(config.base_url, "http://localhost:3000/");
            assert_eq!(config.timeout_ms, 750);
            assert!(!config.browser.headless);
        }

        #[test]
        fn test_bad_timeout_override() {
            let err = HarnessConfig::default()
                .with_overrides(env(&[("SHOPCHECK_TIMEOUT_MS", "soon")]))
                .unwrap_err();
            assert!(err.to_string().contains("soon"));
        }
    }

    #[test]
    fn test_derived_paths() {
        let config = HarnessConfig::default();
        assert_eq!(config.downloads_dir(), PathBuf::from("artifacts/downloads"));
        assert_eq!(config.wait_options().timeout, Duration::from_millis(5000));
    }
}
