//! Result and error types for shopcheck.

use thiserror::Error;

/// Result type for shopcheck operations
pub type ShopResult<T> = Result<T, ShopError>;

/// Errors that can occur while driving or asserting on the shop
#[derive(Debug, Error)]
pub enum ShopError {
    /// A locator resolved to zero elements where at least one was required
    #[error("No element matches {selector}")]
    NotFound {
        /// Rendered locator chain
        selector: String,
    },

    /// A wait condition was not met in time
    #[error("Timed out after {ms}ms waiting for {waiting_for}")]
    Timeout {
        /// Timeout in milliseconds
        ms: u64,
        /// What was being waited for
        waiting_for: String,
    },

    /// An assertion on UI state failed
    #[error("Assertion failed: {message} (expected {expected}, got {actual})")]
    AssertionFailed {
        /// What was asserted
        message: String,
        /// Expected value
        expected: String,
        /// Observed value
        actual: String,
    },

    /// Indexed access beyond the rendered collection
    #[error("Index {index} out of range for {what} (len {len})")]
    IndexOutOfRange {
        /// What was being indexed
        what: String,
        /// Requested index
        index: usize,
        /// Number of available items
        len: usize,
    },

    /// Rendered text could not be parsed
    #[error("Could not parse {what} from {input:?}")]
    Parse {
        /// What was being parsed
        what: String,
        /// The offending text
        input: String,
    },

    /// Element exists but cannot take the requested action
    #[error("Element {selector} is not actionable: {reason}")]
    NotActionable {
        /// Rendered locator chain
        selector: String,
        /// Reason (hidden, disabled, not a checkbox, ...)
        reason: String,
    },

    /// Driver-level failure
    #[error("Driver error: {message}")]
    Driver {
        /// Error message
        message: String,
    },

    /// Navigation failed
    #[error("Navigation to {url} failed: {message}")]
    Navigation {
        /// URL that failed
        url: String,
        /// Error message
        message: String,
    },

    /// Screenshot capture failed
    #[error("Screenshot failed: {message}")]
    Screenshot {
        /// Error message
        message: String,
    },

    /// Video recording unavailable or unreadable
    #[error("Video capture failed: {message}")]
    Video {
        /// Error message
        message: String,
    },

    /// Download did not complete
    #[error("Download failed: {message}")]
    Download {
        /// Error message
        message: String,
    },

    /// Invalid harness configuration
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Archive error
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

impl ShopError {
    /// Build an assertion failure carrying both sides of the comparison
    pub fn assertion(
        message: impl Into<String>,
        expected: impl ToString,
        actual: impl ToString,
    ) -> Self {
        Self::AssertionFailed {
            message: message.into(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Build a driver error from anything displayable
    pub fn driver(message: impl ToString) -> Self {
        Self::Driver {
            message: message.to_string(),
        }
    }

    /// Whether this error is a wait timeout
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Whether this error is a missing element
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Fail with an expected/actual assertion error unless both sides are equal
pub fn ensure_eq<T>(message: &str, expected: T, actual: T) -> ShopResult<()>
where
    T: PartialEq + std::fmt::Debug,
{
    if expected == actual {
        Ok(())
    } else {
        Err(ShopError::assertion(
            message,
            format!("{expected:?}"),
            format!("{actual:?}"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assertion_message_has_both_sides() {
        let err = ShopError::assertion("cart badge", 3, 2);
        let text = err.to_string();
        assert!(text.contains("cart badge"));
        assert!(text.contains("expected 3"));
        assert!(text.contains("got 2"));
    }

    #[test]
    fn test_timeout_display() {
        let err = ShopError::Timeout {
            ms: 5000,
            waiting_for: "cart panel visible".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Timed out after 5000ms waiting for cart panel visible"
        );
        assert!(err.is_timeout());
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_ensure_eq() {
        assert!(ensure_eq("count", 2, 2).is_ok());
        let err = ensure_eq("count", 2, 3).unwrap_err();
        assert!(matches!(err, ShopError::AssertionFailed { .. }));
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: ShopError = io.into();
        assert!(err.to_string().contains("gone"));
    }
}
