//! Polling waits.
//!
//! Every wait probes a condition, sleeps for the poll interval and gives up
//! at the timeout. The timeout is the only cancellation mechanism; errors
//! raised by the probe itself propagate immediately.

use crate::driver::PageDriver;
use crate::locator::Locator;
use crate::result::{ShopError, ShopResult};
use std::future::Future;
use std::time::{Duration, Instant};

/// Default timeout for element waits (5 seconds)
pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;

/// Default polling interval (50ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

/// Element states a locator can be waited into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WaitState {
    /// At least one match
    Attached,
    /// No matches
    Detached,
    /// First match visible
    Visible,
    /// No visible match (detached counts as hidden)
    Hidden,
}

impl std::fmt::Display for WaitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Attached => write!(f, "attached"),
            Self::Detached => write!(f, "detached"),
            Self::Visible => write!(f, "visible"),
            Self::Hidden => write!(f, "hidden"),
        }
    }
}

/// Timeout and polling interval for one wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    /// Give up after this long
    pub timeout: Duration,
    /// Sleep between probes
    pub poll_interval: Duration,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }
}

impl WaitOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set timeout in milliseconds
    #[must_use]
    pub const fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout = Duration::from_millis(timeout_ms);
        self
    }

    /// Set polling interval in milliseconds
    #[must_use]
    pub const fn with_poll_interval(mut self, interval_ms: u64) -> Self {
        self.poll_interval = Duration::from_millis(interval_ms);
        self
    }

    #[must_use]
    pub const fn timeout_ms(&self) -> u64 {
        self.timeout.as_millis() as u64
    }
}

/// Probe until `accept` holds or the timeout passes.
///
/// Returns `Ok(value)` with the accepted value, or `Err(last)` with the last
/// observed value on timeout. The probe always runs at least once.
pub async fn poll_until<T, F, Fut, P>(
    options: &WaitOptions,
    mut probe: F,
    accept: P,
) -> ShopResult<Result<T, T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ShopResult<T>>,
    P: Fn(&T) -> bool,
{
    let start = Instant::now();
    loop {
        let value = probe().await?;
        if accept(&value) {
            return Ok(Ok(value));
        }
        let elapsed = start.elapsed();
        if elapsed >= options.timeout {
            return Ok(Err(value));
        }
        let remaining = options.timeout - elapsed;
        tokio::time::sleep(options.poll_interval.min(remaining)).await;
    }
}

/// Wait for a boolean condition, failing with [`ShopError::Timeout`]
pub async fn wait_until<F, Fut>(waiting_for: &str, options: &WaitOptions, probe: F) -> ShopResult<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ShopResult<bool>>,
{
    tracing::debug!(timeout_ms = options.timeout_ms(), "Waiting for {waiting_for}");
    match poll_until(options, probe, |ok| *ok).await? {
        Ok(_) => Ok(()),
        Err(_) => Err(ShopError::Timeout {
            ms: options.timeout_ms(),
            waiting_for: waiting_for.to_string(),
        }),
    }
}

/// Wait for a locator to reach `state`
pub async fn wait_for_state(locator: &Locator, state: WaitState) -> ShopResult<()> {
    let options = locator.options().wait_options();
    let waiting_for = format!("{locator} to be {state}");
    wait_until(&waiting_for, &options, move || async move {
        Ok(match state {
            WaitState::Attached => locator.count().await? > 0,
            WaitState::Detached => locator.count().await? == 0,
            WaitState::Visible => locator.is_visible().await?,
            WaitState::Hidden => !locator.is_visible().await?,
        })
    })
    .await
}

/// Wait for the locator's text to contain `text`
pub async fn wait_for_text(locator: &Locator, text: &str) -> ShopResult<()> {
    let options = locator.options().wait_options();
    let waiting_for = format!("{locator} to contain text {text:?}");
    wait_until(&waiting_for, &options, move || async move {
        if locator.count().await? == 0 {
            return Ok(false);
        }
        Ok(locator.inner_text().await?.contains(text))
    })
    .await
}

/// Wait for the page URL to contain `fragment`
pub async fn wait_for_url_contains(
    driver: &dyn PageDriver,
    fragment: &str,
    options: &WaitOptions,
) -> ShopResult<()> {
    let waiting_for = format!("URL to contain {fragment:?}");
    wait_until(&waiting_for, options, move || async move {
        Ok(driver.url().await?.contains(fragment))
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    mod options_tests {
        use super::*;

        #[test]
        fn test_defaults() {
            let o = WaitOptions::default();
            assert_eq!(o.timeout_ms(), 5000);
            assert_eq!(o.poll_interval, Duration::from_millis(50));
        }

        #[test]
        fn test_builder() {
            let o = WaitOptions::new().with_timeout(200).with_poll_interval(5);
            assert_eq!(o.timeout_ms(), 200);
            assert_eq!(o.poll_interval, Duration::from_millis(5));
        }
    }

    mod poll_tests {
        use super::*;

        #[tokio::test]
        async fn test_poll_until_accepts_eventually() {
            let calls = AtomicUsize::new(0);
            let calls_ref = &calls;
            let options = WaitOptions::new().with_timeout(1000).with_poll_interval(1);
            let out = poll_until(
                &options,
                move || async move { Ok(calls_ref.fetch_add(1, Ordering::SeqCst) + 1) },
                |n| *n >= 3,
            )
            .await
            .unwrap();
            assert_eq!(out, Ok(3));
        }

        #[tokio::test]
        async fn test_poll_until_returns_last_on_timeout() {
            let options = WaitOptions::new().with_timeout(20).with_poll_interval(5);
            let out = poll_until(&options, || async { Ok(7) }, |n| *n == 8)
                .await
                .unwrap();
            assert_eq!(out, Err(7));
        }

        #[tokio::test]
        async fn test_wait_until_times_out() {
            let options = WaitOptions::new().with_timeout(20).with_poll_interval(5);
            let err = wait_until("never", &options, || async { Ok(false) })
                .await
                .unwrap_err();
            assert!(err.is_timeout());
            assert!(err.to_string().contains("never"));
        }

        #[tokio::test]
        async fn test_condition_error_propagates_immediately() {
            let options = WaitOptions::new().with_timeout(10_000);
            let start = Instant::now();
            let err = wait_until("boom", &options, || async {
                Err(ShopError::NotFound {
                    selector: "x".to_string(),
                })
            })
            .await
            .unwrap_err();
            assert!(err.is_not_found());
            assert!(start.elapsed() < Duration::from_secs(1));
        }
    }
}
