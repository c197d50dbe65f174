//! Auto-retrying assertions on locators.
//!
//! `expect(&locator).to_have_text("Cart").await?` polls until the condition
//! holds or the locator timeout passes, then fails with an
//! [`AssertionFailed`](ShopError::AssertionFailed) carrying what was expected
//! and the last observed value.

use crate::locator::Locator;
use crate::result::{ShopError, ShopResult};
use crate::wait::{poll_until, WaitOptions};
use std::time::Duration;

/// Start an assertion on a locator
#[must_use]
pub fn expect(locator: &Locator) -> LocatorAssertions<'_> {
    LocatorAssertions {
        locator,
        options: locator.options().wait_options(),
    }
}

/// Pending assertions on one locator
#[derive(Debug)]
pub struct LocatorAssertions<'a> {
    locator: &'a Locator,
    options: WaitOptions,
}

impl LocatorAssertions<'_> {
    /// Override the assertion timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = timeout;
        self
    }

    async fn retry<T, F, Fut, P>(&self, what: &str, expected: String, probe: F, accept: P) -> ShopResult<T>
    where
        T: std::fmt::Debug,
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = ShopResult<T>>,
        P: Fn(&T) -> bool,
    {
        match poll_until(&self.options, probe, accept).await? {
            Ok(value) => Ok(value),
            Err(last) => Err(ShopError::assertion(
                format!("{} {what}", self.locator),
                expected,
                format!("{last:?}"),
            )),
        }
    }

    pub async fn to_be_visible(&self) -> ShopResult<()> {
        let loc = self.locator;
        self.retry(
            "to be visible",
            "visible".to_string(),
            move || async move { loc.is_visible().await },
            |v| *v,
        )
        .await
        .map(drop)
    }

    pub async fn to_be_hidden(&self) -> ShopResult<()> {
        let loc = self.locator;
        self.retry(
            "to be hidden",
            "hidden".to_string(),
            move || async move { loc.is_visible().await.map(|v| !v) },
            |hidden| *hidden,
        )
        .await
        .map(drop)
    }

    /// Enabled; a missing element counts as not enabled until the timeout
    pub async fn to_be_enabled(&self) -> ShopResult<()> {
        let loc = self.locator;
        self.retry(
            "to be enabled",
            "enabled".to_string(),
            move || async move {
                if loc.count().await? == 0 {
                    return Ok(false);
                }
                loc.is_enabled().await
            },
            |v| *v,
        )
        .await
        .map(drop)
    }

    pub async fn to_be_checked(&self) -> ShopResult<()> {
        let loc = self.locator;
        self.retry(
            "to be checked",
            "checked".to_string(),
            move || async move {
                if loc.count().await? == 0 {
                    return Ok(false);
                }
                loc.is_checked().await
            },
            |v| *v,
        )
        .await
        .map(drop)
    }

    /// Trimmed text equals `expected`
    pub async fn to_have_text(&self, expected: &str) -> ShopResult<()> {
        let loc = self.locator;
        self.retry(
            "to have text",
            format!("{expected:?}"),
            move || async move { text_or_empty(loc).await },
            |text| text == expected,
        )
        .await
        .map(drop)
    }

    /// Text contains `expected`
    pub async fn to_contain_text(&self, expected: &str) -> ShopResult<()> {
        let loc = self.locator;
        self.retry(
            "to contain text",
            format!("text containing {expected:?}"),
            move || async move { text_or_empty(loc).await },
            |text| text.contains(expected),
        )
        .await
        .map(drop)
    }

    pub async fn to_have_count(&self, expected: usize) -> ShopResult<()> {
        let loc = self.locator;
        self.retry(
            "to have count",
            expected.to_string(),
            move || async move { loc.count().await },
            |n| *n == expected,
        )
        .await
        .map(drop)
    }
}

async fn text_or_empty(locator: &Locator) -> ShopResult<String> {
    if locator.count().await? == 0 {
        return Ok(String::new());
    }
    locator.text().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeShop;
    use std::sync::Arc;

    async fn shop() -> Arc<FakeShop> {
        let shop = Arc::new(FakeShop::default());
        shop.open_home().await.unwrap();
        shop
    }

    fn short(loc: Locator) -> Locator {
        loc.with_timeout(Duration::from_millis(30))
    }

    #[tokio::test]
    async fn test_visible_and_count_pass() {
        let shop = shop().await;
        let heading = Locator::new(shop.clone(), "h4").filter_has_text("Sizes:");
        expect(&heading).to_be_visible().await.unwrap();
        expect(&heading).to_have_text("Sizes:").await.unwrap();
        expect(&heading).to_have_count(1).await.unwrap();
    }

    #[tokio::test]
    async fn test_failure_reports_expected_and_actual() {
        let shop = shop().await;
        let heading = short(Locator::new(shop.clone(), "h4").filter_has_text("Sizes:"));
        let err = expect(&heading).to_have_text("Colors:").await.unwrap_err();
        match err {
            ShopError::AssertionFailed { expected, actual, .. } => {
                assert_eq!(expected, "\"Colors:\"");
                assert_eq!(actual, "\"Sizes:\"");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_missing_element_is_hidden() {
        let shop = shop().await;
        let ghost = short(Locator::new(shop.clone(), "section.nowhere"));
        expect(&ghost).to_be_hidden().await.unwrap();
        assert!(expect(&ghost).to_be_visible().await.is_err());
        assert!(expect(&ghost).to_be_enabled().await.is_err());
    }
}
