//! Page object building blocks.
//!
//! [`BasePage`] wraps a page driver with logged navigation, waits and
//! actions; concrete pages compose it and own their [`Section`]s.

use crate::driver::PageDriver;
use crate::locator::{Locator, LocatorOptions};
use crate::result::ShopResult;
use crate::wait::{self, WaitState};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// A page (or page-like view) the harness can navigate to
pub trait PageObject {
    /// URL path pattern of this page (e.g. `/`, `/:owner/:repo`)
    fn url_pattern(&self) -> &str;

    /// Name used in logs
    fn page_name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Whether `url` is this page
    fn matches_url(&self, url: &str) -> bool {
        UrlMatcher::new(self.url_pattern()).matches(url)
    }
}

/// A component of a page with its own root element
#[async_trait]
pub trait Section: Send + Sync {
    /// Section name used in logs
    fn name(&self) -> &'static str;

    /// Root element of the section
    fn root(&self) -> &Locator;

    /// Assert the section and its key parts are displayed
    async fn verify_section_visible(&self) -> ShopResult<()>;
}

/// Matches URL paths against patterns with `*` and `:param` segments.
/// Scheme, host, query and fragment are ignored.
#[derive(Debug, Clone)]
pub struct UrlMatcher {
    segments: Vec<UrlSegment>,
}

#[derive(Debug, Clone)]
enum UrlSegment {
    Literal(String),
    Wildcard,
    Parameter(String),
}

fn path_segments(url: &str) -> Vec<&str> {
    let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    let path = if url.contains("://") {
        without_scheme.split_once('/').map_or("", |(_, p)| p)
    } else {
        without_scheme
    };
    let path = path.split(['?', '#']).next().unwrap_or("");
    path.split('/').filter(|s| !s.is_empty()).collect()
}

impl UrlMatcher {
    #[must_use]
    pub fn new(pattern: &str) -> Self {
        let segments = path_segments(pattern)
            .into_iter()
            .map(|s| {
                if s == "*" {
                    UrlSegment::Wildcard
                } else if let Some(name) = s.strip_prefix(':') {
                    UrlSegment::Parameter(name.to_string())
                } else {
                    UrlSegment::Literal(s.to_string())
                }
            })
            .collect();
        Self { segments }
    }

    #[must_use]
    pub fn matches(&self, url: &str) -> bool {
        let parts = path_segments(url);
        parts.len() == self.segments.len()
            && self.segments.iter().zip(&parts).all(|(seg, part)| match seg {
                UrlSegment::Literal(lit) => lit == part,
                UrlSegment::Wildcard | UrlSegment::Parameter(_) => true,
            })
    }

    /// Named parameters of a matching URL
    #[must_use]
    pub fn extract_params(&self, url: &str) -> HashMap<String, String> {
        if !self.matches(url) {
            return HashMap::new();
        }
        self.segments
            .iter()
            .zip(path_segments(url))
            .filter_map(|(seg, part)| match seg {
                UrlSegment::Parameter(name) => Some((name.clone(), part.to_string())),
                _ => None,
            })
            .collect()
    }
}

/// Driver handle plus logged helpers shared by every page
#[derive(Clone)]
pub struct BasePage {
    driver: Arc<dyn PageDriver>,
    options: LocatorOptions,
    name: &'static str,
}

impl fmt::Debug for BasePage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasePage")
            .field("name", &self.name)
            .field("timeout", &self.options.timeout)
            .finish()
    }
}

impl BasePage {
    #[must_use]
    pub fn new(driver: Arc<dyn PageDriver>, options: LocatorOptions, name: &'static str) -> Self {
        Self {
            driver,
            options,
            name,
        }
    }

    #[must_use]
    pub fn driver(&self) -> &Arc<dyn PageDriver> {
        &self.driver
    }

    #[must_use]
    pub const fn options(&self) -> LocatorOptions {
        self.options
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Locator from the document root with this page's timing
    #[must_use]
    pub fn locator(&self, css: &str) -> Locator {
        Locator::new(Arc::clone(&self.driver), css).with_options(self.options)
    }

    /// Locator by ARIA role from the document root
    #[must_use]
    pub fn get_by_role(&self, role: &str, name: Option<&str>) -> Locator {
        Locator::from_query(Arc::clone(&self.driver), crate::locator::Query::default(), self.options)
            .get_by_role(role, name)
    }

    pub async fn goto(&self, url: &str) -> ShopResult<()> {
        info!(page = self.name, "Navigating to URL: {url}");
        self.driver.goto(url).await
    }

    pub async fn current_url(&self) -> ShopResult<String> {
        self.driver.url().await
    }

    pub async fn title(&self) -> ShopResult<String> {
        self.driver.title().await
    }

    pub async fn wait_for_visible(&self, locator: &Locator) -> ShopResult<()> {
        info!(page = self.name, "Waiting for element to be visible: {locator}");
        locator.wait_for(WaitState::Visible).await
    }

    pub async fn wait_for_hidden(&self, locator: &Locator) -> ShopResult<()> {
        info!(page = self.name, "Waiting for element to be hidden: {locator}");
        locator.wait_for(WaitState::Hidden).await
    }

    pub async fn wait_for_text(&self, locator: &Locator, text: &str) -> ShopResult<()> {
        info!(page = self.name, "Waiting for text {text:?} in {locator}");
        wait::wait_for_text(locator, text).await
    }

    pub async fn wait_for_url_contains(&self, fragment: &str) -> ShopResult<()> {
        info!(page = self.name, "Waiting for URL to contain {fragment:?}");
        wait::wait_for_url_contains(self.driver.as_ref(), fragment, &self.options.wait_options()).await
    }

    /// Click, then optionally wait for another element to appear
    pub async fn click_and_wait(&self, locator: &Locator, wait_for: Option<&Locator>) -> ShopResult<()> {
        info!(page = self.name, "Clicking element: {locator}");
        locator.click().await?;
        if let Some(target) = wait_for {
            self.wait_for_visible(target).await?;
        }
        Ok(())
    }

    pub async fn fill_and_log(&self, locator: &Locator, text: &str) -> ShopResult<()> {
        info!(page = self.name, "Filling {locator} with {text:?}");
        locator.fill(text).await
    }

    pub async fn get_text_and_log(&self, locator: &Locator) -> ShopResult<String> {
        let text = locator.text().await?;
        info!(page = self.name, "Text from {locator}: {text:?}");
        Ok(text)
    }

    pub async fn is_visible(&self, locator: &Locator) -> ShopResult<bool> {
        let visible = locator.is_visible().await?;
        tracing::debug!(page = self.name, visible, "Visibility of {locator}");
        Ok(visible)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeShop;
    use std::time::Duration;

    mod url_matcher_tests {
        use super::*;

        #[test]
        fn test_root_pattern() {
            let m = UrlMatcher::new("/");
            assert!(m.matches("https://automated-test-evaluation.web.app/"));
            assert!(m.matches("https://automated-test-evaluation.web.app"));
            assert!(!m.matches("https://github.com/jeffersonRibeiro/react-shopping-cart"));
        }

        #[test]
        fn test_params_from_full_url() {
            let m = UrlMatcher::new("/:owner/:repo");
            let url = "https://github.com/jeffersonRibeiro/react-shopping-cart?tab=readme";
            assert!(m.matches(url));
            let params = m.extract_params(url);
            assert_eq!(params.get("owner").map(String::as_str), Some("jeffersonRibeiro"));
            assert_eq!(params.get("repo").map(String::as_str), Some("react-shopping-cart"));
        }

        #[test]
        fn test_wildcard_and_mismatch() {
            let m = UrlMatcher::new("/in/*");
            assert!(m.matches("https://www.linkedin.com/in/someone/"));
            assert!(!m.matches("https://www.linkedin.com/company/x"));
            assert!(m.extract_params("https://www.linkedin.com/company/x").is_empty());
        }
    }

    mod base_page_tests {
        use super::*;

        fn page() -> (Arc<FakeShop>, BasePage) {
            let shop = Arc::new(FakeShop::default());
            let options = LocatorOptions {
                timeout: Duration::from_millis(50),
                poll_interval: Duration::from_millis(5),
            };
            let base = BasePage::new(shop.clone(), options, "test page");
            (shop, base)
        }

        #[tokio::test]
        async fn test_goto_and_title() {
            let (shop, base) = page();
            base.goto(&shop.options().base_url).await.unwrap();
            assert_eq!(base.title().await.unwrap(), "Shopping Page");
            base.wait_for_url_contains("web.app").await.unwrap();
        }

        #[tokio::test]
        async fn test_click_and_wait_opens_cart() {
            let (shop, base) = page();
            shop.open_home().await.unwrap();
            let badge = base.locator("div[title='Products in cart quantity']");
            let panel = base.locator("div.sc-1h98xa9-4");
            assert!(!base.is_visible(&panel).await.unwrap());
            base.click_and_wait(&badge, Some(&panel)).await.unwrap();
            assert!(base.is_visible(&panel).await.unwrap());
        }

        #[tokio::test]
        async fn test_wait_for_hidden_times_out_on_visible() {
            let (shop, base) = page();
            shop.open_home().await.unwrap();
            let heading = base.locator("h4");
            assert!(base.wait_for_hidden(&heading).await.unwrap_err().is_timeout());
        }

        #[tokio::test]
        async fn test_fill_and_read_back() {
            let (shop, base) = page();
            base.goto(&shop.options().repo_url).await.unwrap();
            let search = base.locator("input[name='q']");
            base.fill_and_log(&search, "cart").await.unwrap();
            assert_eq!(search.get_attribute("value").await.unwrap().as_deref(), Some("cart"));
            let name = base.locator("strong[itemprop='name']");
            assert_eq!(base.get_text_and_log(&name).await.unwrap(), "react-shopping-cart");
        }
    }
}
