//! Lazily-resolved element locators.
//!
//! A [`Locator`] is a driver handle plus a [`Query`]: an ordered chain of
//! [`Selector`] steps (`css`, text filter, parent, nth, role). Building a
//! locator never touches the page; every async method re-resolves the chain
//! against the live DOM, so a locator stays valid across re-renders.

use crate::driver::{ElementState, PageDriver};
use crate::result::{ShopError, ShopResult};
use crate::wait::{self, poll_until, WaitOptions, WaitState, DEFAULT_POLL_INTERVAL_MS, DEFAULT_TIMEOUT_MS};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// One step of a locator chain
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Selector {
    /// CSS selector matched against descendants of the current set
    Css(String),
    /// Keep elements whose normalized text contains the value (case-insensitive)
    HasText(String),
    /// Replace each element by its parent
    Parent,
    /// Keep only the element at this index
    Nth(usize),
    /// Keep only the last element
    Last,
    /// Descendants with an ARIA role and, optionally, an accessible name containing `name`
    Role {
        /// ARIA role (`button`, `link`, `checkbox`, ...)
        role: String,
        /// Accessible name filter
        name: Option<String>,
    },
}

impl Selector {
    /// Create a CSS step
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    /// Create a text filter step
    #[must_use]
    pub fn has_text(text: impl Into<String>) -> Self {
        Self::HasText(text.into())
    }

    /// Create a role step
    #[must_use]
    pub fn role(role: impl Into<String>, name: Option<&str>) -> Self {
        Self::Role {
            role: role.into(),
            name: name.map(str::to_string),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css(css) => write!(f, "{css}"),
            Self::HasText(text) => write!(f, "has-text={text:?}"),
            Self::Parent => write!(f, ".."),
            Self::Nth(i) => write!(f, "nth={i}"),
            Self::Last => write!(f, "last"),
            Self::Role { role, name: None } => write!(f, "role={role}"),
            Self::Role {
                role,
                name: Some(name),
            } => write!(f, "role={role}[name={name:?}]"),
        }
    }
}

/// Ordered selector chain, resolved from the document root
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Query {
    steps: Vec<Selector>,
}

impl Query {
    /// Query starting with a CSS selector
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self {
            steps: vec![Selector::css(selector)],
        }
    }

    /// Query from explicit steps
    #[must_use]
    pub fn from_steps(steps: Vec<Selector>) -> Self {
        Self { steps }
    }

    /// Append a step
    #[must_use]
    pub fn then(&self, step: Selector) -> Self {
        let mut steps = self.steps.clone();
        steps.push(step);
        Self { steps }
    }

    #[must_use]
    pub fn steps(&self) -> &[Selector] {
        &self.steps
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                write!(f, " >> ")?;
            }
            write!(f, "{step}")?;
        }
        Ok(())
    }
}

/// Quote a value for use inside a CSS attribute selector
#[must_use]
pub fn css_quote(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

/// Timing options carried by a locator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocatorOptions {
    /// How long waits and assertions on this locator may take
    pub timeout: Duration,
    /// Polling interval for waits
    pub poll_interval: Duration,
}

impl Default for LocatorOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }
}

impl LocatorOptions {
    /// Wait options with the same timing
    #[must_use]
    pub const fn wait_options(&self) -> WaitOptions {
        WaitOptions {
            timeout: self.timeout,
            poll_interval: self.poll_interval,
        }
    }
}

/// What an action needs from its target before it runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actionability {
    /// At least one match (reads)
    Attached,
    /// Attached and visible (hover)
    Visible,
    /// Attached and enabled (checkbox toggles, which may be visually hidden)
    Enabled,
    /// Attached, visible and enabled (click, fill)
    Actionable,
}

impl Actionability {
    /// Whether an observed state satisfies this requirement; `None` means detached
    #[must_use]
    pub const fn satisfied_by(self, state: Option<&ElementState>) -> bool {
        match (self, state) {
            (_, None) => false,
            (Self::Attached, Some(_)) => true,
            (Self::Visible, Some(s)) => s.visible,
            (Self::Enabled, Some(s)) => s.enabled,
            (Self::Actionable, Some(s)) => s.visible && s.enabled,
        }
    }
}

impl fmt::Display for Actionability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Attached => write!(f, "attached"),
            Self::Visible => write!(f, "visible"),
            Self::Enabled => write!(f, "enabled"),
            Self::Actionable => write!(f, "visible and enabled"),
        }
    }
}

/// Element handle resolved lazily against a page
#[derive(Clone)]
pub struct Locator {
    driver: Arc<dyn PageDriver>,
    query: Query,
    options: LocatorOptions,
}

impl fmt::Debug for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Locator")
            .field("query", &self.query.to_string())
            .field("timeout", &self.options.timeout)
            .finish()
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.query.fmt(f)
    }
}

impl Locator {
    /// Locator for a CSS selector from the document root
    #[must_use]
    pub fn new(driver: Arc<dyn PageDriver>, css: impl Into<String>) -> Self {
        Self::from_query(driver, Query::css(css), LocatorOptions::default())
    }

    /// Locator for an arbitrary query
    #[must_use]
    pub fn from_query(driver: Arc<dyn PageDriver>, query: Query, options: LocatorOptions) -> Self {
        Self {
            driver,
            query,
            options,
        }
    }

    fn chain(&self, step: Selector) -> Self {
        Self {
            driver: Arc::clone(&self.driver),
            query: self.query.then(step),
            options: self.options,
        }
    }

    /// Descendants matching a CSS selector
    #[must_use]
    pub fn locator(&self, css: impl Into<String>) -> Self {
        self.chain(Selector::css(css))
    }

    /// Keep matches whose text contains `text`
    #[must_use]
    pub fn filter_has_text(&self, text: impl Into<String>) -> Self {
        self.chain(Selector::has_text(text))
    }

    /// Parent of each match
    #[must_use]
    pub fn parent(&self) -> Self {
        self.chain(Selector::Parent)
    }

    /// Match at `index`
    #[must_use]
    pub fn nth(&self, index: usize) -> Self {
        self.chain(Selector::Nth(index))
    }

    #[must_use]
    pub fn first(&self) -> Self {
        self.nth(0)
    }

    #[must_use]
    pub fn last(&self) -> Self {
        self.chain(Selector::Last)
    }

    /// Descendants by ARIA role and accessible name
    #[must_use]
    pub fn get_by_role(&self, role: &str, name: Option<&str>) -> Self {
        self.chain(Selector::role(role, name))
    }

    /// Descendants whose `title` attribute equals `title`
    #[must_use]
    pub fn get_by_title(&self, title: &str) -> Self {
        self.chain(Selector::css(format!("[title={}]", css_quote(title))))
    }

    /// Same query with a different timeout
    #[must_use]
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let mut options = self.options;
        options.timeout = timeout;
        Self {
            driver: Arc::clone(&self.driver),
            query: self.query.clone(),
            options,
        }
    }

    /// Same query with different timing
    #[must_use]
    pub fn with_options(&self, options: LocatorOptions) -> Self {
        Self {
            driver: Arc::clone(&self.driver),
            query: self.query.clone(),
            options,
        }
    }

    #[must_use]
    pub fn query(&self) -> &Query {
        &self.query
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
    pub const fn timeout(&self) -> Duration {
        self.options.timeout
    }

    /// Number of current matches
    pub async fn count(&self) -> ShopResult<usize> {
        self.driver.count(&self.query).await
    }

    /// Handles for every current match, in document order
    pub async fn all(&self) -> ShopResult<Vec<Self>> {
        let n = self.count().await?;
        Ok((0..n).map(|i| self.nth(i)).collect())
    }

    /// Block until the first match meets `need`, or fail with
    /// [`ShopError::Timeout`] once the locator's timeout passes.
    pub async fn wait_actionable(&self, need: Actionability) -> ShopResult<()> {
        let options = self.options.wait_options();
        let outcome = poll_until(
            &options,
            move || async move { self.observe().await },
            |state| need.satisfied_by(state.as_ref()),
        )
        .await?;
        outcome.map(drop).map_err(|last| ShopError::Timeout {
            ms: options.timeout_ms(),
            waiting_for: match last {
                None => format!("{self} to be {need} (no element matched)"),
                Some(state) => format!("{self} to be {need} (last seen {state:?})"),
            },
        })
    }

    /// State of the first match, `None` while nothing matches
    async fn observe(&self) -> ShopResult<Option<ElementState>> {
        if self.count().await? == 0 {
            return Ok(None);
        }
        match self.state().await {
            Ok(state) => Ok(Some(state)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Click once the target is visible and enabled
    pub async fn click(&self) -> ShopResult<()> {
        self.wait_actionable(Actionability::Actionable).await?;
        self.driver.click(&self.query).await
    }

    pub async fn fill(&self, text: &str) -> ShopResult<()> {
        self.wait_actionable(Actionability::Actionable).await?;
        self.driver.fill(&self.query, text).await
    }

    pub async fn hover(&self) -> ShopResult<()> {
        self.wait_actionable(Actionability::Visible).await?;
        self.driver.hover(&self.query).await
    }

    /// Rendered text, untrimmed. Waits for the target to attach.
    pub async fn inner_text(&self) -> ShopResult<String> {
        self.wait_actionable(Actionability::Attached).await?;
        self.driver.inner_text(&self.query).await
    }

    /// Rendered text with surrounding whitespace removed
    pub async fn text(&self) -> ShopResult<String> {
        Ok(self.inner_text().await?.trim().to_string())
    }

    pub async fn get_attribute(&self, name: &str) -> ShopResult<Option<String>> {
        self.wait_actionable(Actionability::Attached).await?;
        self.driver.attribute(&self.query, name).await
    }

    pub async fn computed_style(&self, property: &str) -> ShopResult<String> {
        self.wait_actionable(Actionability::Attached).await?;
        self.driver.computed_style(&self.query, property).await
    }

    pub async fn state(&self) -> ShopResult<ElementState> {
        self.driver.state(&self.query).await
    }

    /// Visible right now; zero matches counts as not visible
    pub async fn is_visible(&self) -> ShopResult<bool> {
        if self.count().await? == 0 {
            return Ok(false);
        }
        Ok(self.state().await?.visible)
    }

    pub async fn is_enabled(&self) -> ShopResult<bool> {
        Ok(self.state().await?.enabled)
    }

    pub async fn is_checked(&self) -> ShopResult<bool> {
        Ok(self.state().await?.checked)
    }

    pub async fn check(&self) -> ShopResult<()> {
        self.wait_actionable(Actionability::Enabled).await?;
        self.driver.set_checked(&self.query, true).await
    }

    pub async fn uncheck(&self) -> ShopResult<()> {
        self.wait_actionable(Actionability::Enabled).await?;
        self.driver.set_checked(&self.query, false).await
    }

    /// Wait for the locator to reach `state` within its timeout
    pub async fn wait_for(&self, state: WaitState) -> ShopResult<()> {
        wait::wait_for_state(self, state).await
    }

    /// Fail with `NotFound` unless at least one element matches
    pub async fn require(&self) -> ShopResult<usize> {
        match self.count().await? {
            0 => Err(ShopError::NotFound {
                selector: self.query.to_string(),
            }),
            n => Ok(n),
        }
    }
}
