//! Overlay cart panel.
//!
//! Rows are addressed by product title: the first row whose title label
//! contains the given text. Quantities are read back from the row's
//! `Quantity: N` label after every click, so each mutation returns only
//! once the UI has settled.

use crate::assertion::expect;
use crate::dialog::DialogCapture;
use crate::driver::PageDriver;
use crate::locator::{Locator, LocatorOptions};
use crate::money::Money;
use crate::page_object::Section;
use crate::result::{ShopError, ShopResult};
use crate::wait::{poll_until, WaitState};
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, LazyLock};
use tracing::{debug, info};

static QUANTITY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Quantity:\s*(\d+)").expect("quantity pattern"));

/// Parse the quantity out of a row label such as `XS | Navy\nQuantity: 2`
pub fn parse_quantity(label: &str) -> ShopResult<u32> {
    QUANTITY_PATTERN
        .captures(label)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .ok_or_else(|| ShopError::Parse {
            what: "cart quantity".to_string(),
            input: label.to_string(),
        })
}

/// Lowest quantity a decrement may reach
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuantityFloor {
    /// Trust the `-` control: decrement only while it is enabled
    #[default]
    ReportedByUi,
    /// Never decrement at or below this quantity
    Fixed(u32),
}

impl QuantityFloor {
    /// Quantity one decrement would reach from `current`; `None` at the
    /// configured floor or at zero
    #[must_use]
    pub const fn next_below(self, current: u32) -> Option<u32> {
        match self {
            Self::Fixed(min) if current <= min => None,
            _ => current.checked_sub(1),
        }
    }
}

/// A cart line as currently rendered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartProduct {
    pub title: String,
    pub quantity: u32,
    /// Unit price
    pub price: Money,
    /// `price * quantity`
    pub subtotal: Money,
}

impl CartProduct {
    #[must_use]
    pub fn new(title: impl Into<String>, quantity: u32, price: Money) -> Self {
        Self {
            title: title.into(),
            quantity,
            price,
            subtotal: price.times(quantity),
        }
    }
}

/// Cart panel with its rows, quantity controls and checkout
#[derive(Debug, Clone)]
pub struct CartSection {
    driver: Arc<dyn PageDriver>,
    options: LocatorOptions,
    floor: QuantityFloor,
    panel: Locator,
    root: Locator,
    toggle: Locator,
    items: Locator,
    close_button: Locator,
    total_price: Locator,
    checkout_button: Locator,
}

impl CartSection {
    /// `toggle` is the page-level badge that opens the panel
    #[must_use]
    pub fn new(driver: Arc<dyn PageDriver>, options: LocatorOptions, toggle: Locator, floor: QuantityFloor) -> Self {
        let at = |css: &str| Locator::new(Arc::clone(&driver), css).with_options(options);
        let root = at("div.sc-1h98xa9-4");
        Self {
            panel: at("div.sc-1h98xa9-1.kQlqIC"),
            items: root.locator("div.sc-11uohgb-0.hDmOrM"),
            close_button: root.locator("button.sc-1h98xa9-0").filter_has_text("X"),
            total_price: root.locator("div.sc-1h98xa9-8.bciIxg > p.sc-1h98xa9-9.jzywDV"),
            checkout_button: root.get_by_role("button", Some("Checkout")),
            root,
            toggle,
            floor,
            options,
            driver,
        }
    }

    #[must_use]
    pub const fn floor(&self) -> QuantityFloor {
        self.floor
    }

    /// Every rendered cart row
    #[must_use]
    pub fn items(&self) -> &Locator {
        &self.items
    }

    #[must_use]
    pub fn checkout_button(&self) -> &Locator {
        &self.checkout_button
    }

    /// Row whose title contains `title`
    #[must_use]
    pub fn row(&self, title: &str) -> Locator {
        self.items
            .locator("p.sc-11uohgb-2")
            .filter_has_text(title)
            .parent()
            .parent()
            .first()
    }

    fn quantity_label(row: &Locator) -> Locator {
        row.locator("p.sc-11uohgb-3")
    }

    fn minus_button(row: &Locator) -> Locator {
        row.locator("div.sc-11uohgb-8 button").first()
    }

    fn plus_button(row: &Locator) -> Locator {
        row.locator("div.sc-11uohgb-8 button").last()
    }

    /// Show the panel; no-op when it is already visible
    pub async fn open_cart(&self) -> ShopResult<()> {
        if self.root.is_visible().await? {
            debug!("Cart already open");
            return Ok(());
        }
        expect(&self.toggle).to_be_visible().await?;
        info!("Opening cart");
        self.toggle.click().await?;
        self.root.wait_for(WaitState::Visible).await
    }

    /// Hide the panel; no-op when it is already hidden
    pub async fn close_cart(&self) -> ShopResult<()> {
        if !self.root.is_visible().await? {
            return Ok(());
        }
        info!("Closing cart");
        self.close_button.click().await?;
        self.root.wait_for(WaitState::Hidden).await
    }

    /// Aggregate quantity shown on the cart badge
    pub async fn get_cart_count(&self) -> ShopResult<u32> {
        let text = self.toggle.text().await?;
        text.parse().map_err(|_| ShopError::Parse {
            what: "cart badge".to_string(),
            input: text,
        })
    }

    async fn read_row(row: &Locator) -> ShopResult<CartProduct> {
        let title = row.locator("p.sc-11uohgb-2").text().await?;
        let quantity = parse_quantity(&Self::quantity_label(row).inner_text().await?)?;
        let price = Money::parse(&row.locator("div.sc-11uohgb-4 p").first().text().await?)?;
        Ok(CartProduct::new(title, quantity, price))
    }

    /// Row at `index`
    pub async fn get_cart_item(&self, index: usize) -> ShopResult<CartProduct> {
        let len = self.items.count().await?;
        if index >= len {
            return Err(ShopError::IndexOutOfRange {
                what: "cart item".to_string(),
                index,
                len,
            });
        }
        Self::read_row(&self.items.nth(index)).await
    }

    /// Every row, in display order
    pub async fn get_all_cart_products(&self) -> ShopResult<Vec<CartProduct>> {
        let mut products = Vec::new();
        for row in self.items.all().await? {
            products.push(Self::read_row(&row).await?);
        }
        debug!(count = products.len(), "Read cart products");
        Ok(products)
    }

    /// Quantity of the row for `title`; `NotFound` when no row matches
    pub async fn quantity_of(&self, title: &str) -> ShopResult<u32> {
        let row = self.row(title);
        row.require().await?;
        parse_quantity(&Self::quantity_label(&row).inner_text().await?)
    }

    async fn observed_quantity(&self, title: &str) -> ShopResult<Option<u32>> {
        let row = self.row(title);
        if row.count().await? == 0 {
            return Ok(None);
        }
        parse_quantity(&Self::quantity_label(&row).inner_text().await?).map(Some)
    }

    /// Wait until the row shows `expected` (0 means the row is gone)
    async fn settle(&self, title: &str, expected: u32) -> ShopResult<()> {
        let want = (expected > 0).then_some(expected);
        let outcome = poll_until(
            &self.options.wait_options(),
            move || async move { self.observed_quantity(title).await },
            |seen| *seen == want,
        )
        .await?;
        outcome.map(|_| ()).map_err(|last| ShopError::Timeout {
            ms: self.options.timeout.as_millis() as u64,
            waiting_for: format!("quantity of {title:?} to become {expected} (last seen {last:?})"),
        })
    }

    /// Click `+` on the row for `title`, `times` times
    pub async fn increase_quantity(&self, title: &str, times: u32) -> ShopResult<()> {
        let row = self.row(title);
        row.require().await?;
        let plus = Self::plus_button(&row);
        for _ in 0..times {
            let current = self.quantity_of(title).await?;
            expect(&plus).to_be_enabled().await?;
            plus.click().await?;
            self.settle(title, current + 1).await?;
        }
        info!(title, times, "Increased quantity");
        Ok(())
    }

    /// Click `-` on the row for `title` up to `times` times, stopping at the floor
    pub async fn decrease_quantity(&self, title: &str, times: u32) -> ShopResult<()> {
        let row = self.row(title);
        row.require().await?;
        let minus = Self::minus_button(&row);
        let mut clicks = 0;
        for _ in 0..times {
            let current = self.quantity_of(title).await?;
            let Some(next) = self.floor.next_below(current) else {
                debug!(title, current, floor = ?self.floor, "Quantity at floor");
                break;
            };
            if !minus.is_enabled().await? {
                debug!(title, current, "Decrement control disabled");
                break;
            }
            minus.click().await?;
            clicks += 1;
            self.settle(title, next).await?;
            if next == 0 {
                break;
            }
        }
        info!(title, requested = times, clicks, "Decreased quantity");
        Ok(())
    }

    /// Bring the row for `title` to `target` with `|target - current|` clicks
    pub async fn set_quantity(&self, title: &str, target: u32) -> ShopResult<()> {
        let current = self.quantity_of(title).await?;
        info!(title, current, target, "Setting quantity");
        if target > current {
            self.increase_quantity(title, target - current).await
        } else {
            self.decrease_quantity(title, current - target).await
        }
    }

    /// Remove the row for `title` and wait for it to disappear
    pub async fn remove_item(&self, title: &str) -> ShopResult<()> {
        let row = self.row(title);
        let remove = row.get_by_title("remove product from cart");
        expect(&remove).to_be_visible().await?;
        info!(title, "Removing item from cart");
        remove.click().await?;
        row.wait_for(WaitState::Detached).await
    }

    /// Click checkout. With `capture_alert`, the next native dialog is
    /// accepted and its message returned.
    pub async fn click_checkout(&self, capture_alert: bool) -> ShopResult<Option<String>> {
        let capture = capture_alert.then(|| DialogCapture::arm(self.driver.as_ref()));
        expect(&self.checkout_button).to_be_visible().await?;
        info!("Clicking checkout");
        self.checkout_button.click().await?;
        match capture {
            Some(capture) => capture.wait(&self.options.wait_options()).await,
            None => Ok(None),
        }
    }

    /// Subtotal shown in the footer
    pub async fn get_total_price(&self) -> ShopResult<Money> {
        Money::parse(&self.total_price.text().await?)
    }

    /// Assert a row for `title` is displayed
    pub async fn verify_item_in_cart(&self, title: &str) -> ShopResult<()> {
        expect(&self.items.locator("p.sc-11uohgb-2").filter_has_text(title).first())
            .to_be_visible()
            .await
    }
}

#[async_trait]
impl Section for CartSection {
    fn name(&self) -> &'static str {
        "cart"
    }

    fn root(&self) -> &Locator {
        &self.root
    }

    async fn verify_section_visible(&self) -> ShopResult<()> {
        self.panel.wait_for(WaitState::Visible).await?;
        if self.items.count().await? > 0 {
            expect(&self.items.first()).to_be_visible().await?;
        }
        expect(&self.checkout_button).to_be_visible().await?;
        expect(&self.close_button).to_be_visible().await
    }
}
