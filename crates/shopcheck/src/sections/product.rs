//! Product grid and size filters.

use crate::assertion::expect;
use crate::driver::PageDriver;
use crate::locator::{css_quote, Locator, LocatorOptions};
use crate::money::Money;
use crate::page_object::Section;
use crate::result::{ShopError, ShopResult};
use crate::wait::{poll_until, WaitState};
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, LazyLock};
use tracing::{debug, info};

static COUNT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s+Product").expect("product count pattern"));

static URL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"url\(["']?(.*?)["']?\)"#).expect("css url pattern"));

/// URL inside a CSS `background-image` value; `None` for `none` or no url
pub fn extract_background_url(value: &str) -> Option<String> {
    URL_PATTERN
        .captures(value)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|url| !url.is_empty())
}

/// Parse `N Product(s) found`
pub fn parse_product_count(label: &str) -> ShopResult<usize> {
    COUNT_PATTERN
        .captures(label)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .ok_or_else(|| ShopError::Parse {
            what: "product count".to_string(),
            input: label.to_string(),
        })
}

/// Snapshot of one product card. Equality is by title.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub title: String,
    /// Price as rendered, e.g. `$20.00`
    pub price: String,
    pub shipping: String,
    /// Image URLs, primary first, de-duplicated
    pub images: Vec<String>,
}

impl PartialEq for Product {
    fn eq(&self, other: &Self) -> bool {
        self.title == other.title
    }
}

impl Eq for Product {}

impl Product {
    /// Rendered price as money
    pub fn price_value(&self) -> ShopResult<Money> {
        Money::parse(&self.price)
    }
}

/// Result of a single-filter sweep: displayed count per size, in filter order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeSweep {
    counts: Vec<(String, usize)>,
}

impl SizeSweep {
    #[must_use]
    pub fn counts(&self) -> &[(String, usize)] {
        &self.counts
    }

    /// Count recorded for `size`
    #[must_use]
    pub fn count_for(&self, size: &str) -> Option<usize> {
        self.counts.iter().find(|(s, _)| s == size).map(|(_, n)| *n)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    fn record(&mut self, size: String, count: usize) {
        self.counts.push((size, count));
    }
}

/// Product cards plus the size filter sidebar
#[derive(Debug, Clone)]
pub struct ProductSection {
    options: LocatorOptions,
    root: Locator,
    cards: Locator,
    count_label: Locator,
    filter_container: Locator,
    checkboxes: Locator,
}

impl ProductSection {
    #[must_use]
    pub fn new(driver: Arc<dyn PageDriver>, options: LocatorOptions) -> Self {
        let at = |css: &str| Locator::new(Arc::clone(&driver), css).with_options(options);
        let root = at("main.sc-ebmerl-3.hewZDo").locator("div.sc-uhudcz-0.iZZGui");
        let filter_container = at("h4").filter_has_text("Sizes:").parent();
        Self {
            cards: root.locator("div.sc-124al1g-2"),
            count_label: at("main.sc-ebmerl-3.hewZDo p").filter_has_text("Product").first(),
            checkboxes: filter_container.locator("input[data-testid='checkbox']"),
            filter_container,
            root,
            options,
        }
    }

    /// Every rendered product card
    #[must_use]
    pub fn product_cards(&self) -> &Locator {
        &self.cards
    }

    /// Filter checkbox for `size`
    #[must_use]
    pub fn size_checkbox(&self, size: &str) -> Locator {
        self.filter_container
            .locator(format!("input[data-testid='checkbox'][value={}]", css_quote(size)))
    }

    pub async fn count_products(&self) -> ShopResult<usize> {
        self.cards.count().await
    }

    /// Card at `index`, checked against the current count
    pub async fn get_product_card(&self, index: usize) -> ShopResult<Locator> {
        let len = self.count_products().await?;
        if index >= len {
            return Err(ShopError::IndexOutOfRange {
                what: "product".to_string(),
                index,
                len,
            });
        }
        Ok(self.cards.nth(index))
    }

    pub async fn get_product_title(&self, index: usize) -> ShopResult<String> {
        self.get_product_card(index).await?.locator("p.sc-124al1g-4").text().await
    }

    /// Currency, integer and fraction parts joined, e.g. `$20.00`
    pub async fn get_product_price(&self, index: usize) -> ShopResult<String> {
        let price = self.get_product_card(index).await?.locator("p.sc-124al1g-6");
        let mut text = String::new();
        for part in ["small", "b", "span"] {
            text.push_str(&price.locator(part).text().await?);
        }
        Ok(text)
    }

    pub async fn get_product_shipping(&self, index: usize) -> ShopResult<String> {
        self.get_product_card(index).await?.locator("div.sc-124al1g-3").text().await
    }

    /// Background image before and after hovering the card image
    pub async fn get_product_images(&self, index: usize) -> ShopResult<Vec<String>> {
        let container = self.get_product_card(index).await?.locator("div.sc-124al1g-1");
        let mut images = Vec::new();
        if let Some(url) = extract_background_url(&container.computed_style("background-image").await?) {
            images.push(url);
        }
        container.hover().await?;
        if let Some(url) = extract_background_url(&container.computed_style("background-image").await?) {
            if !images.contains(&url) {
                images.push(url);
            }
        }
        debug!(index, images = images.len(), "Read product images");
        Ok(images)
    }

    pub async fn get_product(&self, index: usize) -> ShopResult<Product> {
        Ok(Product {
            title: self.get_product_title(index).await?,
            price: self.get_product_price(index).await?,
            shipping: self.get_product_shipping(index).await?,
            images: self.get_product_images(index).await?,
        })
    }

    /// Every displayed product, in grid order
    pub async fn get_all_products(&self) -> ShopResult<Vec<Product>> {
        let count = self.count_products().await?;
        let mut products = Vec::with_capacity(count);
        for index in 0..count {
            products.push(self.get_product(index).await?);
        }
        info!(count, "Collected products");
        Ok(products)
    }

    pub async fn click_add_to_cart(&self, index: usize) -> ShopResult<()> {
        let button = self.get_product_card(index).await?.locator("button.sc-124al1g-0");
        info!(index, "Adding product to cart");
        button.click().await
    }

    /// Tick the filter for `size`; no-op when already ticked
    pub async fn select_size(&self, size: &str) -> ShopResult<()> {
        let checkbox = self.size_checkbox(size);
        if !checkbox.is_checked().await? {
            info!(size, "Selecting size filter");
            checkbox.check().await?;
        }
        expect(&checkbox).to_be_checked().await
    }

    /// Untick the filter for `size`; no-op when not ticked
    pub async fn deselect_size(&self, size: &str) -> ShopResult<()> {
        let checkbox = self.size_checkbox(size);
        if checkbox.is_checked().await? {
            info!(size, "Deselecting size filter");
            checkbox.uncheck().await?;
        }
        Ok(())
    }

    pub async fn deselect_all_sizes(&self) -> ShopResult<()> {
        for checkbox in self.checkboxes.all().await? {
            if checkbox.is_checked().await? {
                checkbox.uncheck().await?;
            }
        }
        Ok(())
    }

    /// Filter values in sidebar order
    pub async fn available_sizes(&self) -> ShopResult<Vec<String>> {
        let mut sizes = Vec::new();
        for checkbox in self.checkboxes.all().await? {
            if let Some(value) = checkbox.get_attribute("value").await? {
                sizes.push(value);
            }
        }
        Ok(sizes)
    }

    /// Ticked filter values in sidebar order
    pub async fn get_selected_sizes(&self) -> ShopResult<Vec<String>> {
        let mut selected = Vec::new();
        for checkbox in self.checkboxes.all().await? {
            if checkbox.is_checked().await? {
                if let Some(value) = checkbox.get_attribute("value").await? {
                    selected.push(value);
                }
            }
        }
        Ok(selected)
    }

    /// Count reported by the `N Product(s) found` label
    pub async fn get_displayed_product_count(&self) -> ShopResult<usize> {
        parse_product_count(&self.count_label.text().await?)
    }

    /// Wait until the label agrees with the rendered cards, returning the count
    async fn settled_count(&self) -> ShopResult<usize> {
        let outcome = poll_until(
            &self.options.wait_options(),
            move || async move {
                Ok((
                    self.get_displayed_product_count().await?,
                    self.count_products().await?,
                ))
            },
            |(displayed, rendered)| displayed == rendered,
        )
        .await?;
        match outcome {
            Ok((displayed, _)) => Ok(displayed),
            Err((displayed, rendered)) => Err(ShopError::assertion(
                "displayed product count should match rendered cards",
                rendered,
                displayed,
            )),
        }
    }

    /// Select each size alone, in sidebar order, recording the displayed
    /// count. Filters are cleared before and after.
    pub async fn validate_all_sizes(&self) -> ShopResult<SizeSweep> {
        let mut sweep = SizeSweep::default();
        for size in self.available_sizes().await? {
            self.deselect_all_sizes().await?;
            self.select_size(&size).await?;
            let count = self.settled_count().await?;
            info!(size = %size, count, "Size filter count");
            sweep.record(size, count);
        }
        self.deselect_all_sizes().await?;
        self.settled_count().await?;
        Ok(sweep)
    }

    /// Assert every card has a title, a parseable price, shipping info and
    /// an image
    pub async fn validate_product_details(&self) -> ShopResult<Vec<Product>> {
        let products = self.get_all_products().await?;
        for (index, product) in products.iter().enumerate() {
            let fail = |field: &str| {
                Err(ShopError::assertion(
                    format!("product {index} should have a {field}"),
                    format!("non-empty {field}"),
                    format!("{product:?}"),
                ))
            };
            if product.title.is_empty() {
                return fail("title");
            }
            if product.price_value().is_err() {
                return fail("price");
            }
            if product.shipping.is_empty() {
                return fail("shipping label");
            }
            if product.images.is_empty() {
                return fail("image");
            }
        }
        Ok(products)
    }

    /// Products priced at or above `min`
    pub fn filter_by_min_price(products: &[Product], min: Money) -> ShopResult<Vec<Product>> {
        Self::filter_by_price(products, |price| price >= min)
    }

    /// Products priced at or below `max`
    pub fn filter_by_max_price(products: &[Product], max: Money) -> ShopResult<Vec<Product>> {
        Self::filter_by_price(products, |price| price <= max)
    }

    /// Products priced within `[min, max]`
    pub fn filter_by_price_range(products: &[Product], min: Money, max: Money) -> ShopResult<Vec<Product>> {
        Self::filter_by_price(products, |price| min <= price && price <= max)
    }

    fn filter_by_price<F>(products: &[Product], keep: F) -> ShopResult<Vec<Product>>
    where
        F: Fn(Money) -> bool,
    {
        let mut kept = Vec::new();
        for product in products {
            if keep(product.price_value()?) {
                kept.push(product.clone());
            }
        }
        Ok(kept)
    }

    /// Products whose title contains `keyword`, ignoring case
    #[must_use]
    pub fn filter_by_title_keyword(products: &[Product], keyword: &str) -> Vec<Product> {
        let keyword = keyword.to_lowercase();
        products
            .iter()
            .filter(|p| p.title.to_lowercase().contains(&keyword))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Section for ProductSection {
    fn name(&self) -> &'static str {
        "product list"
    }

    fn root(&self) -> &Locator {
        &self.root
    }

    async fn verify_section_visible(&self) -> ShopResult<()> {
        self.root.wait_for(WaitState::Visible).await?;
        expect(&self.filter_container).to_be_visible().await?;
        if self.count_products().await? > 0 {
            expect(&self.cards.first()).to_be_visible().await?;
        }
        expect(&self.count_label).to_be_visible().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeShop;
    use std::time::Duration;

    async fn section() -> (Arc<FakeShop>, ProductSection) {
        let shop = Arc::new(FakeShop::default());
        shop.open_home().await.unwrap();
        let options = LocatorOptions {
            timeout: Duration::from_millis(200),
            poll_interval: Duration::from_millis(5),
        };
        let section = ProductSection::new(shop.clone(), options);
        (shop, section)
    }

    fn product(title: &str, price: &str) -> Product {
        Product {
            title: title.to_string(),
            price: price.to_string(),
            shipping: "Free shipping".to_string(),
            images: vec!["/a.webp".to_string()],
        }
    }

    mod parse_tests {
        use super::*;

        #[test]
        fn test_extract_background_url() {
            assert_eq!(
                extract_background_url(r#"url("/static/a-1-product.webp")"#).as_deref(),
                Some("/static/a-1-product.webp")
            );
            assert_eq!(extract_background_url("url('x.png')").as_deref(), Some("x.png"));
            assert_eq!(extract_background_url("url(y.png)").as_deref(), Some("y.png"));
            assert_eq!(extract_background_url("none"), None);
        }

        #[test]
        fn test_parse_product_count() {
            assert_eq!(parse_product_count("16 Product(s) found").unwrap(), 16);
            assert_eq!(parse_product_count("1 Product(s) found").unwrap(), 1);
            assert!(parse_product_count("no products").is_err());
        }

        #[test]
        fn test_product_equality_is_by_title() {
            let mut other = product("Blue Shirt", "$1.00");
            other.images.clear();
            assert_eq!(product("Blue Shirt", "$20.00"), other);
            assert_ne!(product("Blue Shirt", "$20.00"), product("Blue T-Shirt", "$20.00"));
        }
    }

    mod grid_tests {
        use super::*;

        #[tokio::test]
        async fn test_count_and_first_product() {
            let (_shop, products) = section().await;
            assert_eq!(products.count_products().await.unwrap(), 8);
            assert_eq!(products.get_displayed_product_count().await.unwrap(), 8);
            let first = products.get_product(0).await.unwrap();
            assert_eq!(first.title, "Blue Shirt");
            assert_eq!(first.price, "$20.00");
            assert_eq!(first.shipping, "Free shipping");
            assert_eq!(first.images.len(), 2);
            assert!(first.images[0].ends_with("-1-product.webp"));
            assert!(first.images[1].ends_with("-2-product.webp"));
        }

        #[tokio::test]
        async fn test_get_product_out_of_range() {
            let (_shop, products) = section().await;
            let err = products.get_product(8).await.unwrap_err();
            assert!(matches!(err, ShopError::IndexOutOfRange { index: 8, len: 8, .. }));
        }

        #[tokio::test]
        async fn test_validate_product_details() {
            let (_shop, products) = section().await;
            let all = products.validate_product_details().await.unwrap();
            assert_eq!(all.len(), 8);
            assert_eq!(all[3].shipping, "Standard shipping");
            products.verify_section_visible().await.unwrap();
        }

        #[tokio::test]
        async fn test_click_add_to_cart() {
            let (shop, products) = section().await;
            products.click_add_to_cart(2).await.unwrap();
            assert_eq!(shop.cart_lines(), vec![("Basic Cactus White T-shirt".to_string(), 1)]);
        }
    }

    mod filter_tests {
        use super::*;

        #[tokio::test]
        async fn test_xs_shows_blue_shirt() {
            let (_shop, products) = section().await;
            products.select_size("XS").await.unwrap();
            assert_eq!(products.count_products().await.unwrap(), 1);
            assert_eq!(products.get_all_products().await.unwrap()[0].title, "Blue Shirt");
        }

        #[tokio::test]
        async fn test_select_is_idempotent() {
            let (shop, products) = section().await;
            products.select_size("M").await.unwrap();
            let once = shop.selected_sizes();
            products.select_size("M").await.unwrap();
            assert_eq!(shop.selected_sizes(), once);
            products.deselect_size("L").await.unwrap();
            assert_eq!(shop.selected_sizes(), once);
            assert_eq!(products.get_selected_sizes().await.unwrap(), vec!["M".to_string()]);
        }

        #[tokio::test]
        async fn test_deselect_all_twice() {
            let (shop, products) = section().await;
            products.select_size("S").await.unwrap();
            products.select_size("XL").await.unwrap();
            products.deselect_all_sizes().await.unwrap();
            products.deselect_all_sizes().await.unwrap();
            assert!(shop.selected_sizes().is_empty());
            assert_eq!(products.count_products().await.unwrap(), 8);
        }

        #[tokio::test]
        async fn test_unknown_size_is_not_found() {
            let (_shop, products) = section().await;
            assert!(products.select_size("XXXL").await.unwrap_err().is_not_found());
        }

        #[tokio::test]
        async fn test_validate_all_sizes() {
            let (shop, products) = section().await;
            products.select_size("L").await.unwrap();
            let sweep = products.validate_all_sizes().await.unwrap();
            let expected = [("XS", 1), ("S", 3), ("M", 3), ("ML", 2), ("L", 4), ("XL", 3), ("XXL", 2)];
            let got: Vec<(&str, usize)> = sweep.counts().iter().map(|(s, n)| (s.as_str(), *n)).collect();
            assert_eq!(got, expected);
            assert_eq!(sweep.count_for("ML"), Some(2));
            assert!(shop.selected_sizes().is_empty());
        }
    }

    mod offline_filter_tests {
        use super::*;

        fn catalog() -> Vec<Product> {
            vec![
                product("Blue Shirt", "$20.00"),
                product("Blue T-Shirt", "$9.00"),
                product("Black Tule Oversized", "$29.45"),
            ]
        }

        #[test]
        fn test_price_filters() {
            let all = catalog();
            let min = ProductSection::filter_by_min_price(&all, Money::new(20, 0)).unwrap();
            assert_eq!(min.len(), 2);
            let max = ProductSection::filter_by_max_price(&all, Money::new(9, 0)).unwrap();
            assert_eq!(max, vec![product("Blue T-Shirt", "")]);
            let range = ProductSection::filter_by_price_range(&all, Money::new(9, 0), Money::new(20, 0)).unwrap();
            assert_eq!(range.len(), 2);
        }

        #[test]
        fn test_bad_price_is_parse_error() {
            let all = vec![product("Odd", "free")];
            assert!(ProductSection::filter_by_min_price(&all, Money::ZERO).is_err());
        }

        #[test]
        fn test_title_keyword() {
            let all = catalog();
            let blue = ProductSection::filter_by_title_keyword(&all, "BLUE");
            assert_eq!(blue.len(), 2);
            assert!(ProductSection::filter_by_title_keyword(&all, "hoodie").is_empty());
        }
    }
}
