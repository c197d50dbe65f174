//! The shopping page: product grid, size filters, cart and the promo block.

use crate::config::{HarnessConfig, DEFAULT_TITLE};
use crate::driver::PageDriver;
use crate::locator::{Locator, LocatorOptions};
use crate::page_object::{BasePage, PageObject, Section};
use crate::result::{ensure_eq, ShopResult};
use crate::sections::{CartSection, ProductSection, QuantityFloor, WorkAbroadSection};
use std::sync::Arc;
use tracing::info;

/// Page object for the shop
#[derive(Debug, Clone)]
pub struct ShoppingPage {
    base: BasePage,
    products: ProductSection,
    cart: CartSection,
    work_abroad: WorkAbroadSection,
    repo_star_link: Locator,
    repo_cat_link: Locator,
    cart_quantity: Locator,
    error_message: Locator,
}

impl ShoppingPage {
    #[must_use]
    pub fn new(driver: Arc<dyn PageDriver>, options: LocatorOptions, floor: QuantityFloor) -> Self {
        let base = BasePage::new(Arc::clone(&driver), options, "ShoppingPage");
        let cart_quantity = base.locator("div[title='Products in cart quantity']").first();
        Self {
            products: ProductSection::new(Arc::clone(&driver), options),
            cart: CartSection::new(Arc::clone(&driver), options, cart_quantity.clone(), floor),
            work_abroad: WorkAbroadSection::new(driver, options),
            repo_star_link: base.locator("a[aria-label='Star jeffersonRibeiro/react-shopping-cart on GitHub']"),
            repo_cat_link: base.locator("a[aria-label='View source on Github']"),
            error_message: base.locator(".error, .alert, [role='alert']"),
            cart_quantity,
            base,
        }
    }

    /// Page with the timing and quantity floor from `config`
    #[must_use]
    pub fn from_config(driver: Arc<dyn PageDriver>, config: &HarnessConfig) -> Self {
        Self::new(driver, config.locator_options(), config.quantity_floor)
    }

    #[must_use]
    pub const fn base(&self) -> &BasePage {
        &self.base
    }

    #[must_use]
    pub const fn products(&self) -> &ProductSection {
        &self.products
    }

    #[must_use]
    pub const fn cart(&self) -> &CartSection {
        &self.cart
    }

    #[must_use]
    pub const fn work_abroad(&self) -> &WorkAbroadSection {
        &self.work_abroad
    }

    /// All sections, for bulk visibility checks
    #[must_use]
    pub fn sections(&self) -> [&dyn Section; 3] {
        [&self.products, &self.cart, &self.work_abroad]
    }

    #[must_use]
    pub const fn repo_star_link(&self) -> &Locator {
        &self.repo_star_link
    }

    #[must_use]
    pub const fn repo_cat_link(&self) -> &Locator {
        &self.repo_cat_link
    }

    /// Cart badge; also the toggle that opens the cart
    #[must_use]
    pub const fn cart_quantity(&self) -> &Locator {
        &self.cart_quantity
    }

    pub async fn goto(&self, url: &str) -> ShopResult<()> {
        self.base.goto(url).await
    }

    pub async fn get_title(&self) -> ShopResult<String> {
        self.base.title().await
    }

    /// Assert the document title
    pub async fn verify_page_loaded(&self, expected_title: &str) -> ShopResult<()> {
        let title = self.get_title().await?;
        ensure_eq("page title", expected_title, title.as_str())?;
        info!(title = %title, "Page loaded");
        Ok(())
    }

    /// Assert the default shop title
    pub async fn verify_default_title(&self) -> ShopResult<()> {
        self.verify_page_loaded(DEFAULT_TITLE).await
    }

    /// Text of the first visible error banner
    pub async fn get_error_message(&self) -> ShopResult<Option<String>> {
        let first = self.error_message.first();
        if first.is_visible().await? {
            let text = first.text().await?;
            info!(error = %text, "Error banner shown");
            return Ok(Some(text));
        }
        Ok(None)
    }
}

impl PageObject for ShoppingPage {
    fn url_pattern(&self) -> &str {
        "/"
    }

    fn page_name(&self) -> &str {
        self.base.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assertion::expect;
    use crate::fake::{FakeOptions, FakeShop};

    async fn page(options: FakeOptions) -> (Arc<FakeShop>, ShoppingPage) {
        let shop = Arc::new(FakeShop::new(options));
        let page = ShoppingPage::new(shop.clone(), LocatorOptions::default(), QuantityFloor::ReportedByUi);
        page.goto(&shop.options().base_url).await.unwrap();
        (shop, page)
    }

    #[tokio::test]
    async fn test_loaded_page() {
        let (shop, page) = page(FakeOptions::default()).await;
        page.verify_page_loaded("Shopping Page").await.unwrap();
        assert!(page.matches_url(&shop.options().base_url));
        assert_eq!(page.page_name(), "ShoppingPage");
        expect(page.cart_quantity()).to_have_text("0").await.unwrap();
        expect(page.repo_star_link()).to_be_visible().await.unwrap();
        expect(page.repo_cat_link()).to_be_visible().await.unwrap();
        assert_eq!(page.get_error_message().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_wrong_title_reports_both_sides() {
        let (_shop, page) = page(FakeOptions::default()).await;
        let err = page.verify_page_loaded("Other").await.unwrap_err().to_string();
        assert!(err.contains("Other"));
        assert!(err.contains("Shopping Page"));
    }

    #[tokio::test]
    async fn test_error_banner() {
        let (_shop, page) = page(FakeOptions::default().with_error_banner("Failed to load products")).await;
        assert_eq!(
            page.get_error_message().await.unwrap().as_deref(),
            Some("Failed to load products")
        );
    }

    #[tokio::test]
    async fn test_sections_share_badge() {
        let (_shop, page) = page(FakeOptions::default()).await;
        page.products().click_add_to_cart(0).await.unwrap();
        page.cart().close_cart().await.unwrap();
        expect(page.cart_quantity()).to_have_text("1").await.unwrap();
        page.cart().open_cart().await.unwrap();
        let names: Vec<&str> = page.sections().iter().map(|s| s.name()).collect();
        assert_eq!(names, ["product list", "cart", "work abroad"]);
        for section in page.sections() {
            section.verify_section_visible().await.unwrap();
        }
    }
}
