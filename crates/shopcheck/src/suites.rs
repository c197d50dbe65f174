//! End-to-end scenarios against the shop and its source repository.
//!
//! Every scenario is a [`TestCase`] run by the [`TestHarness`](crate::harness::TestHarness);
//! [`all_cases`] lists them in run order.

use crate::assertion::expect;
use crate::harness::{TestCase, TestContext};
use crate::money::Money;
use crate::page_object::Section;
use crate::pages::ShoppingPage;
use crate::result::{ensure_eq, ShopError, ShopResult};
use crate::sections::CartProduct;
use crate::wait::wait_for_url_contains;
use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::info;

/// Name of the archive saved by the download scenario
pub const DOWNLOADED_ZIP: &str = "downloaded_repo.zip";

pub const SHOPPING_FLOW: TestCase = TestCase {
    node_id: "shopping_flow::test_shopping_flow_happy_path",
    markers: &["smoke"],
    uses_network_logger: true,
    body: shopping_flow_happy_path,
};

pub const CART_DYNAMIC_FLOW: TestCase = TestCase {
    node_id: "cart::test_cart_dynamic_flow",
    markers: &["cart"],
    uses_network_logger: true,
    body: cart_dynamic_flow,
};

pub const DYNAMIC_PRODUCT_FILTERS: TestCase = TestCase {
    node_id: "product_list::test_dynamic_product_filters",
    markers: &["product_list"],
    uses_network_logger: true,
    body: dynamic_product_filters,
};

pub const WORK_ABROAD: TestCase = TestCase {
    node_id: "work_abroad::test_work_abroad_section_and_link",
    markers: &["work_abroad"],
    uses_network_logger: true,
    body: work_abroad_section_and_link,
};

pub const REPO_ACCESSIBILITY: TestCase = TestCase {
    node_id: "repo_page::test_repo_page_accessibility",
    markers: &["accessibility"],
    uses_network_logger: true,
    body: repo_page_accessibility,
};

pub const REPO_DOWNLOAD: TestCase = TestCase {
    node_id: "repo_page::test_repo_page_download",
    markers: &["download"],
    uses_network_logger: true,
    body: repo_page_download,
};

/// Every scenario, in run order
#[must_use]
pub fn all_cases() -> Vec<TestCase> {
    vec![
        SHOPPING_FLOW,
        CART_DYNAMIC_FLOW,
        DYNAMIC_PRODUCT_FILTERS,
        WORK_ABROAD,
        REPO_ACCESSIBILITY,
        REPO_DOWNLOAD,
    ]
}

/// Checkout alert text for a cart total
#[must_use]
pub fn checkout_alert(total: Money) -> String {
    format!("Checkout - Subtotal: {}", total.spaced())
}

async fn open_shop(ctx: &TestContext) -> ShopResult<ShoppingPage> {
    let page = ctx.shopping_page();
    page.goto(&ctx.config().base_url).await?;
    page.verify_page_loaded(&ctx.config().expected_title).await?;
    Ok(page)
}

fn log_network(ctx: &TestContext) {
    if let Some(network) = ctx.network() {
        info!(requests = network.len(), "Captured network requests");
    }
}

async fn expect_no_error_banner(page: &ShoppingPage) -> ShopResult<()> {
    let error = page.get_error_message().await?;
    info!("Captured error message: {error:?}");
    match error {
        None => Ok(()),
        Some(text) => Err(ShopError::assertion("unexpected error banner", "none", text)),
    }
}

async fn checkout_and_verify(page: &ShoppingPage, total: Money) -> ShopResult<()> {
    expect(page.cart().checkout_button()).to_be_visible().await?;
    let alert = page.cart().click_checkout(true).await?.unwrap_or_default();
    let expected = checkout_alert(total);
    if !alert.contains(&expected) {
        return Err(ShopError::assertion("checkout alert", expected, alert));
    }
    Ok(())
}

fn shopping_flow_happy_path(ctx: &TestContext) -> BoxFuture<'_, ShopResult<()>> {
    async move {
        let page = open_shop(ctx).await?;
        expect(page.cart_quantity()).to_be_visible().await?;
        expect(page.cart_quantity()).to_have_text("0").await?;

        let products = page.products();
        products.select_size("XS").await?;
        expect(products.product_cards()).to_have_count(1).await?;
        let listed = products.get_product(0).await?;
        info!("Selected product: {listed:?}");

        products.click_add_to_cart(0).await?;
        expect(page.cart_quantity()).to_have_text("1").await?;

        let cart = page.cart();
        cart.open_cart().await?;
        expect(cart.items()).to_have_count(1).await?;
        let item = cart.get_cart_item(0).await?;
        info!("Cart item: {item:?}");
        ensure_eq("cart item title", listed.title.as_str(), item.title.as_str())?;
        let price = listed.price_value()?;
        ensure_eq("cart item price", price, item.price)?;
        ensure_eq("cart item quantity", 1, item.quantity)?;

        let expected_total = price.times(item.quantity);
        ensure_eq("cart total", expected_total, cart.get_total_price().await?)?;
        checkout_and_verify(&page, expected_total).await?;

        log_network(ctx);
        expect_no_error_banner(&page).await
    }
    .boxed()
}

fn cart_dynamic_flow(ctx: &TestContext) -> BoxFuture<'_, ShopResult<()>> {
    async move {
        let page = open_shop(ctx).await?;
        expect(page.cart_quantity()).to_be_visible().await?;
        expect(page.cart_quantity()).to_have_text("0").await?;

        let products = page.products();
        products.select_size("S").await?;
        let listed = products.get_all_products().await?;
        expect(products.product_cards()).to_have_count(listed.len()).await?;
        info!(count = listed.len(), "Filtered products");

        for index in 0..listed.len() {
            products.click_add_to_cart(index).await?;
        }

        let cart = page.cart();
        cart.open_cart().await?;
        let lines = cart.get_all_cart_products().await?;
        ensure_eq("cart line count", listed.len(), lines.len())?;
        for (line, product) in lines.iter().zip(&listed) {
            ensure_eq("cart line title", product.title.as_str(), line.title.as_str())?;
            ensure_eq("cart line price", product.price_value()?, line.price)?;
            ensure_eq("cart line quantity", 1, line.quantity)?;
        }

        for line in &lines {
            cart.increase_quantity(&line.title, 2).await?;
        }
        let lines = expect_badge_matches(&page).await?;

        if let Some(first) = lines.first() {
            cart.decrease_quantity(&first.title, 1).await?;
        }
        let lines = expect_badge_matches(&page).await?;

        if let Some(second) = lines.get(1) {
            cart.remove_item(&second.title).await?;
        }
        let lines = expect_badge_matches(&page).await?;

        let expected_total: Money = lines.iter().map(|l| l.subtotal).sum();
        ensure_eq("cart total", expected_total, cart.get_total_price().await?)?;
        checkout_and_verify(&page, expected_total).await?;

        log_network(ctx);
        expect_no_error_banner(&page).await
    }
    .boxed()
}

/// Re-read the cart and assert the badge equals the summed quantities
async fn expect_badge_matches(page: &ShoppingPage) -> ShopResult<Vec<CartProduct>> {
    let lines = page.cart().get_all_cart_products().await?;
    let total: u32 = lines.iter().map(|l| l.quantity).sum();
    expect(page.cart_quantity()).to_have_text(&total.to_string()).await?;
    Ok(lines)
}

fn dynamic_product_filters(ctx: &TestContext) -> BoxFuture<'_, ShopResult<()>> {
    async move {
        let page = open_shop(ctx).await?;
        let products = page.products();
        let unfiltered = products.count_products().await?;

        products.verify_section_visible().await?;
        let sweep = products.validate_all_sizes().await?;
        info!(sizes = sweep.len(), "Validated size filters: {:?}", sweep.counts());
        if sweep.is_empty() {
            return Err(ShopError::assertion("size filters present", "at least one", "none"));
        }

        products.validate_product_details().await?;
        ensure_eq("unfiltered product count", unfiltered, products.count_products().await?)?;
        log_network(ctx);
        Ok(())
    }
    .boxed()
}

fn work_abroad_section_and_link(ctx: &TestContext) -> BoxFuture<'_, ShopResult<()>> {
    async move {
        let page = open_shop(ctx).await?;
        expect(page.repo_star_link()).to_be_visible().await?;

        let section = page.work_abroad();
        section.verify_section_visible().await?;
        section.click_linkedin().await?;
        let title = page.get_title().await?;
        if !title.contains("Jeremy") {
            return Err(ShopError::assertion("contact page title", "contains \"Jeremy\"", title));
        }

        log_network(ctx);
        expect_no_error_banner(&page).await
    }
    .boxed()
}

fn repo_page_accessibility(ctx: &TestContext) -> BoxFuture<'_, ShopResult<()>> {
    async move {
        let page = open_shop(ctx).await?;
        page.repo_star_link().click().await?;
        wait_for_url_contains(ctx.page().as_ref(), &ctx.config().repo_url, &ctx.config().wait_options()).await?;

        let repo = ctx.repo_page();
        info!("Checking the repository page is public and offers a download");
        expect(repo.code_button()).to_be_visible().await?;
        if !repo.code_button().is_visible().await? {
            return Err(ShopError::assertion("code button", "visible", "hidden"));
        }
        Ok(())
    }
    .boxed()
}

fn repo_page_download(ctx: &TestContext) -> BoxFuture<'_, ShopResult<()>> {
    async move {
        let repo = ctx.repo_page();
        repo.go_to(&ctx.config().repo_url).await?;
        expect(repo.code_button()).to_be_visible().await?;

        repo.open_code_menu().await?;
        expect(repo.download_zip_link()).to_be_visible().await?;

        info!("Downloading repository ZIP and verifying its contents");
        let dest = ctx.config().downloads_dir().join(DOWNLOADED_ZIP);
        let saved = repo.download_zip(&dest).await?;
        if !saved.exists() {
            return Err(ShopError::assertion("ZIP saved", dest.display(), "missing"));
        }
        repo.verify_zip_contains_file(&saved, "README.md")?;
        Ok(())
    }
    .boxed()
}
