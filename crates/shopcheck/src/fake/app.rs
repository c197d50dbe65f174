//! State and rendering of the fake shopping application.
//!
//! Every mutation re-renders the whole element tree from state, the way the
//! real single-page app re-renders, so locators must re-resolve after each
//! action.

use super::dom::{Action, Dom, Element, NodeId};
use crate::driver::RequestEvent;
use crate::money::Money;

/// Size tokens in the order the filter renders them
pub const SIZES: [&str; 7] = ["XS", "S", "M", "ML", "L", "XL", "XXL"];

/// One product in the fake catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogItem {
    pub id: u32,
    pub title: String,
    pub style: String,
    pub price: Money,
    pub sizes: Vec<String>,
    pub free_shipping: bool,
    /// Primary image and the one shown on hover
    pub images: [String; 2],
}

impl CatalogItem {
    pub fn new(id: u32, title: &str, price: Money, sizes: &[&str]) -> Self {
        let slug = title.to_lowercase().replace(' ', "-");
        Self {
            id,
            title: title.to_string(),
            style: "Classic".to_string(),
            price,
            sizes: sizes.iter().map(|s| (*s).to_string()).collect(),
            free_shipping: true,
            images: [
                format!("/static/products/{slug}-1-product.webp"),
                format!("/static/products/{slug}-2-product.webp"),
            ],
        }
    }

    #[must_use]
    pub const fn with_paid_shipping(mut self) -> Self {
        self.free_shipping = false;
        self
    }

    #[must_use]
    pub fn with_style(mut self, style: &str) -> Self {
        self.style = style.to_string();
        self
    }

    pub fn shipping_label(&self) -> &'static str {
        if self.free_shipping {
            "Free shipping"
        } else {
            "Standard shipping"
        }
    }
}

/// Default catalog: eight products, exactly one tagged XS
pub fn sample_catalog() -> Vec<CatalogItem> {
    vec![
        CatalogItem::new(1, "Blue Shirt", Money::new(20, 0), &["XS", "S"]).with_style("Navy"),
        CatalogItem::new(2, "Cropped Stay Groovy off white", Money::new(10, 90), &["S", "M"]),
        CatalogItem::new(3, "Basic Cactus White T-shirt", Money::new(13, 25), &["M", "ML", "L"]),
        CatalogItem::new(4, "Skater Black Sweatshirt", Money::new(25, 90), &["L", "XL"])
            .with_paid_shipping()
            .with_style("Black"),
        CatalogItem::new(5, "Black Tule Oversized", Money::new(29, 45), &["M", "L", "XL"]),
        CatalogItem::new(6, "Black Batman T-shirt", Money::new(10, 90), &["S", "XXL"]),
        CatalogItem::new(7, "Blue T-Shirt", Money::new(9, 0), &["ML", "XL", "XXL"]).with_paid_shipping(),
        CatalogItem::new(8, "Loose Black T-shirt", Money::new(14, 0), &["L"]),
    ]
}

/// Where the page currently is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Blank,
    Shop,
    Repo,
    External { url: String, title: String },
}

/// A cart line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLine {
    pub product: u32,
    pub quantity: u32,
}

/// Side effects of an action that the driver performs outside the state lock
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    None,
    Requests(Vec<RequestEvent>),
    Alert(String),
    Download,
}

/// Static settings of the fake app
#[derive(Debug, Clone)]
pub struct AppSettings {
    pub base_url: String,
    pub repo_url: String,
    pub linkedin_url: String,
    pub title: String,
    pub min_quantity: u32,
    pub error_banner: Option<String>,
}

/// Mutable application state plus its current rendering
#[derive(Debug, Clone)]
pub struct ShopApp {
    settings: AppSettings,
    catalog: Vec<CatalogItem>,
    route: Route,
    selected: Vec<String>,
    cart: Vec<CartLine>,
    cart_open: bool,
    hovered: Option<u32>,
    code_menu_open: bool,
    search: String,
    dom: Dom,
}

impl ShopApp {
    pub fn new(settings: AppSettings, catalog: Vec<CatalogItem>) -> Self {
        let mut app = Self {
            settings,
            catalog,
            route: Route::Blank,
            selected: Vec::new(),
            cart: Vec::new(),
            cart_open: false,
            hovered: None,
            code_menu_open: false,
            search: String::new(),
            dom: Dom::new(),
        };
        app.render();
        app
    }

    pub const fn dom(&self) -> &Dom {
        &self.dom
    }

    pub fn cart(&self) -> &[CartLine] {
        &self.cart
    }

    pub fn selected_sizes(&self) -> &[String] {
        &self.selected
    }

    pub fn catalog(&self) -> &[CatalogItem] {
        &self.catalog
    }

    pub const fn is_cart_open(&self) -> bool {
        self.cart_open
    }

    pub fn badge_total(&self) -> u32 {
        self.cart.iter().map(|l| l.quantity).sum()
    }

    pub fn subtotal(&self) -> Money {
        self.cart
            .iter()
            .filter_map(|l| self.item(l.product).map(|p| p.price.times(l.quantity)))
            .sum()
    }

    pub fn url(&self) -> String {
        match &self.route {
            Route::Blank => "about:blank".to_string(),
            Route::Shop => self.settings.base_url.clone(),
            Route::Repo => self.settings.repo_url.clone(),
            Route::External { url, .. } => url.clone(),
        }
    }

    pub fn title(&self) -> String {
        match &self.route {
            Route::Blank => String::new(),
            Route::Shop => self.settings.title.clone(),
            Route::Repo => "GitHub - jeffersonRibeiro/react-shopping-cart: 🛍️ Simple ecommerce cart application built with Typescript and React".to_string(),
            Route::External { title, .. } => title.clone(),
        }
    }

    fn item(&self, id: u32) -> Option<&CatalogItem> {
        self.catalog.iter().find(|p| p.id == id)
    }

    fn visible_products(&self) -> Vec<&CatalogItem> {
        self.catalog
            .iter()
            .filter(|p| self.selected.is_empty() || p.sizes.iter().any(|s| self.selected.contains(s)))
            .collect()
    }

    /// Navigate, resetting page state; returns the requests the load issues
    pub fn navigate(&mut self, url: &str) -> Vec<RequestEvent> {
        let base = self.settings.base_url.trim_end_matches('/');
        let repo = self.settings.repo_url.trim_end_matches('/');
        let target = url.trim_end_matches('/');
        self.route = if url == "about:blank" {
            Route::Blank
        } else if target == base || url.starts_with(&format!("{base}/?")) || url.starts_with(&format!("{base}/#")) {
            Route::Shop
        } else if target == repo {
            Route::Repo
        } else {
            Route::External {
                url: url.to_string(),
                title: external_title(url),
            }
        };
        self.selected.clear();
        self.cart.clear();
        self.cart_open = false;
        self.hovered = None;
        self.code_menu_open = false;
        self.render();

        let mut requests = vec![RequestEvent::new("GET", url).with_resource_type("document")];
        if self.route == Route::Shop {
            let root = &self.settings.base_url;
            let root = root.trim_end_matches('/');
            requests.push(RequestEvent::new("GET", format!("{root}/static/js/main.js")).with_resource_type("script"));
            requests.push(RequestEvent::new("GET", format!("{root}/static/css/main.css")).with_resource_type("stylesheet"));
            requests.push(RequestEvent::new("GET", format!("{root}/api/products.json")).with_resource_type("fetch"));
        }
        requests
    }

    pub fn hover(&mut self, node: NodeId) {
        let product = self.dom.product_of(node);
        if product != self.hovered {
            self.hovered = product;
            self.render();
        }
    }

    pub fn fill(&mut self, node: NodeId, text: &str) -> bool {
        let el = self.dom.get(node);
        if el.tag == "input" && el.attrs.get("name").map(String::as_str) == Some("q") {
            self.search = text.to_string();
            self.render();
            true
        } else {
            false
        }
    }

    /// Apply a click action
    pub fn apply(&mut self, action: &Action) -> Effect {
        let effect = match action {
            Action::ToggleSize(size) => {
                if let Some(pos) = self.selected.iter().position(|s| s == size) {
                    self.selected.remove(pos);
                } else {
                    self.selected.push(size.clone());
                }
                Effect::None
            }
            Action::AddToCart(id) => {
                match self.cart.iter_mut().find(|l| l.product == *id) {
                    Some(line) => line.quantity += 1,
                    None => self.cart.push(CartLine {
                        product: *id,
                        quantity: 1,
                    }),
                }
                self.cart_open = true;
                Effect::None
            }
            Action::OpenCart => {
                self.cart_open = true;
                Effect::None
            }
            Action::CloseCart => {
                self.cart_open = false;
                Effect::None
            }
            Action::Increase(id) => {
                if let Some(line) = self.cart.iter_mut().find(|l| l.product == *id) {
                    line.quantity += 1;
                }
                Effect::None
            }
            Action::Decrease(id) => {
                let floor = self.settings.min_quantity;
                if let Some(line) = self.cart.iter_mut().find(|l| l.product == *id) {
                    if line.quantity > floor {
                        line.quantity -= 1;
                    }
                }
                self.cart.retain(|l| l.quantity > 0);
                Effect::None
            }
            Action::Remove(id) => {
                self.cart.retain(|l| l.product != *id);
                Effect::None
            }
            Action::Checkout => {
                if self.cart.is_empty() {
                    Effect::Alert("Add some product in the cart!".to_string())
                } else {
                    Effect::Alert(format!("Checkout - Subtotal: {}", self.subtotal().spaced()))
                }
            }
            Action::Navigate(url) => {
                let url = url.clone();
                return Effect::Requests(self.navigate(&url));
            }
            Action::OpenCodeMenu => {
                self.code_menu_open = !self.code_menu_open;
                Effect::None
            }
            Action::DownloadZip => Effect::Download,
        };
        self.render();
        effect
    }

    fn render(&mut self) {
        let mut dom = Dom::new();
        let body = dom.append(Dom::ROOT, Element::new("div").attr("id", "root"));
        match self.route.clone() {
            Route::Blank => {}
            Route::Shop => self.render_shop(&mut dom, body),
            Route::Repo => self.render_repo(&mut dom, body),
            Route::External { title, .. } => {
                dom.append(body, Element::new("h1").text(title));
            }
        }
        self.dom = dom;
    }

    fn render_shop(&self, dom: &mut Dom, body: NodeId) {
        let repo = self.settings.repo_url.clone();

        if let Some(message) = &self.settings.error_banner {
            dom.append(
                body,
                Element::new("div").class("alert").attr("role", "alert").text(message.clone()),
            );
        }

        let corner = dom.append(body, Element::new("div").class("sc-1wdjhda-0"));
        dom.append(
            corner,
            Element::new("a")
                .attr("href", repo.clone())
                .attr("aria-label", "View source on Github")
                .action(Action::Navigate(repo.clone())),
        );

        let sidebar = dom.append(body, Element::new("div").class("sc-bj2vay-0"));
        dom.append(
            sidebar,
            Element::new("a")
                .class("github-button")
                .attr("href", repo.clone())
                .attr("aria-label", "Star jeffersonRibeiro/react-shopping-cart on GitHub")
                .text("Star")
                .action(Action::Navigate(repo)),
        );
        let filters = dom.append(sidebar, Element::new("div").class("sc-bj2vay-1"));
        dom.append(filters, Element::new("h4").class("sc-bj2vay-2").text("Sizes:"));
        for size in SIZES {
            let label = dom.append(filters, Element::new("label").class("sc-bj2vay-3"));
            dom.append(
                label,
                Element::new("input")
                    .attr("type", "checkbox")
                    .attr("data-testid", "checkbox")
                    .attr("value", size)
                    .checked(self.selected.iter().any(|s| s == size))
                    .action(Action::ToggleSize(size.to_string())),
            );
            dom.append(label, Element::new("span").class("checkmark").text(size));
        }

        let abroad = dom.append(body, Element::new("div").class("sc-joc36b-0 ciyhZL"));
        let img_box = dom.append(abroad, Element::new("div").class("sc-joc36b-1"));
        dom.append(
            img_box,
            Element::new("img")
                .attr("src", "/static/netherlands.svg")
                .attr("alt", "Netherlands flag"),
        );
        let head_box = dom.append(abroad, Element::new("div").class("sc-joc36b-2"));
        dom.append(head_box, Element::new("h4").text("Work in the Netherlands"));
        let text_box = dom.append(abroad, Element::new("div").class("sc-joc36b-3"));
        let para = dom.append(
            text_box,
            Element::new("p").text("Relocation and visa support for engineers. Talk to"),
        );
        let linkedin = self.settings.linkedin_url.clone();
        dom.append(
            para,
            Element::new("a")
                .attr("href", linkedin.clone())
                .attr("target", "_self")
                .text("Jeremy")
                .action(Action::Navigate(linkedin)),
        );

        let main = dom.append(body, Element::new("main").class("sc-ebmerl-3 hewZDo"));
        let visible = self.visible_products();
        let header = dom.append(main, Element::new("div").class("sc-ebmerl-4"));
        dom.append(header, Element::new("p").text(format!("{} Product(s) found", visible.len())));
        let grid = dom.append(main, Element::new("div").class("sc-uhudcz-0 iZZGui"));
        for product in visible {
            self.render_card(dom, grid, product);
        }

        self.render_cart(dom, body);
    }

    fn render_card(&self, dom: &mut Dom, grid: NodeId, product: &CatalogItem) {
        let card = dom.append(
            grid,
            Element::new("div").class("sc-124al1g-2").attr("tabindex", "1").product(product.id),
        );
        dom.append(card, Element::new("div").class("sc-124al1g-3").text(product.shipping_label()));
        let image = if self.hovered == Some(product.id) {
            &product.images[1]
        } else {
            &product.images[0]
        };
        dom.append(
            card,
            Element::new("div")
                .class("sc-124al1g-1")
                .style("background-image", format!("url(\"{image}\")")),
        );
        dom.append(card, Element::new("p").class("sc-124al1g-4").text(product.title.clone()));
        let price_box = dom.append(card, Element::new("div").class("sc-124al1g-5"));
        let price = dom.append(price_box, Element::new("p").class("sc-124al1g-6"));
        let amount = product.price.amount();
        let (units, cents) = amount.split_once('.').unwrap_or((amount.as_str(), "00"));
        dom.append(price, Element::new("small").text("$"));
        dom.append(price, Element::new("b").text(units));
        dom.append(price, Element::new("span").text(format!(".{cents}")));
        dom.append(
            card,
            Element::new("button")
                .class("sc-124al1g-0")
                .text("Add to cart")
                .action(Action::AddToCart(product.id)),
        );
    }

    fn render_cart(&self, dom: &mut Dom, body: NodeId) {
        let panel = dom.append(body, Element::new("div").class("sc-1h98xa9-1 kQlqIC"));
        let total = self.badge_total().to_string();

        if !self.cart_open {
            let toggle = dom.append(
                panel,
                Element::new("button").class("sc-1h98xa9-0").action(Action::OpenCart),
            );
            let icon = dom.append(toggle, Element::new("div").class("sc-1h98xa9-2"));
            dom.append(
                icon,
                Element::new("div")
                    .class("sc-1h98xa9-3")
                    .attr("title", "Products in cart quantity")
                    .text(total),
            );
            return;
        }

        let root = dom.append(panel, Element::new("div").class("sc-1h98xa9-4"));
        dom.append(
            root,
            Element::new("button").class("sc-1h98xa9-0").text("X").action(Action::CloseCart),
        );
        let header = dom.append(root, Element::new("div").class("sc-1h98xa9-5"));
        let icon = dom.append(header, Element::new("div").class("sc-1h98xa9-2"));
        dom.append(
            icon,
            Element::new("div")
                .class("sc-1h98xa9-3")
                .attr("title", "Products in cart quantity")
                .text(total),
        );
        dom.append(header, Element::new("span").class("sc-1h98xa9-6").text("Cart"));

        let items = dom.append(root, Element::new("div").class("sc-7th5t8-0"));
        if self.cart.is_empty() {
            dom.append(items, Element::new("p").class("sc-7th5t8-1").text("Add some products in the cart :)"));
        }
        for line in &self.cart {
            if let Some(product) = self.item(line.product) {
                self.render_line(dom, items, product, line.quantity);
            }
        }

        let footer = dom.append(root, Element::new("div").class("sc-1h98xa9-8 bciIxg"));
        dom.append(footer, Element::new("p").class("sc-1h98xa9-7").text("SUBTOTAL"));
        dom.append(
            footer,
            Element::new("p").class("sc-1h98xa9-9 jzywDV").text(self.subtotal().spaced()),
        );
        dom.append(
            footer,
            Element::new("button").class("sc-1h98xa9-10").text("Checkout").action(Action::Checkout),
        );
    }

    fn render_line(&self, dom: &mut Dom, items: NodeId, product: &CatalogItem, quantity: u32) {
        let row = dom.append(items, Element::new("div").class("sc-11uohgb-0 hDmOrM").product(product.id));
        dom.append(
            row,
            Element::new("button")
                .class("sc-11uohgb-5")
                .attr("title", "remove product from cart")
                .action(Action::Remove(product.id)),
        );
        dom.append(
            row,
            Element::new("img")
                .class("sc-11uohgb-1")
                .attr("src", product.images[0].clone())
                .attr("alt", product.title.clone()),
        );
        let details = dom.append(row, Element::new("div").class("sc-11uohgb-6"));
        dom.append(details, Element::new("p").class("sc-11uohgb-2 elbkhN").text(product.title.clone()));
        let size = product.sizes.first().cloned().unwrap_or_default();
        dom.append(
            details,
            Element::new("p")
                .class("sc-11uohgb-3 gKtloF")
                .text(format!("{size} | {}\nQuantity: {quantity}", product.style)),
        );
        let pricing = dom.append(row, Element::new("div").class("sc-11uohgb-4 bnZqjD"));
        dom.append(pricing, Element::new("p").text(product.price.spaced()));
        let controls = dom.append(pricing, Element::new("div").class("sc-11uohgb-8"));
        dom.append(
            controls,
            Element::new("button")
                .class("sc-11uohgb-7")
                .text("-")
                .disabled(quantity <= self.settings.min_quantity)
                .action(Action::Decrease(product.id)),
        );
        dom.append(
            controls,
            Element::new("button")
                .class("sc-11uohgb-7")
                .text("+")
                .action(Action::Increase(product.id)),
        );
    }

    fn render_repo(&self, dom: &mut Dom, body: NodeId) {
        let header = dom.append(body, Element::new("header").class("AppHeader"));
        dom.append(
            header,
            Element::new("input")
                .attr("name", "q")
                .attr("type", "text")
                .attr("placeholder", "Search or jump to...")
                .attr("value", self.search.clone()),
        );
        let content = dom.append(body, Element::new("div").class("repository-content"));
        dom.append(content, Element::new("strong").attr("itemprop", "name").text("react-shopping-cart"));
        dom.append(
            content,
            Element::new("button")
                .attr("type", "button")
                .attr("aria-haspopup", "true")
                .text("Code")
                .action(Action::OpenCodeMenu),
        );
        if self.code_menu_open {
            let menu = dom.append(content, Element::new("div").attr("role", "menu"));
            let zip_url = format!("{}/archive/refs/heads/main.zip", self.settings.repo_url.trim_end_matches('/'));
            dom.append(
                menu,
                Element::new("a")
                    .attr("href", zip_url)
                    .attr("role", "menuitem")
                    .text("Download ZIP")
                    .action(Action::DownloadZip),
            );
        }
        let readme = dom.append(content, Element::new("article").class("markdown-body"));
        dom.append(readme, Element::new("h1").text("Typescript React Shopping cart"));
    }
}

fn external_title(url: &str) -> String {
    if url.contains("linkedin.com") {
        "Jeremy Soares | LinkedIn".to_string()
    } else {
        url.to_string()
    }
}
