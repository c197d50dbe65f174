//! "Work in the Netherlands" promo block.

use crate::assertion::expect;
use crate::driver::PageDriver;
use crate::locator::{Locator, LocatorOptions};
use crate::page_object::Section;
use crate::result::ShopResult;
use async_trait::async_trait;
use std::sync::Arc;

const HEADING: &str = "Work in the Netherlands";

#[derive(Debug, Clone)]
pub struct WorkAbroadSection {
    root: Locator,
    image: Locator,
    heading: Locator,
    paragraph: Locator,
    linkedin_link: Locator,
}

impl WorkAbroadSection {
    #[must_use]
    pub fn new(driver: Arc<dyn PageDriver>, options: LocatorOptions) -> Self {
        let root = Locator::new(driver, "div.sc-joc36b-0.ciyhZL")
            .with_options(options)
            .filter_has_text(HEADING)
            .first();
        Self {
            image: root.locator("div.sc-joc36b-1 img"),
            heading: root.locator("h4").filter_has_text(HEADING),
            paragraph: root.locator("div.sc-joc36b-3 p"),
            linkedin_link: root.locator("div.sc-joc36b-3 p a"),
            root,
        }
    }

    #[must_use]
    pub fn linkedin_link(&self) -> &Locator {
        &self.linkedin_link
    }

    pub async fn get_heading_text(&self) -> ShopResult<String> {
        self.heading.text().await
    }

    /// Follow the contact link; the page navigates away
    pub async fn click_linkedin(&self) -> ShopResult<()> {
        expect(&self.linkedin_link).to_be_visible().await?;
        tracing::info!("Following work-abroad contact link");
        self.linkedin_link.click().await
    }
}

#[async_trait]
impl Section for WorkAbroadSection {
    fn name(&self) -> &'static str {
        "work abroad"
    }

    fn root(&self) -> &Locator {
        &self.root
    }

    async fn verify_section_visible(&self) -> ShopResult<()> {
        for part in [&self.root, &self.image, &self.heading, &self.paragraph, &self.linkedin_link] {
            expect(part).to_be_visible().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeShop;

    async fn section() -> (Arc<FakeShop>, WorkAbroadSection) {
        let shop = Arc::new(FakeShop::default());
        shop.open_home().await.unwrap();
        let section = WorkAbroadSection::new(shop.clone(), LocatorOptions::default());
        (shop, section)
    }

    #[tokio::test]
    async fn test_section_visible_with_heading() {
        let (_shop, section) = section().await;
        section.verify_section_visible().await.unwrap();
        assert_eq!(section.get_heading_text().await.unwrap(), HEADING);
        assert_eq!(section.name(), "work abroad");
    }

    #[tokio::test]
    async fn test_linkedin_navigates_away() {
        let (shop, section) = section().await;
        section.click_linkedin().await.unwrap();
        assert!(shop.title().await.unwrap().contains("Jeremy"));
        assert!(section.root().count().await.unwrap() == 0);
    }
}
