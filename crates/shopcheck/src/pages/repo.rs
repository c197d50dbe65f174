//! The source repository page linked from the shop.

use crate::assertion::expect;
use crate::driver::PageDriver;
use crate::locator::{Locator, LocatorOptions};
use crate::page_object::{BasePage, PageObject, UrlMatcher};
use crate::result::{ShopError, ShopResult};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Repository landing page with its code/download menu
#[derive(Debug, Clone)]
pub struct RepoPage {
    base: BasePage,
    code_button: Locator,
    download_zip_link: Locator,
    search_input: Locator,
}

impl RepoPage {
    #[must_use]
    pub fn new(driver: Arc<dyn PageDriver>, options: LocatorOptions) -> Self {
        let base = BasePage::new(driver, options, "RepoPage");
        Self {
            code_button: base.get_by_role("button", Some("Code")).first(),
            download_zip_link: base
                .locator("a, [role='menuitem']")
                .filter_has_text("Download ZIP")
                .first(),
            search_input: base.locator("input[name='q']"),
            base,
        }
    }

    #[must_use]
    pub const fn code_button(&self) -> &Locator {
        &self.code_button
    }

    #[must_use]
    pub const fn download_zip_link(&self) -> &Locator {
        &self.download_zip_link
    }

    pub async fn go_to(&self, url: &str) -> ShopResult<()> {
        self.base.goto(url).await
    }

    /// `owner/repo` from the current URL
    pub async fn repo_slug(&self) -> ShopResult<String> {
        let url = self.base.current_url().await?;
        let params = UrlMatcher::new(self.url_pattern()).extract_params(&url);
        match (params.get("owner"), params.get("repo")) {
            (Some(owner), Some(repo)) => Ok(format!("{owner}/{repo}")),
            _ => Err(ShopError::Parse {
                what: "repository slug".to_string(),
                input: url,
            }),
        }
    }

    pub async fn search(&self, text: &str) -> ShopResult<()> {
        self.base.fill_and_log(&self.search_input, text).await
    }

    /// Open the code menu unless the download entry is already showing
    pub async fn open_code_menu(&self) -> ShopResult<()> {
        if self.download_zip_link.is_visible().await? {
            return Ok(());
        }
        expect(&self.code_button).to_be_visible().await?;
        self.base
            .click_and_wait(&self.code_button, Some(&self.download_zip_link))
            .await
    }

    /// Download the repository archive to `dest`
    pub async fn download_zip(&self, dest: &Path) -> ShopResult<PathBuf> {
        self.open_code_menu().await?;
        info!(dest = %dest.display(), "Downloading repository ZIP");
        let saved = self
            .base
            .driver()
            .download(self.download_zip_link.query(), dest)
            .await?;
        if !saved.exists() {
            return Err(ShopError::Download {
                message: format!("{} was not saved", saved.display()),
            });
        }
        Ok(saved)
    }

    /// Assert the archive holds `file_name` at any depth; returns its entry path
    pub fn verify_zip_contains_file(&self, zip_path: &Path, file_name: &str) -> ShopResult<String> {
        let archive = zip::ZipArchive::new(File::open(zip_path)?)?;
        let suffix = format!("/{file_name}");
        let found = archive
            .file_names()
            .find(|name| *name == file_name || name.ends_with(&suffix))
            .map(str::to_string);
        match found {
            Some(entry) => {
                info!(entry = %entry, "Found {file_name} in archive");
                Ok(entry)
            }
            None => Err(ShopError::assertion(
                format!("{} should contain {file_name}", zip_path.display()),
                file_name,
                archive.file_names().collect::<Vec<_>>().join(", "),
            )),
        }
    }
}

impl PageObject for RepoPage {
    fn url_pattern(&self) -> &str {
        "/:owner/:repo"
    }

    fn page_name(&self) -> &str {
        self.base.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeShop;
    use std::io::Write;

    async fn repo() -> (Arc<FakeShop>, RepoPage) {
        let shop = Arc::new(FakeShop::default());
        let page = RepoPage::new(shop.clone(), LocatorOptions::default());
        page.go_to(&shop.options().repo_url).await.unwrap();
        (shop, page)
    }

    mod page_tests {
        use super::*;

        #[tokio::test]
        async fn test_code_button_and_slug() {
            let (shop, page) = repo().await;
            expect(page.code_button()).to_be_visible().await.unwrap();
            assert!(!page.download_zip_link().is_visible().await.unwrap());
            assert_eq!(page.repo_slug().await.unwrap(), "jeffersonRibeiro/react-shopping-cart");
            assert!(page.matches_url(&shop.url().await.unwrap()));
        }

        #[tokio::test]
        async fn test_open_code_menu_twice() {
            let (shop, page) = repo().await;
            page.open_code_menu().await.unwrap();
            page.open_code_menu().await.unwrap();
            assert!(page.download_zip_link().is_visible().await.unwrap());
            let code_clicks = shop.action_log().iter().filter(|a| a.contains("Code")).count();
            assert_eq!(code_clicks, 1);
        }

        #[tokio::test]
        async fn test_download_contains_readme() {
            let dir = tempfile::tempdir().unwrap();
            let (_shop, page) = repo().await;
            let dest = dir.path().join("downloads").join("downloaded_repo.zip");
            let saved = page.download_zip(&dest).await.unwrap();
            assert_eq!(saved, dest);
            let entry = page.verify_zip_contains_file(&saved, "README.md").unwrap();
            assert_eq!(entry, "react-shopping-cart-main/README.md");
        }
    }

    mod zip_tests {
        use super::*;

        fn write_zip(path: &Path, entries: &[&str]) {
            let mut zip = zip::ZipWriter::new(File::create(path).unwrap());
            for name in entries {
                zip.start_file(*name, zip::write::SimpleFileOptions::default()).unwrap();
                zip.write_all(b"x").unwrap();
            }
            zip.finish().unwrap();
        }

        #[tokio::test]
        async fn test_readme_at_root_and_deep() {
            let dir = tempfile::tempdir().unwrap();
            let (_shop, page) = repo().await;
            let flat = dir.path().join("flat.zip");
            write_zip(&flat, &["README.md"]);
            assert_eq!(page.verify_zip_contains_file(&flat, "README.md").unwrap(), "README.md");
            let deep = dir.path().join("deep.zip");
            write_zip(&deep, &["a/b/c/README.md"]);
            assert!(page.verify_zip_contains_file(&deep, "README.md").is_ok());
        }

        #[tokio::test]
        async fn test_missing_file_is_assertion() {
            let dir = tempfile::tempdir().unwrap();
            let (_shop, page) = repo().await;
            let path = dir.path().join("x.zip");
            write_zip(&path, &["src/main.rs", "NOTREADME.md"]);
            let err = page.verify_zip_contains_file(&path, "README.md").unwrap_err();
            assert!(matches!(err, ShopError::AssertionFailed { .. }));
        }
    }
}
