//! shopcheck: page-object end-to-end harness for a single-page shopping cart
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────────┐   ┌───────────────────────┐
//! │  suites      │──►│ pages / sections │──►│ Locator ──► PageDriver│
//! │  (scenarios) │   │ (page objects)   │   │  fake │ chromium (CDP)│
//! └──────┬───────┘   └──────────────────┘   └───────────────────────┘
//!        │
//!        ▼
//! ┌──────────────┐   ┌──────────────────┐   ┌───────────────────────┐
//! │ TestHarness  │──►│  ArtifactHook    │──►│ Reporter (html/junit/ │
//! │ (lifecycle)  │   │ logs/png/webm/net│   │  json)                │
//! └──────────────┘   └──────────────────┘   └───────────────────────┘
//! ```
//!
//! Page objects never touch a browser directly: every element operation goes
//! through [`PageDriver`]. [`fake::FakeShop`] implements it offline; the
//! `browser` feature adds a chromium backend.

#![cfg_attr(test, allow(clippy::large_stack_arrays, clippy::large_stack_frames))]

pub mod artifact;
pub mod assertion;
#[cfg(feature = "browser")]
pub mod browser;
pub mod config;
pub mod dialog;
pub mod driver;
pub mod fake;
pub mod harness;
pub mod locator;
pub mod logging;
pub mod money;
pub mod network;
pub mod page_object;
pub mod pages;
pub mod reporter;
mod result;
pub mod sections;
pub mod suites;
pub mod wait;

pub use artifact::{ArtifactHook, ArtifactPaths, Attachment, AttachmentKind, HookInputs};
pub use assertion::{expect, LocatorAssertions};
pub use config::{BrowserSettings, HarnessConfig, LogSource};
pub use dialog::{Dialog, DialogCapture, DialogType};
pub use driver::{BrowserSession, BrowsingContext, ElementState, PageDriver, RequestEvent, SessionFactory};
pub use harness::{Selection, TestBody, TestCase, TestContext, TestHarness};
pub use locator::{Actionability, Locator, LocatorOptions, Query, Selector};
pub use logging::LogCapture;
pub use money::Money;
pub use network::{NetworkLogger, NetworkRecord};
pub use page_object::{BasePage, PageObject, Section, UrlMatcher};
pub use pages::{RepoPage, ShoppingPage};
pub use reporter::{FailureMode, Reporter, TestOutcome, TestPhase, TestReport};
pub use result::{ensure_eq, ShopError, ShopResult};
pub use sections::{CartProduct, CartSection, Product, ProductSection, QuantityFloor, SizeSweep, WorkAbroadSection};
pub use wait::{WaitOptions, WaitState};
