//! Native dialog interception.
//!
//! The checkout button raises a browser `alert`. A [`DialogCapture`] arms a
//! one-shot handler on the page driver: the first dialog raised afterwards
//! has its message recorded and is accepted, and the handler unsubscribes
//! itself. Dialogs raised with no handler armed are dismissed by the driver.

use crate::driver::PageDriver;
use crate::result::{ShopError, ShopResult};
use crate::wait::{poll_until, WaitOptions};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// Type of browser dialog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DialogType {
    /// Alert dialog (OK button only)
    Alert,
    /// Confirm dialog (OK/Cancel buttons)
    Confirm,
    /// Prompt dialog (text input + OK/Cancel)
    Prompt,
    /// Before unload dialog
    BeforeUnload,
}

impl DialogType {
    /// Parse the CDP / DOM name of a dialog type
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "confirm" => Self::Confirm,
            "prompt" => Self::Prompt,
            "beforeunload" => Self::BeforeUnload,
            _ => Self::Alert,
        }
    }
}

impl std::fmt::Display for DialogType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Alert => write!(f, "alert"),
            Self::Confirm => write!(f, "confirm"),
            Self::Prompt => write!(f, "prompt"),
            Self::BeforeUnload => write!(f, "beforeunload"),
        }
    }
}

/// Action taken on a dialog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DialogAction {
    /// Accepted (OK)
    Accept,
    /// Dismissed (Cancel)
    Dismiss,
    /// Not yet handled
    Pending,
}

/// A browser dialog as seen by a handler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dialog {
    dialog_type: DialogType,
    message: String,
    action: DialogAction,
}

impl Dialog {
    /// Create a pending dialog
    #[must_use]
    pub fn new(dialog_type: DialogType, message: impl Into<String>) -> Self {
        Self {
            dialog_type,
            message: message.into(),
            action: DialogAction::Pending,
        }
    }

    /// Create an alert dialog
    #[must_use]
    pub fn alert(message: impl Into<String>) -> Self {
        Self::new(DialogType::Alert, message)
    }

    #[must_use]
    pub const fn dialog_type(&self) -> DialogType {
        self.dialog_type
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub const fn action(&self) -> &DialogAction {
        &self.action
    }

    /// Whether a handler decided what to do
    #[must_use]
    pub fn is_handled(&self) -> bool {
        self.action != DialogAction::Pending
    }

    pub fn accept(&mut self) {
        self.action = DialogAction::Accept;
    }

    pub fn dismiss(&mut self) {
        self.action = DialogAction::Dismiss;
    }

    /// Whether the resolved action accepts the dialog
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        matches!(self.action, DialogAction::Accept)
    }
}

/// Handler invoked at most once for the next dialog
pub type DialogHandlerFn = Box<dyn FnOnce(&mut Dialog) + Send>;

/// Resolve a raised dialog against an optional one-shot handler.
///
/// Unhandled dialogs, and handlers that leave the dialog pending, end up
/// dismissed.
pub fn resolve_dialog(mut dialog: Dialog, handler: Option<DialogHandlerFn>) -> Dialog {
    if let Some(handler) = handler {
        handler(&mut dialog);
    }
    if !dialog.is_handled() {
        dialog.dismiss();
    }
    dialog
}

/// One-shot capture of the next dialog's message
#[derive(Debug, Clone, Default)]
pub struct DialogCapture {
    slot: Arc<Mutex<Option<String>>>,
}

impl DialogCapture {
    /// Arm a one-shot accept-and-record handler on the driver
    pub fn arm(driver: &dyn PageDriver) -> Self {
        let capture = Self::default();
        let slot = Arc::clone(&capture.slot);
        driver.once_dialog(Box::new(move |dialog: &mut Dialog| {
            tracing::info!(kind = %dialog.dialog_type(), "Dialog message: {}", dialog.message());
            if let Ok(mut guard) = slot.lock() {
                *guard = Some(dialog.message().to_string());
            }
            dialog.accept();
        }));
        capture
    }

    /// Message captured so far, if any
    #[must_use]
    pub fn message(&self) -> Option<String> {
        self.slot.lock().ok().and_then(|guard| guard.clone())
    }

    /// Wait for the dialog to be raised, returning its message or `None`
    /// if nothing appeared in time
    pub async fn wait(&self, options: &WaitOptions) -> ShopResult<Option<String>> {
        let this = self;
        let outcome = poll_until(
            options,
            move || async move { Ok::<_, ShopError>(this.message()) },
            Option::is_some,
        )
        .await?;
        Ok(match outcome {
            Ok(message) | Err(message) => message,
        })
    }
}
