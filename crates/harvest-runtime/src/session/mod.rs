//! Interactive-session abstraction over the browser engine.
//!
//! Defines the `InteractiveSession` trait the session driver runs against.
//! The production implementation is Chromium via chromiumoxide
//! ([`chromium::ChromiumSession`]); tests substitute scripted mocks.

pub mod chromium;

use async_trait::async_trait;
use harvest_core::FailureKind;
use serde::{Deserialize, Serialize};

/// Selector that addresses the whole rendered document in
/// [`InteractiveSession::read_content`].
pub const DOCUMENT_SELECTOR: &str = "html";

/// A keystroke sent to the focused element of the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionKey {
    /// Literal text typed into the focused field.
    Text(String),
    Enter,
    Tab,
    ArrowDown,
    Backspace,
    /// Select the focused field's entire value (clear-before-type).
    SelectAll,
}

/// One interactive browser session against the remote target.
///
/// Every call is a suspension point and may fail with a timeout or an
/// interaction error; callers decide what a failure means for the workflow.
#[async_trait]
pub trait InteractiveSession: Send {
    /// Navigate the session to `url` and wait for the load to settle.
    async fn navigate(&mut self, url: &str) -> Result<(), SessionError>;

    /// Wait until an element matching `selector` is rendered and visible.
    async fn wait_visible(&mut self, selector: &str, timeout_ms: u64) -> Result<(), SessionError>;

    /// Click the first element matching `selector`.
    async fn click(&mut self, selector: &str) -> Result<(), SessionError>;

    /// Send keystrokes to the currently focused element.
    async fn type_keys(&mut self, keys: &[SessionKey]) -> Result<(), SessionError>;

    /// Read the rendered markup of the first element matching `selector`.
    /// [`DOCUMENT_SELECTOR`] reads the whole document.
    async fn read_content(&mut self, selector: &str) -> Result<String, SessionError>;

    /// Best-effort teardown of the remote session.
    async fn close(&mut self) -> Result<(), SessionError>;
}

/// Failure of a single remote-interaction call.
#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    /// The call exceeded its wait budget.
    #[error("timed out after {waited_ms}ms waiting for {what}")]
    Timeout { what: String, waited_ms: u64 },

    /// The remote call itself errored (element missing, connection lost).
    #[error("interaction failed: {0}")]
    Interaction(String),
}

impl SessionError {
    /// The session-outcome failure kind this error maps to.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::Timeout { .. } => FailureKind::Timeout,
            Self::Interaction(_) => FailureKind::Interaction,
        }
    }
}
