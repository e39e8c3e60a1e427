//! Browser collaborator interface.
//!
//! The crate does not automate a browser itself. A [`BrowserDriver`] executes
//! navigation, interaction and waits, and doubles as the [`CaptureBackend`]
//! for screenshots of the open page.
//!
//! Two drivers ship with the crate:
//! - [`PlaywrightDriver`]: a long-lived Node.js bridge process
//! - [`MockBrowser`]: scripted, in-memory, for dry runs and tests

pub mod mock;
pub mod playwright;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::capture::{CaptureBackend, CaptureError};

pub use mock::MockBrowser;
pub use playwright::PlaywrightDriver;

/// Errors reported by a browser collaborator
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("failed to launch browser bridge: {0}")]
    Launch(String),

    #[error("browser bridge disconnected")]
    Disconnected,

    #[error("no page is open")]
    NoPage,

    #[error("{action} timed out after {timeout_ms}ms")]
    Timeout { action: String, timeout_ms: u64 },

    #[error("{action} failed: {message}")]
    Action { action: String, message: String },

    #[error("assertion failed: {0}")]
    Assertion(String),

    #[error("bridge protocol error: {0}")]
    Protocol(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type BrowserResult<T> = Result<T, BrowserError>;

impl From<BrowserError> for CaptureError {
    fn from(err: BrowserError) -> Self {
        CaptureError::Backend(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserKind {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl BrowserKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BrowserKind::Chromium => "chromium",
            BrowserKind::Firefox => "firefox",
            BrowserKind::Webkit => "webkit",
        }
    }
}

impl fmt::Display for BrowserKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BrowserKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "chromium" | "chrome" => Ok(BrowserKind::Chromium),
            "firefox" => Ok(BrowserKind::Firefox),
            "webkit" | "safari" => Ok(BrowserKind::Webkit),
            other => Err(format!("unknown browser '{other}'")),
        }
    }
}

/// How the collaborator answers `alert`/`confirm`/`prompt` dialogs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialogPolicy {
    #[default]
    Accept,
    Dismiss,
}

/// Selector state to wait for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitState {
    #[default]
    Visible,
    Hidden,
    Attached,
    Detached,
}

impl WaitState {
    pub fn as_str(self) -> &'static str {
        match self {
            WaitState::Visible => "visible",
            WaitState::Hidden => "hidden",
            WaitState::Attached => "attached",
            WaitState::Detached => "detached",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Viewport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Settings for a freshly opened page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageOptions {
    pub viewport: Viewport,
    pub dialogs: DialogPolicy,
    /// Default timeout for every action on the page
    pub action_timeout_ms: u64,
}

/// Browser automation collaborator.
///
/// Every method acts on the page opened by the last `open_page`. Methods
/// with a `timeout_ms` of `None` use the page's action timeout.
pub trait BrowserDriver: CaptureBackend {
    fn open_page(&mut self, options: &PageOptions) -> BrowserResult<()>;

    fn close_page(&mut self) -> BrowserResult<()>;

    /// Navigate and wait for the load event
    fn goto(&mut self, url: &str) -> BrowserResult<()>;

    fn reload(&mut self) -> BrowserResult<()>;

    fn fill(&mut self, selector: &str, value: &str) -> BrowserResult<()>;

    fn click(&mut self, selector: &str) -> BrowserResult<()>;

    fn select_option(&mut self, selector: &str, value: &str) -> BrowserResult<()>;

    fn check(&mut self, selector: &str) -> BrowserResult<()>;

    fn hover(&mut self, selector: &str) -> BrowserResult<()>;

    fn wait_for(&mut self, selector: &str, state: WaitState, timeout_ms: Option<u64>)
    -> BrowserResult<()>;

    /// Fixed delay. Prefer [`wait_for`](Self::wait_for).
    fn pause(&mut self, duration: Duration) -> BrowserResult<()> {
        std::thread::sleep(duration);
        Ok(())
    }

    /// Whether `selector` becomes visible within `timeout_ms`. Not finding it
    /// is `Ok(false)`, not an error.
    fn is_visible(&mut self, selector: &str, timeout_ms: u64) -> BrowserResult<bool>;

    /// Fail with [`BrowserError::Assertion`] unless the text of `selector`
    /// contains `expected`
    fn expect_text(&mut self, selector: &str, expected: &str) -> BrowserResult<()>;
}
