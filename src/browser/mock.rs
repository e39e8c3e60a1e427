//! Scripted in-memory browser for dry runs and tests.
//!
//! Every selector is visible and every action succeeds unless configured
//! otherwise. Captures render a placeholder image naming the current URL and
//! the last few actions.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use super::{BrowserDriver, BrowserError, BrowserResult, PageOptions, WaitState};
use crate::capture::{CaptureBackend, CaptureError, CaptureResult, CapturedImage, MockFramebuffer};

const BACKGROUND: [u8; 3] = [30, 41, 59];
const HEADER: [u8; 3] = [102, 126, 234];
const TEXT: [u8; 3] = [241, 245, 249];

/// Mock page canvas; full-page captures are twice as tall
const CANVAS_WIDTH: u32 = 480;
const CANVAS_HEIGHT: u32 = 270;

#[derive(Debug, Default)]
pub struct MockBrowser {
    hidden: HashSet<String>,
    texts: HashMap<String, String>,
    failing: HashMap<String, String>,
    fail_captures: bool,
    page: Option<PageOptions>,
    url: Option<String>,
    calls: Vec<String>,
}

impl MockBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `selector` as never visible
    pub fn hide(mut self, selector: impl Into<String>) -> Self {
        self.hidden.insert(selector.into());
        self
    }

    /// Text content returned for `selector`
    pub fn with_text(mut self, selector: impl Into<String>, text: impl Into<String>) -> Self {
        self.texts.insert(selector.into(), text.into());
        self
    }

    /// Make any action on `selector` fail with `message`
    pub fn fail_on(mut self, selector: impl Into<String>, message: impl Into<String>) -> Self {
        self.failing.insert(selector.into(), message.into());
        self
    }

    /// Make every capture fail
    pub fn fail_captures(mut self) -> Self {
        self.fail_captures = true;
        self
    }

    /// Every call made so far, e.g. `"click #submit"`
    pub fn calls(&self) -> &[String] {
        &self.calls
    }

    pub fn is_page_open(&self) -> bool {
        self.page.is_some()
    }

    fn record(&mut self, call: String) {
        self.calls.push(call);
    }

    fn require_page(&self) -> BrowserResult<&PageOptions> {
        self.page.as_ref().ok_or(BrowserError::NoPage)
    }

    fn interact(&mut self, verb: &str, selector: &str) -> BrowserResult<()> {
        self.record(format!("{verb} {selector}"));
        let timeout_ms = self.require_page()?.action_timeout_ms;
        if let Some(message) = self.failing.get(selector) {
            return Err(BrowserError::Action {
                action: format!("{verb} {selector}"),
                message: message.clone(),
            });
        }
        if self.hidden.contains(selector) {
            return Err(BrowserError::Timeout {
                action: format!("{verb} {selector}"),
                timeout_ms,
            });
        }
        Ok(())
    }

    fn render(&self, full_page: bool) -> CaptureResult<Vec<u8>> {
        let height = if full_page { CANVAS_HEIGHT * 2 } else { CANVAS_HEIGHT };
        let mut fb = MockFramebuffer::new(CANVAS_WIDTH, height, BACKGROUND);
        fb.draw_rect(0, 0, CANVAS_WIDTH, 20, HEADER);
        fb.draw_text(6, 6, self.url.as_deref().unwrap_or("about:blank"), TEXT);

        let recent = self.calls.len().saturating_sub(16);
        fb.draw_lines(6, 30, self.calls[recent..].iter().map(String::as_str), TEXT);
        fb.to_png()
    }
}

impl CaptureBackend for MockBrowser {
    fn capture(&mut self, full_page: bool) -> CaptureResult<CapturedImage> {
        self.record(format!("screenshot full_page={full_page}"));
        self.require_page()?;
        if self.fail_captures {
            return Err(CaptureError::Backend("mock capture failure".into()));
        }
        Ok(CapturedImage {
            image_data: self.render(full_page)?,
        })
    }

    fn source_type(&self) -> &str {
        "mock-browser"
    }
}

impl BrowserDriver for MockBrowser {
    fn open_page(&mut self, options: &PageOptions) -> BrowserResult<()> {
        self.record(format!("open page {}", options.viewport));
        self.page = Some(options.clone());
        self.url = None;
        Ok(())
    }

    fn close_page(&mut self) -> BrowserResult<()> {
        self.record("close page".into());
        self.page = None;
        Ok(())
    }

    fn goto(&mut self, url: &str) -> BrowserResult<()> {
        self.record(format!("goto {url}"));
        self.require_page()?;
        self.url = Some(url.to_string());
        Ok(())
    }

    fn reload(&mut self) -> BrowserResult<()> {
        self.record("reload".into());
        self.require_page().map(|_| ())
    }

    fn fill(&mut self, selector: &str, _value: &str) -> BrowserResult<()> {
        self.interact("fill", selector)
    }

    fn click(&mut self, selector: &str) -> BrowserResult<()> {
        self.interact("click", selector)
    }

    fn select_option(&mut self, selector: &str, _value: &str) -> BrowserResult<()> {
        self.interact("select", selector)
    }

    fn check(&mut self, selector: &str) -> BrowserResult<()> {
        self.interact("check", selector)
    }

    fn hover(&mut self, selector: &str) -> BrowserResult<()> {
        self.interact("hover", selector)
    }

    fn wait_for(
        &mut self,
        selector: &str,
        state: WaitState,
        timeout_ms: Option<u64>,
    ) -> BrowserResult<()> {
        self.record(format!("wait for {selector} {}", state.as_str()));
        let timeout_ms = timeout_ms.unwrap_or(self.require_page()?.action_timeout_ms);
        let present = !self.hidden.contains(selector);
        let satisfied = match state {
            WaitState::Visible | WaitState::Attached => present,
            WaitState::Hidden | WaitState::Detached => !present,
        };
        if satisfied {
            Ok(())
        } else {
            Err(BrowserError::Timeout {
                action: format!("wait for {selector} {}", state.as_str()),
                timeout_ms,
            })
        }
    }

    fn pause(&mut self, duration: Duration) -> BrowserResult<()> {
        self.record(format!("pause {}ms", duration.as_millis()));
        Ok(())
    }

    fn is_visible(&mut self, selector: &str, _timeout_ms: u64) -> BrowserResult<bool> {
        self.record(format!("probe {selector}"));
        self.require_page()?;
        Ok(!self.hidden.contains(selector))
    }

    fn expect_text(&mut self, selector: &str, expected: &str) -> BrowserResult<()> {
        self.interact("read text of", selector)?;
        let actual = self.texts.get(selector).map(String::as_str).unwrap_or_default();
        if actual.contains(expected) {
            Ok(())
        } else {
            Err(BrowserError::Assertion(format!(
                "text of {selector} is {actual:?}, expected it to contain {expected:?}"
            )))
        }
    }
}
