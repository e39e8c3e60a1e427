//! Playwright driver backed by a long-lived Node.js bridge process.
//!
//! The bridge (`bridge.js`, embedded at compile time) is started with
//! `node -e` and speaks newline-delimited JSON: one request per line on
//! stdin, one reply per request on stdout, plus unsolicited event lines for
//! dialogs and page errors. A reader thread forwards replies over a channel
//! and logs events as they arrive.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use super::{BrowserDriver, BrowserError, BrowserKind, BrowserResult, DialogPolicy, PageOptions, WaitState};
use crate::capture::{CaptureBackend, CaptureResult, CapturedImage};
use crate::config::BrowserSettings;

const BRIDGE_SCRIPT: &str = include_str!("bridge.js");

/// Browser startup can include a first-run download check
const LAUNCH_TIMEOUT_MS: u64 = 60_000;

/// Extra time on top of the action timeout before the bridge is considered hung
const REPLY_GRACE_MS: u64 = 5_000;

const SHUTDOWN_WAIT: Duration = Duration::from_secs(3);

#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Request<'a> {
    Launch {
        browser: BrowserKind,
        headless: bool,
    },
    OpenPage {
        width: u32,
        height: u32,
        dialogs: DialogPolicy,
        timeout: u64,
    },
    ClosePage,
    Goto {
        url: &'a str,
    },
    Reload,
    Fill {
        selector: &'a str,
        value: &'a str,
    },
    Click {
        selector: &'a str,
    },
    Select {
        selector: &'a str,
        value: &'a str,
    },
    Check {
        selector: &'a str,
    },
    Hover {
        selector: &'a str,
    },
    WaitFor {
        selector: &'a str,
        state: WaitState,
        #[serde(skip_serializing_if = "Option::is_none")]
        timeout: Option<u64>,
    },
    IsVisible {
        selector: &'a str,
        timeout: u64,
    },
    TextContent {
        selector: &'a str,
    },
    Screenshot {
        full_page: bool,
    },
    Shutdown,
}

#[derive(Debug, Serialize)]
struct Envelope<'a> {
    id: u64,
    #[serde(flatten)]
    request: Request<'a>,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(untagged)]
enum BridgeMessage {
    Event {
        event: String,
        #[serde(default, rename = "type")]
        kind: Option<String>,
        #[serde(default)]
        message: Option<String>,
    },
    Reply {
        id: u64,
        ok: bool,
        #[serde(default)]
        result: Value,
        #[serde(default)]
        error: Option<String>,
        #[serde(default)]
        timeout: bool,
    },
}

#[derive(Debug)]
struct Reply {
    id: u64,
    ok: bool,
    result: Value,
    error: Option<String>,
    timeout: bool,
}

fn log_event(event: &str, kind: Option<&str>, message: Option<&str>) {
    let message = message.unwrap_or_default();
    match event {
        "ready" => debug!("Playwright bridge ready"),
        "dialog" => info!(kind = kind.unwrap_or("dialog"), "Dialog: {message}"),
        "page_error" => warn!("Page error: {message}"),
        "fatal" => error!("Playwright bridge: {message}"),
        other => warn!("Bridge event {other}: {message}"),
    }
}

/// Playwright-backed [`BrowserDriver`]
pub struct PlaywrightDriver {
    child: Child,
    stdin: ChildStdin,
    replies: Receiver<Reply>,
    next_id: u64,
    action_timeout_ms: u64,
    browser_version: String,
}

impl PlaywrightDriver {
    /// Start the bridge and launch the configured browser
    pub fn launch(settings: &BrowserSettings) -> BrowserResult<Self> {
        let mut cmd = Command::new(&settings.node);
        cmd.arg("-e")
            .arg(BRIDGE_SCRIPT)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(node_path) = &settings.node_path {
            cmd.env("NODE_PATH", node_path);
        }
        // Keep terminal SIGINT away from the bridge; Drop shuts it down
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| BrowserError::Launch(format!("cannot start {}: {e}", settings.node)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| BrowserError::Launch("bridge stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| BrowserError::Launch("bridge stdout unavailable".into()))?;

        if let Some(stderr) = child.stderr.take() {
            thread::spawn(move || {
                for line in BufReader::new(stderr).lines().map_while(Result::ok) {
                    debug!(target: "playwright_bridge", "{line}");
                }
            });
        }

        let (tx, replies) = mpsc::channel();
        thread::spawn(move || {
            for line in BufReader::new(stdout).lines().map_while(Result::ok) {
                match serde_json::from_str::<BridgeMessage>(&line) {
                    Ok(BridgeMessage::Event { event, kind, message }) => {
                        log_event(&event, kind.as_deref(), message.as_deref());
                    }
                    Ok(BridgeMessage::Reply { id, ok, result, error, timeout }) => {
                        let reply = Reply { id, ok, result, error, timeout };
                        if tx.send(reply).is_err() {
                            break;
                        }
                    }
                    Err(err) => warn!("Unparseable bridge output ({err}): {line}"),
                }
            }
        });

        let mut driver = Self {
            child,
            stdin,
            replies,
            next_id: 0,
            action_timeout_ms: settings.action_timeout_ms,
            browser_version: String::new(),
        };

        let launched = driver.call(
            "launch",
            Request::Launch {
                browser: settings.browser,
                headless: settings.headless,
            },
            LAUNCH_TIMEOUT_MS,
        );
        let version = match launched {
            Ok(version) => version,
            Err(BrowserError::Disconnected) => {
                return Err(BrowserError::Launch(
                    "bridge exited during startup (is the playwright package installed?)".into(),
                ));
            }
            Err(err) => return Err(BrowserError::Launch(err.to_string())),
        };
        driver.browser_version = version.as_str().unwrap_or_default().to_string();
        info!(
            browser = %settings.browser,
            headless = settings.headless,
            "Launched {} {}",
            settings.browser,
            driver.browser_version
        );
        Ok(driver)
    }

    pub fn browser_version(&self) -> &str {
        &self.browser_version
    }

    fn call(&mut self, action: &str, request: Request<'_>, timeout_ms: u64) -> BrowserResult<Value> {
        self.next_id += 1;
        let id = self.next_id;
        let line = serde_json::to_string(&Envelope { id, request })
            .map_err(|e| BrowserError::Protocol(e.to_string()))?;
        debug!(id, "-> {action}");

        writeln!(self.stdin, "{line}")
            .and_then(|()| self.stdin.flush())
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::BrokenPipe => BrowserError::Disconnected,
                _ => BrowserError::Io(e),
            })?;

        let deadline = Instant::now() + Duration::from_millis(timeout_ms + REPLY_GRACE_MS);
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.replies.recv_timeout(remaining) {
                // Late answers to calls that already timed out
                Ok(reply) if reply.id != id => {
                    debug!(id = reply.id, "Discarding stale bridge reply");
                }
                Ok(reply) if reply.ok => {
                    debug!(id, "<- {action} ok");
                    return Ok(reply.result);
                }
                Ok(reply) => {
                    let message = reply.error.unwrap_or_else(|| "unknown error".into());
                    return Err(if reply.timeout {
                        BrowserError::Timeout {
                            action: action.to_string(),
                            timeout_ms,
                        }
                    } else {
                        BrowserError::Action {
                            action: action.to_string(),
                            message,
                        }
                    });
                }
                Err(RecvTimeoutError::Timeout) => {
                    return Err(BrowserError::Timeout {
                        action: action.to_string(),
                        timeout_ms,
                    });
                }
                Err(RecvTimeoutError::Disconnected) => return Err(BrowserError::Disconnected),
            }
        }
    }

    fn act(&mut self, action: &str, request: Request<'_>) -> BrowserResult<()> {
        let timeout = self.action_timeout_ms;
        self.call(action, request, timeout).map(|_| ())
    }
}

impl CaptureBackend for PlaywrightDriver {
    fn capture(&mut self, full_page: bool) -> CaptureResult<CapturedImage> {
        let timeout = self.action_timeout_ms;
        let encoded = self.call("screenshot", Request::Screenshot { full_page }, timeout)?;
        let encoded = encoded.as_str().ok_or_else(|| {
            BrowserError::Protocol("screenshot reply is not a base64 string".into())
        })?;
        let image_data = BASE64
            .decode(encoded)
            .map_err(|e| BrowserError::Protocol(format!("invalid screenshot data: {e}")))?;
        Ok(CapturedImage { image_data })
    }

    fn source_type(&self) -> &str {
        "playwright"
    }
}

impl BrowserDriver for PlaywrightDriver {
    fn open_page(&mut self, options: &PageOptions) -> BrowserResult<()> {
        self.action_timeout_ms = options.action_timeout_ms;
        self.act(
            "open page",
            Request::OpenPage {
                width: options.viewport.width,
                height: options.viewport.height,
                dialogs: options.dialogs,
                timeout: options.action_timeout_ms,
            },
        )
    }

    fn close_page(&mut self) -> BrowserResult<()> {
        self.act("close page", Request::ClosePage)
    }

    fn goto(&mut self, url: &str) -> BrowserResult<()> {
        self.act("goto", Request::Goto { url })
    }

    fn reload(&mut self) -> BrowserResult<()> {
        self.act("reload", Request::Reload)
    }

    fn fill(&mut self, selector: &str, value: &str) -> BrowserResult<()> {
        self.act(&format!("fill {selector}"), Request::Fill { selector, value })
    }

    fn click(&mut self, selector: &str) -> BrowserResult<()> {
        self.act(&format!("click {selector}"), Request::Click { selector })
    }

    fn select_option(&mut self, selector: &str, value: &str) -> BrowserResult<()> {
        self.act(&format!("select {selector}"), Request::Select { selector, value })
    }

    fn check(&mut self, selector: &str) -> BrowserResult<()> {
        self.act(&format!("check {selector}"), Request::Check { selector })
    }

    fn hover(&mut self, selector: &str) -> BrowserResult<()> {
        self.act(&format!("hover {selector}"), Request::Hover { selector })
    }

    fn wait_for(
        &mut self,
        selector: &str,
        state: WaitState,
        timeout_ms: Option<u64>,
    ) -> BrowserResult<()> {
        let timeout = timeout_ms.unwrap_or(self.action_timeout_ms);
        self.call(
            &format!("wait for {selector} {}", state.as_str()),
            Request::WaitFor {
                selector,
                state,
                timeout: timeout_ms,
            },
            timeout,
        )
        .map(|_| ())
    }

    fn is_visible(&mut self, selector: &str, timeout_ms: u64) -> BrowserResult<bool> {
        let visible = self.call(
            &format!("probe {selector}"),
            Request::IsVisible {
                selector,
                timeout: timeout_ms,
            },
            timeout_ms,
        )?;
        Ok(visible.as_bool().unwrap_or(false))
    }

    fn expect_text(&mut self, selector: &str, expected: &str) -> BrowserResult<()> {
        let timeout = self.action_timeout_ms;
        let text = self.call(
            &format!("read text of {selector}"),
            Request::TextContent { selector },
            timeout,
        )?;
        let actual = text.as_str().unwrap_or_default();
        if actual.contains(expected) {
            Ok(())
        } else {
            Err(BrowserError::Assertion(format!(
                "text of {selector} is {actual:?}, expected it to contain {expected:?}"
            )))
        }
    }
}

impl Drop for PlaywrightDriver {
    fn drop(&mut self) {
        self.next_id += 1;
        let shutdown = Envelope {
            id: self.next_id,
            request: Request::Shutdown,
        };
        if let Ok(line) = serde_json::to_string(&shutdown) {
            let _ = writeln!(self.stdin, "{line}").and_then(|()| self.stdin.flush());
        }

        let deadline = Instant::now() + SHUTDOWN_WAIT;
        while Instant::now() < deadline {
            match self.child.try_wait() {
                Ok(Some(_)) => return,
                Ok(None) => thread::sleep(Duration::from_millis(50)),
                Err(_) => break,
            }
        }
        warn!("Playwright bridge did not exit, killing it");
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_format() {
        let line = serde_json::to_value(Envelope {
            id: 7,
            request: Request::WaitFor {
                selector: "#deal-card",
                state: WaitState::Detached,
                timeout: None,
            },
        })
        .unwrap();
        assert_eq!(
            line,
            serde_json::json!({ "id": 7, "op": "wait_for", "selector": "#deal-card", "state": "detached" })
        );

        let open = serde_json::to_value(Envelope {
            id: 1,
            request: Request::OpenPage {
                width: 390,
                height: 844,
                dialogs: DialogPolicy::Accept,
                timeout: 10_000,
            },
        })
        .unwrap();
        assert_eq!(open["op"], "open_page");
        assert_eq!(open["dialogs"], "accept");

        let close = serde_json::to_value(Envelope { id: 2, request: Request::ClosePage }).unwrap();
        assert_eq!(close, serde_json::json!({ "id": 2, "op": "close_page" }));
    }

    #[test]
    fn test_bridge_message_parsing() {
        let event: BridgeMessage =
            serde_json::from_str(r#"{"event":"dialog","type":"confirm","message":"Delete deal?"}"#)
                .unwrap();
        assert_eq!(
            event,
            BridgeMessage::Event {
                event: "dialog".into(),
                kind: Some("confirm".into()),
                message: Some("Delete deal?".into()),
            }
        );

        let reply: BridgeMessage =
            serde_json::from_str(r#"{"id":3,"ok":false,"error":"Timeout 500ms exceeded","timeout":true}"#)
                .unwrap();
        assert!(matches!(reply, BridgeMessage::Reply { id: 3, ok: false, timeout: true, .. }));

        let ok: BridgeMessage = serde_json::from_str(r#"{"id":4,"ok":true,"result":true}"#).unwrap();
        assert!(matches!(ok, BridgeMessage::Reply { result: Value::Bool(true), .. }));
    }

    #[test]
    fn test_bridge_script_handles_every_op() {
        for op in [
            "launch", "open_page", "close_page", "goto", "reload", "fill", "click", "select",
            "check", "hover", "wait_for", "is_visible", "text_content", "screenshot", "shutdown",
        ] {
            assert!(BRIDGE_SCRIPT.contains(&format!("async {op}(")), "bridge lacks {op}");
        }
    }

    #[test]
    fn test_missing_node_is_a_launch_error() {
        let mut settings = BrowserSettings::defaults();
        settings.node = "/nonexistent/node-binary".into();
        assert!(matches!(
            PlaywrightDriver::launch(&settings),
            Err(BrowserError::Launch(_))
        ));
    }
}
