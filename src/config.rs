//! Configuration management with environment variable support.
//!
//! Every setting has a default and can be overridden from the environment.
//! CLI flags override both.
//!
//! # Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `SCENARIO_REPORT_OUTPUT_DIR` | Run output root | `./test-output` |
//! | `SCENARIO_REPORT_SCREENSHOT_DIR` | Screenshots directory name | `test-screenshots` |
//! | `SCENARIO_REPORT_REPORT_DIR` | Reports directory name | `test-reports` |
//! | `SCENARIO_REPORT_HTML_NAME` | HTML report file name | `test-report.html` |
//! | `SCENARIO_REPORT_NODE` | Node.js executable for the Playwright bridge | `node` |
//! | `SCENARIO_REPORT_NODE_PATH` | `NODE_PATH` handed to the bridge | unset |
//! | `SCENARIO_REPORT_BROWSER` | `chromium`, `firefox` or `webkit` | `chromium` |
//! | `SCENARIO_REPORT_HEADLESS` | Run the browser headless | `true` |
//! | `SCENARIO_REPORT_VIEWPORT` | Viewport preset or `WxH` | `full-hd` |
//! | `SCENARIO_REPORT_ACTION_TIMEOUT` | Browser action timeout (ms) | `10000` |
//! | `SCENARIO_REPORT_SETTLE_DELAY` | Default `pause` duration (ms) | `1000` |
//! | `SUPABASE_URL` | Data store endpoint | unset |
//! | `SUPABASE_ANON_KEY` | Data store anonymous key | unset |
//! | `SCENARIO_REPORT_DATASTORE_TIMEOUT` | Data store request timeout (s) | `15` |
//!
//! # Example
//!
//! ```bash
//! export SCENARIO_REPORT_OUTPUT_DIR=/var/tmp/job-board-run
//! export SCENARIO_REPORT_VIEWPORT=mobile
//! export SCENARIO_REPORT_NODE_PATH="$(npm root -g)"
//! ```

use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;

use crate::browser::{BrowserKind, Viewport};

// ============================================================================
// Default Values
// ============================================================================

pub const DEFAULT_OUTPUT_DIR: &str = "./test-output";
pub const DEFAULT_SCREENSHOT_DIR: &str = crate::layout::DEFAULT_SCREENSHOT_DIR;
pub const DEFAULT_REPORT_DIR: &str = crate::layout::DEFAULT_REPORT_DIR;
pub const DEFAULT_HTML_NAME: &str = crate::report::DEFAULT_HTML_REPORT_NAME;
pub const DEFAULT_NODE: &str = "node";
pub const DEFAULT_VIEWPORT: &str = "full-hd";
pub const DEFAULT_VIEWPORT_WIDTH: u32 = 1920;
pub const DEFAULT_VIEWPORT_HEIGHT: u32 = 1080;

/// Default browser action timeout (milliseconds)
pub const DEFAULT_ACTION_TIMEOUT_MS: u64 = 10_000;

/// Default `pause` duration (milliseconds)
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 1_000;

/// Default data store request timeout (seconds)
pub const DEFAULT_DATASTORE_TIMEOUT: u64 = 15;

// ============================================================================
// Environment Variable Names
// ============================================================================

pub const ENV_OUTPUT_DIR: &str = "SCENARIO_REPORT_OUTPUT_DIR";
pub const ENV_SCREENSHOT_DIR: &str = "SCENARIO_REPORT_SCREENSHOT_DIR";
pub const ENV_REPORT_DIR: &str = "SCENARIO_REPORT_REPORT_DIR";
pub const ENV_HTML_NAME: &str = "SCENARIO_REPORT_HTML_NAME";
pub const ENV_NODE: &str = "SCENARIO_REPORT_NODE";
pub const ENV_NODE_PATH: &str = "SCENARIO_REPORT_NODE_PATH";
pub const ENV_BROWSER: &str = "SCENARIO_REPORT_BROWSER";
pub const ENV_HEADLESS: &str = "SCENARIO_REPORT_HEADLESS";
pub const ENV_VIEWPORT: &str = "SCENARIO_REPORT_VIEWPORT";
pub const ENV_ACTION_TIMEOUT: &str = "SCENARIO_REPORT_ACTION_TIMEOUT";
pub const ENV_SETTLE_DELAY: &str = "SCENARIO_REPORT_SETTLE_DELAY";
pub const ENV_SUPABASE_URL: &str = "SUPABASE_URL";
pub const ENV_SUPABASE_ANON_KEY: &str = "SUPABASE_ANON_KEY";
pub const ENV_DATASTORE_TIMEOUT: &str = "SCENARIO_REPORT_DATASTORE_TIMEOUT";

// ============================================================================
// Configuration Getters (with caching)
// ============================================================================

static CONFIG: OnceLock<Config> = OnceLock::new();

/// Get the global configuration (initialized from environment on first access)
pub fn get() -> &'static Config {
    CONFIG.get_or_init(Config::from_env)
}

#[derive(Debug, Clone)]
pub struct Config {
    pub output: OutputSettings,
    pub browser: BrowserSettings,
    pub datastore: DatastoreSettings,
}

/// Where run artifacts go
#[derive(Debug, Clone)]
pub struct OutputSettings {
    pub root: PathBuf,
    pub screenshot_dir: String,
    pub report_dir: String,
    pub html_name: String,
}

/// Playwright bridge settings
#[derive(Debug, Clone)]
pub struct BrowserSettings {
    pub node: String,
    pub node_path: Option<String>,
    pub browser: BrowserKind,
    pub headless: bool,
    pub viewport: Viewport,
    pub action_timeout_ms: u64,
    pub settle_delay_ms: u64,
}

/// Hosted data store settings
#[derive(Debug, Clone)]
pub struct DatastoreSettings {
    pub url: Option<String>,
    pub anon_key: Option<String>,
    pub timeout_secs: u64,
}

impl Config {
    /// Create configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        Self {
            output: OutputSettings::from_env(),
            browser: BrowserSettings::from_env(),
            datastore: DatastoreSettings::from_env(),
        }
    }

    /// Create configuration with all defaults (ignoring environment)
    pub fn defaults() -> Self {
        Self {
            output: OutputSettings::defaults(),
            browser: BrowserSettings::defaults(),
            datastore: DatastoreSettings::defaults(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

impl OutputSettings {
    pub fn from_env() -> Self {
        Self {
            root: env::var(ENV_OUTPUT_DIR)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            screenshot_dir: env::var(ENV_SCREENSHOT_DIR)
                .unwrap_or_else(|_| DEFAULT_SCREENSHOT_DIR.to_string()),
            report_dir: env::var(ENV_REPORT_DIR).unwrap_or_else(|_| DEFAULT_REPORT_DIR.to_string()),
            html_name: env::var(ENV_HTML_NAME).unwrap_or_else(|_| DEFAULT_HTML_NAME.to_string()),
        }
    }

    pub fn defaults() -> Self {
        Self {
            root: PathBuf::from(DEFAULT_OUTPUT_DIR),
            screenshot_dir: DEFAULT_SCREENSHOT_DIR.to_string(),
            report_dir: DEFAULT_REPORT_DIR.to_string(),
            html_name: DEFAULT_HTML_NAME.to_string(),
        }
    }
}

impl BrowserSettings {
    pub fn from_env() -> Self {
        let viewport = env::var(ENV_VIEWPORT)
            .ok()
            .and_then(|v| parse_viewport(&v))
            .unwrap_or_else(default_viewport);

        Self {
            node: env::var(ENV_NODE).unwrap_or_else(|_| DEFAULT_NODE.to_string()),
            node_path: env::var(ENV_NODE_PATH).ok().filter(|p| !p.is_empty()),
            browser: env::var(ENV_BROWSER)
                .ok()
                .and_then(|b| b.parse().ok())
                .unwrap_or_default(),
            headless: env::var(ENV_HEADLESS)
                .ok()
                .and_then(|h| parse_bool(&h))
                .unwrap_or(true),
            viewport,
            action_timeout_ms: env::var(ENV_ACTION_TIMEOUT)
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_ACTION_TIMEOUT_MS),
            settle_delay_ms: env::var(ENV_SETTLE_DELAY)
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_SETTLE_DELAY_MS),
        }
    }

    pub fn defaults() -> Self {
        Self {
            node: DEFAULT_NODE.to_string(),
            node_path: None,
            browser: BrowserKind::default(),
            headless: true,
            viewport: default_viewport(),
            action_timeout_ms: DEFAULT_ACTION_TIMEOUT_MS,
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
        }
    }
}

impl DatastoreSettings {
    pub fn from_env() -> Self {
        Self {
            url: env::var(ENV_SUPABASE_URL).ok().filter(|u| !u.is_empty()),
            anon_key: env::var(ENV_SUPABASE_ANON_KEY).ok().filter(|k| !k.is_empty()),
            timeout_secs: env::var(ENV_DATASTORE_TIMEOUT)
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_DATASTORE_TIMEOUT),
        }
    }

    pub fn defaults() -> Self {
        Self {
            url: None,
            anon_key: None,
            timeout_secs: DEFAULT_DATASTORE_TIMEOUT,
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn default_viewport() -> Viewport {
    Viewport::new(DEFAULT_VIEWPORT_WIDTH, DEFAULT_VIEWPORT_HEIGHT)
}

/// Parse a viewport string.
/// Supports: "mobile" (390x844), "laptop" (1366x768), "hd" (1280x720),
/// "full-hd" (1920x1080), or "WxH"
pub fn parse_viewport(size: &str) -> Option<Viewport> {
    let (width, height) = match size.trim().to_lowercase().as_str() {
        "mobile" => (390, 844),
        "laptop" => (1366, 768),
        "hd" => (1280, 720),
        "full-hd" | "fullhd" => (1920, 1080),
        custom => {
            let (w, h) = custom.split_once('x')?;
            (w.trim().parse().ok()?, h.trim().parse().ok()?)
        }
    };
    (width > 0 && height > 0).then(|| Viewport::new(width, height))
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
