pub mod backend;
pub mod recorder;
pub mod types;
pub mod utils;

pub use backend::{CaptureBackend, CapturedImage, MockFramebuffer};
pub use recorder::ScreenshotRecorder;
pub use types::{CaptureError, CaptureResult, ScreenshotRecord};
pub use utils::{SCREENSHOT_EXTENSION, capture_timestamp, generate_run_id, sanitize_name, screenshot_filename};
