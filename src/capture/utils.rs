use chrono::{DateTime, SubsecRound, Utc};

/// Extension used for every persisted screenshot
pub const SCREENSHOT_EXTENSION: &str = "png";

/// Current time truncated to milliseconds, the precision kept in reports
pub fn capture_timestamp() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Generate a run id in `run_YYYYMMDD_HHMMSS` format
pub fn generate_run_id() -> String {
    format!("run_{}", Utc::now().format("%Y%m%d_%H%M%S"))
}

/// File name for a screenshot: zero-padded id, slug, extension.
///
/// Ids above 999 simply grow wider; uniqueness comes from the id.
pub fn screenshot_filename(id: u32, name: &str) -> String {
    format!("{:03}-{}.{}", id, sanitize_name(name), SCREENSHOT_EXTENSION)
}

/// Sanitize a name for use in filenames
pub fn sanitize_name(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' => c,
            _ => '_',
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("demand-form-filled"), "demand-form-filled");
        assert_eq!(sanitize_name("hello world"), "hello_world");
        assert_eq!(sanitize_name("a/b\\c"), "a_b_c");
        assert_eq!(sanitize_name("  padded "), "padded");
    }

    #[test]
    fn test_screenshot_filename_padding() {
        assert_eq!(screenshot_filename(1, "x"), "001-x.png");
        assert_eq!(screenshot_filename(42, "agent-review"), "042-agent-review.png");
        assert_eq!(screenshot_filename(1234, "y"), "1234-y.png");
    }

    #[test]
    fn test_capture_timestamp_is_millisecond_precise() {
        let ts = capture_timestamp();
        assert_eq!(ts.timestamp_subsec_nanos() % 1_000_000, 0);
    }

    #[test]
    fn test_run_id_format() {
        let id = generate_run_id();
        assert!(id.starts_with("run_"));
        assert_eq!(id.len(), "run_20250101_120000".len());
    }
}
