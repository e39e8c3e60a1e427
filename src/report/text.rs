use std::fmt::Write;

use crate::aggregator::RunSummary;

use super::{RenderOptions, ReportPaths};

/// Success rate with one decimal, or `N/A` for a run without tests
pub fn success_rate_label(summary: &RunSummary) -> String {
    match summary.success_rate() {
        Some(rate) => format!("{rate:.1}%"),
        None => "N/A".to_string(),
    }
}

fn banner(out: &mut String, heading: &str) {
    let _ = writeln!(out, "{heading}\n{}", "=".repeat(heading.chars().count()));
}

/// Plain-text summary: counts, per-case results, screenshot list and the
/// locations of every generated artifact.
pub fn render_text(summary: &RunSummary, options: &RenderOptions, paths: &ReportPaths) -> String {
    let mut out = String::new();

    banner(&mut out, &options.title.to_uppercase());
    out.push('\n');
    let _ = writeln!(
        out,
        "Generated: {}",
        options.generated_at.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
    );
    if let Some(host) = &options.host {
        let _ = writeln!(out, "Host: {host}");
    }
    let _ = writeln!(out, "Total Tests: {}", summary.total_tests);
    let _ = writeln!(out, "Passed: {}", summary.passed_tests);
    let _ = writeln!(out, "Failed: {}", summary.failed_tests);
    let unfinished = summary.unfinished_tests();
    if unfinished > 0 {
        let _ = writeln!(out, "Unfinished: {unfinished}");
    }
    let _ = writeln!(out, "Success Rate: {}", success_rate_label(summary));
    let _ = writeln!(out, "Total Screenshots: {}", summary.screenshots.len());

    out.push('\n');
    banner(&mut out, "TEST CASE RESULTS:");
    for case in &summary.test_cases {
        let _ = writeln!(out, "\n{}", case.name());
        let _ = writeln!(out, "Status: {}", case.status().as_str().to_uppercase());
        if let Some(error) = case.error() {
            let _ = writeln!(out, "Error: {error}");
        }
        let _ = writeln!(
            out,
            "Steps Completed: {}/{}",
            case.passed_steps(),
            case.steps().len()
        );
    }

    out.push('\n');
    banner(&mut out, "SCREENSHOTS CAPTURED:");
    out.push('\n');
    for shot in &summary.screenshots {
        let _ = writeln!(out, "{}. {} - {}", shot.id, shot.name, shot.description);
    }

    out.push('\n');
    banner(&mut out, "REPORTS GENERATED:");
    let _ = writeln!(out, "- HTML Report: {}", paths.html.display());
    let _ = writeln!(out, "- JSON Data: {}", paths.json.display());
    let _ = writeln!(out, "- Text Summary: {}", paths.text.display());
    if let Some(dir) = &options.screenshots_dir {
        let _ = writeln!(out, "- Screenshots: {}/", dir.display());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::RunAggregator;
    use crate::capture::{ScreenshotRecord, capture_timestamp};
    use crate::record::StepOutcome;
    use std::path::Path;

    fn five_case_run(passing: usize) -> RunSummary {
        let run = RunAggregator::new();
        for i in 0..5 {
            let mut case = run.begin_case(format!("case {i}"));
            case.record_step("1", "setup", StepOutcome::Pass).unwrap();
            if i < passing {
                case.pass().unwrap();
            } else {
                case.record_step("2", "assertion", StepOutcome::Fail).unwrap();
                case.fail("assertion failed").unwrap();
            }
            run.complete_case(&mut case).unwrap();
        }
        run.snapshot()
    }

    fn paths() -> ReportPaths {
        ReportPaths::in_dir(Path::new("out/test-reports"), "test-report.html")
    }

    #[test]
    fn test_success_rate_label() {
        assert_eq!(success_rate_label(&five_case_run(4)), "80.0%");
        assert_eq!(success_rate_label(&five_case_run(5)), "100.0%");
        assert_eq!(success_rate_label(&RunSummary::default()), "N/A");
    }

    #[test]
    fn test_case_blocks() {
        let text = render_text(&five_case_run(4), &RenderOptions::default(), &paths());

        assert!(text.starts_with("TEST REPORT\n===========\n"));
        assert!(text.contains("Total Tests: 5\nPassed: 4\nFailed: 1\nSuccess Rate: 80.0%"));
        assert!(text.contains("case 0\nStatus: PASS\nSteps Completed: 1/1\n"));
        assert!(text.contains("case 4\nStatus: FAIL\nError: assertion failed\nSteps Completed: 1/2\n"));
        assert!(!text.contains("Unfinished"));
    }

    #[test]
    fn test_screenshot_list_and_artifacts() {
        let run = RunAggregator::new();
        run.record_screenshot(ScreenshotRecord::new(1, "x", "first", false, capture_timestamp()))
            .unwrap();
        run.record_screenshot(ScreenshotRecord::new(2, "y", "", true, capture_timestamp()))
            .unwrap();
        let mut options = RenderOptions::default().with_title("Job Board");
        options.screenshots_dir = Some("out/test-screenshots".into());

        let text = render_text(&run.snapshot(), &options, &paths());
        assert!(text.starts_with("JOB BOARD\n=========\n"));
        assert!(text.contains("1. x - first\n2. y - \n"));
        assert!(text.contains("- JSON Data: out/test-reports/test-results.json"));
        assert!(text.contains("- Screenshots: out/test-screenshots/"));
    }

    #[test]
    fn test_unfinished_cases_are_reported() {
        let mut summary = five_case_run(5);
        summary.total_tests = 6;
        let text = render_text(&summary, &RenderOptions::default(), &paths());
        assert!(text.contains("Unfinished: 1"));
    }
}
