use crate::aggregator::RunSummary;

use super::ReportResult;

/// Pretty-printed summary with 2-space indentation. Field order follows the
/// struct definitions, so identical input always yields identical bytes.
pub fn render_json(summary: &RunSummary) -> ReportResult<String> {
    Ok(serde_json::to_string_pretty(summary)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::RunAggregator;
    use crate::capture::ScreenshotRecord;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_json_shape_and_round_trip() {
        let run = RunAggregator::new();
        let mut case = run.begin_case("Deal Deletion Flow");
        case.record_step("1", "Deal deleted", crate::record::StepOutcome::Pass)
            .unwrap();
        case.pass().unwrap();
        run.complete_case(&mut case).unwrap();
        let at = Utc.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap();
        run.record_screenshot(ScreenshotRecord::new(1, "deal-deleted", "After delete", false, at))
            .unwrap();
        let summary = run.snapshot();

        let json = render_json(&summary).unwrap();
        let expected = r#"{
  "totalTests": 1,
  "passedTests": 1,
  "failedTests": 0,
  "screenshots": [
    {
      "id": 1,
      "name": "deal-deleted",
      "filename": "001-deal-deleted.png",
      "description": "After delete",
      "timestamp": "2025-03-14T09:26:53.000Z",
      "fullPage": false
    }
  ],
  "testCases": [
    {
      "name": "Deal Deletion Flow",
      "steps": [
        {
          "step": "1",
          "description": "Deal deleted",
          "status": "pass"
        }
      ],
      "status": "pass"
    }
  ]
}"#;
        assert_eq!(json, expected);
        assert_eq!(RunSummary::from_json(&json).unwrap(), summary);
    }

    #[test]
    fn test_empty_run() {
        let json = render_json(&RunSummary::default()).unwrap();
        let back = RunSummary::from_json(&json).unwrap();
        assert_eq!(back.total_tests, 0);
        assert!(back.screenshots.is_empty());
    }
}
