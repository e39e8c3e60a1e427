use criterion::{Criterion, black_box, criterion_group, criterion_main};
use scenario_report::capture::{ScreenshotRecord, capture_timestamp};
use scenario_report::record::StepOutcome;
use scenario_report::report::{RenderOptions, html::render_html, json::render_json};
use scenario_report::{RunAggregator, RunSummary};

/// A run shaped like a large suite: 50 cases, 8 steps each, 200 screenshots
fn large_run() -> RunSummary {
    let run = RunAggregator::new();
    for case_idx in 0..50 {
        let mut case = run.begin_case(format!("Scenario <{case_idx}> & friends"));
        for step in 0..8 {
            case.record_step(
                format!("{case_idx}.{step}"),
                format!("Checkpoint {step} of \"scenario\" {case_idx}"),
                StepOutcome::Pass,
            )
            .unwrap();
        }
        if case_idx % 10 == 0 {
            case.fail("click #submit timed out after 10000ms").unwrap();
        } else {
            case.pass().unwrap();
        }
        run.complete_case(&mut case).unwrap();
    }
    for id in 1..=200 {
        let record = ScreenshotRecord::new(id, "state", "Screen after an action", id % 4 == 0, capture_timestamp());
        run.record_screenshot(record).unwrap();
    }
    run.snapshot()
}

fn benchmark_render(c: &mut Criterion) {
    let summary = large_run();
    let options = RenderOptions::default();

    c.bench_function("render_html", |b| {
        b.iter(|| render_html(black_box(&summary), black_box(&options)))
    });
    c.bench_function("render_json", |b| {
        b.iter(|| render_json(black_box(&summary)).unwrap())
    });
}

criterion_group!(benches, benchmark_render);
criterion_main!(benches);
