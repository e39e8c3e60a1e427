use clap::{Parser, Subcommand, ValueEnum};
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use tracing::{info, warn};

use scenario_report::browser::{BrowserDriver, MockBrowser, PlaywrightDriver};
use scenario_report::config::{self, ENV_SUPABASE_ANON_KEY, ENV_SUPABASE_URL, parse_viewport};
use scenario_report::datastore::{DatastoreClient, run_connectivity_check};
use scenario_report::harness::{RunnerSettings, Suite, SuiteRunner};
use scenario_report::layout::{OutputLayout, host_name};
use scenario_report::report::{RenderOptions, RenderOutcome, ReportRenderer};
use scenario_report::{RunAggregator, RunSummary, ScreenshotRecorder};

/// scenario-report - run browser scenarios and render screenshot reports
#[derive(Parser, Debug)]
#[command(
    name = "scenario-report",
    about = "Run browser test scenarios and render HTML/JSON/text reports with screenshot galleries",
    after_help = "ENVIRONMENT VARIABLES:\n\
        SCENARIO_REPORT_OUTPUT_DIR      Run output root (default ./test-output)\n\
        SCENARIO_REPORT_HTML_NAME       HTML report file name\n\
        SCENARIO_REPORT_NODE            Node.js executable for the Playwright bridge\n\
        SCENARIO_REPORT_NODE_PATH       NODE_PATH for resolving the playwright package\n\
        SCENARIO_REPORT_BROWSER         chromium, firefox or webkit\n\
        SCENARIO_REPORT_VIEWPORT        Viewport preset or WxH\n\
        SCENARIO_REPORT_ACTION_TIMEOUT  Browser action timeout (ms)\n\
        SUPABASE_URL, SUPABASE_ANON_KEY Data store endpoint and key\n\
        RUST_LOG                        Log filter (default info)"
)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a scenario suite, then render the reports
    Run {
        /// Suite file (JSON)
        suite: PathBuf,

        /// Output root (default: SCENARIO_REPORT_OUTPUT_DIR or ./test-output)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Browser collaborator
        #[arg(long, value_enum, default_value = "playwright")]
        driver: DriverKind,

        /// Remove screenshots left by a previous run first
        #[arg(long)]
        clean: bool,

        /// Show the browser window
        #[arg(long)]
        headed: bool,

        /// Viewport preset (mobile, laptop, hd, full-hd) or WxH; overrides the suite
        #[arg(long, short = 's')]
        viewport: Option<String>,

        /// Print the run summary as JSON on stdout
        #[arg(long)]
        json: bool,
    },

    /// Re-render reports from an existing test-results.json
    Render {
        /// Output root holding the reports directory
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Report title
        #[arg(long)]
        title: Option<String>,

        /// HTML report file name
        #[arg(long)]
        html_name: Option<String>,
    },

    /// Check connectivity to the hosted data store
    DatastoreCheck {
        /// Data store URL
        #[arg(long, env = ENV_SUPABASE_URL)]
        url: Option<String>,

        /// Anonymous API key
        #[arg(long, env = ENV_SUPABASE_ANON_KEY, hide_env_values = true)]
        key: Option<String>,

        /// Print the check report as JSON on stdout
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum DriverKind {
    Playwright,
    Mock,
}

fn main() -> Result<ExitCode, Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = config::get();

    match args.command {
        Commands::Run {
            suite,
            output,
            driver,
            clean,
            headed,
            viewport,
            json,
        } => {
            let mut suite = Suite::load(&suite)?;

            let mut output_settings = config.output.clone();
            if let Some(root) = output {
                output_settings.root = root;
            }
            let layout = OutputLayout::from_settings(&output_settings);
            layout.init()?;
            if clean {
                let removed = layout.clean_screenshots()?;
                info!("Removed {removed} stale screenshot(s)");
            }

            let mut browser_settings = config.browser.clone();
            if headed {
                browser_settings.headless = false;
            }
            if let Some(raw) = viewport {
                browser_settings.viewport = parse_viewport(&raw).ok_or_else(|| {
                    format!("Invalid viewport '{raw}'. Use: mobile, laptop, hd, full-hd, or WxH")
                })?;
                // The flag wins over the suite's own viewport
                suite.viewport = Some(raw);
            }
            let runner_settings = RunnerSettings::from_browser_settings(&browser_settings);

            let cancel = Arc::new(AtomicBool::new(false));
            signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&cancel))?;

            let run = Arc::new(RunAggregator::new());
            let recorder = ScreenshotRecorder::new(layout.screenshots_dir(), Arc::clone(&run));

            let mut browser: Box<dyn BrowserDriver> = match driver {
                DriverKind::Playwright => Box::new(PlaywrightDriver::launch(&browser_settings)?),
                DriverKind::Mock => Box::new(MockBrowser::new()),
            };
            let outcome = SuiteRunner::new(browser.as_mut(), &recorder, runner_settings)
                .with_cancel_flag(Arc::clone(&cancel))
                .run_suite(&suite);
            drop(browser);

            // Reports are rendered even when the run was cut short
            let summary = run.snapshot();
            let html_name = suite
                .html_report
                .clone()
                .unwrap_or_else(|| output_settings.html_name.clone());
            let mut options = RenderOptions::for_layout(&layout)
                .with_title(suite.title())
                .with_html_file_name(html_name)
                .with_features(suite.features.clone());
            if let Some(host) = host_name() {
                options = options.with_host(host);
            }
            let rendered = ReportRenderer::new(options).render(&summary, &layout.reports_dir());

            let outcome = outcome?;
            if json {
                let value = serde_json::json!({
                    "run_id": layout.run_id,
                    "outcome": outcome,
                    "summary": summary,
                });
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                print_run_summary(&summary, &rendered);
                if outcome.cancelled {
                    println!("Run cancelled: {} scenario(s) skipped", outcome.skipped);
                }
            }

            let clean_run = summary.failed_tests == 0 && !outcome.cancelled && rendered.is_complete();
            Ok(if clean_run { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }

        Commands::Render {
            output,
            title,
            html_name,
        } => {
            let mut output_settings = config.output.clone();
            if let Some(root) = output {
                output_settings.root = root;
            }
            let layout = OutputLayout::from_settings(&output_settings);
            let results = layout.results_json_path();
            let summary = RunSummary::load(&results)
                .map_err(|e| format!("Cannot load {}: {e}", results.display()))?;

            let mut options = RenderOptions::for_layout(&layout)
                .with_html_file_name(html_name.unwrap_or(output_settings.html_name));
            if let Some(title) = title {
                options = options.with_title(title);
            }
            if let Some(host) = host_name() {
                options = options.with_host(host);
            }
            let rendered = ReportRenderer::new(options).render(&summary, &layout.reports_dir());
            print_run_summary(&summary, &rendered);
            Ok(if rendered.is_complete() { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }

        Commands::DatastoreCheck { url, key, json } => {
            let mut settings = config.datastore.clone();
            if url.is_some() {
                settings.url = url;
            }
            if key.is_some() {
                settings.anon_key = key;
            }
            let client = DatastoreClient::from_settings(&settings)?;
            let report = run_connectivity_check(&client);

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("Data store: {}", report.endpoint);
                for check in &report.checks {
                    match (&check.error, &check.detail) {
                        (Some(error), _) => println!("  [FAIL] {}: {error}", check.name),
                        (None, Some(detail)) => println!(
                            "  [ok]   {}: {} records, {detail}",
                            check.name,
                            check.records.unwrap_or(0)
                        ),
                        (None, None) => println!(
                            "  [ok]   {}: {} records",
                            check.name,
                            check.records.unwrap_or(0)
                        ),
                    }
                }
            }
            if !report.all_ok() {
                warn!("{} data store check(s) failed", report.failures());
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn print_run_summary(summary: &RunSummary, rendered: &RenderOutcome) {
    println!(
        "Tests: {} total, {} passed, {} failed | Screenshots: {}",
        summary.total_tests,
        summary.passed_tests,
        summary.failed_tests,
        summary.screenshots.len()
    );
    let artifacts = [
        ("HTML Report", &rendered.html),
        ("JSON Data", &rendered.json),
        ("Text Summary", &rendered.text),
    ];
    for (label, result) in artifacts {
        match result {
            Ok(path) => println!("  {label}: {}", path.display()),
            Err(err) => println!("  {label}: not written ({err})"),
        }
    }
}
