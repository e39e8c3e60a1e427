//! Self-contained HTML report: summary counters, features panel, case list
//! and a screenshot gallery with a click-to-enlarge lightbox.

use std::borrow::Cow;
use std::fmt::Write;

use crate::aggregator::RunSummary;
use crate::capture::ScreenshotRecord;
use crate::record::{CaseStatus, TestCaseRecord};

use super::{FeatureGroup, RenderOptions};

const STYLE: &str = r#"
        * { margin: 0; padding: 0; box-sizing: border-box; }
        body {
            font-family: 'Segoe UI', Tahoma, Geneva, Verdana, sans-serif;
            background: linear-gradient(135deg, #667eea 0%, #764ba2 100%);
            padding: 2rem;
            min-height: 100vh;
            color: #1e293b;
        }
        .container {
            max-width: 1600px;
            margin: 0 auto;
            background: white;
            border-radius: 20px;
            padding: 2rem;
            box-shadow: 0 20px 60px rgba(0,0,0,0.3);
        }
        h1 { margin-bottom: 0.5rem; text-align: center; font-size: 2.5rem; }
        h2 { margin-bottom: 1rem; }
        .meta { text-align: center; color: #64748b; margin-bottom: 1.5rem; }
        .summary {
            background: linear-gradient(135deg, #667eea 0%, #764ba2 100%);
            color: white;
            padding: 1.5rem;
            border-radius: 12px;
            margin-bottom: 2rem;
            display: grid;
            grid-template-columns: repeat(auto-fit, minmax(200px, 1fr));
            gap: 1rem;
        }
        .summary-item { text-align: center; }
        .summary-item h3 { font-size: 2rem; margin-bottom: 0.5rem; }
        .features-tested {
            background: #f0f9ff;
            border-radius: 12px;
            padding: 1.5rem;
            margin-bottom: 2rem;
        }
        .features-grid {
            display: grid;
            grid-template-columns: repeat(auto-fit, minmax(250px, 1fr));
            gap: 1rem;
        }
        .feature-item {
            background: white;
            padding: 1rem;
            border-radius: 8px;
            box-shadow: 0 2px 4px rgba(0,0,0,0.1);
        }
        .feature-item h5 { color: #0369a1; margin-bottom: 0.5rem; }
        .feature-item ul { margin-left: 1.2rem; }
        .test-cases { margin-bottom: 2rem; }
        .test-case {
            background: #f8fafc;
            border-radius: 12px;
            padding: 1rem;
            margin-bottom: 1rem;
            border-left: 4px solid #10b981;
        }
        .test-case.failed { border-left-color: #ef4444; background: #fef2f2; }
        .test-case h4 { margin-bottom: 0.5rem; }
        .test-case .error { color: #ef4444; margin-bottom: 0.5rem; }
        .steps { margin-left: 1rem; }
        .step { padding: 0.25rem 0; font-size: 0.9rem; }
        .step.pass { color: #10b981; }
        .step.fail { color: #ef4444; }
        .gallery {
            display: grid;
            grid-template-columns: repeat(auto-fill, minmax(350px, 1fr));
            gap: 1.5rem;
        }
        .screenshot-card {
            background: #f8fafc;
            border-radius: 12px;
            padding: 1rem;
            box-shadow: 0 4px 12px rgba(0,0,0,0.1);
            transition: transform 0.3s ease, box-shadow 0.3s ease;
        }
        .screenshot-card:hover {
            transform: translateY(-5px);
            box-shadow: 0 8px 24px rgba(0,0,0,0.2);
        }
        .screenshot-card img {
            width: 100%;
            border-radius: 8px;
            margin-bottom: 0.75rem;
            cursor: pointer;
        }
        .screenshot-info { font-size: 0.85rem; color: #64748b; margin-bottom: 0.5rem; }
        .screenshot-title { font-weight: 600; color: #334155; font-size: 0.95rem; }
        .screenshot-description { font-size: 0.8rem; color: #64748b; margin-top: 0.5rem; }
        .modal {
            display: none;
            position: fixed;
            z-index: 1000;
            left: 0;
            top: 0;
            width: 100%;
            height: 100%;
            background: rgba(0,0,0,0.9);
            cursor: pointer;
        }
        .modal img {
            display: block;
            margin: auto;
            max-width: 95%;
            max-height: 95%;
            margin-top: 2.5%;
        }
        .modal .close {
            position: absolute;
            top: 20px;
            right: 40px;
            color: white;
            font-size: 40px;
            font-weight: bold;
        }
        #modal-description { color: white; text-align: center; margin-top: 10px; font-size: 1.1rem; }
"#;

// Image paths and descriptions travel through data attributes, never through
// inline script strings.
const SCRIPT: &str = r#"
        const modal = document.getElementById('modal');
        document.querySelectorAll('.screenshot-card img').forEach(function (img) {
            img.addEventListener('click', function () {
                document.getElementById('modal-img').src = img.dataset.full;
                document.getElementById('modal-description').textContent = img.dataset.description || '';
                modal.style.display = 'block';
            });
        });
        modal.addEventListener('click', function () {
            modal.style.display = 'none';
        });
        document.addEventListener('keydown', function (event) {
            if (event.key === 'Escape') {
                modal.style.display = 'none';
            }
        });
"#;

/// Escape text for use in element content and quoted attribute values
pub fn escape_html(raw: &str) -> Cow<'_, str> {
    html_escape::encode_quoted_attribute(raw)
}

/// Gallery title for a screenshot: the slug with dashes shown as spaces
pub fn display_title(name: &str) -> String {
    name.replace('-', " ")
}

pub fn render_html(summary: &RunSummary, options: &RenderOptions) -> String {
    let title = escape_html(&options.title);
    let mut html = String::with_capacity(16 * 1024);

    // Writing into a String cannot fail
    let _ = write!(
        html,
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <style>{STYLE}    </style>
</head>
<body>
    <div class="container">
        <h1>{title}</h1>
        <p class="meta">Generated {generated}{host}</p>
"#,
        generated = options.generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
        host = options
            .host
            .as_deref()
            .map(|h| format!(" on {}", escape_html(h)))
            .unwrap_or_default(),
    );

    write_summary(&mut html, summary);
    if !options.features.is_empty() {
        write_features(&mut html, &options.features);
    }
    write_cases(&mut html, &summary.test_cases);
    write_gallery(&mut html, &summary.screenshots, &options.screenshots_href);

    let _ = write!(
        html,
        r#"    </div>

    <div id="modal" class="modal">
        <span class="close">&times;</span>
        <img id="modal-img" alt="">
        <div id="modal-description"></div>
    </div>

    <script>{SCRIPT}    </script>
</body>
</html>
"#
    );
    html
}

fn write_summary(html: &mut String, summary: &RunSummary) {
    let items = [
        (summary.total_tests.to_string(), "Total Tests"),
        (summary.passed_tests.to_string(), "Passed"),
        (summary.failed_tests.to_string(), "Failed"),
        (summary.screenshots.len().to_string(), "Screenshots"),
    ];
    html.push_str("        <div class=\"summary\">\n");
    for (value, label) in items {
        let _ = writeln!(
            html,
            "            <div class=\"summary-item\"><h3>{value}</h3><p>{label}</p></div>"
        );
    }
    html.push_str("        </div>\n\n");
}

fn write_features(html: &mut String, features: &[FeatureGroup]) {
    html.push_str(
        "        <div class=\"features-tested\">\n            <h2>Features Tested</h2>\n            <div class=\"features-grid\">\n",
    );
    for group in features {
        let _ = writeln!(
            html,
            "                <div class=\"feature-item\">\n                    <h5>{}</h5>\n                    <ul>",
            escape_html(&group.title)
        );
        for item in &group.items {
            let _ = writeln!(html, "                        <li>{}</li>", escape_html(item));
        }
        html.push_str("                    </ul>\n                </div>\n");
    }
    html.push_str("            </div>\n        </div>\n\n");
}

fn write_cases(html: &mut String, cases: &[TestCaseRecord]) {
    html.push_str("        <div class=\"test-cases\">\n            <h2>Test Case Results</h2>\n");
    for case in cases {
        let class = if case.status() == CaseStatus::Fail {
            "test-case failed"
        } else {
            "test-case"
        };
        let _ = writeln!(
            html,
            "            <div class=\"{class}\">\n                <h4>{} - {}</h4>",
            escape_html(case.name()),
            case.status().as_str().to_uppercase()
        );
        if let Some(error) = case.error() {
            let _ = writeln!(
                html,
                "                <p class=\"error\">Error: {}</p>",
                escape_html(error)
            );
        }
        html.push_str("                <div class=\"steps\">\n");
        for step in case.steps() {
            let _ = writeln!(
                html,
                "                    <div class=\"step {}\">{}: {}</div>",
                step.outcome.as_str(),
                escape_html(&step.label),
                escape_html(&step.description)
            );
        }
        html.push_str("                </div>\n            </div>\n");
    }
    html.push_str("        </div>\n\n");
}

fn write_gallery(html: &mut String, screenshots: &[ScreenshotRecord], href: &str) {
    let _ = writeln!(
        html,
        "        <h2>Screenshot Gallery ({} images)</h2>\n        <div class=\"gallery\">",
        screenshots.len()
    );
    let base = href.trim_end_matches('/');
    for shot in screenshots {
        let src = escape_html(&format!("{base}/{}", shot.filename)).into_owned();
        let description = escape_html(&shot.description);
        let _ = writeln!(
            html,
            "            <div class=\"screenshot-card\">\n                <img src=\"{src}\" alt=\"{alt}\" data-full=\"{src}\" data-description=\"{description}\">\n                <div class=\"screenshot-info\">#{id} - {date}</div>\n                <div class=\"screenshot-title\">{title}</div>",
            alt = escape_html(&shot.name),
            id = shot.id,
            date = shot.timestamp.format("%Y-%m-%d"),
            title = escape_html(&display_title(&shot.name)),
        );
        if !shot.description.is_empty() {
            let _ = writeln!(
                html,
                "                <div class=\"screenshot-description\">{description}</div>"
            );
        }
        html.push_str("            </div>\n");
    }
    html.push_str("        </div>\n");
}
