// SPDX-License-Identifier: MIT OR Apache-2.0
//! Output formatting for the Holon CLI.

use holon_core::{Outcome, PublishResult};
use holon_runner::RunReport;

/// Multi-line human rendering of a finished run.
pub fn render_run_report(report: &RunReport) -> String {
    let outcome = match report.manifest.outcome {
        Outcome::Success => "success",
        Outcome::Failure => "failure",
    };
    let mut out = String::new();
    out.push_str(&format!("outcome:   {outcome}\n"));
    out.push_str(&format!("duration:  {}\n", report.manifest.duration));
    if let Some(code) = report.exit_code {
        out.push_str(&format!("exit code: {code}\n"));
    }
    if !report.manifest.artifacts.is_empty() {
        out.push_str(&format!(
            "artifacts: {}\n",
            report.manifest.artifacts.join(", ")
        ));
    }
    out.push_str(&format!("output:    {}\n", report.output_dir.display()));
    out
}

/// Multi-line human rendering of a publish result.
pub fn render_publish_result(result: &PublishResult) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "provider:  {} -> {}\n",
        result.provider, result.target
    ));
    for action in &result.actions {
        out.push_str(&format!(
            "  {:<16} {}\n",
            format!("{:?}", action.action_type),
            action.description
        ));
    }
    for error in &result.errors {
        out.push_str(&format!("  error: {error}\n"));
    }
    out.push_str(&format!(
        "result:    {}\n",
        if result.success { "ok" } else { "failed" }
    ));
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
