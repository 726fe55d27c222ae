//! Output formatting: table, JSON, YAML, plain.
//!
//! Renders data in the format selected by `--output`. Table uses `tabled`,
//! structured formats use serde, plain emits one identifier per line.
//! Batch results additionally get per-deviation detail lines and a
//! colored fleet summary.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use tabled::{settings::Style, Table, Tabled};

use hvac_core::{ActionOutcome, BatchResult, DeviceReport, DeviceStatus};

use crate::cli::{ColorMode, OutputFormat};

// ── Color helpers ────────────────────────────────────────────────────

/// Determine whether color output should be enabled.
pub fn should_color(mode: &ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render a list of serde-serializable + tabled items in the chosen format.
pub fn render_list<T, R>(
    format: &OutputFormat,
    data: &[T],
    to_row: impl Fn(&T) -> R,
    id_fn: impl Fn(&T) -> String,
) -> String
where
    T: serde::Serialize,
    R: Tabled,
{
    match format {
        OutputFormat::Table => {
            let rows: Vec<R> = data.iter().map(to_row).collect();
            render_table(&rows)
        }
        OutputFormat::Json => render_json(data, false),
        OutputFormat::JsonCompact => render_json(data, true),
        OutputFormat::Yaml => render_yaml(data),
        OutputFormat::Plain => data.iter().map(&id_fn).collect::<Vec<_>>().join("\n"),
    }
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

// ── Batch rendering ──────────────────────────────────────────────────

#[derive(Tabled)]
struct BatchRow {
    #[tabled(rename = "Device")]
    device: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Deviations")]
    deviations: String,
    #[tabled(rename = "Actions")]
    actions: String,
}

impl From<&DeviceReport> for BatchRow {
    fn from(report: &DeviceReport) -> Self {
        Self {
            device: report.device.to_string(),
            status: status_label(&report.status).to_owned(),
            deviations: if report.deviations.is_empty() {
                "-".into()
            } else {
                report
                    .deviations
                    .iter()
                    .map(|d| d.key.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            },
            actions: action_tally(report),
        }
    }
}

fn status_label(status: &DeviceStatus) -> &'static str {
    match status {
        DeviceStatus::Stable => "stable",
        DeviceStatus::Deviating => "deviating",
        DeviceStatus::Fixed => "fixed",
        DeviceStatus::Failed { .. } => "failed",
        DeviceStatus::SkippedCancelled => "skipped-cancelled",
    }
}

/// Compact per-device action tally: "2 applied", "1 simulated, 1 failed".
fn action_tally(report: &DeviceReport) -> String {
    if report.actions.is_empty() {
        return "-".into();
    }
    let mut applied = 0;
    let mut simulated = 0;
    let mut skipped = 0;
    let mut failed = 0;
    for result in &report.actions {
        match result.outcome {
            ActionOutcome::Applied => applied += 1,
            ActionOutcome::SkippedDryRun => simulated += 1,
            ActionOutcome::SkippedCancelled => skipped += 1,
            ActionOutcome::Failed { .. } => failed += 1,
        }
    }
    let mut parts = Vec::new();
    if applied > 0 {
        parts.push(format!("{applied} applied"));
    }
    if simulated > 0 {
        parts.push(format!("{simulated} simulated"));
    }
    if skipped > 0 {
        parts.push(format!("{skipped} skipped"));
    }
    if failed > 0 {
        parts.push(format!("{failed} failed"));
    }
    parts.join(", ")
}

/// Render a batch result in the chosen format.
///
/// Table output is the per-device table followed by detail lines for
/// every deviation and device failure; structured formats serialize the
/// whole result.
pub fn render_batch(format: &OutputFormat, result: &BatchResult) -> String {
    match format {
        OutputFormat::Table => {
            let rows: Vec<BatchRow> = result.reports.iter().map(BatchRow::from).collect();
            let mut out = render_table(&rows);
            let detail = batch_detail_lines(result);
            if !detail.is_empty() {
                out.push_str("\n\n");
                out.push_str(&detail);
            }
            out
        }
        OutputFormat::Json => render_json(result, false),
        OutputFormat::JsonCompact => render_json(result, true),
        OutputFormat::Yaml => render_yaml(result),
        OutputFormat::Plain => result
            .reports
            .iter()
            .map(|r| format!("{}\t{}", r.device, status_label(&r.status)))
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

fn batch_detail_lines(result: &BatchResult) -> String {
    let mut lines = Vec::new();
    for report in &result.reports {
        for deviation in &report.deviations {
            let observed = deviation
                .observed
                .as_ref()
                .map_or_else(|| "missing".to_owned(), ToString::to_string);
            lines.push(format!(
                "  {}: {} expected {}, observed {observed}",
                report.device, deviation.key, deviation.expected
            ));
        }
        for action in &report.actions {
            if let ActionOutcome::Failed { ref reason, .. } = action.outcome {
                lines.push(format!(
                    "  {}: apply {} failed: {reason}",
                    report.device, action.action.key
                ));
            }
        }
        if let DeviceStatus::Failed { ref reason, .. } = report.status {
            lines.push(format!("  {}: {reason}", report.device));
        }
    }
    lines.join("\n")
}

/// One-line fleet summary, colored when enabled. Dry-run output is
/// explicitly labeled as simulated.
pub fn batch_summary_line(result: &BatchResult, dry_run: bool, color: bool) -> String {
    let s = &result.summary;
    let mut line = if color {
        format!(
            "Fleet: {} stable, {} deviating, {} fixed, {} failed, {} skipped",
            s.stable.green(),
            s.deviating.yellow(),
            s.fixed.green(),
            s.failed.red(),
            s.skipped
        )
    } else {
        format!(
            "Fleet: {} stable, {} deviating, {} fixed, {} failed, {} skipped",
            s.stable, s.deviating, s.fixed, s.failed, s.skipped
        )
    };
    if dry_run {
        line.push_str(" (dry-run: simulated, no settings were changed)");
    }
    line
}

// ── Format-specific renderers ────────────────────────────────────────

fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

fn render_json<T: serde::Serialize + ?Sized>(data: &T, compact: bool) -> String {
    let rendered = if compact {
        serde_json::to_string(data)
    } else {
        serde_json::to_string_pretty(data)
    };
    rendered.expect("serialization should not fail")
}

fn render_yaml<T: serde::Serialize + ?Sized>(data: &T) -> String {
    serde_yaml::to_string(data).expect("serialization should not fail")
}
