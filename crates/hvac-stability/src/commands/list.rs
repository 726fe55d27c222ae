//! Device listing. Enumerates the gateway account; never touches the
//! reconciliation core.

use tabled::Tabled;

use hvac_api::DeviceSummary;

use crate::cli::GlobalOpts;
use crate::config;
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "Serial")]
    serial: String,
    #[tabled(rename = "Label")]
    label: String,
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "Site")]
    site: String,
}

impl From<&DeviceSummary> for DeviceRow {
    fn from(d: &DeviceSummary) -> Self {
        Self {
            serial: d.serial.clone(),
            label: d.label.clone().unwrap_or_default(),
            model: d.model.clone().unwrap_or_default(),
            site: d.site_name.clone().unwrap_or_default(),
        }
    }
}

#[derive(Tabled, serde::Serialize)]
struct VerboseDeviceRow {
    #[tabled(rename = "Serial")]
    serial: String,
    #[tabled(rename = "Label")]
    label: String,
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "Settings")]
    settings: String,
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let ctx = config::resolve_context(global)?;
    let client = util::connect(&ctx).await?;

    let devices = client.list_devices().await.map_err(CliError::from)?;

    if devices.is_empty() {
        if !global.quiet {
            eprintln!("No devices found.");
        }
        return Ok(());
    }

    if global.verbose > 0 {
        // Fetch live settings per device; an unreachable device gets an
        // error note instead of sinking the whole listing.
        let mut rows = Vec::with_capacity(devices.len());
        for device in &devices {
            let settings = match client.fetch_settings(&device.serial).await {
                Ok(report) => compact_settings(&report.settings),
                Err(e) => format!("<error: {e}>"),
            };
            rows.push(VerboseDeviceRow {
                serial: device.serial.clone(),
                label: device.label.clone().unwrap_or_default(),
                model: device.model.clone().unwrap_or_default(),
                settings,
            });
        }
        let out = output::render_list(&global.output, &rows, |r| VerboseDeviceRow {
            serial: r.serial.clone(),
            label: r.label.clone(),
            model: r.model.clone(),
            settings: r.settings.clone(),
        }, |r| r.serial.clone());
        output::print_output(&out, global.quiet);
    } else {
        let out = output::render_list(
            &global.output,
            &devices,
            DeviceRow::from,
            |d| d.serial.clone(),
        );
        output::print_output(&out, global.quiet);
    }
    Ok(())
}

/// Render a settings object as a compact `key=value` line.
fn compact_settings(settings: &serde_json::Value) -> String {
    match settings.as_object() {
        Some(map) => map
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(" "),
        None => settings.to_string(),
    }
}
