// Wire types for the gateway API.
//
// These mirror the gateway's JSON shapes verbatim; hvac-core normalizes
// them into domain types before anything downstream sees them.

use serde::{Deserialize, Serialize};

/// One device as enumerated by `GET /v1/devices`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSummary {
    /// Gateway-wide unique serial (the device identifier everywhere else).
    pub serial: String,
    /// Human-assigned label ("Living Room", "Server Closet").
    pub label: Option<String>,
    /// Hardware model string, when the gateway reports one.
    pub model: Option<String>,
    /// Site/zone grouping, when configured.
    pub site_name: Option<String>,
}

/// Settings report from `GET /v1/devices/{serial}/settings`.
///
/// `settings` is kept as raw JSON: the set of keys a device exposes varies
/// by model and firmware, and normalization is the inspector's job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSettingsReport {
    pub serial: String,
    /// RFC 3339 timestamp of the device's last report, if known.
    pub reported_at: Option<String>,
    pub settings: serde_json::Value,
}

// ── Request/response envelopes ──────────────────────────────────────

#[derive(Debug, Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginResponse {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DeviceListResponse {
    pub devices: Vec<DeviceSummary>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ApplySettingRequest<'a> {
    pub value: &'a serde_json::Value,
}

/// Error envelope the gateway returns on non-2xx responses.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[allow(dead_code)]
    pub code: Option<String>,
    pub message: String,
}
