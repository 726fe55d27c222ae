// ── Device client seams ──
//
// The orchestrator talks to devices and the fleet registry through these
// traits so tests can substitute in-memory fakes without environment
// mutation. `hvac_api::GatewayClient` is the production implementation
// of both: the gateway account is the registry.

use std::future::Future;

use crate::model::{DeviceId, SettingValue};

/// Transport-layer error type shared with `hvac-api`.
pub type ClientError = hvac_api::Error;

/// Read/write access to a single device's settings.
///
/// Implementations must be safe for concurrent use by multiple device
/// pipelines (the production client shares one pooled HTTP client).
pub trait DeviceClient: Send + Sync {
    /// Fetch the raw settings payload for one device.
    fn fetch_settings(
        &self,
        device: &DeviceId,
    ) -> impl Future<Output = Result<serde_json::Value, ClientError>> + Send;

    /// Apply one setting value to one device. This is the only mutating
    /// operation in the system.
    fn apply_setting(
        &self,
        device: &DeviceId,
        key: &str,
        value: &SettingValue,
    ) -> impl Future<Output = Result<(), ClientError>> + Send;
}

/// Enumerates the fleet. Queried exactly once at batch start when a
/// batch targets `all`; devices added mid-run are not picked up.
pub trait DeviceRegistry: Send + Sync {
    fn list_devices(&self) -> impl Future<Output = Result<Vec<DeviceId>, ClientError>> + Send;
}

// ── Production implementations ──────────────────────────────────────

impl DeviceClient for hvac_api::GatewayClient {
    async fn fetch_settings(&self, device: &DeviceId) -> Result<serde_json::Value, ClientError> {
        let report = hvac_api::GatewayClient::fetch_settings(self, device.as_str()).await?;
        // Re-wrap so the inspector sees the full envelope it validates.
        Ok(serde_json::json!({
            "serial": report.serial,
            "reportedAt": report.reported_at,
            "settings": report.settings,
        }))
    }

    async fn apply_setting(
        &self,
        device: &DeviceId,
        key: &str,
        value: &SettingValue,
    ) -> Result<(), ClientError> {
        hvac_api::GatewayClient::apply_setting(self, device.as_str(), key, &value.to_json()).await
    }
}

impl DeviceRegistry for hvac_api::GatewayClient {
    async fn list_devices(&self) -> Result<Vec<DeviceId>, ClientError> {
        let devices = hvac_api::GatewayClient::list_devices(self).await?;
        Ok(devices.into_iter().map(|d| DeviceId::new(d.serial)).collect())
    }
}
