// ── Settings Inspector ──
//
// Normalizes a raw gateway settings payload into a typed SettingsRecord.
// Known keys are type-checked against the policy's rule kinds; unknown
// keys are preserved but ignored downstream, so devices exposing extra
// settings never fail a check.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use tracing::trace;

use crate::error::CoreError;
use crate::model::{DeviceId, SettingValue, SettingsRecord};
use crate::policy::StabilityPolicy;

/// Normalize a raw settings payload for one device.
///
/// The payload is the gateway report body: an object carrying a
/// `"settings"` object. Fails with [`CoreError::MalformedSettings`] when
/// the envelope is missing/mis-shaped or when a policy-known key holds a
/// value of the wrong JSON type.
pub fn normalize(
    device: &DeviceId,
    payload: &serde_json::Value,
    policy: &StabilityPolicy,
) -> Result<SettingsRecord, CoreError> {
    let envelope = payload
        .as_object()
        .ok_or_else(|| malformed(device, "payload is not a JSON object"))?;

    let settings = envelope
        .get("settings")
        .ok_or_else(|| malformed(device, "missing required key 'settings'"))?
        .as_object()
        .ok_or_else(|| malformed(device, "'settings' is not a JSON object"))?;

    let mut values = IndexMap::with_capacity(settings.len());
    let mut extras = BTreeMap::new();

    for (key, raw) in settings {
        match policy.lookup(key) {
            Some(spec) => {
                let expected = spec.rule.expected_kind();
                let value = SettingValue::from_json(raw)
                    .filter(|v| v.kind() == expected)
                    .ok_or_else(|| {
                        malformed(
                            device,
                            &format!(
                                "setting '{key}' expected a {expected}, got {}",
                                json_type_name(raw)
                            ),
                        )
                    })?;
                values.insert(key.clone(), value);
            }
            None => {
                // Forward compatibility: carry it, never judge it.
                extras.insert(key.clone(), raw.clone());
            }
        }
    }

    trace!(
        device = %device,
        known = values.len(),
        extra = extras.len(),
        "normalized settings payload"
    );
    Ok(SettingsRecord::new(values, extras))
}

fn malformed(device: &DeviceId, reason: &str) -> CoreError {
    CoreError::MalformedSettings {
        reason: format!("device {device}: {reason}"),
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
