//! Stability policy file loading.
//!
//! The policy is a TOML file with one `[[setting]]` table per spec:
//!
//! ```toml
//! [[setting]]
//! key = "mode"
//! priority = 0
//! rule = { type = "exact", value = "cool" }
//!
//! [[setting]]
//! key = "setpoint_f"
//! priority = 10
//! rule = { type = "tolerance", target = 72.0, tolerance = 2.0 }
//!
//! [[setting]]
//! key = "fan_speed"
//! priority = 20
//! rule = { type = "one-of", allowed = ["low", "med", "high"], canonical = "low" }
//! ```
//!
//! Declaration order in the file is comparison order; `priority` is the
//! corrective apply order.

use std::path::Path;

use serde::Deserialize;

use hvac_core::{SettingSpec, StabilityPolicy};

use crate::ConfigError;

#[derive(Debug, Deserialize)]
struct PolicyFile {
    #[serde(default, rename = "setting")]
    settings: Vec<SettingSpec>,
}

/// Load and validate a stability policy from a TOML file.
pub fn load_policy(path: &Path) -> Result<StabilityPolicy, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::InvalidPolicy {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    let file: PolicyFile = toml::from_str(&contents).map_err(|e| ConfigError::InvalidPolicy {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    if file.settings.is_empty() {
        return Err(ConfigError::InvalidPolicy {
            path: path.display().to_string(),
            reason: "policy declares no settings".into(),
        });
    }

    StabilityPolicy::new(file.settings).map_err(|e| ConfigError::InvalidPolicy {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Starter policy written by `config init` for the user to edit.
pub fn starter_policy_toml() -> &'static str {
    r#"# Stability baseline: the settings every device is expected to hold.
# Declaration order is the comparison (and report) order; `priority`
# is the corrective apply order -- lower applies first.

[[setting]]
key = "mode"
priority = 0
rule = { type = "exact", value = "cool" }

[[setting]]
key = "setpoint_f"
priority = 10
rule = { type = "tolerance", target = 72.0, tolerance = 2.0 }

[[setting]]
key = "fan_speed"
priority = 20
rule = { type = "one-of", allowed = ["low", "med", "high"], canonical = "low" }
"#
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::io::Write;

    use super::*;

    fn write_policy(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn starter_policy_parses_and_validates() {
        let file = write_policy(starter_policy_toml());
        let policy = load_policy(file.path()).unwrap();
        assert_eq!(policy.len(), 3);
        let keys: Vec<&str> = policy.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(keys, ["mode", "setpoint_f", "fan_speed"]);
    }

    #[test]
    fn empty_policy_is_rejected() {
        let file = write_policy("# nothing here\n");
        let err = load_policy(file.path()).unwrap_err();
        assert!(err.to_string().contains("no settings"));
    }

    #[test]
    fn invalid_rule_is_rejected_with_path() {
        let file = write_policy(
            r#"
[[setting]]
key = "fan_speed"
rule = { type = "one-of", allowed = ["low"], canonical = "turbo" }
"#,
        );
        let err = load_policy(file.path()).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("turbo"), "{msg}");
    }

    #[test]
    fn missing_file_is_a_policy_error() {
        let err = load_policy(Path::new("/nonexistent/policy.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPolicy { .. }));
    }
}
