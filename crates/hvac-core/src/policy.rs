// ── Stability Policy ──
//
// The declarative baseline of expected device settings. Loaded once per
// run, immutable for the duration of a batch: every device in one
// invocation is judged against the same specs.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::model::{SettingKind, SettingValue};

// ── MatchRule ───────────────────────────────────────────────────────

/// How an observed value is compared against the baseline.
///
/// Each variant also declares its corrective target explicitly; the
/// planner never guesses a value to write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum MatchRule {
    /// Value must equal `value` exactly (numbers compare bit-exact;
    /// use `tolerance` for ranges).
    Exact { value: SettingValue },

    /// Numeric value must lie within `target ± tolerance`.
    Tolerance { target: f64, tolerance: f64 },

    /// String value must be one of `allowed`; `canonical` is the value
    /// written when correcting and must itself be a member of `allowed`.
    OneOf {
        allowed: Vec<String>,
        canonical: String,
    },
}

impl MatchRule {
    /// Does `value` satisfy this rule?
    pub fn is_satisfied_by(&self, value: &SettingValue) -> bool {
        match self {
            Self::Exact { value: expected } => value == expected,
            Self::Tolerance { target, tolerance } => match value {
                SettingValue::Num(n) => (n - target).abs() <= *tolerance,
                _ => false,
            },
            Self::OneOf { allowed, .. } => match value {
                SettingValue::Str(s) => allowed.iter().any(|a| a == s),
                _ => false,
            },
        }
    }

    /// The value written to a device to satisfy this rule.
    pub fn corrective_target(&self) -> SettingValue {
        match self {
            Self::Exact { value } => value.clone(),
            Self::Tolerance { target, .. } => SettingValue::Num(*target),
            Self::OneOf { canonical, .. } => SettingValue::Str(canonical.clone()),
        }
    }

    /// The JSON scalar kind an observed value must have for this rule.
    /// The inspector rejects known keys of the wrong kind outright.
    pub fn expected_kind(&self) -> SettingKind {
        match self {
            Self::Exact { value } => value.kind(),
            Self::Tolerance { .. } => SettingKind::Num,
            Self::OneOf { .. } => SettingKind::Str,
        }
    }

    fn validate(&self) -> Result<(), String> {
        match self {
            Self::Exact { .. } => Ok(()),
            Self::Tolerance { tolerance, .. } => {
                if tolerance.is_sign_negative() || !tolerance.is_finite() {
                    Err(format!("tolerance must be a finite non-negative number, got {tolerance}"))
                } else {
                    Ok(())
                }
            }
            Self::OneOf { allowed, canonical } => {
                if allowed.is_empty() {
                    Err("allowed set must not be empty".into())
                } else if !allowed.iter().any(|a| a == canonical) {
                    Err(format!("canonical value \"{canonical}\" is not in the allowed set"))
                } else {
                    Ok(())
                }
            }
        }
    }
}

impl fmt::Display for MatchRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact { value } => write!(f, "= {value}"),
            Self::Tolerance { target, tolerance } => write!(f, "{target} ±{tolerance}"),
            Self::OneOf { allowed, .. } => write!(f, "one of {}", allowed.join("|")),
        }
    }
}

// ── SettingSpec ─────────────────────────────────────────────────────

/// One named setting with its comparison rule and apply priority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingSpec {
    pub key: String,
    pub rule: MatchRule,
    /// Apply ordering for corrective actions: lower first. Defaults to
    /// last so unprioritized settings never preempt declared ordering.
    #[serde(default = "default_priority")]
    pub priority: u32,
}

fn default_priority() -> u32 {
    u32::MAX
}

// ── StabilityPolicy ─────────────────────────────────────────────────

/// Ordered, immutable collection of setting specs.
///
/// Iteration follows declaration order, which fixes the Diff Engine's
/// output order and makes check output deterministic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StabilityPolicy {
    specs: IndexMap<String, SettingSpec>,
}

impl StabilityPolicy {
    /// Build a policy, validating every rule and rejecting duplicates.
    pub fn new(specs: Vec<SettingSpec>) -> Result<Self, CoreError> {
        let mut map = IndexMap::with_capacity(specs.len());
        for spec in specs {
            spec.rule
                .validate()
                .map_err(|reason| CoreError::InvalidPolicy {
                    reason: format!("setting '{}': {reason}", spec.key),
                })?;
            let key = spec.key.clone();
            if map.insert(key.clone(), spec).is_some() {
                return Err(CoreError::InvalidPolicy {
                    reason: format!("duplicate setting key '{key}'"),
                });
            }
        }
        Ok(Self { specs: map })
    }

    pub fn lookup(&self, key: &str) -> Option<&SettingSpec> {
        self.specs.get(key)
    }

    /// Specs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &SettingSpec> {
        self.specs.values()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exact(key: &str, value: &str) -> SettingSpec {
        SettingSpec {
            key: key.to_owned(),
            rule: MatchRule::Exact {
                value: SettingValue::Str(value.to_owned()),
            },
            priority: 0,
        }
    }

    #[test]
    fn policy_preserves_declaration_order() {
        let policy = StabilityPolicy::new(vec![
            exact("mode", "cool"),
            exact("fan_speed", "low"),
            exact("vane", "auto"),
        ])
        .expect("valid policy");
        let keys: Vec<&str> = policy.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(keys, ["mode", "fan_speed", "vane"]);
        assert!(policy.lookup("fan_speed").is_some());
        assert!(policy.lookup("humidity").is_none());
    }

    #[test]
    fn policy_rejects_duplicate_keys() {
        let err = StabilityPolicy::new(vec![exact("mode", "cool"), exact("mode", "heat")])
            .expect_err("duplicate keys must be rejected");
        assert!(matches!(err, CoreError::InvalidPolicy { .. }));
    }

    #[test]
    fn policy_rejects_canonical_outside_allowed() {
        let spec = SettingSpec {
            key: "fan_speed".into(),
            rule: MatchRule::OneOf {
                allowed: vec!["low".into(), "med".into()],
                canonical: "turbo".into(),
            },
            priority: 0,
        };
        let err = StabilityPolicy::new(vec![spec]).expect_err("canonical must be allowed");
        assert!(err.to_string().contains("turbo"));
    }

    #[test]
    fn policy_rejects_negative_tolerance() {
        let spec = SettingSpec {
            key: "setpoint_f".into(),
            rule: MatchRule::Tolerance {
                target: 72.0,
                tolerance: -1.0,
            },
            priority: 0,
        };
        assert!(StabilityPolicy::new(vec![spec]).is_err());
    }

    #[test]
    fn tolerance_rule_accepts_boundary_values() {
        let rule = MatchRule::Tolerance {
            target: 72.0,
            tolerance: 2.0,
        };
        assert!(rule.is_satisfied_by(&SettingValue::Num(70.0)));
        assert!(rule.is_satisfied_by(&SettingValue::Num(74.0)));
        assert!(!rule.is_satisfied_by(&SettingValue::Num(74.5)));
        assert!(!rule.is_satisfied_by(&SettingValue::Str("72".into())));
    }

    #[test]
    fn corrective_targets_satisfy_their_own_rules() {
        let rules = [
            MatchRule::Exact {
                value: SettingValue::Str("cool".into()),
            },
            MatchRule::Tolerance {
                target: 72.0,
                tolerance: 2.0,
            },
            MatchRule::OneOf {
                allowed: vec!["low".into(), "med".into(), "high".into()],
                canonical: "low".into(),
            },
        ];
        for rule in &rules {
            assert!(rule.is_satisfied_by(&rule.corrective_target()), "{rule}");
        }
    }
}
