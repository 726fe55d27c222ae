// ── Corrective Action Planner ──
//
// Turns deviations into an ordered list of corrective writes. Apply
// order comes from the policy's priority field, not from diff order: a
// device may reject a setpoint while the prerequisite mode change has
// not landed yet. Ties keep the original deviation order (stable sort).

use tracing::trace;

use crate::error::CoreError;
use crate::model::{Action, Deviation};
use crate::policy::StabilityPolicy;

/// Plan exactly one corrective action per deviation.
///
/// Each action's target is the rule's declared corrective value and is
/// re-checked against the rule before the plan is returned; a target
/// that fails its own rule is a [`CoreError::PolicyViolation`] -- a
/// planner bug or inconsistent policy, fatal to the run by contract.
pub fn plan(policy: &StabilityPolicy, deviations: &[Deviation]) -> Result<Vec<Action>, CoreError> {
    let mut actions = Vec::with_capacity(deviations.len());

    for deviation in deviations {
        let spec = policy
            .lookup(&deviation.key)
            .ok_or_else(|| CoreError::PolicyViolation {
                key: deviation.key.clone(),
                reason: "deviation references a key absent from the active policy".into(),
            })?;

        let target = spec.rule.corrective_target();
        if !spec.rule.is_satisfied_by(&target) {
            return Err(CoreError::PolicyViolation {
                key: spec.key.clone(),
                reason: format!("computed target {target} does not satisfy rule ({})", spec.rule),
            });
        }

        actions.push(Action {
            device: deviation.device.clone(),
            key: spec.key.clone(),
            target,
            priority: spec.priority,
        });
    }

    // Stable: equal priorities keep deviation order.
    actions.sort_by_key(|a| a.priority);

    trace!(actions = actions.len(), "planned corrective actions");
    Ok(actions)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::diff::diff;
    use crate::model::{DeviceId, SettingValue, SettingsRecord};
    use crate::policy::{MatchRule, SettingSpec};

    fn scenario_policy() -> StabilityPolicy {
        StabilityPolicy::new(vec![
            SettingSpec {
                key: "setpoint_f".into(),
                rule: MatchRule::Tolerance {
                    target: 72.0,
                    tolerance: 2.0,
                },
                priority: 10,
            },
            SettingSpec {
                key: "mode".into(),
                rule: MatchRule::Exact {
                    value: SettingValue::Str("cool".into()),
                },
                priority: 0,
            },
            SettingSpec {
                key: "fan_speed".into(),
                rule: MatchRule::OneOf {
                    allowed: vec!["low".into(), "med".into(), "high".into()],
                    canonical: "low".into(),
                },
                priority: 20,
            },
        ])
        .expect("valid policy")
    }

    #[test]
    fn one_action_per_deviation_with_satisfying_targets() {
        let policy = scenario_policy();
        let record = SettingsRecord::from_values([
            ("mode", SettingValue::from("heat")),
            ("setpoint_f", SettingValue::from(80.0)),
            ("fan_speed", SettingValue::from("turbo")),
        ]);
        let deviations = diff(&DeviceId::from("A100"), &record, &policy);
        let actions = plan(&policy, &deviations).expect("plan succeeds");

        assert_eq!(actions.len(), deviations.len());
        for action in &actions {
            let spec = policy.lookup(&action.key).expect("known key");
            assert!(
                spec.rule.is_satisfied_by(&action.target),
                "target {} violates rule for {}",
                action.target,
                action.key
            );
        }
    }

    #[test]
    fn actions_sorted_by_policy_priority_not_diff_order() {
        let policy = scenario_policy();
        // Diff order is policy declaration order: setpoint_f, mode, fan_speed.
        let record = SettingsRecord::from_values([
            ("mode", SettingValue::from("heat")),
            ("setpoint_f", SettingValue::from(80.0)),
            ("fan_speed", SettingValue::from("turbo")),
        ]);
        let deviations = diff(&DeviceId::from("A100"), &record, &policy);
        let diff_keys: Vec<&str> = deviations.iter().map(|d| d.key.as_str()).collect();
        assert_eq!(diff_keys, ["setpoint_f", "mode", "fan_speed"]);

        let actions = plan(&policy, &deviations).expect("plan succeeds");
        let plan_keys: Vec<&str> = actions.iter().map(|a| a.key.as_str()).collect();
        // Mode (priority 0) must come before the setpoint that depends on it.
        assert_eq!(plan_keys, ["mode", "setpoint_f", "fan_speed"]);
    }

    #[test]
    fn equal_priorities_preserve_deviation_order() {
        let policy = StabilityPolicy::new(vec![
            SettingSpec {
                key: "vane_h".into(),
                rule: MatchRule::Exact {
                    value: SettingValue::Str("auto".into()),
                },
                priority: 5,
            },
            SettingSpec {
                key: "vane_v".into(),
                rule: MatchRule::Exact {
                    value: SettingValue::Str("auto".into()),
                },
                priority: 5,
            },
        ])
        .expect("valid policy");

        let record = SettingsRecord::from_values([
            ("vane_h", SettingValue::from("swing")),
            ("vane_v", SettingValue::from("swing")),
        ]);
        let deviations = diff(&DeviceId::from("A100"), &record, &policy);
        let actions = plan(&policy, &deviations).expect("plan succeeds");
        let keys: Vec<&str> = actions.iter().map(|a| a.key.as_str()).collect();
        assert_eq!(keys, ["vane_h", "vane_v"]);
    }

    #[test]
    fn mode_only_scenario_plans_single_mode_action() {
        let policy = scenario_policy();
        let record = SettingsRecord::from_values([
            ("mode", SettingValue::from("heat")),
            ("setpoint_f", SettingValue::from(73.0)),
            ("fan_speed", SettingValue::from("low")),
        ]);
        let deviations = diff(&DeviceId::from("A100"), &record, &policy);
        let actions = plan(&policy, &deviations).expect("plan succeeds");

        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].key, "mode");
        assert_eq!(actions[0].target, SettingValue::Str("cool".into()));
    }

    #[test]
    fn deviation_for_unknown_key_is_a_policy_violation() {
        let policy = scenario_policy();
        let rogue = Deviation {
            device: DeviceId::from("A100"),
            key: "not_in_policy".into(),
            expected: MatchRule::Exact {
                value: SettingValue::Str("x".into()),
            },
            observed: None,
            severity: crate::model::DeviationSeverity::Missing,
        };
        let err = plan(&policy, &[rogue]).expect_err("must be fatal");
        assert!(matches!(err, CoreError::PolicyViolation { .. }));
        assert!(err.is_fatal());
    }
}
