// ── Diff Engine ──
//
// Pure comparison of one settings record against the policy. No I/O, no
// side effects: the same (record, policy) pair always yields the same
// deviation sequence, in policy declaration order.

use crate::model::{Deviation, DeviationSeverity, DeviceId, SettingsRecord};
use crate::policy::StabilityPolicy;

/// Compare a record against the policy.
///
/// Iterates specs in policy order; emits `Missing` for absent keys and
/// `Mismatch` for present-but-failing values. An empty result means the
/// device is fully stable. Settings absent from the policy are never
/// reported.
pub fn diff(
    device: &DeviceId,
    record: &SettingsRecord,
    policy: &StabilityPolicy,
) -> Vec<Deviation> {
    let mut deviations = Vec::new();

    for spec in policy.iter() {
        match record.get(&spec.key) {
            None => deviations.push(Deviation {
                device: device.clone(),
                key: spec.key.clone(),
                expected: spec.rule.clone(),
                observed: None,
                severity: DeviationSeverity::Missing,
            }),
            Some(observed) if !spec.rule.is_satisfied_by(observed) => {
                deviations.push(Deviation {
                    device: device.clone(),
                    key: spec.key.clone(),
                    expected: spec.rule.clone(),
                    observed: Some(observed.clone()),
                    severity: DeviationSeverity::Mismatch,
                });
            }
            Some(_) => {}
        }
    }

    deviations
}
