// Batch reconciliation tests with an in-memory fake fleet.
//
// Covers the contracts the engine must uphold end to end: the concrete
// mode/setpoint/fan scenario, dry-run safety, partial-failure isolation,
// idempotent fixes, retry of transient fetch failures, cancellation, and
// the fleet-level auth short-circuit.
#![allow(clippy::unwrap_used)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use serde_json::json;

use hvac_api::Error as ApiError;
use hvac_core::{
    ActionOutcome, BatchOptions, ClientError, DeviceClient, DeviceId, DeviceRegistry,
    DeviceStatus, MatchRule, Orchestrator, RetryPolicy, SettingSpec, SettingValue,
    StabilityPolicy, CoreError, FailureKind, ALL_DEVICES,
};

// ── Fake fleet ──────────────────────────────────────────────────────

enum FailPlan {
    /// Credentials rejected on every fetch.
    Auth,
    /// Permanent gateway error on every fetch.
    Permanent,
    /// Timeout for the first `remaining` fetches, then succeed.
    Transient { remaining: u32 },
}

struct FleetState {
    devices: Vec<(String, serde_json::Map<String, serde_json::Value>)>,
    fail: BTreeMap<String, FailPlan>,
}

/// In-memory device fleet implementing both client and registry.
struct FakeFleet {
    state: Mutex<FleetState>,
    mutations: AtomicUsize,
    panic_on_mutate: bool,
    /// Per-fetch sleep to scramble completion order under concurrency.
    stagger: bool,
}

impl FakeFleet {
    fn new(devices: Vec<(&str, serde_json::Value)>) -> Self {
        let devices = devices
            .into_iter()
            .map(|(serial, settings)| {
                let map = settings.as_object().expect("settings object").clone();
                (serial.to_owned(), map)
            })
            .collect();
        Self {
            state: Mutex::new(FleetState {
                devices,
                fail: BTreeMap::new(),
            }),
            mutations: AtomicUsize::new(0),
            panic_on_mutate: false,
            stagger: false,
        }
    }

    fn with_failure(self, serial: &str, plan: FailPlan) -> Self {
        self.state
            .lock()
            .unwrap()
            .fail
            .insert(serial.to_owned(), plan);
        self
    }

    fn panicking_on_mutate(mut self) -> Self {
        self.panic_on_mutate = true;
        self
    }

    fn staggered(mut self) -> Self {
        self.stagger = true;
        self
    }

    fn mutation_count(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }

    fn setting(&self, serial: &str, key: &str) -> Option<serde_json::Value> {
        let state = self.state.lock().unwrap();
        state
            .devices
            .iter()
            .find(|(s, _)| s == serial)
            .and_then(|(_, map)| map.get(key).cloned())
    }
}

impl DeviceClient for FakeFleet {
    async fn fetch_settings(&self, device: &DeviceId) -> Result<serde_json::Value, ClientError> {
        let (payload, stagger_delay) = {
            let mut state = self.state.lock().unwrap();

            match state.fail.get_mut(device.as_str()) {
                Some(FailPlan::Auth) => {
                    return Err(ApiError::Authentication {
                        message: "credentials rejected".into(),
                    });
                }
                Some(FailPlan::Permanent) => {
                    return Err(ApiError::Gateway {
                        status: 500,
                        message: "internal gateway error".into(),
                    });
                }
                Some(FailPlan::Transient { remaining }) if *remaining > 0 => {
                    *remaining -= 1;
                    return Err(ApiError::Timeout { timeout_secs: 1 });
                }
                _ => {}
            }

            let total = state.devices.len();
            let position = state
                .devices
                .iter()
                .position(|(s, _)| s == device.as_str())
                .ok_or_else(|| ApiError::DeviceNotFound {
                    serial: device.as_str().to_owned(),
                })?;
            let settings = state.devices[position].1.clone();

            let delay = if self.stagger {
                Duration::from_millis(10 * (total - position) as u64)
            } else {
                Duration::ZERO
            };
            (
                json!({ "serial": device.as_str(), "settings": settings }),
                delay,
            )
        };

        if !stagger_delay.is_zero() {
            tokio::time::sleep(stagger_delay).await;
        }
        Ok(payload)
    }

    async fn apply_setting(
        &self,
        device: &DeviceId,
        key: &str,
        value: &SettingValue,
    ) -> Result<(), ClientError> {
        assert!(
            !self.panic_on_mutate,
            "mutating call reached the device client"
        );
        let mut state = self.state.lock().unwrap();
        let entry = state
            .devices
            .iter_mut()
            .find(|(s, _)| s == device.as_str())
            .ok_or_else(|| ApiError::DeviceNotFound {
                serial: device.as_str().to_owned(),
            })?;
        entry.1.insert(key.to_owned(), value.to_json());
        self.mutations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl DeviceRegistry for FakeFleet {
    async fn list_devices(&self) -> Result<Vec<DeviceId>, ClientError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .devices
            .iter()
            .map(|(s, _)| DeviceId::new(s.clone()))
            .collect())
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn scenario_policy() -> StabilityPolicy {
    StabilityPolicy::new(vec![
        SettingSpec {
            key: "mode".into(),
            rule: MatchRule::Exact {
                value: SettingValue::Str("cool".into()),
            },
            priority: 0,
        },
        SettingSpec {
            key: "setpoint_f".into(),
            rule: MatchRule::Tolerance {
                target: 72.0,
                tolerance: 2.0,
            },
            priority: 10,
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

fn fast_options() -> BatchOptions {
    BatchOptions {
        concurrency: 4,
        retry: RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
        },
    }
}

fn stable_settings() -> serde_json::Value {
    json!({ "mode": "cool", "setpoint_f": 72.0, "fan_speed": "low" })
}

fn ids(serials: &[&str]) -> Vec<DeviceId> {
    serials.iter().map(|s| DeviceId::from(*s)).collect()
}

// ── Scenario: check + fix + recheck ─────────────────────────────────

#[tokio::test]
async fn drifted_mode_is_fixed_and_recheck_is_stable() {
    let fleet = FakeFleet::new(vec![(
        "A100",
        json!({ "mode": "heat", "setpoint_f": 73.0, "fan_speed": "low" }),
    )]);
    let policy = scenario_policy();
    let orchestrator = Orchestrator::new(&fleet, &fleet, &policy, fast_options());

    // Check: exactly one deviation, the mode mismatch.
    let check = orchestrator.run_check(&ids(&["A100"])).await.unwrap();
    assert_eq!(check.summary.deviating, 1);
    let report = &check.reports[0];
    assert_eq!(report.deviations.len(), 1);
    assert_eq!(report.deviations[0].key, "mode");

    // Fix: a single applied action setting mode to "cool".
    let fix = orchestrator.run_fix(&ids(&["A100"]), false).await.unwrap();
    assert_eq!(fix.summary.fixed, 1);
    let report = &fix.reports[0];
    assert_eq!(report.actions.len(), 1);
    assert!(report.actions[0].is_applied());
    assert_eq!(report.actions[0].action.target, SettingValue::Str("cool".into()));
    assert_eq!(fleet.setting("A100", "mode"), Some(json!("cool")));
    assert_eq!(fleet.mutation_count(), 1);

    // Recheck: zero deviations.
    let recheck = orchestrator.run_check(&ids(&["A100"])).await.unwrap();
    assert!(recheck.is_all_stable());
}

#[tokio::test]
async fn fix_is_idempotent() {
    let fleet = FakeFleet::new(vec![(
        "A100",
        json!({ "mode": "heat", "setpoint_f": 80.0, "fan_speed": "turbo" }),
    )]);
    let policy = scenario_policy();
    let orchestrator = Orchestrator::new(&fleet, &fleet, &policy, fast_options());

    let first = orchestrator.run_fix(&ids(&["A100"]), false).await.unwrap();
    assert_eq!(first.summary.fixed, 1);
    let mutations_after_first = fleet.mutation_count();
    assert_eq!(mutations_after_first, 3);

    // Second run: nothing left to correct, nothing written.
    let second = orchestrator.run_fix(&ids(&["A100"]), false).await.unwrap();
    assert!(second.is_all_stable());
    assert!(second.reports[0].actions.is_empty());
    assert_eq!(fleet.mutation_count(), mutations_after_first);
}

// ── Dry-run safety ──────────────────────────────────────────────────

#[tokio::test]
async fn dry_run_fleet_simulates_without_any_mutation() {
    // 3 devices, 2 with deviations. The client panics on any mutating
    // call, so reaching the transport at all fails the test.
    let fleet = FakeFleet::new(vec![
        ("A100", json!({ "mode": "heat", "setpoint_f": 72.0, "fan_speed": "low" })),
        ("A200", stable_settings()),
        ("A300", json!({ "mode": "cool", "setpoint_f": 90.0, "fan_speed": "off" })),
    ])
    .panicking_on_mutate();
    let policy = scenario_policy();
    let orchestrator = Orchestrator::new(&fleet, &fleet, &policy, fast_options());

    let result = orchestrator
        .run_fix(&ids(&["A100", "A200", "A300"]), true)
        .await
        .unwrap();

    assert!(result.fix_succeeded(true));
    assert_eq!(result.summary.stable, 1);
    assert_eq!(result.summary.deviating, 2);
    assert_eq!(result.summary.fixed, 0);

    let a100 = &result.reports[0];
    assert_eq!(a100.actions.len(), 1);
    assert!(a100
        .actions
        .iter()
        .all(|r| matches!(r.outcome, ActionOutcome::SkippedDryRun)));

    let a200 = &result.reports[1];
    assert_eq!(a200.status, DeviceStatus::Stable);
    assert!(a200.actions.is_empty());

    let a300 = &result.reports[2];
    assert_eq!(a300.actions.len(), 2);
    assert!(a300
        .actions
        .iter()
        .all(|r| matches!(r.outcome, ActionOutcome::SkippedDryRun)));

    assert_eq!(fleet.mutation_count(), 0);
}

// ── Failure isolation ───────────────────────────────────────────────

#[tokio::test]
async fn one_failing_device_does_not_disturb_siblings() {
    let fleet = FakeFleet::new(vec![
        ("A", stable_settings()),
        ("B", stable_settings()),
        ("C", json!({ "mode": "heat", "setpoint_f": 72.0, "fan_speed": "low" })),
    ])
    .with_failure("B", FailPlan::Permanent);
    let policy = scenario_policy();
    let orchestrator = Orchestrator::new(&fleet, &fleet, &policy, fast_options());

    let result = orchestrator.run_check(&ids(&["A", "B", "C"])).await.unwrap();

    assert_eq!(result.reports.len(), 3);
    assert_eq!(result.reports[0].status, DeviceStatus::Stable);
    assert!(result.reports[1].is_failed());
    assert_eq!(result.reports[2].status, DeviceStatus::Deviating);
    assert_eq!(result.summary.failed, 1);
}

#[tokio::test]
async fn malformed_payload_is_a_device_failure_not_a_crash() {
    let fleet = FakeFleet::new(vec![
        ("A", json!({ "mode": 42, "setpoint_f": 72.0, "fan_speed": "low" })),
        ("B", stable_settings()),
    ]);
    let policy = scenario_policy();
    let orchestrator = Orchestrator::new(&fleet, &fleet, &policy, fast_options());

    let result = orchestrator.run_check(&ids(&["A", "B"])).await.unwrap();

    assert_eq!(result.reports[0].failure_kind(), Some(FailureKind::Malformed));
    assert_eq!(result.reports[1].status, DeviceStatus::Stable);
}

// ── Retry ───────────────────────────────────────────────────────────

#[tokio::test]
async fn transient_fetch_failures_are_retried_to_success() {
    let fleet = FakeFleet::new(vec![("A100", stable_settings())])
        .with_failure("A100", FailPlan::Transient { remaining: 2 });
    let policy = scenario_policy();
    let orchestrator = Orchestrator::new(&fleet, &fleet, &policy, fast_options());

    let result = orchestrator.run_check(&ids(&["A100"])).await.unwrap();
    assert!(result.is_all_stable());
}

#[tokio::test]
async fn transient_failures_beyond_attempts_become_device_failures() {
    let fleet = FakeFleet::new(vec![("A100", stable_settings())])
        .with_failure("A100", FailPlan::Transient { remaining: 10 });
    let policy = scenario_policy();
    let orchestrator = Orchestrator::new(&fleet, &fleet, &policy, fast_options());

    let result = orchestrator.run_check(&ids(&["A100"])).await.unwrap();
    assert_eq!(result.reports[0].failure_kind(), Some(FailureKind::Transport));
}

// ── Fleet expansion & ordering ──────────────────────────────────────

#[tokio::test]
async fn all_expands_to_registry_order_and_results_stay_sorted() {
    let fleet = FakeFleet::new(vec![
        ("D1", stable_settings()),
        ("D2", stable_settings()),
        ("D3", stable_settings()),
        ("D4", stable_settings()),
        ("D5", stable_settings()),
    ])
    .staggered();
    let policy = scenario_policy();
    let orchestrator = Orchestrator::new(&fleet, &fleet, &policy, fast_options());

    let result = orchestrator
        .run_check(&[DeviceId::from(ALL_DEVICES)])
        .await
        .unwrap();

    // D1 sleeps longest and finishes last, but output order is still
    // the registry order.
    let order: Vec<&str> = result.reports.iter().map(|r| r.device.as_str()).collect();
    assert_eq!(order, ["D1", "D2", "D3", "D4", "D5"]);
    assert!(result.is_all_stable());
}

// ── Cancellation ────────────────────────────────────────────────────

#[tokio::test]
async fn cancelled_batch_skips_unstarted_devices() {
    let fleet = FakeFleet::new(vec![
        ("A", stable_settings()),
        ("B", stable_settings()),
    ]);
    let policy = scenario_policy();
    let orchestrator = Orchestrator::new(&fleet, &fleet, &policy, fast_options());

    orchestrator.cancellation_token().cancel();
    let result = orchestrator.run_check(&ids(&["A", "B"])).await.unwrap();

    assert_eq!(result.summary.skipped, 2);
    assert!(result
        .reports
        .iter()
        .all(|r| r.status == DeviceStatus::SkippedCancelled));
}

// ── Fleet-level auth failure ────────────────────────────────────────

#[tokio::test]
async fn auth_failure_on_every_device_is_fleet_fatal() {
    let fleet = FakeFleet::new(vec![
        ("A", stable_settings()),
        ("B", stable_settings()),
    ])
    .with_failure("A", FailPlan::Auth)
    .with_failure("B", FailPlan::Auth);
    let policy = scenario_policy();
    let orchestrator = Orchestrator::new(&fleet, &fleet, &policy, fast_options());

    let err = orchestrator
        .run_check(&ids(&["A", "B"]))
        .await
        .expect_err("fleet-wide auth failure must abort");
    assert!(matches!(err, CoreError::FleetAuthFailure { devices: 2 }));
}

#[tokio::test]
async fn auth_failure_on_one_device_stays_per_device() {
    let fleet = FakeFleet::new(vec![
        ("A", stable_settings()),
        ("B", stable_settings()),
    ])
    .with_failure("B", FailPlan::Auth);
    let policy = scenario_policy();
    let orchestrator = Orchestrator::new(&fleet, &fleet, &policy, fast_options());

    let result = orchestrator.run_check(&ids(&["A", "B"])).await.unwrap();
    assert_eq!(result.reports[0].status, DeviceStatus::Stable);
    assert_eq!(result.reports[1].failure_kind(), Some(FailureKind::Auth));
}
