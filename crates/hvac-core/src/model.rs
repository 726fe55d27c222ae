// ── Reconciliation domain types ──
//
// Every type here is an immutable snapshot: records are never mutated
// after normalization, deviations and actions are terminal once created.
// Each value is owned by exactly one device pipeline until it lands in
// the aggregated batch result, so none of this needs interior locking.

use std::collections::BTreeMap;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

// ── DeviceId ────────────────────────────────────────────────────────

/// Opaque device identifier (the gateway serial).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ── SettingValue ────────────────────────────────────────────────────

/// The JSON scalar kinds a device setting can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKind {
    Str,
    Num,
    Bool,
}

impl fmt::Display for SettingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str => f.write_str("string"),
            Self::Num => f.write_str("number"),
            Self::Bool => f.write_str("boolean"),
        }
    }
}

/// One observed or targeted setting value.
///
/// Numeric equality is exact; approximate comparison belongs to
/// [`MatchRule::Tolerance`](crate::policy::MatchRule), not to the value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Str(String),
    Num(f64),
    Bool(bool),
}

impl SettingValue {
    pub fn kind(&self) -> SettingKind {
        match self {
            Self::Str(_) => SettingKind::Str,
            Self::Num(_) => SettingKind::Num,
            Self::Bool(_) => SettingKind::Bool,
        }
    }

    /// Convert a raw JSON scalar into a typed value. Non-scalar JSON
    /// (objects, arrays, null) yields `None`.
    pub fn from_json(raw: &serde_json::Value) -> Option<Self> {
        match raw {
            serde_json::Value::String(s) => Some(Self::Str(s.clone())),
            serde_json::Value::Number(n) => n.as_f64().map(Self::Num),
            serde_json::Value::Bool(b) => Some(Self::Bool(*b)),
            _ => None,
        }
    }

    /// The wire representation sent back to the gateway on apply.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Str(s) => serde_json::Value::String(s.clone()),
            Self::Num(n) => serde_json::json!(n),
            Self::Bool(b) => serde_json::Value::Bool(*b),
        }
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => write!(f, "\"{s}\""),
            Self::Num(n) => write!(f, "{n}"),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for SettingValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_owned())
    }
}

impl From<f64> for SettingValue {
    fn from(n: f64) -> Self {
        Self::Num(n)
    }
}

impl From<bool> for SettingValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

// ── SettingsRecord ──────────────────────────────────────────────────

/// One device's observed settings at one point in time.
///
/// Keys known to the policy are typed; unknown keys are preserved raw for
/// reporting but ignored by comparison (devices on newer firmware expose
/// settings the policy has never heard of).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettingsRecord {
    values: IndexMap<String, SettingValue>,
    extras: BTreeMap<String, serde_json::Value>,
}

impl SettingsRecord {
    pub fn new(
        values: IndexMap<String, SettingValue>,
        extras: BTreeMap<String, serde_json::Value>,
    ) -> Self {
        Self { values, extras }
    }

    /// Build a record from typed values only (test convenience).
    pub fn from_values<K, V, I>(values: I) -> Self
    where
        K: Into<String>,
        V: Into<SettingValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self {
            values: values
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            extras: BTreeMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&SettingValue> {
        self.values.get(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Unknown keys carried through from the raw payload.
    pub fn extras(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.extras
    }
}

// ── Deviation ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeviationSeverity {
    /// The setting is absent from the device's report.
    Missing,
    /// The setting is present but fails its rule.
    Mismatch,
}

/// A detected gap between one device setting and the policy baseline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Deviation {
    pub device: DeviceId,
    pub key: String,
    /// The rule the observed value failed (always a rule that exists in
    /// the active policy -- deviations are never fabricated for unknown
    /// keys).
    pub expected: crate::policy::MatchRule,
    pub observed: Option<SettingValue>,
    pub severity: DeviationSeverity,
}

// ── Action ──────────────────────────────────────────────────────────

/// One corrective write, derived from exactly one deviation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Action {
    pub device: DeviceId,
    pub key: String,
    /// Always satisfies the originating rule -- checked by the planner.
    pub target: SettingValue,
    /// Policy-declared apply order: lower goes first (a mode change must
    /// land before the setpoint that depends on it).
    pub priority: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "outcome")]
pub enum ActionOutcome {
    /// The device acknowledged the write.
    Applied,
    /// Dry-run: computed and reported, never sent.
    SkippedDryRun,
    /// Batch was cancelled before this action started.
    SkippedCancelled,
    /// The write failed; failures are data, not exceptions.
    Failed { reason: String, retryable: bool },
}

/// Terminal result of executing (or simulating) one action.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionResult {
    pub action: Action,
    pub outcome: ActionOutcome,
}

impl ActionResult {
    pub fn is_applied(&self) -> bool {
        matches!(self.outcome, ActionOutcome::Applied)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, ActionOutcome::Failed { .. })
    }
}
