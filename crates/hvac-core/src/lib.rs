// hvac-core: Device-settings reconciliation engine between hvac-api and the CLI.

pub mod client;
pub mod diff;
pub mod error;
pub mod execute;
pub mod inspect;
pub mod model;
pub mod orchestrate;
pub mod plan;
pub mod policy;
pub mod report;

// ── Primary re-exports ──────────────────────────────────────────────
pub use client::{ClientError, DeviceClient, DeviceRegistry};
pub use error::CoreError;
pub use execute::ActionExecutor;
pub use orchestrate::{BatchOptions, Orchestrator, RetryPolicy, ALL_DEVICES};
pub use policy::{MatchRule, SettingSpec, StabilityPolicy};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    Action, ActionOutcome, ActionResult, Deviation, DeviationSeverity, DeviceId, SettingKind,
    SettingValue, SettingsRecord,
};
pub use report::{BatchResult, DeviceReport, DeviceStatus, FailureKind, FleetSummary};
