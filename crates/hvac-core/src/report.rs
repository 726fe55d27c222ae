// ── Batch reporting types ──
//
// Per-device and fleet-level outcomes. Reports are assembled by the
// orchestrator in original device-list order, independent of internal
// scheduling.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::CoreError;
use crate::model::{ActionResult, Deviation, DeviceId};

/// Classification of a device-level failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    /// Device returned data the inspector cannot normalize.
    Malformed,
    /// Transport-level trouble (after retries were exhausted).
    Transport,
    /// Credentials rejected; never retried.
    Auth,
    Other,
}

/// Terminal status of one device within a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "status")]
pub enum DeviceStatus {
    /// Every policy setting satisfied.
    Stable,
    /// Deviations found and not (or not fully) corrected -- the terminal
    /// state for `check`, for dry-run fixes, and for fixes where an
    /// action failed.
    Deviating,
    /// All corrective actions were applied.
    Fixed,
    /// The device's pipeline failed; siblings were unaffected.
    Failed { reason: String, kind: FailureKind },
    /// The batch was cancelled before this device started.
    SkippedCancelled,
}

/// One device's full outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceReport {
    pub device: DeviceId,
    pub status: DeviceStatus,
    pub deviations: Vec<Deviation>,
    pub actions: Vec<ActionResult>,
    pub checked_at: DateTime<Utc>,
}

impl DeviceReport {
    pub fn stable(device: DeviceId) -> Self {
        Self {
            device,
            status: DeviceStatus::Stable,
            deviations: Vec::new(),
            actions: Vec::new(),
            checked_at: Utc::now(),
        }
    }

    pub fn deviating(device: DeviceId, deviations: Vec<Deviation>) -> Self {
        Self {
            device,
            status: DeviceStatus::Deviating,
            deviations,
            actions: Vec::new(),
            checked_at: Utc::now(),
        }
    }

    /// Report for a fix attempt: `Fixed` only when every action applied.
    /// Dry-run fixes stay `Deviating` -- nothing on the device changed.
    pub fn fixed(
        device: DeviceId,
        deviations: Vec<Deviation>,
        actions: Vec<ActionResult>,
        dry_run: bool,
    ) -> Self {
        let status = if !dry_run && actions.iter().all(ActionResult::is_applied) {
            DeviceStatus::Fixed
        } else {
            DeviceStatus::Deviating
        };
        Self {
            device,
            status,
            deviations,
            actions,
            checked_at: Utc::now(),
        }
    }

    pub fn failed(device: DeviceId, error: &CoreError) -> Self {
        Self {
            device,
            status: DeviceStatus::Failed {
                reason: error.to_string(),
                kind: error.failure_kind(),
            },
            deviations: Vec::new(),
            actions: Vec::new(),
            checked_at: Utc::now(),
        }
    }

    pub fn skipped(device: DeviceId) -> Self {
        Self {
            device,
            status: DeviceStatus::SkippedCancelled,
            deviations: Vec::new(),
            actions: Vec::new(),
            checked_at: Utc::now(),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, DeviceStatus::Failed { .. })
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self.status {
            DeviceStatus::Failed { kind, .. } => Some(kind),
            _ => None,
        }
    }
}

/// Fleet-level tallies, one per status class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FleetSummary {
    pub stable: usize,
    pub deviating: usize,
    pub fixed: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Ordered collection of per-device outcomes plus the fleet summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchResult {
    pub reports: Vec<DeviceReport>,
    pub summary: FleetSummary,
}

impl BatchResult {
    /// Build from reports already sorted into device-list order.
    pub fn from_reports(reports: Vec<DeviceReport>) -> Self {
        let mut summary = FleetSummary::default();
        for report in &reports {
            match report.status {
                DeviceStatus::Stable => summary.stable += 1,
                DeviceStatus::Deviating => summary.deviating += 1,
                DeviceStatus::Fixed => summary.fixed += 1,
                DeviceStatus::Failed { .. } => summary.failed += 1,
                DeviceStatus::SkippedCancelled => summary.skipped += 1,
            }
        }
        Self { reports, summary }
    }

    /// `check` succeeds iff every device is stable.
    pub fn is_all_stable(&self) -> bool {
        self.summary.stable == self.reports.len()
    }

    /// `fix` succeeds iff every device ended stable (or, under dry-run,
    /// would end stable: deviations were planned and simulated with no
    /// device failures or cancellations).
    pub fn fix_succeeded(&self, dry_run: bool) -> bool {
        if dry_run {
            self.summary.failed == 0 && self.summary.skipped == 0
        } else {
            self.summary.stable + self.summary.fixed == self.reports.len()
        }
    }

    pub fn has_failures(&self) -> bool {
        self.summary.failed > 0
    }
}
