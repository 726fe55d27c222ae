// ── Batch Orchestrator ──
//
// Fans a check/fix operation out over a set of devices with bounded
// concurrency, isolates per-device failures, retries transient transport
// trouble, and aggregates a fleet-wide result in device-list order.
//
// Each device's pipeline (fetch -> inspect -> diff -> plan -> execute)
// runs independently; the only shared state is the read-only policy and
// the client's connection pool.

use std::time::Duration;

use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::{DeviceClient, DeviceRegistry};
use crate::diff;
use crate::error::CoreError;
use crate::execute::ActionExecutor;
use crate::inspect;
use crate::model::{ActionOutcome, ActionResult, DeviceId};
use crate::plan;
use crate::policy::StabilityPolicy;
use crate::report::{BatchResult, DeviceReport, FailureKind};

/// Special device identifier that expands to the full registry fleet.
pub const ALL_DEVICES: &str = "all";

// ── Options ─────────────────────────────────────────────────────────

/// Retry tuning for transient transport failures, scoped per device.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts per operation (first try included).
    pub max_attempts: u32,
    /// Exponential backoff base: attempt n sleeps `base * 2^(n-1)`.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

/// Tuning for one batch run.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Worker-pool bound: how many device pipelines run at once. Kept
    /// small so a large fleet cannot overwhelm the gateway's rate limits.
    pub concurrency: usize,
    pub retry: RetryPolicy,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            concurrency: 6,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Mode {
    Check,
    Fix { dry_run: bool },
}

// ── Orchestrator ────────────────────────────────────────────────────

/// Drives check/fix batches over the fleet.
pub struct Orchestrator<'a, C, R> {
    client: &'a C,
    registry: &'a R,
    policy: &'a StabilityPolicy,
    options: BatchOptions,
    cancel: CancellationToken,
}

impl<'a, C, R> Orchestrator<'a, C, R>
where
    C: DeviceClient,
    R: DeviceRegistry,
{
    pub fn new(
        client: &'a C,
        registry: &'a R,
        policy: &'a StabilityPolicy,
        options: BatchOptions,
    ) -> Self {
        Self {
            client,
            registry,
            policy,
            options,
            cancel: CancellationToken::new(),
        }
    }

    /// Token callers can cancel (e.g. on Ctrl-C). Cancellation lets
    /// in-flight writes finish but starts no new devices.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Check every requested device against the policy.
    pub async fn run_check(&self, devices: &[DeviceId]) -> Result<BatchResult, CoreError> {
        self.run(devices, Mode::Check).await
    }

    /// Check and correct every requested device. `dry_run` simulates the
    /// corrective writes without mutating any device.
    pub async fn run_fix(
        &self,
        devices: &[DeviceId],
        dry_run: bool,
    ) -> Result<BatchResult, CoreError> {
        self.run(devices, Mode::Fix { dry_run }).await
    }

    // ── Batch driver ─────────────────────────────────────────────────

    async fn run(&self, devices: &[DeviceId], mode: Mode) -> Result<BatchResult, CoreError> {
        let targets = self.resolve_targets(devices).await?;
        info!(devices = targets.len(), ?mode, "starting batch");

        let concurrency = self.options.concurrency.max(1);
        let mut pipeline_stream = futures_util::stream::iter(
            targets
                .iter()
                .cloned()
                .enumerate()
                .map(|(index, device)| self.guarded_pipeline(index, device, mode)),
        )
        .buffer_unordered(concurrency);

        let mut indexed: Vec<(usize, DeviceReport)> = Vec::with_capacity(targets.len());
        while let Some(item) = pipeline_stream.next().await {
            indexed.push(item?);
        }
        drop(pipeline_stream);

        // Deterministic output: original device-list order, regardless of
        // completion order under concurrency.
        indexed.sort_by_key(|(index, _)| *index);
        let reports: Vec<DeviceReport> = indexed.into_iter().map(|(_, report)| report).collect();

        check_fleet_auth(&reports)?;

        let result = BatchResult::from_reports(reports);
        info!(
            stable = result.summary.stable,
            deviating = result.summary.deviating,
            fixed = result.summary.fixed,
            failed = result.summary.failed,
            skipped = result.summary.skipped,
            "batch complete"
        );
        Ok(result)
    }

    /// Expand `all` through the registry -- exactly once, at batch start.
    async fn resolve_targets(&self, devices: &[DeviceId]) -> Result<Vec<DeviceId>, CoreError> {
        if devices.iter().any(|d| d.as_str() == ALL_DEVICES) {
            let fleet = self
                .registry
                .list_devices()
                .await
                .map_err(|e| CoreError::RegistryUnavailable {
                    reason: e.to_string(),
                })?;
            debug!(devices = fleet.len(), "expanded 'all' via registry");
            return Ok(fleet);
        }
        Ok(devices.to_vec())
    }

    /// Wrap one device's pipeline with cancellation and failure isolation.
    /// Only fatal errors escape as `Err`; everything else becomes a report.
    async fn guarded_pipeline(
        &self,
        index: usize,
        device: DeviceId,
        mode: Mode,
    ) -> Result<(usize, DeviceReport), CoreError> {
        if self.cancel.is_cancelled() {
            return Ok((index, DeviceReport::skipped(device)));
        }
        match self.device_pipeline(&device, mode).await {
            Ok(report) => Ok((index, report)),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!(device = %device, error = %e, "device failed; batch continues");
                Ok((index, DeviceReport::failed(device, &e)))
            }
        }
    }

    // ── Per-device pipeline ──────────────────────────────────────────

    async fn device_pipeline(
        &self,
        device: &DeviceId,
        mode: Mode,
    ) -> Result<DeviceReport, CoreError> {
        let payload = self.fetch_with_retry(device).await?;
        let record = inspect::normalize(device, &payload, self.policy)?;
        let deviations = diff::diff(device, &record, self.policy);

        if deviations.is_empty() {
            debug!(device = %device, "stable");
            return Ok(DeviceReport::stable(device.clone()));
        }

        let Mode::Fix { dry_run } = mode else {
            debug!(device = %device, deviations = deviations.len(), "deviating");
            return Ok(DeviceReport::deviating(device.clone(), deviations));
        };

        let actions = plan::plan(self.policy, &deviations)?;
        let executor = ActionExecutor::new(self.client);
        let mut results = Vec::with_capacity(actions.len());

        for action in &actions {
            // An in-flight apply is never interrupted, but once cancelled
            // no further action starts.
            if self.cancel.is_cancelled() {
                results.push(ActionResult {
                    action: action.clone(),
                    outcome: ActionOutcome::SkippedCancelled,
                });
                continue;
            }
            results.push(self.execute_with_retry(&executor, action, dry_run).await);
        }

        Ok(DeviceReport::fixed(
            device.clone(),
            deviations,
            results,
            dry_run,
        ))
    }

    /// Fetch with bounded retries on transient transport failures.
    async fn fetch_with_retry(&self, device: &DeviceId) -> Result<serde_json::Value, CoreError> {
        let max = self.options.retry.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.client.fetch_settings(device).await {
                Ok(payload) => return Ok(payload),
                Err(e) if e.is_transient() && attempt < max => {
                    let delay = self.options.retry.backoff(attempt);
                    debug!(device = %device, attempt, ?delay, error = %e,
                        "transient fetch failure; backing off");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Execute with bounded retries on retryable outcomes. The executor
    /// itself performs a single transport call per invocation.
    async fn execute_with_retry(
        &self,
        executor: &ActionExecutor<'_, C>,
        action: &crate::model::Action,
        dry_run: bool,
    ) -> ActionResult {
        let max = self.options.retry.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let result = executor.execute(action, dry_run).await;
            match result.outcome {
                ActionOutcome::Failed { retryable: true, .. } if attempt < max => {
                    let delay = self.options.retry.backoff(attempt);
                    debug!(device = %action.device, key = %action.key, attempt, ?delay,
                        "transient apply failure; backing off");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                _ => return result,
            }
        }
    }

}

/// When every processed device failed authentication the problem is the
/// credentials, not the fleet: surface one fatal error instead of a page
/// of identical per-device failures.
fn check_fleet_auth(reports: &[DeviceReport]) -> Result<(), CoreError> {
    let processed = reports
        .iter()
        .filter(|r| !matches!(r.status, crate::report::DeviceStatus::SkippedCancelled))
        .count();
    let auth_failures = reports
        .iter()
        .filter(|r| r.failure_kind() == Some(FailureKind::Auth))
        .count();
    if processed > 0 && auth_failures == processed {
        return Err(CoreError::FleetAuthFailure {
            devices: auth_failures,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_per_attempt() {
        let retry = RetryPolicy {
            max_attempts: 4,
            base_delay: Duration::from_millis(100),
        };
        assert_eq!(retry.backoff(1), Duration::from_millis(100));
        assert_eq!(retry.backoff(2), Duration::from_millis(200));
        assert_eq!(retry.backoff(3), Duration::from_millis(400));
    }

    #[test]
    fn default_options_bound_concurrency() {
        let options = BatchOptions::default();
        assert!(options.concurrency >= 4 && options.concurrency <= 8);
        assert_eq!(options.retry.max_attempts, 3);
    }
}
