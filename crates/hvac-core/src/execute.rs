// ── Action Executor ──
//
// Applies one corrective action to one device, or simulates it under
// dry-run. Failures come back as data so batch processing is never
// interrupted. The executor performs exactly one transport call per
// invocation -- retry policy belongs to the orchestrator.

use tracing::{debug, warn};

use crate::client::DeviceClient;
use crate::model::{Action, ActionOutcome, ActionResult};

/// Executes actions against a device client.
pub struct ActionExecutor<'a, C: DeviceClient> {
    client: &'a C,
}

impl<'a, C: DeviceClient> ActionExecutor<'a, C> {
    pub fn new(client: &'a C) -> Self {
        Self { client }
    }

    /// Execute (or simulate) one action.
    ///
    /// Under dry-run this returns immediately with `SkippedDryRun` and is
    /// guaranteed to make zero client calls. Otherwise the client applies
    /// the target value; transport failures become `Failed { .. }`, never
    /// an `Err` past this boundary.
    pub async fn execute(&self, action: &Action, dry_run: bool) -> ActionResult {
        if dry_run {
            debug!(device = %action.device, key = %action.key, target = %action.target,
                "dry-run: skipping apply");
            return ActionResult {
                action: action.clone(),
                outcome: ActionOutcome::SkippedDryRun,
            };
        }

        match self
            .client
            .apply_setting(&action.device, &action.key, &action.target)
            .await
        {
            Ok(()) => {
                debug!(device = %action.device, key = %action.key, target = %action.target,
                    "setting applied");
                ActionResult {
                    action: action.clone(),
                    outcome: ActionOutcome::Applied,
                }
            }
            Err(e) => {
                warn!(device = %action.device, key = %action.key, error = %e, "apply failed");
                ActionResult {
                    action: action.clone(),
                    outcome: ActionOutcome::Failed {
                        reason: e.to_string(),
                        retryable: e.is_transient(),
                    },
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientError;
    use crate::model::{DeviceId, SettingValue};

    /// A client whose mutating call panics: proves dry-run never touches
    /// the transport.
    struct PanickingClient;

    impl DeviceClient for PanickingClient {
        async fn fetch_settings(&self, _: &DeviceId) -> Result<serde_json::Value, ClientError> {
            panic!("fetch_settings must not be called");
        }

        async fn apply_setting(
            &self,
            _: &DeviceId,
            _: &str,
            _: &SettingValue,
        ) -> Result<(), ClientError> {
            panic!("apply_setting must not be called under dry-run");
        }
    }

    struct FailingClient;

    impl DeviceClient for FailingClient {
        async fn fetch_settings(&self, _: &DeviceId) -> Result<serde_json::Value, ClientError> {
            Err(ClientError::Timeout { timeout_secs: 1 })
        }

        async fn apply_setting(
            &self,
            _: &DeviceId,
            _: &str,
            _: &SettingValue,
        ) -> Result<(), ClientError> {
            Err(ClientError::Gateway {
                status: 503,
                message: "maintenance".into(),
            })
        }
    }

    fn mode_action() -> Action {
        Action {
            device: DeviceId::from("A100"),
            key: "mode".into(),
            target: SettingValue::Str("cool".into()),
            priority: 0,
        }
    }

    #[tokio::test]
    async fn dry_run_never_calls_the_client() {
        let executor = ActionExecutor::new(&PanickingClient);
        let result = executor.execute(&mode_action(), true).await;
        assert!(matches!(result.outcome, ActionOutcome::SkippedDryRun));
        assert!(!result.is_applied());
    }

    #[tokio::test]
    async fn transport_failure_becomes_data() {
        let executor = ActionExecutor::new(&FailingClient);
        let result = executor.execute(&mode_action(), false).await;
        match result.outcome {
            ActionOutcome::Failed { ref reason, retryable } => {
                assert!(reason.contains("maintenance"), "{reason}");
                assert!(retryable, "503 is transient");
            }
            ref other => panic!("expected Failed, got {other:?}"),
        }
    }
}
