// ── Core error types ──
//
// User-facing errors from hvac-core. These are NOT API-specific --
// consumers never see HTTP status codes or JSON parse failures directly.
// The `From<hvac_api::Error>` impl translates transport-layer errors
// into domain-appropriate variants.

use thiserror::Error;

use crate::report::FailureKind;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Device-level errors (captured into reports, batch continues) ─
    #[error("Malformed settings payload: {reason}")]
    MalformedSettings { reason: String },

    #[error("Transport failure: {message}")]
    Transport { message: String, transient: bool },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Gateway rejected the request (HTTP {status}): {message}")]
    Gateway { status: u16, message: String },

    #[error("Unknown device: {device}")]
    UnknownDevice { device: String },

    // ── Fleet-level fatal conditions (abort the batch) ───────────────
    /// Every device in the batch failed authentication -- almost
    /// certainly misconfigured credentials, not per-device trouble.
    #[error("Authentication failed for all {devices} device(s) -- check gateway credentials")]
    FleetAuthFailure { devices: usize },

    /// A planned action does not satisfy its own setting rule. This is a
    /// planner bug or an inconsistent policy and must never be swallowed.
    #[error("Policy violation for setting '{key}': {reason}")]
    PolicyViolation { key: String, reason: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Invalid stability policy: {reason}")]
    InvalidPolicy { reason: String },

    #[error("Device registry unavailable: {reason}")]
    RegistryUnavailable { reason: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Fatal errors abort the whole batch instead of being recorded as a
    /// single device's failure.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::PolicyViolation { .. } | Self::FleetAuthFailure { .. } | Self::InvalidPolicy { .. }
        )
    }

    /// Returns `true` if retrying the same operation may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport { transient: true, .. })
    }

    /// Classify this error for per-device failure reporting.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::MalformedSettings { .. } => FailureKind::Malformed,
            Self::Transport { .. } => FailureKind::Transport,
            Self::AuthenticationFailed { .. } => FailureKind::Auth,
            _ => FailureKind::Other,
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<hvac_api::Error> for CoreError {
    fn from(err: hvac_api::Error) -> Self {
        match err {
            hvac_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            hvac_api::Error::SessionExpired => CoreError::AuthenticationFailed {
                message: "Session expired -- re-authentication required".into(),
            },
            hvac_api::Error::Transport(ref e) => CoreError::Transport {
                message: e.to_string(),
                transient: e.is_timeout() || e.is_connect(),
            },
            hvac_api::Error::Timeout { timeout_secs } => CoreError::Transport {
                message: format!("request timed out after {timeout_secs}s"),
                transient: true,
            },
            hvac_api::Error::InvalidUrl(e) => CoreError::Internal(format!("invalid URL: {e}")),
            hvac_api::Error::Gateway { status, message } => {
                if matches!(status, 429 | 502 | 503 | 504) {
                    CoreError::Transport {
                        message: format!("gateway unavailable (HTTP {status}): {message}"),
                        transient: true,
                    }
                } else {
                    CoreError::Gateway { status, message }
                }
            }
            hvac_api::Error::DeviceNotFound { serial } => {
                CoreError::UnknownDevice { device: serial }
            }
            hvac_api::Error::Deserialization { message, body: _ } => CoreError::MalformedSettings {
                reason: format!("gateway response did not decode: {message}"),
            },
        }
    }
}
