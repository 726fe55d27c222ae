//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and config errors into user-facing errors with
//! actionable help text, and carries the drift outcome for exit codes.

use miette::Diagnostic;
use thiserror::Error;

use hvac_core::CoreError;

/// Exit codes for the check/fix contract.
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
    /// Devices deviate from the baseline (or would after a dry-run fix).
    pub const DRIFT: i32 = 9;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not reach the gateway")]
    #[diagnostic(
        code(hvac::connection_failed),
        help(
            "Check the gateway URL and your network connection.\n\
             Current gateway: {url}"
        )
    )]
    ConnectionFailed { url: String, reason: String },

    #[error("Request timed out after {seconds}s")]
    #[diagnostic(
        code(hvac::timeout),
        help("Increase timeout with --timeout or check gateway responsiveness.")
    )]
    Timeout { seconds: u64 },

    // ── Authentication ───────────────────────────────────────────────

    #[error("Authentication failed")]
    #[diagnostic(
        code(hvac::auth_failed),
        help(
            "Verify your gateway credentials.\n\
             Run: hvac-stability login"
        )
    )]
    AuthFailed { message: String },

    #[error("No credentials configured for profile '{profile}'")]
    #[diagnostic(
        code(hvac::no_credentials),
        help(
            "Store credentials with: hvac-stability login\n\
             Or set HVAC_USERNAME and HVAC_PASSWORD environment variables."
        )
    )]
    NoCredentials { profile: String },

    // ── Resources ────────────────────────────────────────────────────

    #[error("Device '{serial}' not found in the gateway account")]
    #[diagnostic(
        code(hvac::device_not_found),
        help("Run: hvac-stability list to see available devices")
    )]
    DeviceNotFound { serial: String },

    // ── Reconciliation outcomes ──────────────────────────────────────

    #[error("{deviating} device(s) deviate from the stability baseline")]
    #[diagnostic(
        code(hvac::drift_detected),
        help("Run: hvac-stability fix-device-settings <DEVICE|all> [--dry-run]")
    )]
    DriftDetected { deviating: usize },

    #[error("{failed} device(s) could not be processed")]
    #[diagnostic(
        code(hvac::device_failures),
        help("Per-device errors are listed above; rerun with -v for transport detail.")
    )]
    BatchFailures { failed: usize },

    // ── Gateway / core ───────────────────────────────────────────────

    #[error("Gateway error: {message}")]
    #[diagnostic(code(hvac::gateway_error))]
    GatewayError { message: String },

    #[error("Stability policy is inconsistent: {message}")]
    #[diagnostic(
        code(hvac::policy_violation),
        help("A computed corrective value failed its own rule. Review the policy file.")
    )]
    PolicyViolation { message: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(hvac::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: hvac-stability config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("Configuration file not found")]
    #[diagnostic(
        code(hvac::no_config),
        help(
            "Create one with: hvac-stability config init\n\
             Expected at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error("No stability policy configured")]
    #[diagnostic(
        code(hvac::no_policy),
        help(
            "Create a starter policy with: hvac-stability config init\n\
             Expected at: {path}"
        )
    )]
    NoPolicy { path: String },

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(hvac::validation))]
    Validation { field: String, reason: String },

    #[error(transparent)]
    #[diagnostic(code(hvac::config))]
    Config(Box<hvac_config::ConfigError>),

    // ── Interactive ──────────────────────────────────────────────────

    #[error("Applying settings to '{target}' requires confirmation")]
    #[diagnostic(
        code(hvac::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { target: String },

    // ── IO / Serialization ───────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON payload: {0}")]
    #[diagnostic(code(hvac::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::DeviceNotFound { .. } => exit_code::NOT_FOUND,
            Self::DriftDetected { .. } => exit_code::DRIFT,
            Self::Validation { .. } | Self::NonInteractiveRequiresYes { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── Conversions ──────────────────────────────────────────────────────

impl From<hvac_config::ConfigError> for CliError {
    fn from(err: hvac_config::ConfigError) -> Self {
        match err {
            hvac_config::ConfigError::NoCredentials { profile } => {
                CliError::NoCredentials { profile }
            }
            hvac_config::ConfigError::NoPolicy { profile: _ } => CliError::NoPolicy {
                path: hvac_config::default_policy_path().display().to_string(),
            },
            hvac_config::ConfigError::Validation { field, reason } => {
                CliError::Validation { field, reason }
            }
            other => CliError::Config(Box::new(other)),
        }
    }
}

impl From<hvac_api::Error> for CliError {
    fn from(err: hvac_api::Error) -> Self {
        match err {
            hvac_api::Error::Authentication { message } => CliError::AuthFailed { message },
            hvac_api::Error::SessionExpired => CliError::AuthFailed {
                message: "session expired".into(),
            },
            hvac_api::Error::Timeout { timeout_secs } => CliError::Timeout {
                seconds: timeout_secs,
            },
            hvac_api::Error::Transport(ref e) if e.is_timeout() => CliError::Timeout { seconds: 0 },
            hvac_api::Error::Transport(ref e) => CliError::ConnectionFailed {
                url: e.url().map(ToString::to_string).unwrap_or_default(),
                reason: e.to_string(),
            },
            hvac_api::Error::DeviceNotFound { serial } => CliError::DeviceNotFound { serial },
            other => CliError::GatewayError {
                message: other.to_string(),
            },
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::AuthenticationFailed { message } => CliError::AuthFailed { message },
            CoreError::FleetAuthFailure { devices } => CliError::AuthFailed {
                message: format!("all {devices} device(s) rejected the credentials"),
            },
            CoreError::PolicyViolation { key, reason } => CliError::PolicyViolation {
                message: format!("setting '{key}': {reason}"),
            },
            CoreError::InvalidPolicy { reason } => CliError::Validation {
                field: "policy".into(),
                reason,
            },
            CoreError::UnknownDevice { device } => CliError::DeviceNotFound { serial: device },
            CoreError::Transport { message, .. } => CliError::ConnectionFailed {
                url: String::new(),
                reason: message,
            },
            CoreError::RegistryUnavailable { reason } => CliError::GatewayError {
                message: format!("device registry unavailable: {reason}"),
            },
            other => CliError::GatewayError {
                message: other.to_string(),
            },
        }
    }
}
