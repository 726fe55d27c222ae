use thiserror::Error;

/// Top-level error type for the `hvac-api` crate.
///
/// Covers every failure mode of the gateway API surface: authentication,
/// transport, structured gateway errors, and payload decoding.
/// `hvac-core` maps these into domain-appropriate variants.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login rejected or session token no longer accepted.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// Session token expired mid-run.
    #[error("Session expired -- re-authentication required")]
    SessionExpired,

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Gateway ─────────────────────────────────────────────────────
    /// Structured error from the gateway (parsed from the error envelope).
    #[error("Gateway error (HTTP {status}): {message}")]
    Gateway { status: u16, message: String },

    /// Device serial unknown to the gateway account.
    #[error("Device not found: {serial}")]
    DeviceNotFound { serial: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this error indicates auth was rejected
    /// and credentials need attention.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Authentication { .. } | Self::SessionExpired)
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout { .. } => true,
            Self::Gateway { status, .. } => matches!(status, 429 | 502 | 503 | 504),
            _ => false,
        }
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            Self::DeviceNotFound { .. } => true,
            Self::Gateway { status: 404, .. } => true,
            _ => false,
        }
    }
}
