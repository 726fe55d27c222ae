// Gateway API HTTP client
//
// Wraps `reqwest::Client` with gateway-specific URL construction, bearer
// token injection, and error-envelope unwrapping. All methods return
// decoded payloads -- the envelope is stripped before the caller sees it.

use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::models::{
    ApplySettingRequest, DeviceListResponse, DeviceSettingsReport, DeviceSummary, ErrorEnvelope,
    LoginRequest, LoginResponse,
};
use crate::transport::TransportConfig;

/// Raw HTTP client for the HVAC cloud gateway.
///
/// Authenticated with a bearer session token obtained via
/// [`login`](Self::login). The underlying `reqwest::Client` pools
/// connections and is safe to share across concurrent callers.
pub struct GatewayClient {
    http: reqwest::Client,
    base_url: Url,
    token: SecretString,
}

impl GatewayClient {
    /// Authenticate against the gateway and return a ready client.
    ///
    /// `POST /v1/session` with the account credentials; a 401/403 response
    /// becomes [`Error::Authentication`].
    pub async fn login(
        base_url: Url,
        username: &str,
        password: &str,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        let url = join_url(&base_url, "v1/session")?;
        debug!(%url, username, "logging in to gateway");

        let resp = http
            .post(url)
            .json(&LoginRequest { username, password })
            .send()
            .await
            .map_err(Error::Transport)?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let message = read_error_message(resp).await;
            return Err(Error::Authentication { message });
        }
        if !status.is_success() {
            let message = read_error_message(resp).await;
            return Err(Error::Gateway {
                status: status.as_u16(),
                message,
            });
        }

        let body = resp.text().await.map_err(Error::Transport)?;
        let login: LoginResponse =
            serde_json::from_str(&body).map_err(|e| Error::Deserialization {
                message: e.to_string(),
                body,
            })?;

        Ok(Self {
            http,
            base_url,
            token: SecretString::from(login.token),
        })
    }

    /// Create a client from an existing session token.
    ///
    /// Used by tests and by callers that cache tokens between invocations.
    pub fn with_token(
        base_url: Url,
        token: SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self {
            http,
            base_url,
            token,
        })
    }

    /// The gateway base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── Endpoints ────────────────────────────────────────────────────

    /// Enumerate all devices registered to the account.
    ///
    /// `GET /v1/devices`
    pub async fn list_devices(&self) -> Result<Vec<DeviceSummary>, Error> {
        let url = join_url(&self.base_url, "v1/devices")?;
        debug!("listing account devices");
        let list: DeviceListResponse = self.get(url).await?;
        Ok(list.devices)
    }

    /// Fetch the current settings report for one device.
    ///
    /// `GET /v1/devices/{serial}/settings`
    pub async fn fetch_settings(&self, serial: &str) -> Result<DeviceSettingsReport, Error> {
        let url = join_url(&self.base_url, &format!("v1/devices/{serial}/settings"))?;
        debug!(serial, "fetching device settings");
        self.get(url).await
    }

    /// Write one setting on one device.
    ///
    /// `PUT /v1/devices/{serial}/settings/{key}` with `{"value": ...}`.
    /// The gateway relays the write to the device and confirms only after
    /// the device acknowledges it.
    pub async fn apply_setting(
        &self,
        serial: &str,
        key: &str,
        value: &serde_json::Value,
    ) -> Result<(), Error> {
        let url = join_url(
            &self.base_url,
            &format!("v1/devices/{serial}/settings/{key}"),
        )?;
        debug!(serial, key, "applying device setting");

        let resp = self
            .http
            .put(url)
            .bearer_auth(self.token.expose_secret())
            .json(&ApplySettingRequest { value })
            .send()
            .await
            .map_err(Error::Transport)?;

        check_status(resp, Some(serial)).await?;
        Ok(())
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Send an authenticated GET and decode the JSON body.
    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        debug!("GET {}", url);

        let resp = self
            .http
            .get(url)
            .bearer_auth(self.token.expose_secret())
            .send()
            .await
            .map_err(Error::Transport)?;

        let resp = check_status(resp, None).await?;
        let body = resp.text().await.map_err(Error::Transport)?;
        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body,
        })
    }
}

/// Translate a non-2xx status into the error taxonomy.
async fn check_status(
    resp: reqwest::Response,
    serial: Option<&str>,
) -> Result<reqwest::Response, Error> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    if status == StatusCode::UNAUTHORIZED {
        return Err(Error::SessionExpired);
    }
    if status == StatusCode::NOT_FOUND {
        if let Some(serial) = serial {
            return Err(Error::DeviceNotFound {
                serial: serial.to_owned(),
            });
        }
    }
    let message = read_error_message(resp).await;
    Err(Error::Gateway {
        status: status.as_u16(),
        message,
    })
}

/// Join a path onto the base URL, tolerating base URLs with or without a
/// trailing slash.
fn join_url(base: &Url, path: &str) -> Result<Url, Error> {
    let trimmed = base.as_str().trim_end_matches('/');
    Url::parse(&format!("{trimmed}/{path}")).map_err(Error::InvalidUrl)
}

/// Best-effort extraction of the gateway's error message body.
async fn read_error_message(resp: reqwest::Response) -> String {
    let fallback = resp.status().to_string();
    let Ok(body) = resp.text().await else {
        return fallback;
    };
    match serde_json::from_str::<ErrorEnvelope>(&body) {
        Ok(envelope) => envelope.error.message,
        Err(_) if !body.is_empty() => body,
        Err(_) => fallback,
    }
}
