//! Shared helpers for command handlers.

use secrecy::ExposeSecret;

use hvac_api::transport::TransportConfig;
use hvac_api::GatewayClient;

use crate::config::RunContext;
use crate::error::CliError;

/// Authenticate against the gateway using the resolved context.
pub async fn connect(ctx: &RunContext) -> Result<GatewayClient, CliError> {
    let transport = TransportConfig {
        timeout: ctx.timeout,
    };
    let client = GatewayClient::login(
        ctx.gateway.clone(),
        &ctx.username,
        ctx.password.expose_secret(),
        &transport,
    )
    .await?;
    tracing::debug!(gateway = %ctx.gateway, profile = %ctx.profile_name, "authenticated");
    Ok(client)
}

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(message: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    let confirmed = dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))?;
    Ok(confirmed)
}
