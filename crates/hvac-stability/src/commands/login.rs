//! Login: verify credentials against the gateway and store them.
//!
//! The password lands in the system keyring; the username and gateway URL
//! are persisted in the profile so later invocations need nothing but the
//! command name.

use std::time::Duration;

use hvac_api::transport::TransportConfig;
use hvac_api::GatewayClient;
use hvac_config::Profile;

use crate::cli::{GlobalOpts, LoginArgs};
use crate::config;
use crate::error::CliError;

pub async fn handle(args: LoginArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut cfg = hvac_config::load_config_or_default();
    let profile_name = config::active_profile_name(global, &cfg);
    let stored = cfg.profiles.get(&profile_name);

    let gateway_str = global
        .gateway
        .clone()
        .or_else(|| stored.map(|p| p.gateway.clone()))
        .ok_or_else(|| CliError::NoConfig {
            path: hvac_config::config_path().display().to_string(),
        })?;
    let gateway: url::Url = gateway_str.parse().map_err(|_| CliError::Validation {
        field: "gateway".into(),
        reason: format!("invalid URL: {gateway_str}"),
    })?;

    // Username: argument, then flag/env, then profile, then prompt.
    let username = match args
        .username
        .or_else(|| global.username.clone())
        .or_else(|| stored.and_then(|p| p.username.clone()))
    {
        Some(u) => u,
        None => dialoguer::Input::new()
            .with_prompt("Username")
            .interact_text()
            .map_err(|e| CliError::Io(std::io::Error::other(e)))?,
    };

    let password = match args.password {
        Some(p) => p,
        None => rpassword::prompt_password("Password: ")?,
    };

    // Verify before storing anything.
    let transport = TransportConfig {
        timeout: Duration::from_secs(global.timeout),
    };
    GatewayClient::login(gateway.clone(), &username, &password, &transport).await?;

    hvac_config::store_password(&profile_name, &password)?;

    let gateway_for_profile = gateway_str.clone();
    cfg.profiles
        .entry(profile_name.clone())
        .and_modify(|p| {
            p.gateway = gateway_str.clone();
            p.username = Some(username.clone());
        })
        .or_insert_with(|| Profile {
            gateway: gateway_for_profile,
            username: Some(username.clone()),
            password: None,
            password_env: None,
            policy: None,
            timeout: None,
            concurrency: None,
        });
    if cfg.default_profile.is_none() {
        cfg.default_profile = Some(profile_name.clone());
    }
    hvac_config::save_config(&cfg)?;

    if !global.quiet {
        eprintln!("Login successful; credentials stored for profile '{profile_name}'");
    }
    Ok(())
}
