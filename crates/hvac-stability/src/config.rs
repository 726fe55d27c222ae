//! Profile resolution: config file + environment + CLI flags.
//!
//! Produces a fully-resolved `RunContext` so command handlers never
//! touch ambient state -- credentials and tuning are explicit values
//! passed into the gateway client and orchestrator.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use hvac_config::{Config, Profile};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Everything a connected command needs, resolved up front.
pub struct RunContext {
    pub profile_name: String,
    pub gateway: url::Url,
    pub username: String,
    pub password: SecretString,
    pub policy_path: PathBuf,
    pub timeout: Duration,
    pub concurrency: usize,
}

/// The profile name in effect: CLI flag, then config default, then "default".
pub fn active_profile_name(global: &GlobalOpts, cfg: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| cfg.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Resolve the full run context from config + flags.
pub fn resolve_context(global: &GlobalOpts) -> Result<RunContext, CliError> {
    let cfg = hvac_config::load_config_or_default();
    let profile_name = active_profile_name(global, &cfg);

    if let Some(profile) = cfg.profiles.get(&profile_name) {
        return resolve_profile(profile, &profile_name, &cfg, global);
    }

    // No profile found -- try to build from CLI flags / env vars alone.
    let gateway_str = global.gateway.as_deref().ok_or_else(|| CliError::NoConfig {
        path: hvac_config::config_path().display().to_string(),
    })?;
    let gateway = parse_gateway(gateway_str)?;

    let username = global
        .username
        .clone()
        .ok_or_else(|| CliError::NoCredentials {
            profile: profile_name.clone(),
        })?;
    let password = std::env::var("HVAC_PASSWORD")
        .map(SecretString::from)
        .map_err(|_| CliError::NoCredentials {
            profile: profile_name.clone(),
        })?;

    Ok(RunContext {
        profile_name,
        gateway,
        username,
        password,
        policy_path: hvac_config::default_policy_path(),
        timeout: Duration::from_secs(global.timeout),
        concurrency: cfg.defaults.concurrency,
    })
}

fn resolve_profile(
    profile: &Profile,
    profile_name: &str,
    cfg: &Config,
    global: &GlobalOpts,
) -> Result<RunContext, CliError> {
    let gateway = match global.gateway.as_deref() {
        Some(flag) => parse_gateway(flag)?,
        None => hvac_config::gateway_url(profile)?,
    };

    // Clap's env attribute already folded HVAC_USERNAME into the flag.
    let username = global
        .username
        .clone()
        .or_else(|| profile.username.clone())
        .ok_or_else(|| CliError::NoCredentials {
            profile: profile_name.to_owned(),
        })?;

    let password = hvac_config::resolve_password(profile, profile_name)?;

    let policy_path = profile
        .policy
        .clone()
        .unwrap_or_else(hvac_config::default_policy_path);

    Ok(RunContext {
        profile_name: profile_name.to_owned(),
        gateway,
        username,
        password,
        policy_path,
        timeout: Duration::from_secs(profile.timeout.unwrap_or(global.timeout)),
        concurrency: profile.concurrency.unwrap_or(cfg.defaults.concurrency),
    })
}

fn parse_gateway(raw: &str) -> Result<url::Url, CliError> {
    raw.parse().map_err(|_| CliError::Validation {
        field: "gateway".into(),
        reason: format!("invalid URL: {raw}"),
    })
}
