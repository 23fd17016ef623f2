//! Configuration Loader - File Loading, Env Overrides and Validation
//!
//! Handles loading `config.toml`, applying `CHAIN_ID` / `RPC_URL`
//! overrides, validating all parameters, and providing clear error
//! messages for misconfiguration.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use super::AppConfig;

/// Overrides the configured chain id.
pub const CHAIN_ID_ENV: &str = "CHAIN_ID";
/// Overrides the configured RPC endpoint.
pub const RPC_URL_ENV: &str = "RPC_URL";

/// Load and validate configuration from a TOML file, reading overrides
/// from the process environment.
///
/// # Errors
/// Returns detailed error if:
/// - File doesn't exist or can't be read
/// - TOML parsing fails
/// - An override is malformed
/// - Validation rules are violated
pub fn load_config(path: &str) -> Result<AppConfig> {
  load_config_with_env(path, |key| std::env::var(key).ok())
}

/// Same as [`load_config`] with an injectable environment lookup.
pub fn load_config_with_env<F>(path: &str, env: F) -> Result<AppConfig>
where
  F: Fn(&str) -> Option<String>,
{
  let path = Path::new(path);

  let content = std::fs::read_to_string(path)
    .with_context(|| format!("Failed to read config file: {}", path.display()))?;

  let mut config: AppConfig =
    toml::from_str(&content).with_context(|| "Failed to parse config.toml")?;

  apply_env_overrides(&mut config, env)?;
  validate_config(&config)?;

  info!(
    name = %config.app.name,
    chain_id = config.app.chain_id,
    contract_sets = config.contracts.len(),
    "Configuration loaded successfully"
  );

  Ok(config)
}

/// Apply `CHAIN_ID` and `RPC_URL`. Empty values are ignored.
fn apply_env_overrides<F>(config: &mut AppConfig, env: F) -> Result<()>
where
  F: Fn(&str) -> Option<String>,
{
  if let Some(raw) = env(CHAIN_ID_ENV).filter(|v| !v.trim().is_empty()) {
    config.app.chain_id = raw
      .trim()
      .parse()
      .with_context(|| format!("{CHAIN_ID_ENV} must be an integer, got {raw:?}"))?;
  }

  if let Some(url) = env(RPC_URL_ENV).filter(|v| !v.trim().is_empty()) {
    config.rpc.url = url.trim().to_string();
  }

  Ok(())
}

/// Validate all configuration parameters.
///
/// The target chain id itself is not checked here: an unsupported id is
/// reported by the workflow when the market is resolved.
fn validate_config(config: &AppConfig) -> Result<()> {
  anyhow::ensure!(!config.app.name.is_empty(), "app.name must not be empty");

  // RPC validation
  anyhow::ensure!(!config.rpc.url.is_empty(), "RPC URL must not be empty");
  anyhow::ensure!(
    config.rpc.poll_interval_ms > 0,
    "rpc.poll_interval_ms must be positive"
  );
  if let Some(timeout) = config.rpc.confirmation_timeout_secs {
    anyhow::ensure!(
      timeout > 0,
      "rpc.confirmation_timeout_secs must be positive when set"
    );
  }

  // Contract sets: supported chains, non-zero addresses, one set per chain
  config.contracts_by_chain()?;

  Ok(())
}
