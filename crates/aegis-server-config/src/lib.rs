// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration for the Aegis server.
//!
//! Layers are merged in precedence order (highest wins):
//! 1. Environment variables (`AEGIS_SERVER_*`)
//! 2. Config file (`/etc/aegis/server.toml` or an explicit path)
//! 3. Built-in defaults
//!
//! The signing key is a secret and is only read from
//! `AEGIS_SERVER_SIGNING_KEY` or the file named by
//! `AEGIS_SERVER_SIGNING_KEY_FILE`.

pub mod error;
pub mod layer;
pub mod secret;
pub mod sections;
pub mod sources;

pub use error::{ConfigError, SecretEnvError};
pub use layer::ServerConfigLayer;
pub use secret::load_secret_env;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource, SIGNING_KEY_ENV};

use std::path::PathBuf;

use tracing::{debug, info};

/// Fully resolved server configuration.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
	pub database: DatabaseConfig,
	pub logging: LoggingConfig,
	pub session: SessionConfig,
	pub signing: SigningConfig,
	pub sso: SsoConfig,
	pub signup: SignupConfig,
}

pub fn load_config() -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource::new()),
	])
}

pub fn load_config_with_file(config_path: impl Into<PathBuf>) -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource::new()),
	])
}

pub fn load_from_sources(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<ServerConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = ServerConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		merged.merge(source.load()?);
	}

	finalize(merged)
}

fn finalize(layer: ServerConfigLayer) -> Result<ServerConfig, ConfigError> {
	let config = ServerConfig {
		database: layer.database.unwrap_or_default().finalize(),
		logging: layer.logging.unwrap_or_default().finalize(),
		session: layer.session.unwrap_or_default().finalize(),
		signing: layer.signing.unwrap_or_default().finalize(),
		sso: layer.sso.unwrap_or_default().finalize(),
		signup: layer.signup.unwrap_or_default().finalize(),
	};

	validate_config(&config)?;

	info!(
		database = %config.database.url,
		log_format = %config.logging.format,
		refresh_tokens = config.session.refresh_token_enabled,
		signing_key_configured = config.signing.key.is_some(),
		sso_access_token_flow = config.sso.external_access_token_flow_enabled,
		"server configuration loaded"
	);

	Ok(config)
}

fn validate_config(config: &ServerConfig) -> Result<(), ConfigError> {
	if config.session.secret_bytes < MIN_SECRET_BYTES {
		return Err(ConfigError::Validation(format!(
			"session.secret_bytes must be at least {MIN_SECRET_BYTES}"
		)));
	}
	if config.signing.validity_secs == 0 {
		return Err(ConfigError::Validation("signing.validity_secs must be positive".to_string()));
	}
	if config.signup.login_id_keys.is_empty() {
		return Err(ConfigError::Validation("signup.login_id_keys must not be empty".to_string()));
	}
	for key in &config.signup.verify_code_keys {
		if !config.signup.login_id_keys.iter().any(|k| &k.key == key) {
			return Err(ConfigError::Validation(format!(
				"signup.verify_code_keys names unknown login id key '{key}'"
			)));
		}
	}
	Ok(())
}
