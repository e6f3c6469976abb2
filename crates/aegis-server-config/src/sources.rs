// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: defaults, TOML files and environment variables.

use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;

use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::ServerConfigLayer;
use crate::secret::resolve_secret;
use crate::sections::{
	DatabaseConfigLayer, LogFormat, LoggingConfigLayer, SessionConfigLayer, SigningConfigLayer, SignupConfigLayer,
	SsoConfigLayer,
};

pub const SIGNING_KEY_ENV: &str = "AEGIS_SERVER_SIGNING_KEY";

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<ServerConfigLayer, ConfigError>;
}

pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(ServerConfigLayer::default())
	}
}

pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new("/etc/aegis/server.toml")
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(ServerConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: ServerConfigLayer = toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
			path: self.path.clone(),
			source: e,
		})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: `AEGIS_SERVER_<SECTION>_<FIELD>`.
#[derive(Default)]
pub struct EnvSource {
	vars: Option<HashMap<String, String>>,
}

impl EnvSource {
	/// Read from the process environment.
	pub fn new() -> Self {
		Self::default()
	}

	/// Read from a fixed set of variables instead of the process environment.
	pub fn from_vars<I, K, V>(vars: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<String>,
	{
		Self {
			vars: Some(vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect()),
		}
	}

	fn raw(&self, name: &str) -> Option<String> {
		match &self.vars {
			Some(vars) => vars.get(name).cloned(),
			None => std::env::var(name).ok(),
		}
	}

	fn var(&self, name: &str) -> Option<String> {
		self.raw(name).filter(|s| !s.is_empty())
	}

	fn bool(&self, name: &str) -> Option<bool> {
		self.var(name).map(|v| v.eq_ignore_ascii_case("true") || v == "1")
	}

	fn parsed<T: FromStr>(&self, name: &str) -> Result<Option<T>, ConfigError>
	where
		T::Err: std::fmt::Display,
	{
		match self.var(name) {
			Some(v) => v.parse().map(Some).map_err(|e| ConfigError::InvalidValue {
				key: name.to_string(),
				message: format!("invalid value '{v}': {e}"),
			}),
			None => Ok(None),
		}
	}

	fn list(&self, name: &str) -> Option<Vec<String>> {
		self.var(name).map(|v| {
			v.split(',')
				.map(str::trim)
				.filter(|s| !s.is_empty())
				.map(str::to_string)
				.collect()
		})
	}

	fn database(&self) -> Result<DatabaseConfigLayer, ConfigError> {
		Ok(DatabaseConfigLayer {
			url: self.var("AEGIS_SERVER_DATABASE_URL"),
			max_connections: self.parsed("AEGIS_SERVER_DATABASE_MAX_CONNECTIONS")?,
		})
	}

	fn logging(&self) -> Result<LoggingConfigLayer, ConfigError> {
		Ok(LoggingConfigLayer {
			level: self.var("AEGIS_SERVER_LOG_LEVEL"),
			format: self.parsed::<LogFormat>("AEGIS_SERVER_LOG_FORMAT")?,
		})
	}

	fn session(&self) -> Result<SessionConfigLayer, ConfigError> {
		Ok(SessionConfigLayer {
			secret_bytes: self.parsed("AEGIS_SERVER_SESSION_SECRET_BYTES")?,
			refresh_token_enabled: self.bool("AEGIS_SERVER_SESSION_REFRESH_TOKEN_ENABLED"),
		})
	}

	fn signing(&self) -> Result<SigningConfigLayer, ConfigError> {
		Ok(SigningConfigLayer {
			key: resolve_secret(SIGNING_KEY_ENV, |name| self.raw(name))?,
			validity_secs: self.parsed("AEGIS_SERVER_SIGNING_VALIDITY_SECS")?,
		})
	}

	fn sso(&self) -> SsoConfigLayer {
		SsoConfigLayer {
			external_access_token_flow_enabled: self.bool("AEGIS_SERVER_SSO_ACCESS_TOKEN_FLOW_ENABLED"),
			welcome_email_enabled: self.bool("AEGIS_SERVER_SSO_WELCOME_EMAIL_ENABLED"),
			allow_merge: self.bool("AEGIS_SERVER_SSO_ALLOW_MERGE"),
			allow_create_new: self.bool("AEGIS_SERVER_SSO_ALLOW_CREATE_NEW"),
			github_api_url: self.var("AEGIS_SERVER_SSO_GITHUB_API_URL"),
			github_authorize_url: self.var("AEGIS_SERVER_SSO_GITHUB_AUTHORIZE_URL"),
			github_client_id: self.var("AEGIS_SERVER_SSO_GITHUB_CLIENT_ID"),
		}
	}

	fn signup(&self) -> Result<SignupConfigLayer, ConfigError> {
		const KEYS: &str = "AEGIS_SERVER_SIGNUP_LOGIN_ID_KEYS";
		let login_id_keys = match self.var(KEYS) {
			Some(v) => Some(crate::sections::parse_login_id_keys(&v).map_err(|message| {
				ConfigError::InvalidValue {
					key: KEYS.to_string(),
					message,
				}
			})?),
			None => None,
		};
		Ok(SignupConfigLayer {
			login_id_keys,
			welcome_email_enabled: self.bool("AEGIS_SERVER_SIGNUP_WELCOME_EMAIL_ENABLED"),
			verify_code_keys: self.list("AEGIS_SERVER_SIGNUP_VERIFY_CODE_KEYS"),
		})
	}
}

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading environment variables");
		Ok(ServerConfigLayer {
			database: Some(self.database()?),
			logging: Some(self.logging()?),
			session: Some(self.session()?),
			signing: Some(self.signing()?),
			sso: Some(self.sso()),
			signup: Some(self.signup()?),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_env_values_parse() {
		let source = EnvSource::from_vars([
			("AEGIS_SERVER_DATABASE_URL", "sqlite::memory:"),
			("AEGIS_SERVER_DATABASE_MAX_CONNECTIONS", "3"),
			("AEGIS_SERVER_LOG_FORMAT", "json"),
			("AEGIS_SERVER_SESSION_REFRESH_TOKEN_ENABLED", "1"),
			("AEGIS_SERVER_SIGNING_KEY", "k"),
			("AEGIS_SERVER_SSO_ALLOW_MERGE", "TRUE"),
			("AEGIS_SERVER_SIGNUP_VERIFY_CODE_KEYS", "email, phone"),
		]);
		let layer = source.load().unwrap();

		let database = layer.database.unwrap();
		assert_eq!(database.url.as_deref(), Some("sqlite::memory:"));
		assert_eq!(database.max_connections, Some(3));
		assert_eq!(layer.logging.unwrap().format, Some(LogFormat::Json));
		assert_eq!(layer.session.unwrap().refresh_token_enabled, Some(true));
		assert_eq!(layer.signing.unwrap().key.unwrap().expose(), "k");
		assert_eq!(layer.sso.unwrap().allow_merge, Some(true));
		assert_eq!(
			layer.signup.unwrap().verify_code_keys,
			Some(vec!["email".to_string(), "phone".to_string()])
		);
	}

	#[test]
	fn test_empty_values_are_unset() {
		let source = EnvSource::from_vars([("AEGIS_SERVER_DATABASE_URL", "")]);
		assert!(source.load().unwrap().database.unwrap().url.is_none());
	}

	#[test]
	fn test_invalid_number_names_key() {
		let source = EnvSource::from_vars([("AEGIS_SERVER_SESSION_SECRET_BYTES", "many")]);
		let err = source.load().unwrap_err();
		assert!(err.to_string().contains("AEGIS_SERVER_SESSION_SECRET_BYTES"));
	}

	#[test]
	fn test_missing_toml_is_skipped() {
		let dir = tempfile::tempdir().unwrap();
		let layer = TomlSource::new(dir.path().join("absent.toml")).load().unwrap();
		assert!(layer.database.is_none());
	}

	#[test]
	fn test_bad_toml_is_error() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("server.toml");
		std::fs::write(&path, "[database\nurl = 1").unwrap();
		assert!(matches!(
			TomlSource::new(&path).load(),
			Err(ConfigError::TomlParse { .. })
		));
	}

	#[test]
	fn test_precedence_order() {
		assert!(Precedence::Defaults < Precedence::ConfigFile);
		assert!(Precedence::ConfigFile < Precedence::Environment);
	}
}
