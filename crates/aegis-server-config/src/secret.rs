// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Secrets from the environment.
//!
//! A secret named `NAME` is read from `NAME`, or from the file whose path is
//! in `NAME_FILE`. Setting both is an error. Trailing newlines in files are
//! trimmed.

use std::path::PathBuf;

use aegis_common_secret::SecretString;

use crate::error::SecretEnvError;

/// Load a secret from the process environment.
pub fn load_secret_env(name: &str) -> Result<Option<SecretString>, SecretEnvError> {
	resolve_secret(name, |key| std::env::var(key).ok())
}

pub(crate) fn resolve_secret<F>(name: &str, lookup: F) -> Result<Option<SecretString>, SecretEnvError>
where
	F: Fn(&str) -> Option<String>,
{
	let direct = lookup(name).filter(|v| !v.is_empty());
	let file = lookup(&format!("{name}_FILE")).filter(|v| !v.is_empty());

	match (direct, file) {
		(Some(_), Some(_)) => Err(SecretEnvError::Ambiguous { name: name.to_string() }),
		(Some(value), None) => Ok(Some(SecretString::new(value))),
		(None, Some(path)) => {
			let path = PathBuf::from(path);
			let content = std::fs::read_to_string(&path).map_err(|source| SecretEnvError::FileRead {
				name: name.to_string(),
				path: path.clone(),
				source,
			})?;
			tracing::debug!(name, path = %path.display(), "loaded secret from file");
			Ok(Some(SecretString::new(content.trim_end_matches(['\r', '\n']).to_string())))
		}
		(None, None) => Ok(None),
	}
}
