// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use aegis_common_secret::SecretString;
use serde::Deserialize;

const DEFAULT_VALIDITY_SECS: u64 = 300;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningConfig {
	/// HMAC key. Only ever read from `AEGIS_SERVER_SIGNING_KEY[_FILE]`.
	pub key: Option<SecretString>,
	pub validity_secs: u64,
}

impl Default for SigningConfig {
	fn default() -> Self {
		SigningConfigLayer::default().finalize()
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SigningConfigLayer {
	#[serde(skip)]
	pub key: Option<SecretString>,
	#[serde(default)]
	pub validity_secs: Option<u64>,
}

impl SigningConfigLayer {
	pub fn merge(&mut self, other: SigningConfigLayer) {
		if other.key.is_some() {
			self.key = other.key;
		}
		if other.validity_secs.is_some() {
			self.validity_secs = other.validity_secs;
		}
	}

	pub fn finalize(self) -> SigningConfig {
		SigningConfig {
			key: self.key,
			validity_secs: self.validity_secs.unwrap_or(DEFAULT_VALIDITY_SECS),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_key_is_not_read_from_toml() {
		let layer: SigningConfigLayer = toml::from_str("key = \"inline\"\nvalidity_secs = 60\n").unwrap();
		assert!(layer.key.is_none());
		assert_eq!(layer.finalize().validity_secs, 60);
	}
}
