// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::atomic::{AtomicU64, Ordering};

use aegis_server_auth::SessionId;
use rand::RngCore;
use uuid::Uuid;

/// Random bytes per token secret.
pub const DEFAULT_SECRET_BYTES: usize = 32;

/// Source of session ids and token secrets.
///
/// Secrets must be printable and must not contain `.`.
pub trait TokenGenerator: Send + Sync {
	fn session_id(&self) -> SessionId;
	fn secret(&self) -> String;
}

/// Cryptographically random ids and hex secrets.
#[derive(Debug, Clone)]
pub struct RandomTokenGenerator {
	secret_bytes: usize,
}

impl RandomTokenGenerator {
	pub fn new(secret_bytes: usize) -> Self {
		Self {
			secret_bytes: secret_bytes.max(16),
		}
	}
}

impl Default for RandomTokenGenerator {
	fn default() -> Self {
		Self::new(DEFAULT_SECRET_BYTES)
	}
}

impl TokenGenerator for RandomTokenGenerator {
	fn session_id(&self) -> SessionId {
		SessionId::generate()
	}

	fn secret(&self) -> String {
		let mut bytes = vec![0u8; self.secret_bytes];
		rand::thread_rng().fill_bytes(&mut bytes);
		hex::encode(bytes)
	}
}

/// Predictable ids and secrets for tests. Never use outside tests.
#[derive(Debug, Default)]
pub struct SequentialTokenGenerator {
	next: AtomicU64,
}

impl SequentialTokenGenerator {
	pub fn new() -> Self {
		Self::default()
	}

	fn bump(&self) -> u64 {
		self.next.fetch_add(1, Ordering::SeqCst) + 1
	}
}

impl TokenGenerator for SequentialTokenGenerator {
	fn session_id(&self) -> SessionId {
		SessionId::new(Uuid::from_u128(self.bump() as u128))
	}

	fn secret(&self) -> String {
		format!("{:064x}", self.bump())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn random_secret_is_hex_of_requested_length() {
		let secret = RandomTokenGenerator::new(32).secret();
		assert_eq!(secret.len(), 64);
		assert!(secret.chars().all(|c| c.is_ascii_hexdigit()));
	}

	#[test]
	fn random_secrets_differ() {
		let generator = RandomTokenGenerator::default();
		assert_ne!(generator.secret(), generator.secret());
		assert_ne!(generator.session_id(), generator.session_id());
	}

	#[test]
	fn short_secret_length_is_raised() {
		assert_eq!(RandomTokenGenerator::new(1).secret().len(), 32);
	}

	#[test]
	fn sequential_ids_are_unique() {
		let generator = SequentialTokenGenerator::new();
		let a = generator.session_id();
		let b = generator.session_id();
		assert_ne!(a, b);
		assert!(!generator.secret().contains('.'));
	}
}
