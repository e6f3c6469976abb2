// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Wrapper for long-lived secrets held by the auth core.
//!
//! Session token digests, password hashes, HMAC signing keys and third-party
//! access tokens all travel through [`Secret<T>`]. The wrapper:
//!
//! - prints `[REDACTED]` from `Debug`, `Display` and `Serialize`
//! - zeroes its memory on drop
//! - only yields the value through [`Secret::expose`]
//! - compares byte-like contents in constant time via [`Secret::ct_eq`]
//!
//! ```
//! use aegis_common_secret::SecretString;
//!
//! let digest = SecretString::new("9f86d081884c7d65".to_string());
//! assert_eq!(format!("{digest}"), "[REDACTED]");
//! assert!(digest.ct_eq("9f86d081884c7d65"));
//! ```

use std::fmt;

use subtle::ConstantTimeEq;
use zeroize::Zeroize;

/// Placeholder written wherever a secret would otherwise be rendered.
pub const REDACTED: &str = "[REDACTED]";

#[derive(Zeroize)]
#[zeroize(drop)]
pub struct Secret<T>
where
	T: Zeroize,
{
	inner: T,
}

pub type SecretString = Secret<String>;

pub type SecretBytes = Secret<Vec<u8>>;

impl<T> Secret<T>
where
	T: Zeroize,
{
	pub fn new(inner: T) -> Self {
		Self { inner }
	}

	/// Access the wrapped value. Every call site is a place the secret leaves
	/// the wrapper.
	pub fn expose(&self) -> &T {
		&self.inner
	}

	/// Returns an owned copy; the wrapper's own memory is still zeroed on drop.
	pub fn into_inner(self) -> T
	where
		T: Clone,
	{
		self.inner.clone()
	}
}

impl<T> Secret<T>
where
	T: Zeroize + AsRef<[u8]>,
{
	/// Constant-time comparison against a candidate value.
	///
	/// Runs in time dependent only on the lengths of the two inputs, never on
	/// the position of the first differing byte.
	pub fn ct_eq(&self, candidate: impl AsRef<[u8]>) -> bool {
		self.inner.as_ref().ct_eq(candidate.as_ref()).into()
	}

	pub fn is_empty(&self) -> bool {
		self.inner.as_ref().is_empty()
	}
}

impl<T> Clone for Secret<T>
where
	T: Zeroize + Clone,
{
	fn clone(&self) -> Self {
		Self::new(self.inner.clone())
	}
}

impl<T> fmt::Debug for Secret<T>
where
	T: Zeroize,
{
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("Secret").field(&REDACTED).finish()
	}
}

impl<T> fmt::Display for Secret<T>
where
	T: Zeroize,
{
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(REDACTED)
	}
}

impl<T> PartialEq for Secret<T>
where
	T: Zeroize + AsRef<[u8]>,
{
	fn eq(&self, other: &Self) -> bool {
		self.ct_eq(other.inner.as_ref())
	}
}

impl<T> Eq for Secret<T> where T: Zeroize + AsRef<[u8]> {}

impl From<String> for SecretString {
	fn from(value: String) -> Self {
		Self::new(value)
	}
}

impl From<&str> for SecretString {
	fn from(value: &str) -> Self {
		Self::new(value.to_string())
	}
}

#[cfg(feature = "serde")]
mod serde_impl {
	use super::{Secret, REDACTED};
	use serde::{Deserialize, Deserializer, Serialize, Serializer};
	use zeroize::Zeroize;

	impl<T> Serialize for Secret<T>
	where
		T: Zeroize,
	{
		fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
		where
			S: Serializer,
		{
			serializer.serialize_str(REDACTED)
		}
	}

	impl<'de, T> Deserialize<'de> for Secret<T>
	where
		T: Deserialize<'de> + Zeroize,
	{
		fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
		where
			D: Deserializer<'de>,
		{
			T::deserialize(deserializer).map(Secret::new)
		}
	}
}
