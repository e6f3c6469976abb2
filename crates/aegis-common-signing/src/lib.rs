// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Expiring HMAC-SHA256 request signatures.
//!
//! [`sign`] appends three query parameters to a request URI:
//!
//! - `x-aegis-date`: unix seconds at signing time
//! - `x-aegis-expires`: validity window in seconds
//! - `x-aegis-signature`: lowercase hex HMAC-SHA256
//!
//! [`verify`] recomputes the MAC and checks it before looking at the clock, so
//! a tampered request is always reported as [`SigningError::InvalidSignature`]
//! even when it is also stale.
//!
//! # Canonical encoding
//!
//! The MAC input is a sequence of fields, each written as an 8-byte big-endian
//! length followed by the raw bytes:
//!
//! 1. the version tag [`CANONICAL_VERSION`]
//! 2. the HTTP method
//! 3. the URI path
//! 4. the decimal number of signed query segments
//! 5. every non-empty `&`-separated query segment except `x-aegis-signature`,
//!    sorted bytewise, exactly as it appears in the URI
//!
//! Segments are never percent-decoded. `+`, `%20` and `%2B` are distinct, as
//! are `%FF` and `%EF%BF%BD`, and `flag` differs from `flag=`. Together with the
//! length prefixes this makes the encoding injective over the signed query.
//! The layout is frozen under the version tag; any change needs a new tag.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use http::uri::{PathAndQuery, Uri};
use http::Request;
use sha2::Sha256;
use url::form_urlencoded;

use aegis_common_secret::SecretBytes;

type HmacSha256 = Hmac<Sha256>;

pub const CANONICAL_VERSION: &str = "AEGIS-HMAC-SHA256-V1";
pub const DATE_PARAM: &str = "x-aegis-date";
pub const EXPIRES_PARAM: &str = "x-aegis-expires";
pub const SIGNATURE_PARAM: &str = "x-aegis-signature";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SigningError {
	#[error("invalid signature")]
	InvalidSignature,

	#[error("expired signature")]
	ExpiredSignature,

	#[error("malformed request uri: {0}")]
	MalformedUri(String),
}

/// Holds a signing key together with the default validity window.
#[derive(Clone, Debug)]
pub struct RequestSigner {
	key: SecretBytes,
	validity_secs: u64,
}

impl RequestSigner {
	pub fn new(key: SecretBytes, validity_secs: u64) -> Self {
		Self { key, validity_secs }
	}

	pub fn validity_secs(&self) -> u64 {
		self.validity_secs
	}

	pub fn sign<B>(&self, request: &mut Request<B>, signed_at: DateTime<Utc>) -> Result<(), SigningError> {
		sign(self.key.expose(), request, signed_at, self.validity_secs)
	}

	pub fn verify<B>(&self, request: &Request<B>, now: DateTime<Utc>) -> Result<(), SigningError> {
		verify(self.key.expose(), request, now)
	}
}

/// Sign `request` in place.
///
/// Query segments already present are kept byte-for-byte, except stale
/// `x-aegis-*` parameters from a previous signature, which are replaced.
#[tracing::instrument(skip(key, request), fields(method = %request.method(), path = request.uri().path()))]
pub fn sign<B>(
	key: &[u8],
	request: &mut Request<B>,
	signed_at: DateTime<Utc>,
	validity_secs: u64,
) -> Result<(), SigningError> {
	let uri = request.uri().clone();
	let path = uri.path().to_string();

	let mut segments: Vec<String> = uri
		.query()
		.unwrap_or_default()
		.split('&')
		.filter(|segment| !segment.is_empty() && !is_reserved_segment(segment))
		.map(str::to_string)
		.collect();

	segments.push(encode_pair(DATE_PARAM, &signed_at.timestamp().to_string()));
	segments.push(encode_pair(EXPIRES_PARAM, &validity_secs.to_string()));

	let signed: Vec<&str> = segments.iter().map(String::as_str).collect();
	let message = canonical_message(request.method().as_str(), &path, &signed);
	let signature = hex::encode(compute_mac(key, &message)?);

	segments.push(encode_pair(SIGNATURE_PARAM, &signature));
	let path_and_query = format!("{path}?{}", segments.join("&"));

	let mut parts = uri.into_parts();
	parts.path_and_query = Some(
		PathAndQuery::try_from(path_and_query).map_err(|e| SigningError::MalformedUri(e.to_string()))?,
	);
	*request.uri_mut() = Uri::from_parts(parts).map_err(|e| SigningError::MalformedUri(e.to_string()))?;

	tracing::debug!("request signed");
	Ok(())
}

/// Verify a request signed by [`sign`].
///
/// The MAC is checked first; the expiry window (`now - date <= expires`) only
/// after the MAC matched.
#[tracing::instrument(skip(key, request), fields(method = %request.method(), path = request.uri().path()))]
pub fn verify<B>(key: &[u8], request: &Request<B>, now: DateTime<Utc>) -> Result<(), SigningError> {
	let segments: Vec<&str> = request
		.uri()
		.query()
		.unwrap_or_default()
		.split('&')
		.filter(|segment| !segment.is_empty())
		.collect();

	let mut signatures = segments.iter().filter(|s| segment_name(s) == SIGNATURE_PARAM);
	let signature = match (signatures.next(), signatures.next()) {
		(Some(segment), None) => segment_value(segment),
		_ => return Err(SigningError::InvalidSignature),
	};
	let expected = hex::decode(signature).map_err(|_| SigningError::InvalidSignature)?;

	let signed: Vec<&str> = segments
		.iter()
		.copied()
		.filter(|s| segment_name(s) != SIGNATURE_PARAM)
		.collect();
	let message = canonical_message(request.method().as_str(), request.uri().path(), &signed);

	let mut mac = HmacSha256::new_from_slice(key).map_err(|_| SigningError::InvalidSignature)?;
	mac.update(&message);
	if mac.verify_slice(&expected).is_err() {
		tracing::debug!("signature mismatch");
		return Err(SigningError::InvalidSignature);
	}

	let signed_at: i64 = single_integer(&signed, DATE_PARAM)?;
	let validity: u64 = single_integer(&signed, EXPIRES_PARAM)?;

	let age = u64::try_from(now.timestamp().saturating_sub(signed_at)).unwrap_or(0);
	if age > validity {
		tracing::debug!(age, validity, "signature expired");
		return Err(SigningError::ExpiredSignature);
	}

	Ok(())
}

/// Build the MAC input for the given request fields.
///
/// `segments` are raw query segments, still percent-encoded, without the
/// signature parameter.
pub fn canonical_message(method: &str, path: &str, segments: &[&str]) -> Vec<u8> {
	let mut sorted = segments.to_vec();
	sorted.sort_unstable();

	let mut out = Vec::new();
	write_field(&mut out, CANONICAL_VERSION.as_bytes());
	write_field(&mut out, method.as_bytes());
	write_field(&mut out, path.as_bytes());
	write_field(&mut out, sorted.len().to_string().as_bytes());
	for segment in sorted {
		write_field(&mut out, segment.as_bytes());
	}
	out
}

fn write_field(out: &mut Vec<u8>, bytes: &[u8]) {
	out.extend_from_slice(&(bytes.len() as u64).to_be_bytes());
	out.extend_from_slice(bytes);
}

fn compute_mac(key: &[u8], message: &[u8]) -> Result<Vec<u8>, SigningError> {
	let mut mac = HmacSha256::new_from_slice(key).map_err(|_| SigningError::InvalidSignature)?;
	mac.update(message);
	Ok(mac.finalize().into_bytes().to_vec())
}

fn segment_name(segment: &str) -> &str {
	segment.split_once('=').map_or(segment, |(name, _)| name)
}

fn segment_value(segment: &str) -> &str {
	segment.split_once('=').map_or("", |(_, value)| value)
}

fn encode_pair(name: &str, value: &str) -> String {
	form_urlencoded::Serializer::new(String::new())
		.append_pair(name, value)
		.finish()
}

fn is_reserved_segment(segment: &str) -> bool {
	matches!(segment_name(segment), DATE_PARAM | EXPIRES_PARAM | SIGNATURE_PARAM)
}

fn single_integer<T: std::str::FromStr>(segments: &[&str], name: &str) -> Result<T, SigningError> {
	let mut values = segments.iter().filter(|s| segment_name(s) == name);
	match (values.next(), values.next()) {
		(Some(segment), None) => segment_value(segment)
			.parse()
			.map_err(|_| SigningError::InvalidSignature),
		_ => Err(SigningError::InvalidSignature),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::{Duration, TimeZone};

	const KEY: &[u8] = b"internal-signing-key";

	fn signed_at() -> DateTime<Utc> {
		Utc.with_ymd_and_hms(2006, 1, 2, 15, 4, 5).unwrap()
	}

	fn request(uri: &str) -> Request<()> {
		Request::builder().method("POST").uri(uri).body(()).unwrap()
	}

	fn signed(uri: &str) -> Request<()> {
		let mut req = request(uri);
		sign(KEY, &mut req, signed_at(), 5).unwrap();
		req
	}

	fn with_uri(req: &Request<()>, uri: String) -> Request<()> {
		Request::builder()
			.method(req.method().clone())
			.uri(uri)
			.body(())
			.unwrap()
	}

	mod round_trip {
		use super::*;

		#[test]
		fn verifies_within_window() {
			let req = signed("http://gateway.internal/records/query?app=demo");
			assert_eq!(verify(KEY, &req, signed_at()), Ok(()));
			assert_eq!(verify(KEY, &req, signed_at() + Duration::seconds(5)), Ok(()));
		}

		#[test]
		fn rejects_after_window() {
			let req = signed("http://gateway.internal/records/query");
			assert_eq!(
				verify(KEY, &req, signed_at() + Duration::seconds(6)),
				Err(SigningError::ExpiredSignature)
			);
		}

		#[test]
		fn keeps_existing_query_segments() {
			let req = signed("/hook?b=2&a=%2Fx&flag");
			let query = req.uri().query().unwrap();
			assert!(query.starts_with("b=2&a=%2Fx&flag&"));
			assert!(query.contains(SIGNATURE_PARAM));
		}

		#[test]
		fn resigning_replaces_previous_signature() {
			let mut req = signed("/hook?a=1");
			sign(KEY, &mut req, signed_at() + Duration::seconds(60), 5).unwrap();
			let query = req.uri().query().unwrap();
			assert_eq!(query.matches(SIGNATURE_PARAM).count(), 1);
			assert_eq!(query.matches(DATE_PARAM).count(), 1);
			assert_eq!(verify(KEY, &req, signed_at() + Duration::seconds(61)), Ok(()));
		}

		#[test]
		fn accepts_the_full_validity_range() {
			let mut req = request("/hook");
			sign(KEY, &mut req, signed_at(), u64::MAX).unwrap();
			assert_eq!(verify(KEY, &req, signed_at() + Duration::days(365 * 100)), Ok(()));
		}

		#[test]
		fn signed_in_the_future_is_not_expired() {
			let req = signed("/hook");
			assert_eq!(verify(KEY, &req, signed_at() - Duration::seconds(30)), Ok(()));
		}

		#[test]
		fn request_signer_uses_configured_window() {
			let signer = RequestSigner::new(SecretBytes::new(KEY.to_vec()), 30);
			let mut req = request("/hook");
			signer.sign(&mut req, signed_at()).unwrap();
			assert_eq!(signer.verify(&req, signed_at() + Duration::seconds(30)), Ok(()));
			assert_eq!(
				signer.verify(&req, signed_at() + Duration::seconds(31)),
				Err(SigningError::ExpiredSignature)
			);
		}
	}

	mod tampering {
		use super::*;

		#[test]
		fn changed_parameter_is_invalid() {
			let req = signed("/hook?amount=10");
			let uri = req.uri().to_string().replace("amount=10", "amount=11");
			assert_eq!(
				verify(KEY, &with_uri(&req, uri), signed_at()),
				Err(SigningError::InvalidSignature)
			);
		}

		#[test]
		fn added_parameter_is_invalid() {
			let req = signed("/hook?amount=10");
			let uri = format!("{}&extra=1", req.uri());
			assert_eq!(
				verify(KEY, &with_uri(&req, uri), signed_at()),
				Err(SigningError::InvalidSignature)
			);
		}

		#[test]
		fn changed_path_is_invalid() {
			let req = signed("/hook?amount=10");
			let uri = req.uri().to_string().replace("/hook", "/hooks");
			assert_eq!(
				verify(KEY, &with_uri(&req, uri), signed_at()),
				Err(SigningError::InvalidSignature)
			);
		}

		#[test]
		fn changed_method_is_invalid() {
			let req = signed("/hook");
			let tampered = Request::builder()
				.method("GET")
				.uri(req.uri().clone())
				.body(())
				.unwrap();
			assert_eq!(verify(KEY, &tampered, signed_at()), Err(SigningError::InvalidSignature));
		}

		#[test]
		fn extended_window_is_invalid_not_expired() {
			let req = signed("/hook");
			let uri = req
				.uri()
				.to_string()
				.replace(&format!("{EXPIRES_PARAM}=5"), &format!("{EXPIRES_PARAM}=500"));
			assert_eq!(
				verify(KEY, &with_uri(&req, uri), signed_at() + Duration::seconds(60)),
				Err(SigningError::InvalidSignature)
			);
		}

		#[test]
		fn changed_escape_is_invalid() {
			let req = signed("/hook?a=%FF");
			for replacement in ["a=%FE", "a=%EF%BF%BD", "a=%ff"] {
				let uri = req.uri().to_string().replace("a=%FF", replacement);
				assert_eq!(
					verify(KEY, &with_uri(&req, uri), signed_at()),
					Err(SigningError::InvalidSignature),
					"{replacement}"
				);
			}
		}

		#[test]
		fn plus_and_encoded_space_are_distinct() {
			let req = signed("/hook?q=a+b");
			let uri = req.uri().to_string().replace("q=a+b", "q=a%20b");
			assert_eq!(
				verify(KEY, &with_uri(&req, uri), signed_at()),
				Err(SigningError::InvalidSignature)
			);
		}

		#[test]
		fn wrong_key_is_invalid() {
			let req = signed("/hook");
			assert_eq!(verify(b"other", &req, signed_at()), Err(SigningError::InvalidSignature));
		}

		#[test]
		fn missing_signature_is_invalid() {
			let req = request("/hook?a=1");
			assert_eq!(verify(KEY, &req, signed_at()), Err(SigningError::InvalidSignature));
		}
	}

	mod encoding {
		use super::*;

		#[test]
		fn shifted_boundaries_differ() {
			let a = canonical_message("GET", "/", &["a=bc"]);
			let b = canonical_message("GET", "/", &["ab=c"]);
			assert_ne!(a, b);
		}

		#[test]
		fn escapes_are_not_decoded() {
			let variants = ["a=%FF", "a=%FE", "a=%EF%BF%BD", "a=+", "a=%20", "a=%2B", "a", "a="];
			for (i, x) in variants.iter().enumerate() {
				for y in &variants[i + 1..] {
					assert_ne!(canonical_message("GET", "/", &[*x]), canonical_message("GET", "/", &[*y]), "{x} vs {y}");
				}
			}
		}

		#[test]
		fn path_and_method_boundaries_differ() {
			let a = canonical_message("GE", "T/x", &[]);
			let b = canonical_message("GET", "/x", &[]);
			assert_ne!(a, b);
		}

		#[test]
		fn segment_order_is_irrelevant() {
			let a = canonical_message("GET", "/", &["a=1", "b=2"]);
			let b = canonical_message("GET", "/", &["b=2", "a=1"]);
			assert_eq!(a, b);
		}
	}

	mod proptests {
		use super::*;
		use proptest::prelude::*;

		proptest! {
			#[test]
			fn prop_sign_then_verify(
				key in proptest::collection::vec(any::<u8>(), 1..64),
				name in "[a-z]{1,8}",
				value in "[a-zA-Z0-9 /&=]{0,16}",
				validity in 0u64..3600,
			) {
				let mut req = request(&format!("/rpc?{}", encode_pair(&name, &value)));
				sign(&key, &mut req, signed_at(), validity).unwrap();
				prop_assert_eq!(verify(&key, &req, signed_at() + Duration::seconds(validity as i64)), Ok(()));
				prop_assert_eq!(
					verify(&key, &req, signed_at() + Duration::seconds(validity as i64 + 1)),
					Err(SigningError::ExpiredSignature)
				);
			}

			#[test]
			fn prop_encoding_is_injective_on_segment_sets(
				left in proptest::collection::btree_set("[a-z%=+]{0,6}", 0..4),
				right in proptest::collection::btree_set("[a-z%=+]{0,6}", 0..4),
			) {
				let l: Vec<&str> = left.iter().map(String::as_str).collect();
				let r: Vec<&str> = right.iter().map(String::as_str).collect();
				prop_assert_eq!(
					canonical_message("GET", "/", &l) == canonical_message("GET", "/", &r),
					left == right
				);
			}
		}
	}
}
