// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! `sign-url` and `verify-url` subcommands.

use aegis_common_secret::SecretBytes;
use aegis_common_signing::RequestSigner;
use aegis_server_config::{SigningConfig, SIGNING_KEY_ENV};
use anyhow::{anyhow, bail, Context};
use chrono::{DateTime, Utc};
use http::{Method, Request};

pub fn signer_from_config(config: &SigningConfig, validity_secs: Option<u64>) -> anyhow::Result<RequestSigner> {
	let key = config
		.key
		.as_ref()
		.ok_or_else(|| anyhow!("{SIGNING_KEY_ENV} (or {SIGNING_KEY_ENV}_FILE) is not set"))?;
	if key.is_empty() {
		bail!("{SIGNING_KEY_ENV} is empty");
	}
	let validity_secs = validity_secs.unwrap_or(config.validity_secs);
	if validity_secs == 0 {
		bail!("validity must be positive");
	}
	Ok(RequestSigner::new(
		SecretBytes::new(key.expose().as_bytes().to_vec()),
		validity_secs,
	))
}

fn build_request(method: &str, url: &str) -> anyhow::Result<Request<()>> {
	let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
		.with_context(|| format!("invalid method '{method}'"))?;
	Request::builder()
		.method(method)
		.uri(url)
		.body(())
		.with_context(|| format!("invalid url '{url}'"))
}

/// Returns `url` with the signature query parameters appended.
pub fn sign_url(signer: &RequestSigner, method: &str, url: &str, now: DateTime<Utc>) -> anyhow::Result<String> {
	let mut request = build_request(method, url)?;
	signer.sign(&mut request, now)?;
	Ok(request.uri().to_string())
}

pub fn verify_url(signer: &RequestSigner, method: &str, url: &str, now: DateTime<Utc>) -> anyhow::Result<()> {
	let request = build_request(method, url)?;
	signer.verify(&request, now)?;
	Ok(())
}
