// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use aegis_server_auth::AuthError;

/// Failures verifying an access token with an external provider.
#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
	#[error("HTTP request failed: {0}")]
	HttpRequest(#[from] reqwest::Error),

	/// The provider rejected the access token.
	#[error("access token rejected by {0}")]
	Unauthorized(String),

	#[error("provider API error: {0}")]
	Api(String),

	#[error("failed to parse response: {0}")]
	Parse(String),

	/// The provider lacks settings needed for the requested operation.
	#[error("provider not configured: {0}")]
	NotConfigured(String),
}

impl From<OAuthError> for AuthError {
	fn from(err: OAuthError) -> Self {
		match err {
			OAuthError::NotConfigured(_) => AuthError::InvalidArgument(err.to_string()),
			_ => AuthError::ExternalAuthFailed(err.to_string()),
		}
	}
}
