// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authorization URLs for redirect-based SSO.
//!
//! A client asks for the provider's authorization URL, sends the user there,
//! and gets the result delivered to its `callback_url`. The attempt's
//! parameters travel in the provider's `state` parameter.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use aegis_server_auth::{AuthError, UserId};
use serde::{Deserialize, Serialize};
use url::Url;

/// How the client presents the provider's login page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UxMode {
	WebRedirect,
	WebPopup,
	Ios,
	Android,
}

impl UxMode {
	pub fn as_str(&self) -> &'static str {
		match self {
			UxMode::WebRedirect => "web_redirect",
			UxMode::WebPopup => "web_popup",
			UxMode::Ios => "ios",
			UxMode::Android => "android",
		}
	}
}

impl fmt::Display for UxMode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for UxMode {
	type Err = AuthError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"web_redirect" => Ok(UxMode::WebRedirect),
			"web_popup" => Ok(UxMode::WebPopup),
			"ios" => Ok(UxMode::Ios),
			"android" => Ok(UxMode::Android),
			other => Err(AuthError::InvalidArgument(format!("unknown ux_mode: {other}"))),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthAction {
	Login,
}

/// Client payload for an authorization URL. Fields are checked by
/// [`AuthUrlRequest::into_params`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthUrlRequest {
	#[serde(default)]
	pub scope: Vec<String>,
	/// Extra provider query parameters, such as `prompt`.
	#[serde(default)]
	pub options: BTreeMap<String, String>,
	#[serde(default)]
	pub callback_url: String,
	#[serde(default)]
	pub ux_mode: String,
}

impl AuthUrlRequest {
	pub fn new(callback_url: impl Into<String>, ux_mode: UxMode) -> Self {
		Self {
			callback_url: callback_url.into(),
			ux_mode: ux_mode.as_str().to_string(),
			..Self::default()
		}
	}

	pub fn with_scope<I, S>(mut self, scope: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.scope = scope.into_iter().map(Into::into).collect();
		self
	}

	pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.options.insert(key.into(), value.into());
		self
	}

	/// `callback_url` and `ux_mode` are required.
	pub fn into_params(self, action: AuthAction, user_id: Option<UserId>) -> Result<AuthUrlParams, AuthError> {
		if self.callback_url.is_empty() {
			return Err(AuthError::InvalidArgument("callback_url is required".to_string()));
		}
		let callback_url = Url::parse(&self.callback_url)
			.map_err(|e| AuthError::InvalidArgument(format!("invalid callback_url: {e}")))?;
		if self.ux_mode.is_empty() {
			return Err(AuthError::InvalidArgument("ux_mode is required".to_string()));
		}
		let ux_mode = self.ux_mode.parse()?;

		Ok(AuthUrlParams {
			scope: self.scope,
			options: self.options,
			state: AuthUrlState {
				action,
				callback_url: callback_url.into(),
				ux_mode,
				user_id,
			},
		})
	}
}

/// Round-tripped through the provider as its `state` parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUrlState {
	pub action: AuthAction,
	/// Validated absolute URL.
	pub callback_url: String,
	pub ux_mode: UxMode,
	/// Set when an authenticated user starts the attempt.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub user_id: Option<UserId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUrlParams {
	pub scope: Vec<String>,
	pub options: BTreeMap<String, String>,
	pub state: AuthUrlState,
}
