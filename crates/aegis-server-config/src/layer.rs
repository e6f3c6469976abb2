// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde::Deserialize;

use crate::sections::{
	DatabaseConfigLayer, LoggingConfigLayer, SessionConfigLayer, SigningConfigLayer, SignupConfigLayer,
	SsoConfigLayer,
};

/// One source's partial view of the configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerConfigLayer {
	#[serde(default)]
	pub database: Option<DatabaseConfigLayer>,
	#[serde(default)]
	pub logging: Option<LoggingConfigLayer>,
	#[serde(default)]
	pub session: Option<SessionConfigLayer>,
	#[serde(default)]
	pub signing: Option<SigningConfigLayer>,
	#[serde(default)]
	pub sso: Option<SsoConfigLayer>,
	#[serde(default)]
	pub signup: Option<SignupConfigLayer>,
}

fn merge_section<T>(base: &mut Option<T>, other: Option<T>, merge: impl FnOnce(&mut T, T)) {
	match (base.as_mut(), other) {
		(Some(existing), Some(incoming)) => merge(existing, incoming),
		(None, Some(incoming)) => *base = Some(incoming),
		(_, None) => {}
	}
}

impl ServerConfigLayer {
	/// Overlay `other` on `self`; fields set in `other` win.
	pub fn merge(&mut self, other: ServerConfigLayer) {
		merge_section(&mut self.database, other.database, DatabaseConfigLayer::merge);
		merge_section(&mut self.logging, other.logging, LoggingConfigLayer::merge);
		merge_section(&mut self.session, other.session, SessionConfigLayer::merge);
		merge_section(&mut self.signing, other.signing, SigningConfigLayer::merge);
		merge_section(&mut self.sso, other.sso, SsoConfigLayer::merge);
		merge_section(&mut self.signup, other.signup, SignupConfigLayer::merge);
	}
}
