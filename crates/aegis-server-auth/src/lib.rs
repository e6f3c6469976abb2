// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Domain model for the Aegis authentication core.
//!
//! - [`types`]: id newtypes, realms and the duplicate-user policy
//! - [`session`]: session records and the `<session-id>.<secret>` token format
//! - [`principal`]: the closed set of login mechanisms
//! - [`user`]: the user record principals and sessions hang off
//! - [`events`]: post-commit notifications
//! - [`error`]: the error taxonomy shared by every auth crate

mod argon2_config;
pub mod error;
pub mod events;
pub mod principal;
pub mod session;
pub mod types;
pub mod user;

pub use error::AuthError;
pub use events::{AuthEvent, EventSink, NoopEventSink, RecordingEventSink, SessionCreateReason};
pub use principal::{
	AnonymousPrincipal, Attributes, Claims, ExternalIdentity, LoginIdChecker, LoginIdKey, OAuthPrincipal,
	PasswordPrincipal, Principal, PrincipalKind, StandardClaim, verify_unknown_password,
};
pub use session::{
	format_token, hash_token, parse_token, AuthenticatorInfo, MfaOptions, Session, SessionContext,
	SessionTokenKind, SessionTokens,
};
pub use types::{OnUserDuplicate, PrincipalId, SessionId, UserId, DEFAULT_REALM};
pub use user::User;

pub type Result<T> = std::result::Result<T, AuthError>;
