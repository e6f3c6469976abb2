// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! SSO login for Aegis.
//!
//! An external access token is exchanged for a verified [`ExternalIdentity`]
//! by an [`ExternalAccessTokenProvider`]. The [`SsoOrchestrator`] then
//! reconciles that identity with local users:
//!
//! 1. A known `(provider, provider_user_id)` logs in as its user.
//! 2. Otherwise an email claim matching a password principal in the merge
//!    realm is a duplicate, resolved by the request's [`OnUserDuplicate`]
//!    policy: reject, merge into the existing user, or create a new one.
//! 3. Otherwise a new user is created.
//!
//! User, principal and session writes commit as one unit of work. Events
//! are emitted only after the commit.
//!
//! Providers that support redirect-based login also build authorization
//! URLs; see [`SsoOrchestrator::login_auth_url`].
//!
//! [`ExternalIdentity`]: aegis_server_auth::ExternalIdentity
//! [`OnUserDuplicate`]: aegis_server_auth::OnUserDuplicate

pub mod auth_url;
pub mod config;
pub mod error;
pub mod github;
pub mod orchestrator;
pub mod provider;

pub use auth_url::{AuthAction, AuthUrlParams, AuthUrlRequest, AuthUrlState, UxMode};
pub use config::{LoginState, SsoConfig};
pub use error::OAuthError;
pub use github::{GitHubEmail, GitHubProvider, GitHubUser};
pub use orchestrator::{LoginDecision, SsoOrchestrator};
pub use provider::{ExternalAccessTokenProvider, ProviderRegistry};
