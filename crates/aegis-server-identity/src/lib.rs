// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Identity resolution and the local authentication flows.
//!
//! - [`IdentityProvider`]: resolves a principal id to its concrete mechanism
//! - [`SignupFlow`]: creates a user, its principals and a first session
//! - [`PasswordLoginFlow`]: authenticates a password principal
//! - [`HookDispatcher`]: delivers post-commit [`AuthEvent`]s to handlers
//!
//! Flows share an [`AuthServices`] bundle and stage every write on one
//! [`UnitOfWork`](aegis_server_db::UnitOfWork). Events are emitted only
//! after the unit of work committed.
//!
//! [`AuthEvent`]: aegis_server_auth::AuthEvent

pub mod hooks;
pub mod login;
pub mod provider;
pub mod response;
pub mod services;
pub mod signup;

pub use hooks::{EventHandler, HookDispatcher, HookError, TracingEventHandler};
pub use login::{LoginRequest, PasswordLoginFlow};
pub use provider::IdentityProvider;
pub use response::AuthResponse;
pub use services::AuthServices;
pub use signup::{SignupConfig, SignupFlow, SignupRequest};
