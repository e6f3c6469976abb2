// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

mod database;
mod logging;
mod session;
mod signing;
mod signup;
mod sso;

pub use database::{DatabaseConfig, DatabaseConfigLayer};
pub use logging::{LogFormat, LoggingConfig, LoggingConfigLayer};
pub use session::{SessionConfig, SessionConfigLayer, MIN_SECRET_BYTES};
pub use signing::{SigningConfig, SigningConfigLayer};
pub use signup::{SignupConfig, SignupConfigLayer};
pub use sso::{SsoConfig, SsoConfigLayer};

pub(crate) use signup::parse_login_id_keys;
