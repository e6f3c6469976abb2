// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Session lifecycle for Aegis authentication flows.
//!
//! [`SessionProvider`] is the only component that writes session records.
//! Its time source and its id/secret source are injected so tests run
//! deterministically and in parallel.

pub mod clock;
pub mod generator;
pub mod provider;

pub use clock::{Clock, MockClock, SystemClock};
pub use generator::{RandomTokenGenerator, SequentialTokenGenerator, TokenGenerator, DEFAULT_SECRET_BYTES};
pub use provider::{SessionProvider, SessionProviderConfig};
