// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Operational helpers behind the `aegis-server` binary.

pub mod logging;
pub mod runtime;
pub mod signing;
pub mod version;
