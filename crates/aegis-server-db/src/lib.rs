// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Persistence contracts for sessions, principals and users.
//!
//! Each record type has a store trait with two implementations: an SQLite
//! repository over [`sqlx`] and the in-memory [`MemoryStore`]. Multi-record
//! writes go through a [`UnitOfWork`] committed atomically by a
//! [`TransactionCommitter`].

mod convert;
pub mod error;
pub mod memory;
pub mod pool;
pub mod principal;
pub mod schema;
pub mod session;
pub mod testing;
pub mod unit_of_work;
pub mod user;

pub use error::{DbError, Result};
pub use memory::MemoryStore;
pub use pool::create_pool;
pub use principal::{AnonymousPrincipalStore, OAuthPrincipalStore, PasswordPrincipalStore, PrincipalRepository};
pub use schema::run_migrations;
pub use session::{SessionChange, SessionRepository, SessionStore};
pub use unit_of_work::{run_in_transaction, SqliteCommitter, StagedWrite, TransactionCommitter, UnitOfWork};
pub use user::{UserRepository, UserStore};
