// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! SQLite schema.
//!
//! `principal_ids` registers every principal id regardless of mechanism so
//! ids stay unique across the three principal tables.

use sqlx::sqlite::SqlitePool;

use crate::error::DbError;

const MIGRATIONS: &[&str] = &[
	r#"
	CREATE TABLE IF NOT EXISTS users (
		id TEXT PRIMARY KEY,
		created_at TEXT NOT NULL,
		updated_at TEXT NOT NULL,
		last_login_at TEXT,
		disabled INTEGER NOT NULL DEFAULT 0
	)
	"#,
	r#"
	CREATE TABLE IF NOT EXISTS principal_ids (
		id TEXT PRIMARY KEY,
		kind TEXT NOT NULL
	)
	"#,
	r#"
	CREATE TABLE IF NOT EXISTS password_principals (
		id TEXT PRIMARY KEY REFERENCES principal_ids(id),
		user_id TEXT NOT NULL REFERENCES users(id),
		login_id_key TEXT NOT NULL,
		login_id TEXT NOT NULL,
		realm TEXT NOT NULL,
		hashed_password TEXT NOT NULL,
		claims TEXT NOT NULL,
		created_at TEXT NOT NULL,
		updated_at TEXT NOT NULL,
		UNIQUE(login_id_key, login_id, realm)
	)
	"#,
	r#"
	CREATE TABLE IF NOT EXISTS anonymous_principals (
		id TEXT PRIMARY KEY REFERENCES principal_ids(id),
		user_id TEXT NOT NULL REFERENCES users(id),
		created_at TEXT NOT NULL
	)
	"#,
	r#"
	CREATE TABLE IF NOT EXISTS oauth_principals (
		id TEXT PRIMARY KEY REFERENCES principal_ids(id),
		user_id TEXT NOT NULL REFERENCES users(id),
		provider TEXT NOT NULL,
		provider_user_id TEXT NOT NULL,
		profile TEXT NOT NULL,
		claims TEXT NOT NULL,
		created_at TEXT NOT NULL,
		updated_at TEXT NOT NULL,
		UNIQUE(provider, provider_user_id)
	)
	"#,
	r#"
	CREATE TABLE IF NOT EXISTS sessions (
		id TEXT PRIMARY KEY,
		user_id TEXT NOT NULL,
		principal_id TEXT NOT NULL,
		client_id TEXT,
		created_at TEXT NOT NULL,
		accessed_at TEXT NOT NULL,
		access_token_hash TEXT NOT NULL,
		access_token_created_at TEXT NOT NULL,
		refresh_token_hash TEXT,
		authenticator_id TEXT,
		authenticator_type TEXT,
		authenticator_oob_channel TEXT,
		authenticator_updated_at TEXT,
		ip_address TEXT,
		user_agent TEXT
	)
	"#,
	"CREATE INDEX IF NOT EXISTS idx_sessions_user_id ON sessions(user_id)",
	"CREATE INDEX IF NOT EXISTS idx_password_principals_user_id ON password_principals(user_id)",
	"CREATE INDEX IF NOT EXISTS idx_oauth_principals_user_id ON oauth_principals(user_id)",
	"CREATE INDEX IF NOT EXISTS idx_anonymous_principals_user_id ON anonymous_principals(user_id)",
];

/// Create all tables and indexes. Safe to run repeatedly.
#[tracing::instrument(skip(pool))]
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), DbError> {
	let mut tx = pool.begin().await?;
	for statement in MIGRATIONS {
		sqlx::query(statement).execute(&mut *tx).await?;
	}
	tx.commit().await?;

	tracing::info!(statements = MIGRATIONS.len(), "database schema up to date");
	Ok(())
}
