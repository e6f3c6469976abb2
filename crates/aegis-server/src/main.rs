// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Aegis authentication server binary.

use std::path::PathBuf;

use aegis_server::runtime::AuthRuntime;
use aegis_server::{logging, signing, version};
use aegis_server_auth::UserId;
use anyhow::Context;
use clap::{Parser, Subcommand};

/// Aegis - sessions, identities and SSO login.
#[derive(Parser, Debug)]
#[command(name = "aegis-server", about = "Aegis authentication server", version)]
struct Args {
	/// Config file (defaults to /etc/aegis/server.toml)
	#[arg(long, global = true, env = "AEGIS_SERVER_CONFIG")]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Show version and build information
	Version,

	/// Create or upgrade the database schema
	Migrate,

	/// Print a signed copy of a URL
	SignUrl {
		/// HTTP method the signature is bound to
		#[arg(long, default_value = "GET")]
		method: String,

		/// Override signing.validity_secs
		#[arg(long)]
		validity_secs: Option<u64>,

		url: String,
	},

	/// Check a signed URL; exits non-zero when invalid or expired
	VerifyUrl {
		#[arg(long, default_value = "GET")]
		method: String,

		url: String,
	},

	/// Log a user out everywhere by deleting all of their sessions
	RevokeSessions {
		user_id: String,
	},
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();

	if let Command::Version = args.command {
		println!("{}", version::format_version_info());
		return Ok(());
	}

	dotenvy::dotenv().ok();

	let config = match &args.config {
		Some(path) => aegis_server_config::load_config_with_file(path)?,
		None => aegis_server_config::load_config()?,
	};

	logging::init_tracing(&config.logging)?;

	match args.command {
		Command::Version => {}
		Command::Migrate => {
			tracing::info!(database = %config.database.url, "running migrations");
			let pool = aegis_server_db::create_pool(&config.database.url, config.database.max_connections).await?;
			aegis_server_db::run_migrations(&pool).await?;
			tracing::info!("migrations complete");
		}
		Command::SignUrl {
			method,
			validity_secs,
			url,
		} => {
			let signer = signing::signer_from_config(&config.signing, validity_secs)?;
			println!("{}", signing::sign_url(&signer, &method, &url, chrono::Utc::now())?);
		}
		Command::VerifyUrl { method, url } => {
			let signer = signing::signer_from_config(&config.signing, None)?;
			signing::verify_url(&signer, &method, &url, chrono::Utc::now())?;
			println!("valid");
		}
		Command::RevokeSessions { user_id } => {
			let user_id: UserId = user_id.parse().with_context(|| format!("invalid user id '{user_id}'"))?;
			let pool = aegis_server_db::create_pool(&config.database.url, config.database.max_connections).await?;
			let runtime = AuthRuntime::from_config(&config, pool)?;
			let before = runtime.services.sessions.list(&user_id).await?.len();
			runtime.services.sessions.invalidate_all(&user_id, None).await?;
			println!("revoked {before} session(s)");
		}
	}

	Ok(())
}
