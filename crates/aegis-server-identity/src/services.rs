// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use aegis_server_auth::EventSink;
use aegis_server_db::{AnonymousPrincipalStore, OAuthPrincipalStore, PasswordPrincipalStore, TransactionCommitter, UserStore};
use aegis_server_session::SessionProvider;

use crate::provider::IdentityProvider;

/// Collaborators shared by every authentication flow.
#[derive(Clone)]
pub struct AuthServices {
	pub identities: Arc<IdentityProvider>,
	pub sessions: Arc<SessionProvider>,
	pub committer: Arc<dyn TransactionCommitter>,
	pub events: Arc<dyn EventSink>,
}

impl AuthServices {
	pub fn new(
		identities: Arc<IdentityProvider>,
		sessions: Arc<SessionProvider>,
		committer: Arc<dyn TransactionCommitter>,
		events: Arc<dyn EventSink>,
	) -> Self {
		Self {
			identities,
			sessions,
			committer,
			events,
		}
	}

	/// Wire flows over a store that also commits units of work, such as
	/// [`MemoryStore`](aegis_server_db::MemoryStore).
	pub fn from_store<S>(store: Arc<S>, sessions: Arc<SessionProvider>, events: Arc<dyn EventSink>) -> Self
	where
		S: UserStore
			+ PasswordPrincipalStore
			+ AnonymousPrincipalStore
			+ OAuthPrincipalStore
			+ TransactionCommitter
			+ 'static,
	{
		Self::new(
			Arc::new(IdentityProvider::from_store(store.clone())),
			sessions,
			store,
			events,
		)
	}
}
