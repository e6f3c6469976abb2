// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Asynchronous delivery of post-commit events.
//!
//! [`HookDispatcher`] queues events on a bounded channel and a background
//! task fans them out to every [`EventHandler`]. A full queue drops the
//! event; a failing handler is logged and skipped.

use std::sync::Arc;

use aegis_server_auth::{AuthEvent, EventSink};
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{instrument, warn};

#[derive(Debug, Error)]
pub enum HookError {
	#[error("transient hook failure: {0}")]
	Transient(String),

	#[error("hook rejected event: {0}")]
	Rejected(String),
}

/// Receives events after the flow that produced them committed.
#[async_trait]
pub trait EventHandler: Send + Sync {
	fn name(&self) -> &str;

	/// Whether this handler wants `event`. Defaults to all events.
	fn accepts(&self, _event: &AuthEvent) -> bool {
		true
	}

	async fn handle(&self, event: Arc<AuthEvent>) -> Result<(), HookError>;
}

/// Writes every event to the tracing pipeline.
pub struct TracingEventHandler;

#[async_trait]
impl EventHandler for TracingEventHandler {
	fn name(&self) -> &str {
		"tracing"
	}

	async fn handle(&self, event: Arc<AuthEvent>) -> Result<(), HookError> {
		let payload = serde_json::to_string(event.as_ref()).map_err(|e| HookError::Rejected(e.to_string()))?;
		tracing::info!(target: "aegis::events", event = event.name(), %payload, "auth event");
		Ok(())
	}
}

pub struct HookDispatcher {
	tx: mpsc::Sender<AuthEvent>,
}

impl HookDispatcher {
	/// Spawn the delivery task. Must be called within a Tokio runtime.
	pub fn new(queue_capacity: usize, handlers: Vec<Arc<dyn EventHandler>>) -> Self {
		let (tx, rx) = mpsc::channel(queue_capacity);
		tokio::spawn(Self::background_task(rx, handlers));
		Self { tx }
	}

	async fn background_task(mut rx: mpsc::Receiver<AuthEvent>, handlers: Vec<Arc<dyn EventHandler>>) {
		while let Some(event) = rx.recv().await {
			let event = Arc::new(event);
			for handler in &handlers {
				if !handler.accepts(&event) {
					continue;
				}

				let handler = Arc::clone(handler);
				let event = Arc::clone(&event);
				tokio::spawn(async move {
					if let Err(e) = handler.handle(Arc::clone(&event)).await {
						warn!(handler = handler.name(), event = event.name(), error = %e, "event handler failed");
					}
				});
			}
		}
	}
}

impl EventSink for HookDispatcher {
	#[instrument(skip(self, event), fields(event = event.name()))]
	fn notify(&self, event: AuthEvent) {
		if let Err(e) = self.tx.try_send(event) {
			warn!(error = %e, "event queue full, dropping event");
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use aegis_server_auth::UserId;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use tokio::time::{sleep, Duration};

	struct CountingHandler {
		only: Option<&'static str>,
		count: AtomicUsize,
	}

	impl CountingHandler {
		fn new(only: Option<&'static str>) -> Arc<Self> {
			Arc::new(Self {
				only,
				count: AtomicUsize::new(0),
			})
		}

		fn count(&self) -> usize {
			self.count.load(Ordering::SeqCst)
		}
	}

	#[async_trait]
	impl EventHandler for CountingHandler {
		fn name(&self) -> &str {
			"counting"
		}

		fn accepts(&self, event: &AuthEvent) -> bool {
			self.only.map_or(true, |name| event.name() == name)
		}

		async fn handle(&self, _event: Arc<AuthEvent>) -> Result<(), HookError> {
			self.count.fetch_add(1, Ordering::SeqCst);
			Ok(())
		}
	}

	struct FailingHandler;

	#[async_trait]
	impl EventHandler for FailingHandler {
		fn name(&self) -> &str {
			"failing"
		}

		async fn handle(&self, _event: Arc<AuthEvent>) -> Result<(), HookError> {
			Err(HookError::Transient("smtp down".to_string()))
		}
	}

	fn user_sync() -> AuthEvent {
		AuthEvent::UserSync {
			user_id: UserId::generate(),
		}
	}

	#[tokio::test]
	async fn delivers_to_every_accepting_handler() {
		let all = CountingHandler::new(None);
		let welcome_only = CountingHandler::new(Some("welcome_email"));
		let handlers: Vec<Arc<dyn EventHandler>> = vec![all.clone(), welcome_only.clone()];
		let dispatcher = HookDispatcher::new(16, handlers);

		dispatcher.notify(user_sync());
		dispatcher.notify(AuthEvent::WelcomeEmail {
			user_id: UserId::generate(),
			email: "jane@example.com".to_string(),
		});
		sleep(Duration::from_millis(50)).await;

		assert_eq!(all.count(), 2);
		assert_eq!(welcome_only.count(), 1);
	}

	#[tokio::test]
	async fn failing_handler_does_not_block_others() {
		let counting = CountingHandler::new(None);
		let handlers: Vec<Arc<dyn EventHandler>> = vec![Arc::new(FailingHandler), counting.clone()];
		let dispatcher = HookDispatcher::new(16, handlers);

		dispatcher.notify(user_sync());
		dispatcher.notify(user_sync());
		sleep(Duration::from_millis(50)).await;

		assert_eq!(counting.count(), 2);
	}

	#[tokio::test]
	async fn tracing_handler_accepts_all_events() {
		let handler = TracingEventHandler;
		assert!(handler.handle(Arc::new(user_sync())).await.is_ok());
	}
}
