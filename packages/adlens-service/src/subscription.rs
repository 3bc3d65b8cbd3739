use std::{
	collections::HashMap,
	sync::{Arc, Mutex},
};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::AdlensService;
use adlens_domain::Post;
use adlens_gateway::{AnalysisResult, PushEvent};

/// Ties a push channel back to the page whose items it classifies.
#[derive(Clone, Debug)]
pub(crate) struct CorrelationBinding {
	pub(crate) correlation_id: String,
	pub(crate) push_token: String,
	pub(crate) query: String,
	pub(crate) page: u32,
}

/// Live push channels keyed by correlation id.
#[derive(Default)]
pub(crate) struct SubscriptionSet {
	active: Mutex<HashMap<String, CancellationToken>>,
}
impl SubscriptionSet {
	fn begin(&self, correlation_id: &str) -> Option<CancellationToken> {
		let mut active = self.active.lock().unwrap_or_else(|err| err.into_inner());

		if active.contains_key(correlation_id) {
			return None;
		}

		let token = CancellationToken::new();

		active.insert(correlation_id.to_string(), token.clone());

		Some(token)
	}

	fn end(&self, correlation_id: &str) {
		let mut active = self.active.lock().unwrap_or_else(|err| err.into_inner());

		active.remove(correlation_id);
	}

	pub(crate) fn close(&self, correlation_id: &str) {
		let active = self.active.lock().unwrap_or_else(|err| err.into_inner());

		if let Some(token) = active.get(correlation_id) {
			token.cancel();
		}
	}
}

impl AdlensService {
	/// Opens the push channel for `binding` and applies its classifications
	/// to the cache as they arrive. No-op when a channel for the correlation
	/// id is already open.
	pub(crate) fn spawn_subscription(self: &Arc<Self>, binding: CorrelationBinding) {
		let Some(cancel) = self.subscriptions.begin(&binding.correlation_id) else {
			return;
		};
		let (tx, rx) = mpsc::channel(32);
		let transport = self.clone();
		let transport_cancel = cancel.clone();
		let transport_binding = binding.clone();

		tokio::spawn(async move {
			let result = transport
				.providers
				.push
				.subscribe(
					&transport.cfg.gateway,
					&transport_binding.correlation_id,
					&transport_binding.push_token,
					transport_cancel,
					tx,
				)
				.await;

			if let Err(err) = result {
				let correlation_id = &transport_binding.correlation_id;

				tracing::warn!(error = %err, %correlation_id, "Push transport failed.");
			}
		});

		let consumer = self.clone();

		tokio::spawn(async move { consumer.consume_push(binding, rx, cancel).await });
	}

	async fn consume_push(
		self: Arc<Self>,
		binding: CorrelationBinding,
		mut rx: mpsc::Receiver<PushEvent>,
		cancel: CancellationToken,
	) {
		let correlation_id = binding.correlation_id.clone();
		let mut acknowledged = false;

		while let Some(event) = rx.recv().await {
			match event {
				PushEvent::Connected => {
					acknowledged = true;

					tracing::debug!(%correlation_id, "Push channel acknowledged.");
				},
				PushEvent::Heartbeat => {},
				PushEvent::Message(result) => {
					if result.req_id != binding.correlation_id {
						tracing::debug!(
							req_id = %result.req_id,
							%correlation_id,
							"Ignoring a push message for another correlation id."
						);

						continue;
					}

					self.apply_analysis(&binding, &result);

					if !self.has_pending(&binding.query, binding.page) {
						// Everything settled: neither the channel nor the
						// timeout fallback has work left.
						self.resolver.disarm(&binding.correlation_id);
						cancel.cancel();

						break;
					}
				},
			}
		}

		tracing::debug!(%correlation_id, acknowledged, "Push channel closed.");

		self.subscriptions.end(&binding.correlation_id);
	}

	/// Replaces the matching pending item and republishes the page when it is
	/// the one on screen. A message whose job id matches nothing is dropped.
	fn apply_analysis(&self, binding: &CorrelationBinding, result: &AnalysisResult) {
		let patched = {
			let mut cache = self.lock_cache();
			let Some(post) = cache.page(&binding.query, binding.page).and_then(|entry| {
				entry.posts.iter().find(|post| post.carries_job(&result.job_id)).cloned()
			}) else {
				tracing::debug!(job_id = %result.job_id, "Push message matched no pending item.");

				return;
			};
			let resolved = post.resolved(
				result.is_sponsored,
				result.sponsor_probability,
				result.sponsor_indicator.clone(),
			);

			cache.patch_item(
				&binding.query,
				binding.page,
				|post| post.carries_job(&result.job_id),
				resolved,
			)
		};

		if patched {
			tracing::debug!(
				job_id = %result.job_id,
				sponsored = result.is_sponsored,
				"Classified an item from the push channel."
			);

			self.republish_if_current(&binding.query, binding.page);
		}
	}

	pub(crate) fn has_pending(&self, query: &str, page: u32) -> bool {
		let cache = self.lock_cache();

		cache
			.page(query, page)
			.map(|entry| entry.posts.iter().any(Post::is_pending))
			.unwrap_or(false)
	}
}
