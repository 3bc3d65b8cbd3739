use std::{
	collections::HashMap,
	sync::{Arc, Mutex},
	time::Duration,
};

use tokio_util::sync::CancellationToken;

use crate::{AdlensService, subscription::CorrelationBinding};

/// Fallback timers keyed by correlation id. When a timer fires, every item
/// still pending on the bound page is settled as non-sponsored.
#[derive(Default)]
pub(crate) struct ResolverSet {
	armed: Mutex<HashMap<String, CancellationToken>>,
}
impl ResolverSet {
	fn arm(&self, correlation_id: &str) -> CancellationToken {
		let mut armed = self.armed.lock().unwrap_or_else(|err| err.into_inner());

		if let Some(previous) = armed.remove(correlation_id) {
			previous.cancel();
		}

		let token = CancellationToken::new();

		armed.insert(correlation_id.to_string(), token.clone());

		token
	}

	pub(crate) fn disarm(&self, correlation_id: &str) {
		let mut armed = self.armed.lock().unwrap_or_else(|err| err.into_inner());

		if let Some(token) = armed.remove(correlation_id) {
			token.cancel();
		}
	}
}

impl AdlensService {
	/// Starts (or restarts) the force-resolution deadline for `binding`.
	pub(crate) fn arm_resolver(self: &Arc<Self>, binding: &CorrelationBinding) {
		let token = self.resolver.arm(&binding.correlation_id);
		let service = self.clone();
		let binding = binding.clone();
		let deadline = Duration::from_millis(service.cfg.push.resolver_timeout_ms);

		tokio::spawn(async move {
			tokio::select! {
				() = token.cancelled() => return,
				() = tokio::time::sleep(deadline) => {},
			}

			service.resolver.disarm(&binding.correlation_id);
			service.subscriptions.close(&binding.correlation_id);
			service.force_resolve(&binding);
		});
	}

	fn force_resolve(&self, binding: &CorrelationBinding) {
		let mut settled = 0_u32;

		{
			let mut cache = self.lock_cache();

			loop {
				let Some(post) = cache
					.page(&binding.query, binding.page)
					.and_then(|entry| entry.posts.iter().find(|post| post.is_pending()).cloned())
				else {
					break;
				};

				if !cache.patch_item(
					&binding.query,
					binding.page,
					|candidate| candidate.is_pending(),
					post.force_resolved(),
				) {
					break;
				}

				settled += 1;
			}
		}

		if settled > 0 {
			tracing::info!(
				query = %binding.query,
				page = binding.page,
				settled,
				"Force-resolved items whose classification never arrived."
			);

			self.republish_if_current(&binding.query, binding.page);
		}
	}
}
