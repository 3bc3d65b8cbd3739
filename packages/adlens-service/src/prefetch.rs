use std::{
	collections::HashMap,
	sync::{
		Arc, Mutex,
		atomic::{AtomicU64, Ordering},
	},
};

use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;

use crate::{AdlensService, dedup::PageKey};
use adlens_storage::MergeArgs;

/// Background fetches keyed by page. At most one prefetch runs per key, and
/// a foreground fetch for the same key cancels it before anything is written.
#[derive(Default)]
pub(crate) struct PrefetchSet {
	tasks: Mutex<HashMap<PageKey, (u64, CancellationToken)>>,
	generation: AtomicU64,
}
impl PrefetchSet {
	fn begin(&self, key: &PageKey) -> Option<(u64, CancellationToken)> {
		let mut tasks = self.tasks.lock().unwrap_or_else(|err| err.into_inner());

		if tasks.contains_key(key) {
			return None;
		}

		let generation = self.generation.fetch_add(1, Ordering::Relaxed);
		let token = CancellationToken::new();

		tasks.insert(key.clone(), (generation, token.clone()));

		Some((generation, token))
	}

	pub(crate) fn cancel(&self, key: &PageKey) {
		let mut tasks = self.tasks.lock().unwrap_or_else(|err| err.into_inner());

		if let Some((_, token)) = tasks.remove(key) {
			tracing::debug!(query = %key.query, page = key.page, "Yielding a prefetch to a foreground fetch.");
			token.cancel();
		}
	}

	fn finish(&self, key: &PageKey, generation: u64) {
		let mut tasks = self.tasks.lock().unwrap_or_else(|err| err.into_inner());

		if tasks.get(key).is_some_and(|(current, _)| *current == generation) {
			tasks.remove(key);
		}
	}
}

impl AdlensService {
	/// Warms the cache for `page` in the background. The live snapshot is
	/// never touched from here.
	pub(crate) fn spawn_prefetch(self: &Arc<Self>, query: &str, page: u32) {
		if !self.cfg.search.prefetch {
			return;
		}

		let items_per_page = self.cfg.search.items_per_page;

		{
			let cache = self.lock_cache();

			if let Some(keyword) = cache.keyword_data(query) {
				let last_page = keyword.total_results.div_ceil(u64::from(items_per_page));

				if u64::from(page) > last_page {
					return;
				}
			}
			if cache.is_fresh_complete(query, page, OffsetDateTime::now_utc()) {
				return;
			}
		}

		let key = PageKey { query: query.to_string(), page };
		let Some((generation, token)) = self.prefetch.begin(&key) else {
			return;
		};
		let service = self.clone();

		tokio::spawn(async move {
			let offset = (page - 1) * items_per_page;
			let result = service
				.providers
				.search
				.search(&service.cfg.gateway, &key.query, offset, items_per_page, &token)
				.await;

			match result {
				Ok(response) => {
					let mut cache = service.lock_cache();

					// Checked under the cache lock: the foreground cancels
					// before its own first write, so a cancelled prefetch can
					// never write after this point.
					if !token.is_cancelled() {
						cache.merge(
							MergeArgs {
								query: &key.query,
								page,
								posts: &response.posts,
								start_index: 0,
								total_results: response.total_results,
								sponsored_results: response.sponsored_results,
							},
							OffsetDateTime::now_utc(),
						);

						tracing::debug!(query = %key.query, page, "Prefetched a page.");
					}
				},
				Err(err) if token.is_cancelled() => {
					tracing::debug!(error = %err, "Prefetch cancelled.");
				},
				Err(err) => {
					tracing::debug!(error = %err, query = %key.query, page, "Prefetch failed.");
				},
			}

			service.prefetch.finish(&key, generation);
		});
	}
}
