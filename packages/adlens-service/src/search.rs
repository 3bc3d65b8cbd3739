use std::sync::Arc;

use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;

use crate::{
	AdlensService, Error, Result, Snapshot,
	dedup::{PageKey, Ticket, wait_for_outcome},
	subscription::CorrelationBinding,
};
use adlens_storage::MergeArgs;

impl AdlensService {
	/// Runs a search for `raw_query` and loads its first page. The returned
	/// snapshot is the final state of the load; partial states stream through
	/// [`AdlensService::snapshots`] while chunks land.
	pub async fn search(self: &Arc<Self>, raw_query: &str) -> Result<Snapshot> {
		let query = normalize_query(raw_query);

		self.require_query(&query)?;
		self.load_page(&query, 1).await
	}

	/// Loads `page` of an earlier query, from cache when it is fresh.
	pub async fn change_page(self: &Arc<Self>, raw_query: &str, page: u32) -> Result<Snapshot> {
		if page == 0 {
			return Err(self.reject(Error::InvalidPage));
		}

		let query = normalize_query(raw_query);

		self.require_query(&query)?;
		self.load_page(&query, page).await
	}

	/// Whether a fresh, complete copy of `(query, page)` is already cached.
	/// Front ends use this to tell if the next page is ready.
	pub fn is_cached(&self, raw_query: &str, page: u32) -> bool {
		let query = normalize_query(raw_query);
		let cache = self.lock_cache();

		cache.is_fresh_complete(&query, page, OffsetDateTime::now_utc())
	}

	fn require_query(&self, query: &str) -> Result<()> {
		let min = self.cfg.search.min_query_chars;

		if (query.chars().count() as u32) < min {
			return Err(self.reject(Error::QueryTooShort { min }));
		}

		Ok(())
	}

	// Validation failures surface on the snapshot channel too, without
	// disturbing whatever page is on screen.
	fn reject(&self, err: Error) -> Error {
		let mut snapshot = self.snapshots().borrow().clone();

		snapshot.is_loading = false;
		snapshot.error = Some(err.to_string());
		self.publish(snapshot);

		err
	}

	async fn load_page(self: &Arc<Self>, query: &str, page: u32) -> Result<Snapshot> {
		let key = PageKey { query: query.to_string(), page };

		// The foreground owns the key: a prefetch racing it stops before it
		// can write.
		self.prefetch.cancel(&key);

		match self.in_flight.join(&key) {
			Ticket::Follower(slot) => {
				tracing::debug!(%query, page, "Joining an in-flight fetch.");

				wait_for_outcome(slot).await.map_err(|message| Error::Search { message })?;

				let snapshot = self.snapshot_from_cache(query, page, false, None);

				self.publish(snapshot.clone());

				Ok(snapshot)
			},
			Ticket::Leader(guard) => match self.fetch_page(query, page).await {
				Ok(snapshot) => {
					guard.finish(Ok(()));

					Ok(snapshot)
				},
				Err(err) => {
					let message = err.to_string();

					tracing::error!(error = %message, %query, page, "Page load failed.");
					guard.finish(Err(message.clone()));
					self.publish(self.snapshot_from_cache(query, page, false, Some(message)));

					Err(err)
				},
			},
		}
	}

	async fn fetch_page(self: &Arc<Self>, query: &str, page: u32) -> Result<Snapshot> {
		let items_per_page = self.cfg.search.items_per_page;
		let cached = {
			let cache = self.lock_cache();

			cache.is_fresh_complete(query, page, OffsetDateTime::now_utc())
		};

		if cached {
			tracing::debug!(%query, page, "Serving a page from cache.");

			let snapshot = self.snapshot_from_cache(query, page, false, None);

			self.publish(snapshot.clone());
			// Items left pending by an earlier session settle by deadline;
			// there is no channel left to reopen for them.
			self.ensure_pending_resolution(query, page, None);
			self.spawn_prefetch(query, page + 1);

			return Ok(snapshot);
		}

		self.publish(self.snapshot_from_cache(query, page, true, None));

		let cancel = CancellationToken::new();
		let base_offset = (page - 1) * items_per_page;
		let chunks = self.chunk_plan(page);
		let mut push_hints = None;

		for (idx, (chunk_offset, limit)) in chunks.iter().copied().enumerate() {
			let response = self
				.providers
				.search
				.search(&self.cfg.gateway, query, base_offset + chunk_offset, limit, &cancel)
				.await
				.map_err(|err| Error::Search { message: err.to_string() })?;

			if push_hints.is_none()
				&& let (Some(correlation_id), Some(push_token)) =
					(response.correlation_id.clone(), response.push_token.clone())
			{
				push_hints = Some((correlation_id, push_token));
			}

			let received = response.posts.len() as u32;
			let entry = {
				let mut cache = self.lock_cache();

				cache.merge(
					MergeArgs {
						query,
						page,
						posts: &response.posts,
						start_index: chunk_offset,
						total_results: response.total_results,
						sponsored_results: response.sponsored_results,
					},
					OffsetDateTime::now_utc(),
				)
			};
			let last = idx + 1 == chunks.len();

			if !last {
				self.publish(self.snapshot_from_cache(query, page, true, None));
			}
			// The backend ran out of items for this page; further chunks
			// would come back empty.
			if entry.is_complete || received < limit {
				break;
			}
		}

		let snapshot = self.snapshot_from_cache(query, page, false, None);

		self.publish(snapshot.clone());
		self.ensure_pending_resolution(query, page, push_hints);
		self.spawn_prefetch(query, page + 1);

		Ok(snapshot)
	}

	// Page 1 loads in small chunks so the first results render early; deeper
	// pages load in one request.
	fn chunk_plan(&self, page: u32) -> Vec<(u32, u32)> {
		let search = &self.cfg.search;

		if page == 1 {
			(0..search.initial_chunk_count)
				.map(|idx| (idx * search.initial_chunk_size, search.initial_chunk_size))
				.collect()
		} else {
			vec![(0, search.items_per_page)]
		}
	}

	fn ensure_pending_resolution(
		self: &Arc<Self>,
		query: &str,
		page: u32,
		push_hints: Option<(String, String)>,
	) {
		if !self.has_pending(query, page) {
			return;
		}

		let binding = match push_hints {
			Some((correlation_id, push_token)) => {
				let binding = CorrelationBinding {
					correlation_id,
					push_token,
					query: query.to_string(),
					page,
				};

				self.spawn_subscription(binding.clone());

				binding
			},
			None => CorrelationBinding {
				correlation_id: format!("local:{query}/{page}"),
				push_token: String::new(),
				query: query.to_string(),
				page,
			},
		};

		self.arm_resolver(&binding);
	}
}

fn normalize_query(raw: &str) -> String {
	raw.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn queries_normalize_before_keying() {
		assert_eq!(normalize_query("  Coffee Beans "), "coffee beans");
	}
}
