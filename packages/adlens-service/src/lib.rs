mod dedup;
mod error;
mod prefetch;
mod resolver;
mod search;
mod subscription;

use std::{
	future::Future,
	pin::Pin,
	sync::{Arc, Mutex, MutexGuard},
};

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

pub use error::{Error, Result};

use crate::{
	dedup::InFlightRegistry, prefetch::PrefetchSet, resolver::ResolverSet,
	subscription::SubscriptionSet,
};
use adlens_config::Config;
use adlens_domain::Post;
use adlens_gateway::{PushEvent, SearchPage};
use adlens_storage::CacheStore;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait SearchProvider
where
	Self: Send + Sync,
{
	fn search<'a>(
		&'a self,
		cfg: &'a adlens_config::Gateway,
		query: &'a str,
		offset: u32,
		limit: u32,
		cancel: &'a CancellationToken,
	) -> BoxFuture<'a, color_eyre::Result<SearchPage>>;
}

pub trait PushProvider
where
	Self: Send + Sync,
{
	fn subscribe<'a>(
		&'a self,
		cfg: &'a adlens_config::Gateway,
		correlation_id: &'a str,
		push_token: &'a str,
		cancel: CancellationToken,
		tx: mpsc::Sender<PushEvent>,
	) -> BoxFuture<'a, color_eyre::Result<()>>;
}

#[derive(Clone)]
pub struct Providers {
	pub search: Arc<dyn SearchProvider>,
	pub push: Arc<dyn PushProvider>,
}
impl Providers {
	pub fn new(search: Arc<dyn SearchProvider>, push: Arc<dyn PushProvider>) -> Self {
		Self { search, push }
	}
}
impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);

		Self { search: provider.clone(), push: provider }
	}
}

struct DefaultProviders;
impl SearchProvider for DefaultProviders {
	fn search<'a>(
		&'a self,
		cfg: &'a adlens_config::Gateway,
		query: &'a str,
		offset: u32,
		limit: u32,
		cancel: &'a CancellationToken,
	) -> BoxFuture<'a, color_eyre::Result<SearchPage>> {
		Box::pin(async move {
			adlens_gateway::search_blogs(cfg, query, offset, limit, cancel)
				.await
				.map_err(color_eyre::Report::new)
		})
	}
}
impl PushProvider for DefaultProviders {
	fn subscribe<'a>(
		&'a self,
		cfg: &'a adlens_config::Gateway,
		correlation_id: &'a str,
		push_token: &'a str,
		cancel: CancellationToken,
		tx: mpsc::Sender<PushEvent>,
	) -> BoxFuture<'a, color_eyre::Result<()>> {
		Box::pin(async move {
			adlens_gateway::subscribe_push(cfg, correlation_id, push_token, cancel, tx)
				.await
				.map_err(color_eyre::Report::new)
		})
	}
}

/// What the current page looks like right now. Published on every visible
/// change through [`AdlensService::snapshots`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Snapshot {
	pub query: String,
	pub page: u32,
	pub posts: Vec<Post>,
	pub total_results: u64,
	pub sponsored_results: u64,
	pub items_per_page: u32,
	pub is_loading: bool,
	pub error: Option<String>,
}
impl Snapshot {
	pub fn pending_count(&self) -> usize {
		self.posts.iter().filter(|post| post.is_pending()).count()
	}
}

/// Query orchestration over the result cache: deduplicated fetches, chunked
/// first-page loads, push-driven classification with a timeout fallback, and
/// next-page prefetch.
pub struct AdlensService {
	pub cfg: Config,
	providers: Providers,
	cache: Mutex<CacheStore>,
	in_flight: InFlightRegistry,
	prefetch: PrefetchSet,
	subscriptions: SubscriptionSet,
	resolver: ResolverSet,
	snapshot_tx: watch::Sender<Snapshot>,
}
impl AdlensService {
	pub fn new(cfg: Config) -> Arc<Self> {
		Self::with_providers(cfg, Providers::default())
	}

	pub fn with_providers(cfg: Config, providers: Providers) -> Arc<Self> {
		let cache = CacheStore::open(&cfg.cache, cfg.search.items_per_page);
		let (snapshot_tx, _) = watch::channel(Snapshot::default());

		Arc::new(Self {
			cfg,
			providers,
			cache: Mutex::new(cache),
			in_flight: InFlightRegistry::default(),
			prefetch: PrefetchSet::default(),
			subscriptions: SubscriptionSet::default(),
			resolver: ResolverSet::default(),
			snapshot_tx,
		})
	}

	/// A live view of the current page; see [`Snapshot`].
	pub fn snapshots(&self) -> watch::Receiver<Snapshot> {
		self.snapshot_tx.subscribe()
	}

	fn lock_cache(&self) -> MutexGuard<'_, CacheStore> {
		self.cache.lock().unwrap_or_else(|err| err.into_inner())
	}

	fn publish(&self, snapshot: Snapshot) {
		let _ = self.snapshot_tx.send(snapshot);
	}

	/// Re-renders `(query, page)` from cache when it is the page on screen.
	/// Classification updates for any other page stay cache-only.
	pub(crate) fn republish_if_current(&self, query: &str, page: u32) {
		let (is_loading, error) = {
			let current = self.snapshot_tx.borrow();

			if current.query != query || current.page != page {
				return;
			}

			(current.is_loading, current.error.clone())
		};

		self.publish(self.snapshot_from_cache(query, page, is_loading, error));
	}

	fn snapshot_from_cache(
		&self,
		query: &str,
		page: u32,
		is_loading: bool,
		error: Option<String>,
	) -> Snapshot {
		let cache = self.lock_cache();
		let (total_results, sponsored_results) = cache
			.keyword_data(query)
			.map(|data| (data.total_results, data.sponsored_results))
			.unwrap_or((0, 0));

		Snapshot {
			query: query.to_string(),
			page,
			posts: cache.page(query, page).map(|entry| entry.posts.clone()).unwrap_or_default(),
			total_results,
			sponsored_results,
			items_per_page: cache.items_per_page(),
			is_loading,
			error,
		}
	}
}
