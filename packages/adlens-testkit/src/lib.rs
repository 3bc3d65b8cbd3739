//! Scripted providers and fixtures for exercising the service without a
//! network.

use std::{
	collections::{HashMap, VecDeque},
	sync::{
		Mutex,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration,
};

use color_eyre::eyre;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use adlens_config::Config;
use adlens_domain::{IndicatorKind, Post, SponsorIndicator};
use adlens_gateway::{PushEvent, SearchPage};
use adlens_service::{BoxFuture, PushProvider, SearchProvider};

/// A search backend driven entirely by responses scripted per
/// `(query, offset)`. Unscripted requests fail. Latency, when set, applies
/// to every call and respects cancellation.
#[derive(Default)]
pub struct ScriptedSearch {
	responses: Mutex<HashMap<(String, u32), VecDeque<SearchPage>>>,
	calls: AtomicUsize,
	latency: Option<Duration>,
}
impl ScriptedSearch {
	pub fn with_latency(latency: Duration) -> Self {
		Self { latency: Some(latency), ..Self::default() }
	}

	pub fn respond(&self, query: &str, offset: u32, page: SearchPage) {
		let mut responses = self.responses.lock().unwrap_or_else(|err| err.into_inner());

		responses.entry((query.to_string(), offset)).or_default().push_back(page);
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}
impl SearchProvider for ScriptedSearch {
	fn search<'a>(
		&'a self,
		_cfg: &'a adlens_config::Gateway,
		query: &'a str,
		offset: u32,
		_limit: u32,
		cancel: &'a CancellationToken,
	) -> BoxFuture<'a, color_eyre::Result<SearchPage>> {
		Box::pin(async move {
			self.calls.fetch_add(1, Ordering::SeqCst);

			if let Some(latency) = self.latency {
				tokio::select! {
					() = cancel.cancelled() => return Err(eyre::eyre!("Request was cancelled.")),
					() = tokio::time::sleep(latency) => {},
				}
			}

			let mut responses = self.responses.lock().unwrap_or_else(|err| err.into_inner());

			responses
				.get_mut(&(query.to_string(), offset))
				.and_then(VecDeque::pop_front)
				.ok_or_else(|| eyre::eyre!("No scripted response for {query:?} at offset {offset}."))
		})
	}
}

/// A push backend that hands the test a sender per correlation id, so tests
/// emit classification events directly.
#[derive(Default)]
pub struct ScriptedPush {
	channels: Mutex<HashMap<String, mpsc::Sender<PushEvent>>>,
}
impl ScriptedPush {
	pub fn is_subscribed(&self, correlation_id: &str) -> bool {
		let channels = self.channels.lock().unwrap_or_else(|err| err.into_inner());

		channels.contains_key(correlation_id)
	}

	/// Waits for the service to open the channel. Panics after one second;
	/// scripted tests never legitimately wait longer.
	pub async fn subscribed(&self, correlation_id: &str) {
		for _ in 0..100 {
			if self.is_subscribed(correlation_id) {
				return;
			}

			tokio::time::sleep(Duration::from_millis(10)).await;
		}

		panic!("no subscription for {correlation_id:?}");
	}

	pub async fn emit(&self, correlation_id: &str, event: PushEvent) -> bool {
		let sender = {
			let channels = self.channels.lock().unwrap_or_else(|err| err.into_inner());

			channels.get(correlation_id).cloned()
		};
		let Some(sender) = sender else {
			return false;
		};

		sender.send(event).await.is_ok()
	}
}
impl PushProvider for ScriptedPush {
	fn subscribe<'a>(
		&'a self,
		_cfg: &'a adlens_config::Gateway,
		correlation_id: &'a str,
		_push_token: &'a str,
		cancel: CancellationToken,
		tx: mpsc::Sender<PushEvent>,
	) -> BoxFuture<'a, color_eyre::Result<()>> {
		Box::pin(async move {
			{
				let mut channels = self.channels.lock().unwrap_or_else(|err| err.into_inner());

				channels.insert(correlation_id.to_string(), tx.clone());
			}

			let _ = tx.send(PushEvent::Connected).await;

			cancel.cancelled().await;

			let mut channels = self.channels.lock().unwrap_or_else(|err| err.into_inner());

			channels.remove(correlation_id);

			Ok(())
		})
	}
}

/// Baseline config for scripted runs: memory-only cache, no prefetch, short
/// resolver deadline.
pub fn test_config() -> Config {
	let mut cfg = Config::default();

	cfg.gateway.api_base = "http://gateway.test".to_string();
	cfg.search.prefetch = false;
	cfg.push.resolver_timeout_ms = 150;

	cfg
}

pub fn sample_post(id: u32) -> Post {
	Post {
		title: format!("post {id}"),
		link: format!("https://blog.example/posts/{id}"),
		description: String::new(),
		blogger_name: "author".to_string(),
		blogger_link: "https://blog.example".to_string(),
		post_date: "2026-03-01".to_string(),
		is_sponsored: false,
		sponsor_probability: 0.0,
		sponsor_indicators: vec![],
	}
}

pub fn pending_post(id: u32, job_id: &str) -> Post {
	let mut post = sample_post(id);

	post.sponsor_indicators = vec![SponsorIndicator::pending(job_id)];

	post
}

pub fn sample_posts(range: std::ops::Range<u32>) -> Vec<Post> {
	range.map(sample_post).collect()
}

pub fn page(posts: Vec<Post>, total_results: u64) -> SearchPage {
	SearchPage { posts, total_results, sponsored_results: 0, correlation_id: None, push_token: None }
}

pub fn page_with_push(
	posts: Vec<Post>,
	total_results: u64,
	correlation_id: &str,
	push_token: &str,
) -> SearchPage {
	SearchPage {
		posts,
		total_results,
		sponsored_results: 0,
		correlation_id: Some(correlation_id.to_string()),
		push_token: Some(push_token.to_string()),
	}
}

pub fn sponsored_indicator(probability: f32) -> SponsorIndicator {
	SponsorIndicator {
		kind: IndicatorKind::Sponsored,
		pattern: "paid partnership".to_string(),
		matched_text: "paid partnership".to_string(),
		probability,
		source: None,
		job_id: None,
	}
}
