use std::path::PathBuf;

use serde::Deserialize;

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
	pub service: Service,
	pub search: Search,
	pub cache: Cache,
	pub gateway: Gateway,
	pub push: Push,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Service {
	pub log_level: String,
}
impl Default for Service {
	fn default() -> Self {
		Self { log_level: "info".to_string() }
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Search {
	/// Queries shorter than this (in chars, after trimming) are rejected
	/// before any network or cache work.
	pub min_query_chars: u32,
	pub items_per_page: u32,
	/// Chunk geometry for the foreground load: the first chunk is published
	/// as soon as it lands, the rest fill the page in the background.
	pub initial_chunk_size: u32,
	pub initial_chunk_count: u32,
	pub prefetch: bool,
}
impl Default for Search {
	fn default() -> Self {
		Self {
			min_query_chars: 2,
			items_per_page: 10,
			initial_chunk_size: 2,
			initial_chunk_count: 5,
			prefetch: true,
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Cache {
	/// Cache document location. `None` keeps the cache in memory only.
	pub path: Option<PathBuf>,
	pub ttl_minutes: i64,
	/// Query records beyond this bound are evicted least-recently-written
	/// first at write time.
	pub max_queries: u32,
}
impl Default for Cache {
	fn default() -> Self {
		Self { path: None, ttl_minutes: 30, max_queries: 32 }
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Gateway {
	pub api_base: String,
	pub search_path: String,
	pub events_path: String,
	pub timeout_ms: u64,
}
impl Default for Gateway {
	fn default() -> Self {
		Self {
			api_base: String::new(),
			search_path: "/v1/search".to_string(),
			events_path: "/v1/search/events".to_string(),
			timeout_ms: 30_000,
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Push {
	/// Deadline after which still-pending items are force-resolved.
	pub resolver_timeout_ms: u64,
}
impl Default for Push {
	fn default() -> Self {
		Self { resolver_timeout_ms: 15_000 }
	}
}
