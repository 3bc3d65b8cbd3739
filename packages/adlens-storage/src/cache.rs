use std::{
	collections::{BTreeMap, HashMap},
	fs,
	path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::{Error, Result};
use adlens_domain::Post;

/// All items received so far for one `(query, page)`. Owned by [`CacheStore`]
/// and mutated only through [`CacheStore::merge`] and
/// [`CacheStore::patch_item`].
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageEntry {
	pub posts: Vec<Post>,
	pub current_count: u32,
	pub is_complete: bool,
	// Chunk-offset slots. Kept out of the persisted layout; rebuilt on load.
	#[serde(skip)]
	slots: BTreeMap<u32, Post>,
}
impl PageEntry {
	fn recompute(&mut self, items_per_page: u32) {
		self.posts = self.slots.values().cloned().collect();
		self.current_count = self.posts.len() as u32;
		self.is_complete = self.current_count >= items_per_page;
	}

	fn rebuild_slots(&mut self) {
		self.slots =
			self.posts.iter().enumerate().map(|(idx, post)| (idx as u32, post.clone())).collect();
	}
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordData {
	pub total_results: u64,
	pub items_per_page: u32,
	pub sponsored_results: u64,
	/// Unix seconds of the last write to this record.
	pub timestamp: i64,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryCacheRecord {
	pub keyword_data: KeywordData,
	pub page_data: BTreeMap<u32, PageEntry>,
}

#[derive(Clone, Copy, Debug)]
pub struct MergeArgs<'a> {
	pub query: &'a str,
	pub page: u32,
	pub posts: &'a [Post],
	pub start_index: u32,
	pub total_results: u64,
	pub sponsored_results: u64,
}

/// Durable `(query, page)` result cache. Freshness is a read-time check: a
/// record older than the TTL is reported as a miss but never purged by a
/// background sweep. Persistence is best effort; the in-memory document stays
/// authoritative when a write fails.
pub struct CacheStore {
	path: Option<PathBuf>,
	ttl: Duration,
	items_per_page: u32,
	max_queries: usize,
	records: HashMap<String, QueryCacheRecord>,
}
impl CacheStore {
	pub fn open(cfg: &adlens_config::Cache, items_per_page: u32) -> Self {
		let records = match cfg.path.as_deref() {
			Some(path) if path.exists() => match load_document(path) {
				Ok(records) => records,
				Err(err) => {
					tracing::warn!(error = %err, "Cache document unreadable. Starting empty.");

					HashMap::new()
				},
			},
			_ => HashMap::new(),
		};

		Self {
			path: cfg.path.clone(),
			ttl: Duration::minutes(cfg.ttl_minutes),
			items_per_page,
			max_queries: cfg.max_queries as usize,
			records,
		}
	}

	pub fn items_per_page(&self) -> u32 {
		self.items_per_page
	}

	/// The entry for `(query, page)`, but only when the owning record is
	/// fresh and the page is complete. Partial or stale data is a miss.
	pub fn read(&self, query: &str, page: u32, now: OffsetDateTime) -> Option<PageEntry> {
		let record = self.records.get(query)?;

		if !self.is_fresh(record, now) {
			return None;
		}

		let entry = record.page_data.get(&page)?;

		if !entry.is_complete {
			return None;
		}

		Some(entry.clone())
	}

	pub fn keyword_data(&self, query: &str) -> Option<&KeywordData> {
		self.records.get(query).map(|record| &record.keyword_data)
	}

	/// The entry regardless of freshness or completeness. Used by patch and
	/// pending-scan paths that must see partial pages.
	pub fn page(&self, query: &str, page: u32) -> Option<&PageEntry> {
		self.records.get(query).and_then(|record| record.page_data.get(&page))
	}

	pub fn is_fresh_complete(&self, query: &str, page: u32, now: OffsetDateTime) -> bool {
		self.read(query, page, now).is_some()
	}

	/// Writes a chunk of posts at sequential slots starting at
	/// `args.start_index`, refreshes the record metadata and timestamp, and
	/// persists the document. Chunks may arrive out of order; re-merging the
	/// same chunk at the same offset is a no-op for the resulting entry.
	pub fn merge(&mut self, args: MergeArgs<'_>, now: OffsetDateTime) -> PageEntry {
		let items_per_page = self.items_per_page;
		let record = self.records.entry(args.query.to_string()).or_insert_with(|| {
			QueryCacheRecord {
				keyword_data: KeywordData {
					total_results: args.total_results,
					items_per_page,
					sponsored_results: args.sponsored_results,
					timestamp: now.unix_timestamp(),
				},
				page_data: BTreeMap::new(),
			}
		});

		record.keyword_data.total_results = args.total_results;
		record.keyword_data.items_per_page = items_per_page;
		record.keyword_data.sponsored_results = args.sponsored_results;
		record.keyword_data.timestamp = now.unix_timestamp();

		let entry = record.page_data.entry(args.page).or_default();

		for (offset, post) in args.posts.iter().enumerate() {
			let slot = args.start_index + offset as u32;

			if slot < items_per_page {
				entry.slots.insert(slot, post.clone());
			}
		}

		entry.recompute(items_per_page);

		let merged = entry.clone();

		self.evict_over_bound(args.query);
		self.persist();

		merged
	}

	/// Replaces the first item matching `predicate` with `new_post`. No-op
	/// when nothing matches. Safe after the page has been marked complete.
	pub fn patch_item<F>(&mut self, query: &str, page: u32, predicate: F, new_post: Post) -> bool
	where
		F: Fn(&Post) -> bool,
	{
		let items_per_page = self.items_per_page;
		let Some(record) = self.records.get_mut(query) else {
			return false;
		};
		let Some(entry) = record.page_data.get_mut(&page) else {
			return false;
		};
		let Some(slot) = entry
			.slots
			.iter()
			.find(|(_, post)| predicate(post))
			.map(|(slot, _)| *slot)
		else {
			return false;
		};

		entry.slots.insert(slot, new_post);
		entry.recompute(items_per_page);

		record.keyword_data.timestamp = OffsetDateTime::now_utc().unix_timestamp();

		self.persist();

		true
	}

	fn is_fresh(&self, record: &QueryCacheRecord, now: OffsetDateTime) -> bool {
		now.unix_timestamp() - record.keyword_data.timestamp < self.ttl.whole_seconds()
	}

	// LRU by last write. The record written in the current call survives.
	fn evict_over_bound(&mut self, keep: &str) {
		while self.records.len() > self.max_queries {
			let Some(oldest) = self
				.records
				.iter()
				.filter(|(query, _)| query.as_str() != keep)
				.min_by_key(|(_, record)| record.keyword_data.timestamp)
				.map(|(query, _)| query.clone())
			else {
				return;
			};

			tracing::debug!(query = %oldest, "Evicting cache record over the query bound.");

			self.records.remove(&oldest);
		}
	}

	fn persist(&self) {
		let Some(path) = self.path.as_deref() else {
			return;
		};

		if let Err(err) = store_document(path, &self.records) {
			// Best effort. The in-memory copy stays authoritative.
			tracing::warn!(error = %err, "Failed to persist cache document.");
		}
	}
}

fn load_document(path: &Path) -> Result<HashMap<String, QueryCacheRecord>> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::Read { path: path.to_path_buf(), source: err })?;
	let mut records: HashMap<String, QueryCacheRecord> =
		serde_json::from_str(&raw).map_err(Error::Decode)?;

	for record in records.values_mut() {
		for entry in record.page_data.values_mut() {
			entry.rebuild_slots();
		}
	}

	Ok(records)
}

fn store_document(path: &Path, records: &HashMap<String, QueryCacheRecord>) -> Result<()> {
	let raw = serde_json::to_string(records).map_err(Error::Encode)?;

	if let Some(parent) = path.parent()
		&& !parent.as_os_str().is_empty()
	{
		fs::create_dir_all(parent)
			.map_err(|err| Error::Write { path: path.to_path_buf(), source: err })?;
	}

	// Write-then-rename: a crash mid-write leaves the previous document in
	// place instead of a truncated one.
	let staging = path.with_extension("json.tmp");

	fs::write(&staging, raw).map_err(|err| Error::Write { path: staging.clone(), source: err })?;
	fs::rename(&staging, path)
		.map_err(|err| Error::Write { path: path.to_path_buf(), source: err })
}
