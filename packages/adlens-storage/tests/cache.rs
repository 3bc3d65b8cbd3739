use time::{Duration, OffsetDateTime};

use adlens_config::Cache;
use adlens_domain::{Post, SponsorIndicator};
use adlens_storage::{CacheStore, MergeArgs};

const ITEMS_PER_PAGE: u32 = 10;

fn memory_cache() -> CacheStore {
	CacheStore::open(&Cache::default(), ITEMS_PER_PAGE)
}

fn post(id: u32) -> Post {
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

fn pending_post(id: u32, job_id: &str) -> Post {
	let mut post = post(id);

	post.sponsor_indicators = vec![SponsorIndicator::pending(job_id)];

	post
}

fn chunk(range: std::ops::Range<u32>) -> Vec<Post> {
	range.map(post).collect()
}

fn merge_chunk(store: &mut CacheStore, page: u32, posts: &[Post], start_index: u32) {
	let now = OffsetDateTime::now_utc();

	store.merge(
		MergeArgs {
			query: "coffee",
			page,
			posts,
			start_index,
			total_results: 42,
			sponsored_results: 7,
		},
		now,
	);
}

#[test]
fn page_is_complete_only_at_items_per_page() {
	let mut store = memory_cache();

	merge_chunk(&mut store, 1, &chunk(0..8), 0);

	let entry = store.page("coffee", 1).expect("partial entry");

	assert_eq!(entry.current_count, 8);
	assert!(!entry.is_complete);

	merge_chunk(&mut store, 1, &chunk(8..10), 8);

	let entry = store.page("coffee", 1).expect("complete entry");

	assert_eq!(entry.current_count, 10);
	assert!(entry.is_complete);
}

#[test]
fn partial_pages_are_read_misses() {
	let mut store = memory_cache();

	merge_chunk(&mut store, 1, &chunk(0..4), 0);

	assert!(store.read("coffee", 1, OffsetDateTime::now_utc()).is_none());
}

#[test]
fn merge_is_idempotent_per_chunk_and_offset() {
	let mut store = memory_cache();
	let posts = chunk(0..10);

	merge_chunk(&mut store, 1, &posts[0..2], 0);
	merge_chunk(&mut store, 1, &posts[2..10], 2);

	let once = store.page("coffee", 1).expect("entry").clone();

	merge_chunk(&mut store, 1, &posts[2..10], 2);

	let twice = store.page("coffee", 1).expect("entry").clone();

	assert_eq!(once, twice);
}

#[test]
fn chunks_merge_out_of_order() {
	let mut store = memory_cache();
	let posts = chunk(0..10);

	merge_chunk(&mut store, 1, &posts[8..10], 8);
	merge_chunk(&mut store, 1, &posts[0..8], 0);

	let entry = store.page("coffee", 1).expect("entry");

	assert!(entry.is_complete);
	assert_eq!(entry.posts, posts);
}

#[test]
fn stale_record_reads_as_a_miss_but_stays_stored() {
	let mut store = memory_cache();
	let now = OffsetDateTime::now_utc();

	store.merge(
		MergeArgs {
			query: "coffee",
			page: 1,
			posts: &chunk(0..10),
			start_index: 0,
			total_results: 42,
			sponsored_results: 7,
		},
		now,
	);

	assert!(store.read("coffee", 1, now + Duration::minutes(29)).is_some());
	// Forty minutes later the record is stale: a miss, not an error, and it
	// is not purged.
	assert!(store.read("coffee", 1, now + Duration::minutes(40)).is_none());
	assert!(store.page("coffee", 1).is_some());
}

#[test]
fn patch_item_replaces_by_job_id_after_completion() {
	let mut store = memory_cache();
	let mut posts = chunk(0..10);

	posts[3] = pending_post(3, "job-3");

	merge_chunk(&mut store, 1, &posts, 0);

	let replacement = posts[3].force_resolved();
	let patched = store.patch_item("coffee", 1, |post| post.carries_job("job-3"), replacement);

	assert!(patched);

	let entry = store.page("coffee", 1).expect("entry");

	assert!(entry.is_complete);
	assert!(!entry.posts[3].is_pending());
	assert!(entry.posts[3].is_non_sponsored());
}

#[test]
fn patch_item_without_a_match_is_a_no_op() {
	let mut store = memory_cache();

	merge_chunk(&mut store, 1, &chunk(0..10), 0);

	let before = store.page("coffee", 1).expect("entry").clone();
	let patched =
		store.patch_item("coffee", 1, |post| post.carries_job("job-unknown"), post(99));

	assert!(!patched);
	assert_eq!(store.page("coffee", 1).expect("entry"), &before);
}

#[test]
fn document_survives_a_reopen() {
	let dir = tempfile::tempdir().expect("tempdir");
	let cfg = Cache { path: Some(dir.path().join("cache.json")), ..Cache::default() };
	let mut store = CacheStore::open(&cfg, ITEMS_PER_PAGE);

	merge_chunk(&mut store, 1, &chunk(0..10), 0);

	drop(store);

	let reopened = CacheStore::open(&cfg, ITEMS_PER_PAGE);
	let entry = reopened.read("coffee", 1, OffsetDateTime::now_utc()).expect("persisted entry");

	assert!(entry.is_complete);
	assert_eq!(entry.current_count, 10);

	let keyword = reopened.keyword_data("coffee").expect("keyword data");

	assert_eq!(keyword.total_results, 42);
	assert_eq!(keyword.sponsored_results, 7);
}

#[test]
fn persistence_leaves_only_the_document_behind() {
	let dir = tempfile::tempdir().expect("tempdir");
	let path = dir.path().join("cache.json");
	let cfg = Cache { path: Some(path.clone()), ..Cache::default() };
	let mut store = CacheStore::open(&cfg, ITEMS_PER_PAGE);

	merge_chunk(&mut store, 1, &chunk(0..10), 0);
	merge_chunk(&mut store, 2, &chunk(0..10), 0);

	// Each write goes through a staging file and renames over the document;
	// no staging file may outlive a completed write.
	let entries: Vec<_> = std::fs::read_dir(dir.path())
		.expect("read dir")
		.map(|entry| entry.expect("dir entry").file_name())
		.collect();

	assert_eq!(entries, vec!["cache.json"]);

	let reopened = CacheStore::open(&cfg, ITEMS_PER_PAGE);

	assert!(reopened.page("coffee", 2).is_some());
}

#[test]
fn persistence_failure_keeps_the_memory_copy() {
	let dir = tempfile::tempdir().expect("tempdir");
	// A directory at the document path makes every write fail.
	let path = dir.path().join("cache.json");

	std::fs::create_dir_all(&path).expect("blocker dir");

	let cfg = Cache { path: Some(path), ..Cache::default() };
	let mut store = CacheStore::open(&cfg, ITEMS_PER_PAGE);

	merge_chunk(&mut store, 1, &chunk(0..10), 0);

	assert!(store.read("coffee", 1, OffsetDateTime::now_utc()).is_some());
}

#[test]
fn query_records_are_bounded_lru_by_last_write() {
	let cfg = Cache { max_queries: 2, ..Cache::default() };
	let mut store = CacheStore::open(&cfg, ITEMS_PER_PAGE);
	let base = OffsetDateTime::now_utc();

	for (idx, query) in ["first", "second", "third"].iter().enumerate() {
		store.merge(
			MergeArgs {
				query,
				page: 1,
				posts: &chunk(0..10),
				start_index: 0,
				total_results: 10,
				sponsored_results: 0,
			},
			base + Duration::seconds(idx as i64),
		);
	}

	assert!(store.keyword_data("first").is_none());
	assert!(store.keyword_data("second").is_some());
	assert!(store.keyword_data("third").is_some());
}
