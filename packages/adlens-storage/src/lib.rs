mod cache;
mod error;

pub use cache::{CacheStore, KeywordData, MergeArgs, PageEntry, QueryCacheRecord};
pub use error::{Error, Result};
