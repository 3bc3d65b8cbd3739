use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::{Error, Result};
use adlens_domain::Post;

/// One chunk of results from the search endpoint. `correlation_id` and
/// `push_token` are present only when the backend left items pending and
/// offers a push channel for the late classifications.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage {
	pub posts: Vec<Post>,
	pub total_results: u64,
	pub sponsored_results: u64,
	#[serde(default)]
	pub correlation_id: Option<String>,
	#[serde(default)]
	pub push_token: Option<String>,
}

pub async fn search_blogs(
	cfg: &adlens_config::Gateway,
	query: &str,
	offset: u32,
	limit: u32,
	cancel: &CancellationToken,
) -> Result<SearchPage> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.search_path);
	let request = client.get(&url).query(&[
		("keyword", query.to_string()),
		("offset", offset.to_string()),
		("limit", limit.to_string()),
	]);

	tracing::debug!(%query, offset, limit, "Fetching a search chunk.");

	let response = tokio::select! {
		biased;
		() = cancel.cancelled() => return Err(Error::Cancelled),
		response = request.send() => response?.error_for_status()?,
	};
	let page = tokio::select! {
		biased;
		() = cancel.cancelled() => return Err(Error::Cancelled),
		page = response.json::<SearchPage>() => page?,
	};

	Ok(page)
}
