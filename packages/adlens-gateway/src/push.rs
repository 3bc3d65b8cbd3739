use std::time::Duration;

use reqwest::{Client, header::AUTHORIZATION};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{
	Error, Result,
	sse::{SseFrame, SseParser},
};
use adlens_domain::SponsorIndicator;

/// A late classification for one item of an earlier search response. `req_id`
/// names the correlation id of that response; `job_id` names the item.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
	pub req_id: String,
	pub job_id: String,
	pub is_sponsored: bool,
	pub sponsor_probability: f32,
	pub sponsor_indicator: SponsorIndicator,
}

// Wire envelope of a `message` frame.
#[derive(Debug, Deserialize)]
struct AnalysisMessage {
	result: AnalysisResult,
}

#[derive(Clone, Debug, PartialEq)]
pub enum PushEvent {
	Connected,
	Heartbeat,
	Message(AnalysisResult),
}

/// Opens the push channel for `correlation_id` and forwards its events into
/// `tx` until the server closes the stream, the receiver is dropped, or
/// `cancel` fires. Cancellation and receiver loss are clean exits.
pub async fn subscribe_push(
	cfg: &adlens_config::Gateway,
	correlation_id: &str,
	push_token: &str,
	cancel: CancellationToken,
	tx: mpsc::Sender<PushEvent>,
) -> Result<()> {
	// No per-call timeout here: the stream stays open across heartbeats.
	let client =
		Client::builder().connect_timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}/{correlation_id}", cfg.api_base, cfg.events_path);
	let request = client.get(&url).header(AUTHORIZATION, format!("Bearer {push_token}"));
	let mut response = tokio::select! {
		biased;
		() = cancel.cancelled() => return Err(Error::Cancelled),
		response = request.send() => response?,
	};

	if !response.status().is_success() {
		return Err(Error::Subscribe { status: response.status() });
	}

	tracing::debug!(%correlation_id, "Push channel open.");

	let mut parser = SseParser::default();

	loop {
		let chunk = tokio::select! {
			biased;
			() = cancel.cancelled() => return Ok(()),
			chunk = response.chunk() => chunk?,
		};
		let Some(chunk) = chunk else {
			tracing::debug!(%correlation_id, "Push channel closed by the server.");

			return Ok(());
		};

		for frame in parser.push(&chunk) {
			let Some(event) = decode_event(&frame) else {
				continue;
			};

			if tx.send(event).await.is_err() {
				return Ok(());
			}
		}
	}
}

// A malformed frame is logged and skipped; one bad payload must not tear
// down the stream.
fn decode_event(frame: &SseFrame) -> Option<PushEvent> {
	match frame.event.as_str() {
		"connected" => Some(PushEvent::Connected),
		"heartbeat" => Some(PushEvent::Heartbeat),
		"message" => match serde_json::from_str::<AnalysisMessage>(&frame.data) {
			Ok(message) => Some(PushEvent::Message(message.result)),
			Err(err) => {
				tracing::warn!(error = %err, "Discarding an undecodable push message.");

				None
			},
		},
		other => {
			tracing::debug!(event = %other, "Ignoring an unknown push event kind.");

			None
		},
	}
}
