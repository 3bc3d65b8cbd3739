use serde::{Deserialize, Serialize};

/// Classification state carried by a sponsor indicator. A post is pending
/// until the backend settles it as sponsored or non-sponsored; `Completed`
/// marks an item the client force-resolved after the push channel went quiet.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum IndicatorKind {
	Pending,
	Sponsored,
	NonSponsored,
	Completed,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorSource {
	pub sponsor_type: String,
	pub text: String,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SponsorIndicator {
	#[serde(rename = "type")]
	pub kind: IndicatorKind,
	#[serde(default)]
	pub pattern: String,
	#[serde(default)]
	pub matched_text: String,
	pub probability: f32,
	#[serde(default)]
	pub source: Option<IndicatorSource>,
	/// Server job id binding this indicator to a push event. Pending only.
	#[serde(default)]
	pub job_id: Option<String>,
}
impl SponsorIndicator {
	pub fn pending(job_id: impl Into<String>) -> Self {
		Self {
			kind: IndicatorKind::Pending,
			pattern: String::new(),
			matched_text: String::new(),
			probability: 0.0,
			source: None,
			job_id: Some(job_id.into()),
		}
	}

	/// Terminal marker for an item the client resolved on its own.
	pub fn completed() -> Self {
		Self {
			kind: IndicatorKind::Completed,
			pattern: String::new(),
			matched_text: String::new(),
			probability: 0.0,
			source: None,
			job_id: None,
		}
	}
}

/// One search hit. Immutable value object: classification updates replace the
/// whole post so concurrent snapshot reads never observe a half-written item.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
	pub title: String,
	/// Stable identifier of the item.
	pub link: String,
	pub description: String,
	pub blogger_name: String,
	pub blogger_link: String,
	pub post_date: String,
	pub is_sponsored: bool,
	pub sponsor_probability: f32,
	pub sponsor_indicators: Vec<SponsorIndicator>,
}
impl Post {
	pub fn is_pending(&self) -> bool {
		self.sponsor_indicators.iter().any(|indicator| indicator.kind == IndicatorKind::Pending)
	}

	pub fn is_non_sponsored(&self) -> bool {
		!self.is_sponsored && !self.is_pending()
	}

	pub fn pending_job_id(&self) -> Option<&str> {
		self.sponsor_indicators
			.iter()
			.find(|indicator| indicator.kind == IndicatorKind::Pending)
			.and_then(|indicator| indicator.job_id.as_deref())
	}

	pub fn carries_job(&self, job_id: &str) -> bool {
		self.is_pending() && self.pending_job_id() == Some(job_id)
	}

	/// The post with its classification settled by a push-channel result.
	pub fn resolved(&self, is_sponsored: bool, probability: f32, indicator: SponsorIndicator) -> Self {
		Self {
			is_sponsored,
			sponsor_probability: probability,
			sponsor_indicators: vec![indicator],
			..self.clone()
		}
	}

	/// The deterministic fallback applied when classification never arrives.
	pub fn force_resolved(&self) -> Self {
		Self {
			is_sponsored: false,
			sponsor_probability: 0.0,
			sponsor_indicators: vec![SponsorIndicator::completed()],
			..self.clone()
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn pending_post() -> Post {
		Post {
			title: "t".to_string(),
			link: "https://blog.example/1".to_string(),
			description: "d".to_string(),
			blogger_name: "b".to_string(),
			blogger_link: "https://blog.example".to_string(),
			post_date: "2026-01-01".to_string(),
			is_sponsored: false,
			sponsor_probability: 0.0,
			sponsor_indicators: vec![SponsorIndicator::pending("job-1")],
		}
	}

	#[test]
	fn pending_iff_a_pending_indicator_exists() {
		let post = pending_post();

		assert!(post.is_pending());
		assert!(!post.is_non_sponsored());
		assert_eq!(post.pending_job_id(), Some("job-1"));
		assert!(post.carries_job("job-1"));
		assert!(!post.carries_job("job-2"));
	}

	#[test]
	fn force_resolved_settles_to_non_sponsored() {
		let resolved = pending_post().force_resolved();

		assert!(!resolved.is_pending());
		assert!(resolved.is_non_sponsored());
		assert!(!resolved.is_sponsored);
		assert_eq!(resolved.sponsor_probability, 0.0);
		assert_eq!(resolved.sponsor_indicators.len(), 1);
		assert_eq!(resolved.sponsor_indicators[0].kind, IndicatorKind::Completed);
	}

	#[test]
	fn resolved_replaces_all_indicators() {
		let indicator = SponsorIndicator {
			kind: IndicatorKind::Sponsored,
			pattern: "paid post".to_string(),
			matched_text: "paid post".to_string(),
			probability: 0.93,
			source: None,
			job_id: None,
		};
		let resolved = pending_post().resolved(true, 0.93, indicator);

		assert!(resolved.is_sponsored);
		assert!(!resolved.is_pending());
		assert_eq!(resolved.sponsor_indicators.len(), 1);
		assert_eq!(resolved.sponsor_indicators[0].kind, IndicatorKind::Sponsored);
	}
}
