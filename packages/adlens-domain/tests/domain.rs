use adlens_domain::{IndicatorKind, Post, SponsorIndicator};

#[test]
fn post_wire_layout_is_camel_case() {
	let post = Post {
		title: "Seoul cafe review".to_string(),
		link: "https://blog.example/posts/42".to_string(),
		description: "desc".to_string(),
		blogger_name: "author".to_string(),
		blogger_link: "https://blog.example".to_string(),
		post_date: "2026-02-11".to_string(),
		is_sponsored: false,
		sponsor_probability: 0.0,
		sponsor_indicators: vec![SponsorIndicator::pending("job-9")],
	};
	let value = serde_json::to_value(&post).expect("encode post");

	assert_eq!(value["bloggerName"], "author");
	assert_eq!(value["isSponsored"], false);
	assert_eq!(value["sponsorIndicators"][0]["type"], "pending");
	assert_eq!(value["sponsorIndicators"][0]["jobId"], "job-9");
}

#[test]
fn indicator_decodes_from_backend_payload() {
	let raw = r#"{
		"type": "non-sponsored",
		"pattern": "",
		"matchedText": "",
		"probability": 0.08,
		"source": { "sponsorType": "none", "text": "" }
	}"#;
	let indicator: SponsorIndicator = serde_json::from_str(raw).expect("decode indicator");

	assert_eq!(indicator.kind, IndicatorKind::NonSponsored);
	assert_eq!(indicator.job_id, None);
	assert_eq!(indicator.source.as_ref().map(|source| source.sponsor_type.as_str()), Some("none"));
}

#[test]
fn decoded_post_round_trips() {
	let raw = r#"{
		"title": "t",
		"link": "https://blog.example/posts/1",
		"description": "d",
		"bloggerName": "b",
		"bloggerLink": "https://blog.example",
		"postDate": "2026-01-30",
		"isSponsored": true,
		"sponsorProbability": 0.97,
		"sponsorIndicators": [
			{ "type": "sponsored", "pattern": "paid", "matchedText": "paid", "probability": 0.97 }
		]
	}"#;
	let post: Post = serde_json::from_str(raw).expect("decode post");

	assert!(post.is_sponsored);
	assert!(!post.is_pending());

	let encoded = serde_json::to_string(&post).expect("encode post");
	let decoded: Post = serde_json::from_str(&encoded).expect("decode encoded post");

	assert_eq!(decoded, post);
}
