/// One decoded server-sent event frame. Frames with no `event:` field carry
/// the protocol default name `message`.
#[derive(Clone, Debug, PartialEq)]
pub struct SseFrame {
	pub event: String,
	pub data: String,
}

/// Incremental frame splitter over a byte stream that may cut frames at
/// arbitrary chunk boundaries, including in the middle of a multi-byte
/// character. Feed raw bytes in, get complete frames out; partial input stays
/// buffered until the terminating blank line arrives, and text is only
/// decoded once a frame is whole.
#[derive(Debug, Default)]
pub struct SseParser {
	buffer: Vec<u8>,
}
impl SseParser {
	pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
		self.buffer.extend_from_slice(chunk);

		let mut frames = Vec::new();

		while let Some((frame_end, rest_start)) = frame_boundary(&self.buffer) {
			let raw = String::from_utf8_lossy(&self.buffer[..frame_end]).into_owned();

			self.buffer.drain(..rest_start);

			if let Some(frame) = parse_frame(&raw) {
				frames.push(frame);
			}
		}

		frames
	}
}

// Frames end at the first blank line, in either line-ending convention.
fn frame_boundary(buffer: &[u8]) -> Option<(usize, usize)> {
	let lf = find(buffer, b"\n\n").map(|idx| (idx, idx + 2));
	let crlf = find(buffer, b"\r\n\r\n").map(|idx| (idx, idx + 4));

	match (lf, crlf) {
		(Some(a), Some(b)) => Some(if b.0 < a.0 { b } else { a }),
		(boundary, None) | (None, boundary) => boundary,
	}
}

fn find(buffer: &[u8], needle: &[u8]) -> Option<usize> {
	buffer.windows(needle.len()).position(|window| window == needle)
}

fn parse_frame(raw: &str) -> Option<SseFrame> {
	let mut event = None;
	let mut data: Vec<&str> = Vec::new();

	for line in raw.lines() {
		if line.starts_with(':') {
			continue;
		}

		let (field, value) = line.split_once(':').unwrap_or((line, ""));
		let value = value.strip_prefix(' ').unwrap_or(value);

		match field {
			"event" => event = Some(value.to_string()),
			"data" => data.push(value),
			// `id` and `retry` carry nothing this client acts on.
			_ => {},
		}
	}

	if event.is_none() && data.is_empty() {
		return None;
	}

	Some(SseFrame {
		event: event.unwrap_or_else(|| "message".to_string()),
		data: data.join("\n"),
	})
}
