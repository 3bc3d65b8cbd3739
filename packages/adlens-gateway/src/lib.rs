mod error;
mod push;
mod search;
mod sse;

pub use error::{Error, Result};
pub use push::{AnalysisResult, PushEvent, subscribe_push};
pub use search::{SearchPage, search_blogs};
pub use sse::{SseFrame, SseParser};
