mod post;

pub use post::{IndicatorKind, IndicatorSource, Post, SponsorIndicator};
