//! Field normalization
//!
//! Pure conversions from the human-readable renderings found on forum pages
//! into canonical values: magnitude strings ("1.2K", "3,400") into integers and
//! site-specific date strings into ISO-8601 with offset.

mod magnitude;
mod timestamp;

pub use magnitude::parse_magnitude;
pub use timestamp::{parse_timestamp, DEFAULT_TIMESTAMP_FORMATS};
