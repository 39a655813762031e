//! Page fetching, text extraction, and feed reading for monitored targets.
//!
//! This crate provides:
//! - [`engine`]: the SSRF-guarded [`PageFetcher`] and content hashing
//! - [`extract`]: visible-text extraction and safe truncation
//! - [`feeds`]: RSS/Atom parsing with a lookback window

pub mod engine;
pub mod extract;
pub mod feeds;

pub use engine::{PageFetcher, compute_hash};
pub use extract::{extract_fragment_text, extract_text, truncate_chars};
pub use feeds::parse_feed;
