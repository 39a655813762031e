//! Shared types, error model, and configuration for Lookout.
//!
//! This crate is the foundation depended on by all other Lookout crates.
//! It provides:
//! - [`LookoutError`]: the unified error type
//! - Domain types ([`MonitoringResult`], [`HistoryRecord`], [`FeedEntry`], [`RunId`])
//! - Targets ([`Target`], `targets.json` loading and saving)
//! - Configuration ([`MonitorConfig`], [`Credentials`], config loading)

pub mod config;
pub mod error;
pub mod targets;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    CONFIG_FILE_NAME, ChannelKind, Credentials, DEFAULT_SLACK_CHANNEL, Frequency, MonitorConfig,
    SmtpSettings, init_config, load_config, save_config, validate_api_key,
};
pub use error::{LookoutError, Result};
pub use targets::{
    Channel, TARGETS_FILE_NAME, Target, default_targets, load_targets, load_targets_strict,
    save_targets,
};
pub use types::{ContentKind, FeedEntry, HistoryRecord, MonitoringResult, RunId, history_key};
