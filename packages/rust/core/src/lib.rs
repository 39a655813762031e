//! Monitoring orchestration and domain logic for Lookout.
//!
//! This crate ties together page fetching, LLM analysis, history storage,
//! report writing and notification delivery into end-to-end runs
//! (e.g., [`pipeline::Pipeline::run_report`]).

pub mod analysis;
pub mod llm;
pub mod monitor;
pub mod notify;
pub mod pipeline;
pub mod report;
pub mod schedule;

#[cfg(test)]
pub(crate) mod test_support;

pub use analysis::{Analysis, Analyst, CHANGE_NOTE};
pub use llm::OpenAiClient;
pub use monitor::{CycleOutcome, Monitor};
pub use notify::{Delivery, DeliveryOutcome, NotifierSet};
pub use pipeline::{Pipeline, ProgressReporter, ReportOutcome, SilentProgress};
pub use report::{ReportStats, Reporter};
pub use schedule::{cron_expression, start_scheduler};
