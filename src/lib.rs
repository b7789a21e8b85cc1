//! edulog - batch pipeline for e-learning process-mining event logs
//!
//! edulog transforms raw exports of an e-learning tutorial platform
//! (page-interaction events, quiz answers, survey responses) into cleaned
//! event logs through a deterministic pipeline: label canonicalization →
//! timestamp repair → per-case enrichment (quiz, survey, usability scores)
//! → pseudo-event synthesis → class and tercile labeling.
//!
//! ## Modules
//!
//! - **builder**: the event-log construction stage, orchestrating everything
//! - **quiz**: per-session aggregation of the raw quiz export
//! - **tables**: typed CSV ingestion and emission

pub mod aggregate;
pub mod builder;
pub mod classes;
pub mod classifier;
pub mod dedup;
pub mod error;
pub mod quiz;
pub mod tables;
pub mod tercile;
pub mod types;

pub use builder::{BuildConfig, BuildInputs, EventLog, EventLogBuilder, SURVEY_END};
pub use classes::{ClassWindowTable, UNCLASSIFIED};
pub use classifier::{ClassifierConfig, EventClassifier};
pub use error::PipelineError;
pub use types::{Granularity, LogRow, RawEvent, TercileMetric, TercileRank};

/// Crate version stamped into CLI output.
pub const EDULOG_VERSION: &str = env!("CARGO_PKG_VERSION");
