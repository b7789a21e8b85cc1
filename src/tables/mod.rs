//! CSV ingestion and emission
//!
//! Thin, typed I/O layer around the pipeline: readers resolve each table's
//! schema from its header once, deduplicate raw rows, and hand typed records
//! to the builder; writers emit the final logs and the audit side outputs.
//!
//! Every table, in and out, uses the `;` delimiter.

pub mod read;
pub mod write;

/// Field delimiter shared by all input and output tables.
pub const DELIMITER: u8 = b';';

pub use read::{
    read_case_filter, read_events, read_quiz_answers, read_quiz_stats, read_survey, read_sus,
};
pub use write::{
    write_class_distribution, write_durations, write_event_log, write_quiz_stats,
    write_unclassified_timestamps,
};
