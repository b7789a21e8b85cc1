//! Timestamp collision repair
//!
//! Platform exports record timestamps at one-second resolution, so bursts of
//! interactions within a session routinely collide. A collision would leave
//! the case without a total order and corrupt downstream process mining, so
//! colliding timestamps are perturbed until each case is strictly increasing.
//!
//! The scheme is a single left-to-right cascade over the sorted rows: a row
//! that matches its predecessor's case and (possibly already adjusted)
//! timestamp is pushed to predecessor + 1 s, so `t, t, t` becomes
//! `t, t+1s, t+2s`. Known limitation, reproduced from the reference
//! behavior: a correction can overtake the next *original* timestamp in the
//! same case, and the pass does not detect the resulting local inversion.

use chrono::Duration;
use log::info;

use crate::types::LogRow;

/// Outcome of a deduplication pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DedupReport {
    /// Rows whose timestamp was adjusted.
    pub corrected: usize,
    /// Rows scanned.
    pub scanned: usize,
}

/// Sort rows by `(case_id, timestamp)` and cascade-fix equal timestamps
/// within each case.
///
/// The sort is stable, so rows that collide keep their original relative
/// order and the cascade assigns them increasing offsets in input order.
pub fn fix_timestamp_collisions(rows: &mut [LogRow]) -> DedupReport {
    rows.sort_by(|a, b| {
        a.case_id
            .cmp(&b.case_id)
            .then(a.timestamp.cmp(&b.timestamp))
    });

    let mut corrected = 0;
    for i in 1..rows.len() {
        if rows[i].case_id == rows[i - 1].case_id && rows[i].timestamp == rows[i - 1].timestamp {
            rows[i].timestamp = rows[i - 1].timestamp + Duration::seconds(1);
            corrected += 1;
        }
    }

    let report = DedupReport {
        corrected,
        scanned: rows.len(),
    };
    info!(
        "timestamp collisions corrected: {} / {}",
        report.corrected, report.scanned
    );
    report
}
