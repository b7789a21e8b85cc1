//! Per-case duration statistics
//!
//! Reduces a timestamped event table to one summary row per case: first and
//! last timestamp, row count, and total elapsed time in hours, minutes, and
//! days. A case with a single event has zero elapsed time in every unit.

use std::collections::HashMap;

use crate::types::{CaseDuration, LogRow};

const SECONDS_PER_HOUR: f64 = 3600.0;
const SECONDS_PER_MINUTE: f64 = 60.0;
const SECONDS_PER_DAY: f64 = 86_400.0;

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Compute one [`CaseDuration`] per case present in `rows`.
///
/// The result is sorted by total time, case length, then case id, the order
/// the duration report is emitted in.
pub fn aggregate_cases(rows: &[LogRow]) -> Vec<CaseDuration> {
    let mut by_case: HashMap<&str, CaseDuration> = HashMap::new();

    for row in rows {
        by_case
            .entry(&row.case_id)
            .and_modify(|d| {
                if row.timestamp < d.start {
                    d.start = row.timestamp;
                }
                if row.timestamp > d.end {
                    d.end = row.timestamp;
                }
                d.case_length += 1;
            })
            .or_insert_with(|| CaseDuration {
                case_id: row.case_id.clone(),
                start: row.timestamp,
                end: row.timestamp,
                case_length: 1,
                total_hours: 0.0,
                total_minutes: 0.0,
                total_days: 0.0,
            });
    }

    let mut durations: Vec<CaseDuration> = by_case
        .into_values()
        .map(|mut d| {
            let elapsed = (d.end - d.start).num_seconds() as f64;
            d.total_hours = round2(elapsed / SECONDS_PER_HOUR);
            d.total_minutes = round2(elapsed / SECONDS_PER_MINUTE);
            d.total_days = round2(elapsed / SECONDS_PER_DAY);
            d
        })
        .collect();

    durations.sort_by(|a, b| {
        a.total_hours
            .total_cmp(&b.total_hours)
            .then(a.total_minutes.total_cmp(&b.total_minutes))
            .then(a.total_days.total_cmp(&b.total_days))
            .then(a.case_length.cmp(&b.case_length))
            .then(a.case_id.cmp(&b.case_id))
    });

    durations
}
