//! Session-class assignment
//!
//! Each data-collection round happened in a known classroom slot. A class
//! window is a date plus an inclusive time-of-day range; an event timestamp
//! falling inside a window inherits that window's label. Timestamps outside
//! every window get the `NA` label and are listed in a side report for
//! manual inspection.

use std::collections::{HashMap, HashSet};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::types::{ClassWindow, LogRow};

/// Label for timestamps outside every configured window.
pub const UNCLASSIFIED: &str = "NA";

/// Ordered list of class windows; first match wins.
///
/// Windows are non-overlapping by construction upstream; the first-match
/// rule fixes the tie-break if a malformed table ever overlaps.
#[derive(Debug, Clone, Default)]
pub struct ClassWindowTable {
    windows: Vec<ClassWindow>,
}

impl ClassWindowTable {
    pub fn new(windows: Vec<ClassWindow>) -> Self {
        Self { windows }
    }

    /// The window table for the 2024 data-collection rounds.
    pub fn builtin() -> Self {
        fn window(date: NaiveDate, start: (u32, u32), end: (u32, u32), label: &str) -> ClassWindow {
            ClassWindow {
                date,
                start_time: NaiveTime::from_hms_opt(start.0, start.1, 0).unwrap(),
                end_time: NaiveTime::from_hms_opt(end.0, end.1, 0).unwrap(),
                label: label.to_string(),
            }
        }

        let d = |y, m, day| NaiveDate::from_ymd_opt(y, m, day).unwrap();
        Self::new(vec![
            window(d(2024, 3, 7), (0, 0), (23, 59), "SAA"),
            window(d(2024, 3, 19), (0, 0), (23, 59), "ECO"),
            window(d(2024, 4, 18), (10, 45), (12, 59), "SMTO1"),
            window(d(2024, 4, 18), (13, 0), (15, 14), "SMTO2"),
            window(d(2024, 4, 18), (15, 15), (23, 59), "SMTO3"),
            window(d(2024, 4, 22), (11, 45), (13, 59), "SMCN1"),
            window(d(2024, 4, 22), (14, 0), (23, 59), "SMCN2"),
        ])
    }

    /// Label for a timestamp: the first window whose date matches and whose
    /// inclusive `[start, end]` range contains the time-of-day, or
    /// [`UNCLASSIFIED`].
    pub fn label_for(&self, timestamp: NaiveDateTime) -> &str {
        let date = timestamp.date();
        let time_of_day = timestamp.time();
        for window in &self.windows {
            if window.date == date
                && window.start_time <= time_of_day
                && time_of_day <= window.end_time
            {
                return &window.label;
            }
        }
        UNCLASSIFIED
    }
}

/// Distinct-case count and share for one class label.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ClassCount {
    pub label: String,
    pub cases: usize,
    /// Share of distinct cases, in percent, 2 decimals.
    pub percent: f64,
}

/// Count distinct cases per class label, descending by count.
pub fn class_distribution(rows: &[LogRow]) -> Vec<ClassCount> {
    let mut cases_by_class: HashMap<&str, HashSet<&str>> = HashMap::new();
    for row in rows {
        cases_by_class
            .entry(&row.class_label)
            .or_default()
            .insert(&row.case_id);
    }

    let total: usize = cases_by_class.values().map(|s| s.len()).sum();
    let mut counts: Vec<ClassCount> = cases_by_class
        .into_iter()
        .map(|(label, cases)| ClassCount {
            label: label.to_string(),
            cases: cases.len(),
            percent: if total == 0 {
                0.0
            } else {
                (cases.len() as f64 / total as f64 * 10_000.0).round() / 100.0
            },
        })
        .collect();

    counts.sort_by(|a, b| b.cases.cmp(&a.cases).then(a.label.cmp(&b.label)));
    counts
}

/// Distinct timestamps of `NA`-class rows, oldest first, for inspection.
pub fn unclassified_timestamps(rows: &[LogRow]) -> Vec<NaiveDateTime> {
    let mut timestamps: Vec<NaiveDateTime> = rows
        .iter()
        .filter(|r| r.class_label == UNCLASSIFIED)
        .map(|r| r.timestamp)
        .collect();
    timestamps.sort();
    timestamps.dedup();
    timestamps
}
