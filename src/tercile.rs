//! Tercile bucketing of per-case metrics
//!
//! Splits the distribution of a per-case metric into three equal-frequency
//! buckets and propagates each case's bucket to every one of its rows. The
//! distribution is taken over *distinct cases*, never over event rows, so a
//! long case does not drag the cut points.
//!
//! Quantiles use linear interpolation between order statistics; a value
//! exactly on a cut point falls in the lower bucket. When the cut points
//! coincide (too few distinct values), fewer buckets are produced and ranks
//! stay consecutive from the bottom. Cases with a missing metric value get
//! [`TercileRank::NoData`].

use std::collections::{HashMap, HashSet};

use log::{info, warn};

use crate::types::{LogRow, TercileMetric, TercileRank};

/// Outcome of labeling one metric, for audit output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TercileOutcome {
    pub metric: TercileMetric,
    /// Buckets actually produced (3, or fewer on degenerate distributions).
    pub buckets: usize,
    /// Cases that received a rank.
    pub ranked_cases: usize,
    /// Cases with a missing metric value (rank 0).
    pub missing_cases: usize,
}

/// Linear-interpolation quantile over an ascending-sorted slice.
fn quantile(sorted: &[f64], p: f64) -> f64 {
    debug_assert!(!sorted.is_empty());
    let h = (sorted.len() - 1) as f64 * p;
    let lo = h.floor() as usize;
    let hi = h.ceil() as usize;
    sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
}

/// Bucket index (1-based) for a value given ascending distinct cut points.
/// Values on a cut point land in the lower bucket.
fn bucket(value: f64, cuts: &[f64]) -> usize {
    for (i, cut) in cuts.iter().enumerate() {
        if value <= *cut {
            return i + 1;
        }
    }
    cuts.len() + 1
}

/// Rank every row's case for `metric` and append the rank to each row's
/// tercile list.
///
/// One representative value per case is taken from the case's first row;
/// all rows of a case carry the same per-case value by construction of the
/// join, so this is not re-validated.
pub fn label_terciles(rows: &mut [LogRow], metric: TercileMetric) -> TercileOutcome {
    let mut seen: HashSet<String> = HashSet::new();
    let mut per_case: Vec<(String, Option<f64>)> = Vec::new();
    for row in rows.iter() {
        if seen.insert(row.case_id.clone()) {
            per_case.push((row.case_id.clone(), metric.value(row)));
        }
    }

    let mut values: Vec<f64> = per_case.iter().filter_map(|(_, v)| *v).collect();
    values.sort_by(f64::total_cmp);

    let cuts: Vec<f64> = if values.is_empty() {
        Vec::new()
    } else {
        let mut cuts = vec![quantile(&values, 1.0 / 3.0), quantile(&values, 2.0 / 3.0)];
        cuts.dedup();
        cuts
    };

    let mut missing_cases = 0;
    let rank_by_case: HashMap<&str, TercileRank> = per_case
        .iter()
        .map(|(case_id, value)| {
            let rank = match value {
                Some(v) => TercileRank::from_bucket(bucket(*v, &cuts)),
                None => {
                    missing_cases += 1;
                    TercileRank::NoData
                }
            };
            (case_id.as_str(), rank)
        })
        .collect();

    for row in rows.iter_mut() {
        let rank = rank_by_case[row.case_id.as_str()];
        row.terciles.push(rank);
    }

    let outcome = TercileOutcome {
        metric,
        buckets: if values.is_empty() { 0 } else { cuts.len() + 1 },
        ranked_cases: per_case.len() - missing_cases,
        missing_cases,
    };
    if outcome.buckets > 0 && outcome.buckets < 3 {
        warn!(
            "metric {} has too few distinct values: {} buckets produced",
            metric.column_name(),
            outcome.buckets
        );
    }
    info!(
        "tercile on {}: {} ranked cases, {} without data",
        metric.column_name(),
        outcome.ranked_cases,
        outcome.missing_cases
    );
    outcome
}
