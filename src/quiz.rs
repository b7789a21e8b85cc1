//! Quiz aggregation
//!
//! Groups the raw quiz export by session and produces the per-case
//! statistics table the event-log builder joins in: attempt counts,
//! correct/wrong totals, and correct ratios over the attempts and over the
//! tutorial's full question set. A second set of aggregates covers the
//! first-three-track subset shared by every cohort.

use std::collections::HashMap;

use crate::tables::read::QuizAnswer;
use crate::types::QuizStats;

/// Questions in the full tutorial.
pub const QUIZ_QUESTION_TOTAL: f64 = 10.0;

/// Questions in the first-three-track subset.
pub const QUIZ_SUBSET_QUESTION_TOTAL: f64 = 3.0;

/// Quiz pages of the tracks every cohort completed, as exported (the quiz
/// export is aggregated before relabeling).
pub fn default_subset_titles() -> Vec<String> {
    ["Introduzione-Quiz", "Primo programma-Quiz", "Variabili-Quiz"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Default)]
struct Tally {
    count: u32,
    correct: u32,
}

impl Tally {
    fn add(&mut self, correct: bool) {
        self.count += 1;
        if correct {
            self.correct += 1;
        }
    }
}

/// Aggregate the raw quiz answers into one [`QuizStats`] row per session,
/// sorted by session id.
///
/// Sessions that never answered a subset-track question get null `_P3`
/// fields (the builder's left join keeps them null in the log).
pub fn aggregate_quiz(answers: &[QuizAnswer], subset_titles: &[String]) -> Vec<QuizStats> {
    let mut totals: HashMap<&str, Tally> = HashMap::new();
    let mut subset: HashMap<&str, Tally> = HashMap::new();

    for answer in answers {
        totals.entry(&answer.session_id).or_default().add(answer.correct);
        if subset_titles.iter().any(|t| t == &answer.page_title) {
            subset.entry(&answer.session_id).or_default().add(answer.correct);
        }
    }

    let mut stats: Vec<QuizStats> = totals
        .iter()
        .map(|(session_id, tally)| {
            let sub = subset.get(session_id);
            QuizStats {
                session_id: session_id.to_string(),
                session_count: tally.count,
                correct_total: tally.correct,
                wrong_total: tally.count - tally.correct,
                correct_ratio_over_count: round2(tally.correct as f64 / tally.count as f64),
                correct_ratio_over_all: round2(tally.correct as f64 / QUIZ_QUESTION_TOTAL),
                session_count_p3: sub.map(|s| s.count),
                correct_total_p3: sub.map(|s| s.correct),
                wrong_total_p3: sub.map(|s| s.count - s.correct),
                correct_ratio_over_count_p3: sub
                    .map(|s| round2(s.correct as f64 / s.count as f64)),
                correct_ratio_over_all_p3: sub
                    .map(|s| round2(s.correct as f64 / QUIZ_SUBSET_QUESTION_TOTAL)),
            }
        })
        .collect();

    stats.sort_by(|a, b| a.session_id.cmp(&b.session_id));
    stats
}
