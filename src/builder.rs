//! Event-log construction
//!
//! This module orchestrates the full enrichment stage. It owns no algorithm
//! of its own beyond composition:
//!
//! 1. relabel raw events onto the canonical vocabulary
//! 2. split into the page- or paragraph-granularity stream
//! 3. repair timestamp collisions
//! 4. count click/double-click occurrences per case, then drop those rows
//! 5. left-join quiz, survey, and SUS tables by case id
//! 6. synthesize one `SURVEY-END` pseudo-event per surveyed case
//! 7. attach per-case durations, class labels, and tercile ranks

use std::collections::{HashMap, HashSet};

use log::warn;

use crate::aggregate::aggregate_cases;
use crate::classifier::{ClassifierConfig, EventClassifier};
use crate::classes::ClassWindowTable;
use crate::dedup::{fix_timestamp_collisions, DedupReport};
use crate::tercile::{label_terciles, TercileOutcome};
use crate::types::{
    CaseDuration, EventKind, Granularity, LogRow, QuizStats, RawEvent, SurveyTable, SusScores,
    TercileMetric,
};

/// Activity name of the synthesized survey-completion pseudo-event.
pub const SURVEY_END: &str = "SURVEY-END";

/// Configuration handed to the builder at construction time.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub classifier: ClassifierConfig,
    pub class_windows: ClassWindowTable,
    /// Metrics to tercile-rank, in output column order.
    pub tercile_metrics: Vec<TercileMetric>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            classifier: ClassifierConfig::tutorial_defaults(),
            class_windows: ClassWindowTable::builtin(),
            tercile_metrics: vec![
                TercileMetric::Sus,
                TercileMetric::PerceivedLearning,
                TercileMetric::UeqOverall,
                TercileMetric::QuizCorrectRatioOverAll,
            ],
        }
    }
}

/// The input tables of a build, already ingested.
#[derive(Debug, Clone, Default)]
pub struct BuildInputs {
    pub events: Vec<RawEvent>,
    pub quiz: Vec<QuizStats>,
    pub survey: SurveyTable,
    pub sus: Vec<SusScores>,
}

/// A finished event log plus its side outputs.
#[derive(Debug, Clone)]
pub struct EventLog {
    pub granularity: Granularity,
    /// Survey question codes, in column order.
    pub question_codes: Vec<String>,
    /// Tercile metrics, in column order.
    pub metrics: Vec<TercileMetric>,
    pub rows: Vec<LogRow>,
    pub durations: Vec<CaseDuration>,
    pub dedup: DedupReport,
    pub tercile_outcomes: Vec<TercileOutcome>,
}

impl EventLog {
    pub fn distinct_cases(&self) -> usize {
        self.rows
            .iter()
            .map(|r| r.case_id.as_str())
            .collect::<HashSet<_>>()
            .len()
    }

    /// Copy of the log retaining only cases in `allow`; everything already
    /// computed (counts, labels, ranks) is kept as-is.
    pub fn filtered(&self, allow: &HashSet<String>) -> EventLog {
        EventLog {
            granularity: self.granularity,
            question_codes: self.question_codes.clone(),
            metrics: self.metrics.clone(),
            rows: self
                .rows
                .iter()
                .filter(|r| allow.contains(&r.case_id))
                .cloned()
                .collect(),
            durations: self
                .durations
                .iter()
                .filter(|d| allow.contains(&d.case_id))
                .cloned()
                .collect(),
            dedup: self.dedup,
            tercile_outcomes: self.tercile_outcomes.clone(),
        }
    }

    /// Class label per case, for re-emitting enrichment tables with class.
    pub fn class_by_case(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();
        for row in &self.rows {
            map.entry(row.case_id.clone())
                .or_insert_with(|| row.class_label.clone());
        }
        map
    }
}

/// Orchestrates the enrichment stage for one granularity.
pub struct EventLogBuilder {
    config: BuildConfig,
}

impl Default for EventLogBuilder {
    fn default() -> Self {
        Self::new(BuildConfig::default())
    }
}

impl EventLogBuilder {
    pub fn new(config: BuildConfig) -> Self {
        Self { config }
    }

    /// Run the full enrichment stage over the input tables.
    pub fn build(&self, inputs: &BuildInputs, granularity: Granularity) -> EventLog {
        let classifier = EventClassifier::new(self.config.classifier.clone());

        let mut events = inputs.events.clone();
        classifier.relabel(&mut events);

        let mut rows = split_stream(&events, granularity);

        let dedup = fix_timestamp_collisions(&mut rows);

        attach_click_counts(&mut rows);
        rows.retain(|r| {
            !matches!(
                EventKind::from_label(&r.event_page),
                Some(EventKind::Click) | Some(EventKind::DoubleClick)
            )
        });

        join_enrichment_tables(&mut rows, &inputs.quiz, &inputs.survey, &inputs.sus);

        synthesize_survey_end(&mut rows, &inputs.survey, granularity);
        rows.sort_by(|a, b| {
            a.case_id
                .cmp(&b.case_id)
                .then(a.timestamp.cmp(&b.timestamp))
        });

        let durations = aggregate_cases(&rows);
        let duration_by_case: HashMap<&str, &CaseDuration> = durations
            .iter()
            .map(|d| (d.case_id.as_str(), d))
            .collect();
        for row in rows.iter_mut() {
            row.duration = duration_by_case.get(row.case_id.as_str()).map(|d| (*d).clone());
        }

        for row in rows.iter_mut() {
            row.class_label = self
                .config
                .class_windows
                .label_for(row.timestamp)
                .to_string();
        }

        let tercile_outcomes = self
            .config
            .tercile_metrics
            .iter()
            .map(|metric| label_terciles(&mut rows, *metric))
            .collect();

        EventLog {
            granularity,
            question_codes: inputs.survey.question_codes.clone(),
            metrics: self.config.tercile_metrics.clone(),
            rows,
            durations,
            dedup,
            tercile_outcomes,
        }
    }
}

/// Page stream keeps page entries and click events (clicks are counted and
/// dropped later); paragraph stream keeps every event and attaches the
/// composite paragraph activity.
fn split_stream(events: &[RawEvent], granularity: Granularity) -> Vec<LogRow> {
    events
        .iter()
        .filter(|e| match granularity {
            Granularity::Page => matches!(
                EventKind::from_label(&e.event),
                Some(EventKind::PageIn) | Some(EventKind::Click) | Some(EventKind::DoubleClick)
            ),
            Granularity::Paragraph => true,
        })
        .map(|e| LogRow {
            case_id: e.session_id.clone(),
            page_title: e.page_title.clone(),
            menu: e.menu.clone(),
            page_order: e.page_order,
            page_para: e.page_para,
            event_page: e.event.clone(),
            timestamp: e.timestamp,
            event_para: match granularity {
                Granularity::Page => None,
                Granularity::Paragraph => Some(EventClassifier::composite_activity(
                    &e.page_title,
                    &e.event,
                    e.page_para,
                )),
            },
            click_count: 0,
            dbclick_count: 0,
            quiz: None,
            survey: None,
            sus: None,
            duration: None,
            class_label: String::new(),
            terciles: Vec::new(),
        })
        .collect()
}

/// Count click and double-click rows per case and stamp the counts on every
/// row of the case.
fn attach_click_counts(rows: &mut [LogRow]) {
    let mut counts: HashMap<&str, (u32, u32)> = HashMap::new();
    for row in rows.iter() {
        match EventKind::from_label(&row.event_page) {
            Some(EventKind::Click) => counts.entry(&row.case_id).or_default().0 += 1,
            Some(EventKind::DoubleClick) => counts.entry(&row.case_id).or_default().1 += 1,
            _ => {}
        }
    }

    let counts: HashMap<String, (u32, u32)> = counts
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
    for row in rows.iter_mut() {
        let (clicks, dbclicks) = counts.get(&row.case_id).copied().unwrap_or((0, 0));
        row.click_count = clicks;
        row.dbclick_count = dbclicks;
    }
}

/// Left-join quiz, survey, and SUS fields by case id. Cases absent from a
/// table keep `None` fields; a duplicated key in a per-case table is a
/// data-quality defect and only the first row is used.
fn join_enrichment_tables(
    rows: &mut [LogRow],
    quiz: &[QuizStats],
    survey: &SurveyTable,
    sus: &[SusScores],
) {
    let mut quiz_by_case: HashMap<&str, &QuizStats> = HashMap::new();
    for stats in quiz {
        if quiz_by_case.insert(&stats.session_id, stats).is_some() {
            warn!("duplicate quiz-stats key {}, keeping first row", stats.session_id);
        }
    }

    let mut sus_by_case: HashMap<&str, &SusScores> = HashMap::new();
    for scores in sus {
        if sus_by_case.insert(&scores.session_id, scores).is_some() {
            warn!("duplicate SUS key {}, keeping first row", scores.session_id);
        }
    }

    let mut survey_by_case: HashMap<&str, &crate::types::SurveyRecord> = HashMap::new();
    for record in &survey.records {
        if survey_by_case.insert(&record.session_id, record).is_some() {
            warn!("duplicate survey key {}, keeping first row", record.session_id);
        }
    }

    for row in rows.iter_mut() {
        row.quiz = quiz_by_case.get(row.case_id.as_str()).map(|q| (*q).clone());
        row.sus = sus_by_case.get(row.case_id.as_str()).map(|s| (*s).clone());
        row.survey = survey_by_case
            .get(row.case_id.as_str())
            .map(|r| r.answers.clone());
    }
}

/// Append one `SURVEY-END` row per case that has a survey timestamp.
///
/// The pseudo-event clones the case's first row, so menu/page coordinates,
/// counts, and joined fields carry over; activity, event label, and
/// timestamp are overridden. Cases whose survey record has no timestamp, or
/// that never appear in the event stream, get nothing.
fn synthesize_survey_end(rows: &mut Vec<LogRow>, survey: &SurveyTable, granularity: Granularity) {
    let survey_ts: HashMap<&str, chrono::NaiveDateTime> = survey
        .records
        .iter()
        .filter_map(|r| r.timestamp.map(|t| (r.session_id.as_str(), t)))
        .collect();

    let mut seen: HashSet<&str> = HashSet::new();
    let mut synthesized: Vec<LogRow> = Vec::new();
    for row in rows.iter() {
        if !seen.insert(&row.case_id) {
            continue;
        }
        if let Some(&timestamp) = survey_ts.get(row.case_id.as_str()) {
            let mut pseudo = row.clone();
            pseudo.page_title = SURVEY_END.to_string();
            pseudo.event_page = EventKind::PageIn.as_str().to_string();
            pseudo.event_para = match granularity {
                Granularity::Page => None,
                Granularity::Paragraph => Some(EventClassifier::composite_activity(
                    SURVEY_END,
                    EventKind::PageIn.as_str(),
                    0,
                )),
            };
            pseudo.timestamp = timestamp;
            synthesized.push(pseudo);
        }
    }

    rows.extend(synthesized);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SurveyRecord;
    use chrono::{NaiveDate, NaiveDateTime};
    use pretty_assertions::assert_eq;

    fn ts(d: u32, h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, d)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn raw(session: &str, page: &str, event: &str, para: i64, t: NaiveDateTime) -> RawEvent {
        RawEvent {
            session_id: session.to_string(),
            page_title: page.to_string(),
            menu: "main".to_string(),
            page_order: 1,
            page_para: para,
            event: event.to_string(),
            timestamp: t,
        }
    }

    fn quiz_stats(session: &str, correct_ratio: f64) -> QuizStats {
        QuizStats {
            session_id: session.to_string(),
            session_count: 10,
            correct_total: 7,
            wrong_total: 3,
            correct_ratio_over_count: 0.7,
            correct_ratio_over_all: correct_ratio,
            session_count_p3: None,
            correct_total_p3: None,
            wrong_total_p3: None,
            correct_ratio_over_count_p3: None,
            correct_ratio_over_all_p3: None,
        }
    }

    fn sample_inputs() -> BuildInputs {
        BuildInputs {
            events: vec![
                // Case s1: two page entries (one collision), a click, a mouse event.
                raw("s1", "Introduzione", "ingressoPagina", 0, ts(7, 10, 0, 0)),
                raw("s1", "Variabili", "ingressoPagina", 0, ts(7, 10, 0, 0)),
                raw("s1", "Variabili", "click", 2, ts(7, 10, 5, 0)),
                raw("s1", "Variabili", "mouseover", 1, ts(7, 10, 6, 0)),
                // Case s2: one page entry, no quiz/survey/SUS rows.
                raw("s2", "Introduzione", "ingressoPagina", 0, ts(19, 9, 0, 0)),
            ],
            quiz: vec![quiz_stats("s1", 0.7)],
            survey: SurveyTable {
                question_codes: vec!["Q_1".to_string(), "Q_2".to_string()],
                records: vec![SurveyRecord {
                    session_id: "s1".to_string(),
                    timestamp: Some(ts(7, 11, 0, 0)),
                    answers: vec!["4".to_string(), "5".to_string()],
                }],
            },
            sus: vec![SusScores {
                session_id: "s1".to_string(),
                sus: 72.5,
                perceived_learning: 4.0,
                ueq_pragmatic: 1.2,
                ueq_hedonic: 0.8,
                ueq_overall: 1.0,
            }],
        }
    }

    #[test]
    fn test_page_log_end_to_end() {
        let log = EventLogBuilder::default().build(&sample_inputs(), Granularity::Page);

        // s1: 2 page entries + survey-end; s2: 1 page entry. Clicks dropped.
        assert_eq!(log.rows.len(), 4);
        assert_eq!(log.distinct_cases(), 2);

        let s1: Vec<&LogRow> = log.rows.iter().filter(|r| r.case_id == "s1").collect();
        assert_eq!(s1.len(), 3);
        // Collision repaired, strict ordering per case.
        assert_eq!(s1[0].timestamp, ts(7, 10, 0, 0));
        assert_eq!(s1[1].timestamp, ts(7, 10, 0, 1));
        assert_eq!(log.dedup.corrected, 1);
        for pair in s1.windows(2) {
            assert!(pair[0].timestamp < pair[1].timestamp);
        }

        // Click counted, row dropped, count stamped on every case row.
        assert!(s1.iter().all(|r| r.click_count == 1 && r.dbclick_count == 0));
        assert!(s1.iter().all(|r| r.event_page != "Click"));

        // Survey-end synthesized at the survey timestamp.
        let end = s1.last().unwrap();
        assert_eq!(end.page_title, SURVEY_END);
        assert_eq!(end.event_page, "PageIn");
        assert_eq!(end.timestamp, ts(7, 11, 0, 0));

        // Class label from the built-in windows (2024-03-07 -> SAA).
        assert!(s1.iter().all(|r| r.class_label == "SAA"));

        // Durations computed over the final rows, survey-end included.
        let d = s1[0].duration.as_ref().unwrap();
        assert_eq!(d.case_length, 3);
        assert_eq!(d.total_hours, 1.0);
    }

    #[test]
    fn test_left_join_keeps_unmatched_cases() {
        let log = EventLogBuilder::default().build(&sample_inputs(), Granularity::Page);

        let s2: Vec<&LogRow> = log.rows.iter().filter(|r| r.case_id == "s2").collect();
        assert_eq!(s2.len(), 1);
        assert!(s2[0].quiz.is_none());
        assert!(s2[0].survey.is_none());
        assert!(s2[0].sus.is_none());
        // No survey timestamp, no synthesized row.
        assert!(s2.iter().all(|r| r.page_title != SURVEY_END));
        // Metric ranks all NoData for the case without backing tables.
        assert!(s2[0]
            .terciles
            .iter()
            .all(|t| *t == crate::types::TercileRank::NoData));
    }

    #[test]
    fn test_paragraph_log_keeps_all_events_with_composite_ids() {
        let log = EventLogBuilder::default().build(&sample_inputs(), Granularity::Paragraph);

        let s1: Vec<&LogRow> = log.rows.iter().filter(|r| r.case_id == "s1").collect();
        // 2 page entries + mouseover + survey-end; the click is counted then dropped.
        assert_eq!(s1.len(), 4);
        assert!(s1.iter().all(|r| r.click_count == 1));

        let mouse = s1.iter().find(|r| r.event_page == "MouseIn").unwrap();
        assert_eq!(mouse.event_para.as_deref(), Some("VARS_MouseIn_1"));

        let end = s1.iter().find(|r| r.page_title == SURVEY_END).unwrap();
        assert_eq!(end.event_para.as_deref(), Some("SURVEY-END_PageIn_0"));
    }

    #[test]
    fn test_deterministic_rebuild() {
        let builder = EventLogBuilder::default();
        let inputs = sample_inputs();
        let first = builder.build(&inputs, Granularity::Page);
        let second = builder.build(&inputs, Granularity::Page);
        assert_eq!(first.rows, second.rows);
        assert_eq!(first.durations, second.durations);
    }

    #[test]
    fn test_allow_list_filtering() {
        let log = EventLogBuilder::default().build(&sample_inputs(), Granularity::Page);

        let allow: HashSet<String> = ["s1".to_string()].into();
        let filtered = log.filtered(&allow);

        assert_eq!(filtered.distinct_cases(), 1);
        assert!(filtered.rows.iter().all(|r| r.case_id == "s1"));
        assert!(filtered.durations.iter().all(|d| d.case_id == "s1"));
        // The unfiltered log is untouched.
        assert_eq!(log.distinct_cases(), 2);
    }

    #[test]
    fn test_survey_end_counts_toward_join_completeness() {
        let log = EventLogBuilder::default().build(&sample_inputs(), Granularity::Page);

        // Every case from the events input appears with its full event count
        // plus 0 or 1 survey-end rows.
        let s1_rows = log.rows.iter().filter(|r| r.case_id == "s1").count();
        let s1_ends = log
            .rows
            .iter()
            .filter(|r| r.case_id == "s1" && r.page_title == SURVEY_END)
            .count();
        assert_eq!(s1_rows, 2 + s1_ends);
        assert_eq!(s1_ends, 1);
    }
}
