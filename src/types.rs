//! Core types for the edulog pipeline
//!
//! This module defines the data structures that flow through each stage of the
//! pipeline: raw platform events, the per-session enrichment tables, and the
//! final event-log rows.

use chrono::{NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// Canonical interaction event vocabulary.
///
/// Raw exports carry localized labels; the classifier maps them onto these
/// names. Labels outside the mapping pass through as plain strings, so log
/// rows store the label as a `String` and this enum defines the canonical
/// spellings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    PageIn,
    PageOut,
    MouseIn,
    MouseOut,
    MouseEnter,
    Click,
    DoubleClick,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::PageIn => "PageIn",
            EventKind::PageOut => "PageOut",
            EventKind::MouseIn => "MouseIn",
            EventKind::MouseOut => "MouseOut",
            EventKind::MouseEnter => "MouseEnter",
            EventKind::Click => "Click",
            EventKind::DoubleClick => "DoubleClick",
        }
    }

    /// Parse a canonical label back into the enum, if it is one.
    pub fn from_label(label: &str) -> Option<EventKind> {
        match label {
            "PageIn" => Some(EventKind::PageIn),
            "PageOut" => Some(EventKind::PageOut),
            "MouseIn" => Some(EventKind::MouseIn),
            "MouseOut" => Some(EventKind::MouseOut),
            "MouseEnter" => Some(EventKind::MouseEnter),
            "Click" => Some(EventKind::Click),
            "DoubleClick" => Some(EventKind::DoubleClick),
            _ => None,
        }
    }
}

/// One raw interaction record from the platform's events export.
///
/// The export's `lang`, `pageName`, and `duration` columns are dropped at
/// ingestion; everything else is kept verbatim. Immutable once read, except
/// for the relabeling pass over `page_title`/`event`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RawEvent {
    /// Session identifier; becomes the case id of the final log.
    pub session_id: String,
    /// Page title as exported (localized) or canonical after relabeling.
    pub page_title: String,
    /// Menu section the page belongs to.
    pub menu: String,
    /// Position of the page in the tutorial.
    pub page_order: i64,
    /// Paragraph index within the page.
    pub page_para: i64,
    /// Event label as exported (localized) or canonical after relabeling.
    pub event: String,
    /// Wall-clock time of the interaction.
    pub timestamp: NaiveDateTime,
}

/// Per-session quiz aggregates (the stage-2 output consumed by the builder).
///
/// `_p3` fields cover the first-three-track subset and are null for sessions
/// that never touched those tracks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizStats {
    pub session_id: String,
    /// Number of quiz answers submitted by the session.
    pub session_count: u32,
    pub correct_total: u32,
    pub wrong_total: u32,
    /// Correct answers over answers submitted, 2 decimals.
    pub correct_ratio_over_count: f64,
    /// Correct answers over the full question set, 2 decimals.
    pub correct_ratio_over_all: f64,
    pub session_count_p3: Option<u32>,
    pub correct_total_p3: Option<u32>,
    pub wrong_total_p3: Option<u32>,
    pub correct_ratio_over_count_p3: Option<f64>,
    pub correct_ratio_over_all_p3: Option<f64>,
}

/// One cleaned survey response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurveyRecord {
    pub session_id: String,
    /// When the respondent reached the survey form, if recorded.
    pub timestamp: Option<NaiveDateTime>,
    /// Answers aligned with [`SurveyTable::question_codes`].
    pub answers: Vec<String>,
}

/// The cleaned survey table with its question-code schema.
///
/// Question codes (`Q_1..Q_n`) are taken from the table header once at
/// ingestion rather than re-derived positionally downstream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SurveyTable {
    pub question_codes: Vec<String>,
    pub records: Vec<SurveyRecord>,
}

impl SurveyTable {
    pub fn get(&self, session_id: &str) -> Option<&SurveyRecord> {
        self.records.iter().find(|r| r.session_id == session_id)
    }
}

/// Per-session usability and experience scores.
///
/// The source file carries decimal commas and blanks; ingestion normalizes
/// commas and reads blanks as 0, matching the upstream export's conventions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SusScores {
    pub session_id: String,
    pub sus: f64,
    pub perceived_learning: f64,
    pub ueq_pragmatic: f64,
    pub ueq_hedonic: f64,
    pub ueq_overall: f64,
}

/// Per-case duration and length summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseDuration {
    pub case_id: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    /// Number of rows the case contributes to the log.
    pub case_length: u32,
    /// `end - start` in hours, 2 decimals.
    pub total_hours: f64,
    /// `end - start` in minutes, 2 decimals.
    pub total_minutes: f64,
    /// `end - start` in days, 2 decimals.
    pub total_days: f64,
}

/// Tercile bucket of a per-case metric.
///
/// `NoData` marks cases whose metric value is missing; the remaining ranks
/// are equal-frequency thirds of the distribution over distinct cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TercileRank {
    NoData,
    Low,
    Mid,
    High,
}

impl TercileRank {
    /// Numeric encoding used in the emitted log: 0 = no data, 1..3 = rank.
    pub fn as_u8(&self) -> u8 {
        match self {
            TercileRank::NoData => 0,
            TercileRank::Low => 1,
            TercileRank::Mid => 2,
            TercileRank::High => 3,
        }
    }

    pub fn from_bucket(bucket: usize) -> TercileRank {
        match bucket {
            1 => TercileRank::Low,
            2 => TercileRank::Mid,
            _ => TercileRank::High,
        }
    }
}

/// Output granularity of the event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    /// One activity per page visit; only page entries survive as rows.
    Page,
    /// One activity per paragraph-level interaction.
    Paragraph,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Page => "PAGE",
            Granularity::Paragraph => "PARA",
        }
    }
}

/// Metrics the tercile labeler can rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TercileMetric {
    Sus,
    PerceivedLearning,
    UeqOverall,
    QuizCorrectRatioOverAll,
}

impl TercileMetric {
    /// Column the metric is reported under; the tercile column appends
    /// `_Tercile` to this name.
    pub fn column_name(&self) -> &'static str {
        match self {
            TercileMetric::Sus => "SUS",
            TercileMetric::PerceivedLearning => "PerceivedLearning",
            TercileMetric::UeqOverall => "UEQ-Overall",
            TercileMetric::QuizCorrectRatioOverAll => "QuizAnswerCorrectRatioOverAll",
        }
    }

    /// Extract the metric value from a log row. `None` when the case is
    /// absent from the backing table (left-join gap).
    pub fn value(&self, row: &LogRow) -> Option<f64> {
        match self {
            TercileMetric::Sus => row.sus.as_ref().map(|s| s.sus),
            TercileMetric::PerceivedLearning => row.sus.as_ref().map(|s| s.perceived_learning),
            TercileMetric::UeqOverall => row.sus.as_ref().map(|s| s.ueq_overall),
            TercileMetric::QuizCorrectRatioOverAll => {
                row.quiz.as_ref().map(|q| q.correct_ratio_over_all)
            }
        }
    }
}

/// One row of the final event log.
///
/// Built up in stages: the event core first, then per-case click counts,
/// then the left-joined quiz/survey/SUS fields, then duration, class label,
/// and tercile ranks.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRow {
    pub case_id: String,
    pub page_title: String,
    pub menu: String,
    pub page_order: i64,
    pub page_para: i64,
    /// Canonical event label.
    pub event_page: String,
    pub timestamp: NaiveDateTime,
    /// Composite paragraph activity (`VARS_Click_3`); paragraph logs only.
    pub event_para: Option<String>,
    pub click_count: u32,
    pub dbclick_count: u32,
    pub quiz: Option<QuizStats>,
    /// Survey answers aligned with the table's question codes.
    pub survey: Option<Vec<String>>,
    pub sus: Option<SusScores>,
    pub duration: Option<CaseDuration>,
    /// Session-class label, `"NA"` when no window matched.
    pub class_label: String,
    /// Ranks aligned with the configured metric list.
    pub terciles: Vec<TercileRank>,
}

impl LogRow {
    /// The activity name the process-mining tool sees.
    pub fn activity(&self, granularity: Granularity) -> &str {
        match granularity {
            Granularity::Page => &self.page_title,
            Granularity::Paragraph => self.event_para.as_deref().unwrap_or(&self.page_title),
        }
    }
}

/// A classroom-session window: a date plus an inclusive time-of-day range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassWindow {
    pub date: chrono::NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub label: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_round_trip() {
        for kind in [
            EventKind::PageIn,
            EventKind::PageOut,
            EventKind::MouseIn,
            EventKind::MouseOut,
            EventKind::MouseEnter,
            EventKind::Click,
            EventKind::DoubleClick,
        ] {
            assert_eq!(EventKind::from_label(kind.as_str()), Some(kind));
        }
        assert_eq!(EventKind::from_label("ingressoPagina"), None);
    }

    #[test]
    fn test_tercile_rank_encoding() {
        assert_eq!(TercileRank::NoData.as_u8(), 0);
        assert_eq!(TercileRank::Low.as_u8(), 1);
        assert_eq!(TercileRank::Mid.as_u8(), 2);
        assert_eq!(TercileRank::High.as_u8(), 3);
        assert_eq!(TercileRank::from_bucket(2), TercileRank::Mid);
    }

    #[test]
    fn test_activity_by_granularity() {
        let row = LogRow {
            case_id: "s1".to_string(),
            page_title: "VARS".to_string(),
            menu: "main".to_string(),
            page_order: 3,
            page_para: 2,
            event_page: "Click".to_string(),
            timestamp: chrono::NaiveDate::from_ymd_opt(2024, 3, 7)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap(),
            event_para: Some("VARS_Click_2".to_string()),
            click_count: 0,
            dbclick_count: 0,
            quiz: None,
            survey: None,
            sus: None,
            duration: None,
            class_label: "NA".to_string(),
            terciles: Vec::new(),
        };
        assert_eq!(row.activity(Granularity::Page), "VARS");
        assert_eq!(row.activity(Granularity::Paragraph), "VARS_Click_2");
    }
}
