//! Typed readers for the pipeline's input tables
//!
//! Each reader resolves column positions from the header once and reports
//! what is missing: a missing key column fails the read, a missing
//! enrichment column is logged and its fields come back empty. Exact
//! duplicate rows are dropped at ingestion, before any column selection.

use std::collections::HashSet;
use std::path::Path;

use chrono::NaiveDateTime;
use csv::{ReaderBuilder, StringRecord};
use log::warn;

use crate::error::PipelineError;
use crate::tables::DELIMITER;
use crate::types::{QuizStats, RawEvent, SurveyRecord, SurveyTable, SusScores};

/// One answer row of the raw quiz export (stage-2 input).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizAnswer {
    pub session_id: String,
    pub page_title: String,
    pub correct: bool,
}

fn open_reader(path: &Path) -> Result<csv::Reader<std::fs::File>, PipelineError> {
    let file = std::fs::File::open(path).map_err(|e| PipelineError::io(path, e))?;
    Ok(ReaderBuilder::new()
        .delimiter(DELIMITER)
        .flexible(true)
        .from_reader(file))
}

/// Load every record of a table, dropping exact duplicate rows.
fn read_distinct_records(
    path: &Path,
) -> Result<(StringRecord, Vec<StringRecord>), PipelineError> {
    let mut reader = open_reader(path)?;
    let headers = reader
        .headers()
        .map_err(|e| PipelineError::csv(path, e))?
        .clone();

    let mut seen: HashSet<Vec<String>> = HashSet::new();
    let mut records = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| PipelineError::csv(path, e))?;
        let key: Vec<String> = record.iter().map(|s| s.to_string()).collect();
        if seen.insert(key) {
            records.push(record);
        }
    }

    if records.is_empty() {
        return Err(PipelineError::EmptyTable {
            path: path.to_path_buf(),
        });
    }
    Ok((headers, records))
}

fn column_index(headers: &StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|h| h.trim() == name)
}

fn require_column(
    headers: &StringRecord,
    name: &str,
    path: &Path,
) -> Result<usize, PipelineError> {
    column_index(headers, name).ok_or_else(|| PipelineError::MissingColumn {
        column: name.to_string(),
        path: path.to_path_buf(),
    })
}

fn optional_column(headers: &StringRecord, name: &str, path: &Path) -> Option<usize> {
    let index = column_index(headers, name);
    if index.is_none() {
        warn!(
            "column `{}` missing in {}, its fields will be empty",
            name,
            path.display()
        );
    }
    index
}

fn cell<'r>(record: &'r StringRecord, index: usize) -> &'r str {
    record.get(index).unwrap_or("").trim()
}

fn optional_cell<'r>(record: &'r StringRecord, index: Option<usize>) -> &'r str {
    index.map(|i| cell(record, i)).unwrap_or("")
}

/// Parse a platform timestamp (`YYYY-MM-DD HH:MM:SS`, `T`-separated also
/// tolerated).
pub fn parse_timestamp(value: &str) -> Result<NaiveDateTime, PipelineError> {
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(parsed);
        }
    }
    Err(PipelineError::BadTimestamp {
        value: value.to_string(),
    })
}

fn parse_i64(value: &str, column: &str) -> Result<i64, PipelineError> {
    if value.is_empty() {
        return Ok(0);
    }
    value.parse().map_err(|_| PipelineError::BadNumber {
        column: column.to_string(),
        value: value.to_string(),
    })
}

/// Empty cells read as 0; used for count/ratio columns whose gaps mean
/// "nothing recorded".
fn parse_f64_or_zero(value: &str) -> f64 {
    if value.is_empty() {
        return 0.0;
    }
    value.replace(',', ".").parse().unwrap_or(0.0)
}

fn parse_u32_or_zero(value: &str) -> u32 {
    if value.is_empty() {
        return 0;
    }
    value.parse().unwrap_or(0)
}

fn parse_opt_u32(value: &str) -> Option<u32> {
    if value.is_empty() {
        None
    } else {
        value.parse().ok()
    }
}

fn parse_opt_f64(value: &str) -> Option<f64> {
    if value.is_empty() {
        None
    } else {
        value.replace(',', ".").parse().ok()
    }
}

/// Read the platform's events export.
pub fn read_events(path: &Path) -> Result<Vec<RawEvent>, PipelineError> {
    let (headers, records) = read_distinct_records(path)?;

    let session = require_column(&headers, "sessionID", path)?;
    let page_title = require_column(&headers, "pageTitle", path)?;
    let event = require_column(&headers, "event", path)?;
    let timestamp = require_column(&headers, "lastUpdate", path)?;
    let menu = optional_column(&headers, "menu", path);
    let page_order = optional_column(&headers, "pageOrder", path);
    let page_para = optional_column(&headers, "pagePara", path);

    let mut events = Vec::with_capacity(records.len());
    for record in &records {
        events.push(RawEvent {
            session_id: cell(record, session).to_string(),
            page_title: cell(record, page_title).to_string(),
            menu: optional_cell(record, menu).to_string(),
            page_order: parse_i64(optional_cell(record, page_order), "pageOrder")?,
            page_para: parse_i64(optional_cell(record, page_para), "pagePara")?,
            event: cell(record, event).to_string(),
            timestamp: parse_timestamp(cell(record, timestamp))?,
        });
    }
    Ok(events)
}

/// Read the per-session quiz statistics table (stage-2 output).
pub fn read_quiz_stats(path: &Path) -> Result<Vec<QuizStats>, PipelineError> {
    let (headers, records) = read_distinct_records(path)?;

    let session = require_column(&headers, "sessionID", path)?;
    let count = optional_column(&headers, "QuizSessionCount", path);
    let correct = optional_column(&headers, "QuizAnswerCorrectTotal", path);
    let wrong = optional_column(&headers, "QuizAnswerWrongTotal", path);
    let ratio_count = optional_column(&headers, "QuizAnswerCorrectRatioOverCount", path);
    let ratio_all = optional_column(&headers, "QuizAnswerCorrectRatioOverAll", path);
    let count_p3 = optional_column(&headers, "QuizSessionCount_P3", path);
    let correct_p3 = optional_column(&headers, "QuizAnswerCorrectTotal_P3", path);
    let wrong_p3 = optional_column(&headers, "QuizAnswerWrongTotal_P3", path);
    let ratio_count_p3 = optional_column(&headers, "QuizAnswerCorrectRatioOverCount_P3", path);
    let ratio_all_p3 = optional_column(&headers, "QuizAnswerCorrectRatioOverAll_P3", path);

    let mut stats = Vec::with_capacity(records.len());
    for record in &records {
        stats.push(QuizStats {
            session_id: cell(record, session).to_string(),
            session_count: parse_u32_or_zero(optional_cell(record, count)),
            correct_total: parse_u32_or_zero(optional_cell(record, correct)),
            wrong_total: parse_u32_or_zero(optional_cell(record, wrong)),
            correct_ratio_over_count: parse_f64_or_zero(optional_cell(record, ratio_count)),
            correct_ratio_over_all: parse_f64_or_zero(optional_cell(record, ratio_all)),
            session_count_p3: parse_opt_u32(optional_cell(record, count_p3)),
            correct_total_p3: parse_opt_u32(optional_cell(record, correct_p3)),
            wrong_total_p3: parse_opt_u32(optional_cell(record, wrong_p3)),
            correct_ratio_over_count_p3: parse_opt_f64(optional_cell(record, ratio_count_p3)),
            correct_ratio_over_all_p3: parse_opt_f64(optional_cell(record, ratio_all_p3)),
        });
    }
    Ok(stats)
}

/// Read the cleaned survey table. Question codes are whatever header columns
/// remain after `sessionID` and `SurveyTimestamp`, in header order.
pub fn read_survey(path: &Path) -> Result<SurveyTable, PipelineError> {
    let (headers, records) = read_distinct_records(path)?;

    let session = require_column(&headers, "sessionID", path)?;
    let timestamp = optional_column(&headers, "SurveyTimestamp", path);

    let question_columns: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != session && Some(*i) != timestamp)
        .map(|(i, h)| (i, h.trim().to_string()))
        .collect();

    let mut table = SurveyTable {
        question_codes: question_columns.iter().map(|(_, h)| h.clone()).collect(),
        records: Vec::with_capacity(records.len()),
    };
    for record in &records {
        let raw_ts = optional_cell(record, timestamp);
        let parsed_ts = if raw_ts.is_empty() {
            None
        } else {
            match parse_timestamp(raw_ts) {
                Ok(t) => Some(t),
                Err(_) => {
                    warn!(
                        "unparseable survey timestamp `{}` in {}, treated as absent",
                        raw_ts,
                        path.display()
                    );
                    None
                }
            }
        };
        table.records.push(SurveyRecord {
            session_id: cell(record, session).to_string(),
            timestamp: parsed_ts,
            answers: question_columns
                .iter()
                .map(|(i, _)| cell(record, *i).to_string())
                .collect(),
        });
    }
    Ok(table)
}

/// Read the SUS/UEQ score table. Decimal commas are normalized; blanks read
/// as 0, matching the upstream export.
pub fn read_sus(path: &Path) -> Result<Vec<SusScores>, PipelineError> {
    let (headers, records) = read_distinct_records(path)?;

    let session = require_column(&headers, "sessionID", path)?;
    let sus = optional_column(&headers, "SUS", path);
    let learning = optional_column(&headers, "PerceivedLearning", path);
    let pragmatic = optional_column(&headers, "UEQ-Pragmatic", path);
    let hedonic = optional_column(&headers, "UEQ-Hedonic", path);
    let overall = optional_column(&headers, "UEQ-Overall", path);

    fn round3(value: f64) -> f64 {
        (value * 1000.0).round() / 1000.0
    }

    let mut scores = Vec::with_capacity(records.len());
    for record in &records {
        scores.push(SusScores {
            session_id: cell(record, session).to_string(),
            sus: round3(parse_f64_or_zero(optional_cell(record, sus))),
            perceived_learning: round3(parse_f64_or_zero(optional_cell(record, learning))),
            ueq_pragmatic: round3(parse_f64_or_zero(optional_cell(record, pragmatic))),
            ueq_hedonic: round3(parse_f64_or_zero(optional_cell(record, hedonic))),
            ueq_overall: round3(parse_f64_or_zero(optional_cell(record, overall))),
        });
    }
    Ok(scores)
}

/// Read the externally curated case allow-list. Returns the distinct values
/// of its `Case ID` column.
pub fn read_case_filter(path: &Path) -> Result<HashSet<String>, PipelineError> {
    let (headers, records) = read_distinct_records(path)?;
    let case = require_column(&headers, "Case ID", path)?;
    Ok(records
        .iter()
        .map(|record| cell(record, case).to_string())
        .filter(|id| !id.is_empty())
        .collect())
}

/// Read the raw quiz export (stage-2 input).
pub fn read_quiz_answers(path: &Path) -> Result<Vec<QuizAnswer>, PipelineError> {
    let (headers, records) = read_distinct_records(path)?;

    let session = require_column(&headers, "sessionID", path)?;
    let page_title = require_column(&headers, "pageTitle", path)?;
    let correct = require_column(&headers, "answerCorrect", path)?;

    let mut answers = Vec::with_capacity(records.len());
    for record in &records {
        answers.push(QuizAnswer {
            session_id: cell(record, session).to_string(),
            page_title: cell(record, page_title).to_string(),
            correct: cell(record, correct) == "1",
        });
    }
    Ok(answers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn write_temp(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_read_events_selects_and_dedupes() {
        let file = write_temp(
            "sessionID;lang;pageName;pageTitle;menu;pageOrder;pagePara;event;duration;lastUpdate\n\
             s1;it;intro;Introduzione;main;1;0;ingressoPagina;;2024-03-07 10:00:00\n\
             s1;it;intro;Introduzione;main;1;0;ingressoPagina;;2024-03-07 10:00:00\n\
             s1;it;vars;Variabili;main;3;2;click;0.5;2024-03-07 10:05:00\n",
        );

        let events = read_events(file.path()).unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].session_id, "s1");
        assert_eq!(events[0].page_title, "Introduzione");
        assert_eq!(events[1].page_para, 2);
        assert_eq!(events[1].event, "click");
    }

    #[test]
    fn test_read_events_missing_key_column_fails() {
        let file = write_temp("pageTitle;event;lastUpdate\nIntro;click;2024-03-07 10:00:00\n");

        let result = read_events(file.path());

        assert!(matches!(
            result,
            Err(PipelineError::MissingColumn { column, .. }) if column == "sessionID"
        ));
    }

    #[test]
    fn test_read_survey_resolves_question_codes_from_header() {
        let file = write_temp(
            "sessionID;SurveyTimestamp;Q_1;Q_2;Q_3\n\
             s1;2024-03-07 11:00:00;4;5;often\n\
             s2;;3;2;never\n",
        );

        let table = read_survey(file.path()).unwrap();

        assert_eq!(table.question_codes, vec!["Q_1", "Q_2", "Q_3"]);
        assert_eq!(table.records.len(), 2);
        assert!(table.records[0].timestamp.is_some());
        assert_eq!(table.records[0].answers, vec!["4", "5", "often"]);
        assert!(table.records[1].timestamp.is_none());
    }

    #[test]
    fn test_read_quiz_stats_optional_subset_columns() {
        let file = write_temp(
            "sessionID;QuizSessionCount;QuizAnswerCorrectTotal;QuizAnswerWrongTotal;\
             QuizAnswerCorrectRatioOverCount;QuizAnswerCorrectRatioOverAll\n\
             s1;10;7;3;0.7;0.7\n",
        );

        let stats = read_quiz_stats(file.path()).unwrap();

        assert_eq!(stats[0].session_count, 10);
        assert_eq!(stats[0].correct_ratio_over_all, 0.7);
        assert_eq!(stats[0].session_count_p3, None);
        assert_eq!(stats[0].correct_ratio_over_all_p3, None);
    }

    #[test]
    fn test_read_sus_normalizes_decimal_commas() {
        let file = write_temp(
            "sessionID;SUS;PerceivedLearning;UEQ-Pragmatic;UEQ-Hedonic;UEQ-Overall\n\
             s1;72,5;4,25;1,2;0,8;1,0\n\
             s2;;;;;\n",
        );

        let scores = read_sus(file.path()).unwrap();

        assert_eq!(scores[0].sus, 72.5);
        assert_eq!(scores[0].perceived_learning, 4.25);
        assert_eq!(scores[1].sus, 0.0);
    }

    #[test]
    fn test_read_case_filter() {
        let file = write_temp("Case ID;Variant\ns1;A\ns2;B\ns1;A\n");

        let allow = read_case_filter(file.path()).unwrap();

        assert_eq!(allow.len(), 2);
        assert!(allow.contains("s1"));
        assert!(allow.contains("s2"));
    }

    #[test]
    fn test_read_quiz_answers() {
        let file = write_temp(
            "sessionID;lang;pageName;pageTitle;menu;pageOrder;answer;answerCorrect;lastUpdate\n\
             s1;it;q1;Introduzione-Quiz;main;2;B;1;2024-03-07 10:02:00\n\
             s1;it;q2;Variabili-Quiz;main;6;C;0;2024-03-07 10:12:00\n",
        );

        let answers = read_quiz_answers(file.path()).unwrap();

        assert_eq!(answers.len(), 2);
        assert!(answers[0].correct);
        assert!(!answers[1].correct);
    }

    #[test]
    fn test_empty_table_is_an_error() {
        let file = write_temp("sessionID;event\n");

        assert!(matches!(
            read_events(file.path()),
            Err(PipelineError::EmptyTable { .. })
        ));
    }

    #[test]
    fn test_parse_timestamp_formats() {
        assert!(parse_timestamp("2024-03-07 10:00:00").is_ok());
        assert!(parse_timestamp("2024-03-07T10:00:00").is_ok());
        assert!(parse_timestamp("07/03/2024").is_err());
    }
}
