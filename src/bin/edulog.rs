//! edulog CLI - command-line interface for the event-log pipeline
//!
//! Commands:
//! - build: run the event-log construction stage over the input tables
//! - quiz-stats: aggregate the raw quiz export into per-session statistics
//! - validate: check the events export and report label coverage
//! - schema: print input/output table schemas

use clap::{Parser, Subcommand, ValueEnum};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use edulog::builder::{BuildInputs, EventLogBuilder};
use edulog::classes::{class_distribution, unclassified_timestamps};
use edulog::classifier::ClassifierConfig;
use edulog::error::PipelineError;
use edulog::quiz::{aggregate_quiz, default_subset_titles};
use edulog::tables::{
    read_case_filter, read_events, read_quiz_answers, read_quiz_stats, read_survey, read_sus,
    write_class_distribution, write_durations, write_event_log, write_quiz_stats,
    write_unclassified_timestamps,
};
use edulog::types::{EventKind, Granularity};
use edulog::EDULOG_VERSION;

/// edulog - turn e-learning tutorial exports into process-mining event logs
#[derive(Parser)]
#[command(name = "edulog")]
#[command(version = EDULOG_VERSION)]
#[command(about = "Build process-mining event logs from tutorial exports", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the event-log construction stage end to end
    Build {
        /// Events export (CSV, `;`-delimited)
        #[arg(long)]
        events: PathBuf,

        /// Per-session quiz statistics table
        #[arg(long)]
        quiz_stats: PathBuf,

        /// Cleaned survey table
        #[arg(long)]
        survey: PathBuf,

        /// SUS/UEQ score table
        #[arg(long)]
        sus: PathBuf,

        /// Optional case allow-list (table with a `Case ID` column)
        #[arg(long)]
        case_filter: Option<PathBuf>,

        /// Directory for the event-log outputs
        #[arg(long, default_value = "logs")]
        log_dir: PathBuf,

        /// Directory for the statistics side outputs
        #[arg(long, default_value = "stats")]
        stats_dir: PathBuf,
    },

    /// Aggregate the raw quiz export into the per-session statistics table
    QuizStats {
        /// Raw quiz export (CSV, `;`-delimited)
        #[arg(short, long)]
        input: PathBuf,

        /// Output path for the statistics table
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Validate the events export and report label coverage
    Validate {
        /// Events export to check
        #[arg(short, long)]
        input: PathBuf,

        /// Output the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print input/output table schemas
    Schema {
        /// Schema to print
        #[arg(value_enum)]
        schema_type: SchemaType,
    },
}

#[derive(Clone, ValueEnum)]
enum SchemaType {
    /// Input tables consumed by `build`
    Input,
    /// Event-log layout emitted by `build`
    Output,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), PipelineError> {
    match cli.command {
        Commands::Build {
            events,
            quiz_stats,
            survey,
            sus,
            case_filter,
            log_dir,
            stats_dir,
        } => cmd_build(
            &events,
            &quiz_stats,
            &survey,
            &sus,
            case_filter.as_deref(),
            &log_dir,
            &stats_dir,
        ),

        Commands::QuizStats { input, output } => cmd_quiz_stats(&input, &output),

        Commands::Validate { input, json } => cmd_validate(&input, json),

        Commands::Schema { schema_type } => {
            cmd_schema(schema_type);
            Ok(())
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_build(
    events_path: &Path,
    quiz_stats_path: &Path,
    survey_path: &Path,
    sus_path: &Path,
    case_filter_path: Option<&Path>,
    log_dir: &Path,
    stats_dir: &Path,
) -> Result<(), PipelineError> {
    fs::create_dir_all(log_dir).map_err(|e| PipelineError::io(log_dir, e))?;
    fs::create_dir_all(stats_dir).map_err(|e| PipelineError::io(stats_dir, e))?;

    println!("Reading events from {}", events_path.display());
    let inputs = BuildInputs {
        events: read_events(events_path)?,
        quiz: read_quiz_stats(quiz_stats_path)?,
        survey: read_survey(survey_path)?,
        sus: read_sus(sus_path)?,
    };
    println!("Events: {} rows", inputs.events.len());
    println!("Quiz stats: {} sessions", inputs.quiz.len());
    println!("Survey: {} responses", inputs.survey.records.len());
    println!("SUS: {} sessions", inputs.sus.len());

    // An absent allow-list file means no filtering.
    let case_filter = match case_filter_path {
        Some(path) if path.exists() => {
            let allow = read_case_filter(path)?;
            println!("Cases in allow-list filter: {}", allow.len());
            Some(allow)
        }
        _ => {
            println!("Cases in allow-list filter: 0");
            None
        }
    };
    println!();

    let builder = EventLogBuilder::default();
    let mut page_log = None;

    for granularity in [Granularity::Page, Granularity::Paragraph] {
        println!(">> Building event log at {} level", granularity.as_str());
        let log = builder.build(&inputs, granularity);
        println!(
            "Rows: {}, cases: {}, timestamp collisions fixed: {}",
            log.rows.len(),
            log.distinct_cases(),
            log.dedup.corrected
        );

        let log_path = log_dir.join(format!(
            "edu_event_log_{}_raw_ter.csv",
            granularity.as_str()
        ));
        println!("Saving event log to {}", log_path.display());
        write_event_log(&log_path, &log)?;

        let durations_path = stats_dir.join(format!(
            "edu_event_log_{}_total_time.csv",
            granularity.as_str()
        ));
        write_durations(&durations_path, &log.durations)?;

        if let Some(allow) = &case_filter {
            let filtered = log.filtered(allow);
            println!(
                "Cases after allow-list filter: {}",
                filtered.distinct_cases()
            );
            let filtered_path = log_dir.join(format!(
                "edu_event_log_{}_filtered_ter.csv",
                granularity.as_str()
            ));
            println!("Saving filtered event log to {}", filtered_path.display());
            write_event_log(&filtered_path, &filtered)?;
        }

        if granularity == Granularity::Page {
            page_log = Some(log);
        }
        println!();
    }

    // Class reports are derived from the page-level log.
    let page_log = page_log.expect("page log built above");
    println!(">> Class statistics");
    let distribution = class_distribution(&page_log.rows);
    for count in &distribution {
        println!("  {}: {} cases ({}%)", count.label, count.cases, count.percent);
    }
    write_class_distribution(
        &stats_dir.join("class_distinct_session_counts.csv"),
        &distribution,
    )?;
    write_unclassified_timestamps(
        &stats_dir.join("distinct_event_timestamps_na_class.csv"),
        &unclassified_timestamps(&page_log.rows),
    )?;
    write_quiz_stats(
        &stats_dir.join("quiz_stats_with_class.csv"),
        &inputs.quiz,
        Some(&page_log.class_by_case()),
    )?;

    println!();
    println!("Done.");
    Ok(())
}

fn cmd_quiz_stats(input: &Path, output: &Path) -> Result<(), PipelineError> {
    println!("Reading quiz export from {}", input.display());
    let answers = read_quiz_answers(input)?;
    println!("Answers: {} rows", answers.len());

    let stats = aggregate_quiz(&answers, &default_subset_titles());
    println!("Sessions: {}", stats.len());

    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
        }
    }
    write_quiz_stats(output, &stats, None)?;
    println!("Saved quiz statistics to {}", output.display());
    Ok(())
}

#[derive(serde::Serialize)]
struct ValidationReport {
    total_rows: usize,
    distinct_sessions: usize,
    first_timestamp: Option<String>,
    last_timestamp: Option<String>,
    unknown_page_titles: BTreeMap<String, usize>,
    unknown_event_labels: BTreeMap<String, usize>,
}

fn cmd_validate(input: &Path, json: bool) -> Result<(), PipelineError> {
    let events = read_events(input)?;
    let config = ClassifierConfig::tutorial_defaults();

    let mut unknown_page_titles: BTreeMap<String, usize> = BTreeMap::new();
    let mut unknown_event_labels: BTreeMap<String, usize> = BTreeMap::new();
    let mut sessions = std::collections::HashSet::new();
    let mut first = None;
    let mut last = None;

    for event in &events {
        sessions.insert(event.session_id.as_str());
        if !config.page_titles.contains_key(&event.page_title)
            && !config.page_titles.values().any(|v| v == &event.page_title)
        {
            *unknown_page_titles.entry(event.page_title.clone()).or_default() += 1;
        }
        if !config.event_labels.contains_key(&event.event)
            && EventKind::from_label(&event.event).is_none()
        {
            *unknown_event_labels.entry(event.event.clone()).or_default() += 1;
        }
        if first.map_or(true, |t| event.timestamp < t) {
            first = Some(event.timestamp);
        }
        if last.map_or(true, |t| event.timestamp > t) {
            last = Some(event.timestamp);
        }
    }

    let report = ValidationReport {
        total_rows: events.len(),
        distinct_sessions: sessions.len(),
        first_timestamp: first.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string()),
        last_timestamp: last.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string()),
        unknown_page_titles,
        unknown_event_labels,
    };

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).expect("report serializes")
        );
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total rows:        {}", report.total_rows);
        println!("Distinct sessions: {}", report.distinct_sessions);
        println!(
            "Timestamp range:   {} .. {}",
            report.first_timestamp.as_deref().unwrap_or("-"),
            report.last_timestamp.as_deref().unwrap_or("-")
        );
        if !report.unknown_page_titles.is_empty() {
            println!("\nPage titles outside the mapping:");
            for (title, count) in &report.unknown_page_titles {
                println!("  {title}: {count} rows");
            }
        }
        if !report.unknown_event_labels.is_empty() {
            println!("\nEvent labels outside the mapping:");
            for (label, count) in &report.unknown_event_labels {
                println!("  {label}: {count} rows");
            }
        }
    }
    Ok(())
}

fn cmd_schema(schema_type: SchemaType) {
    match schema_type {
        SchemaType::Input => {
            println!("Input tables (delimiter `;`):");
            println!();
            println!("1. events export");
            println!("   sessionID;lang;pageName;pageTitle;menu;pageOrder;pagePara;event;duration;lastUpdate");
            println!();
            println!("2. quiz statistics (from `edulog quiz-stats`)");
            println!("   sessionID;QuizSessionCount;QuizAnswerCorrectTotal;QuizAnswerWrongTotal;");
            println!("   QuizAnswerCorrectRatioOverCount;QuizAnswerCorrectRatioOverAll;<same>_P3");
            println!();
            println!("3. cleaned survey");
            println!("   sessionID;SurveyTimestamp;Q_1..Q_28");
            println!();
            println!("4. SUS/UEQ scores");
            println!("   sessionID;SUS;PerceivedLearning;UEQ-Pragmatic;UEQ-Hedonic;UEQ-Overall");
            println!();
            println!("5. optional case allow-list: any table with a `Case ID` column");
        }
        SchemaType::Output => {
            println!("Event-log layout (delimiter `;`):");
            println!();
            println!("Case ID;Activity;pageTitle;menu;pageOrder;pagePara;eventPage;");
            println!("Complete Timestamp;[eventPara;]click_num;dbclick_num;");
            println!("<quiz statistics columns>;Q_1..Q_28;<SUS/UEQ columns>;");
            println!("TotalTimeHH;TotalTimeMM;TotalTimeDD;CaseLength;Class;<metric>_Tercile...");
            println!();
            println!("`eventPara` and paragraph-level activities appear in the PARA log only.");
            println!("Tercile columns encode 0 = no data, 1..3 = ascending terciles.");
        }
    }
}
