//! Table and JSON output

use chrono::{DateTime, Local, Utc};
use colored::Colorize;
use logrotor_engine::{Decision, FileOutcome, Outcome, PlanEntry, RunReport};
use logrotor_state::{StateRecord, StateStore};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use tabled::{
    settings::{object::Columns, Alignment, Modify, Style},
    Table, Tabled,
};

/// Global flag for JSON output mode
static JSON_MODE: AtomicBool = AtomicBool::new(false);

/// Enable or disable JSON output mode
pub fn set_json_mode(enabled: bool) {
    JSON_MODE.store(enabled, Ordering::SeqCst);
}

/// Check if JSON output mode is enabled
pub fn is_json_mode() -> bool {
    JSON_MODE.load(Ordering::SeqCst)
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing to JSON: {}", e),
    }
}

fn render<T: Tabled>(rows: Vec<T>) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

#[derive(Tabled)]
pub struct PlanRow {
    #[tabled(rename = "group")]
    pub group: String,
    #[tabled(rename = "file")]
    pub file: String,
    #[tabled(rename = "action")]
    pub action: String,
}

impl From<&PlanEntry> for PlanRow {
    fn from(entry: &PlanEntry) -> Self {
        let label = entry.label();
        let action = if entry.recover {
            label.yellow().to_string()
        } else {
            match entry.decision {
                Decision::RotateNow(_) => label.green().to_string(),
                Decision::Skip(_) => label.dimmed().to_string(),
            }
        };

        PlanRow {
            group: entry.group.clone(),
            file: entry.path.display().to_string(),
            action,
        }
    }
}

pub fn print_plan(plan: &[PlanEntry]) {
    if is_json_mode() {
        print_json(plan);
        return;
    }

    if plan.is_empty() {
        println!("No log files matched");
        return;
    }

    println!("{}", render(plan.iter().map(PlanRow::from).collect()));

    let due = plan.iter().filter(|e| e.recover || e.decision.is_due()).count();
    println!();
    print_info(&format!("{} of {} file(s) would be rotated", due, plan.len()));
}

#[derive(Tabled)]
pub struct OutcomeRow {
    #[tabled(rename = "group")]
    pub group: String,
    #[tabled(rename = "file")]
    pub file: String,
    #[tabled(rename = "result")]
    pub result: String,
    #[tabled(rename = "detail")]
    pub detail: String,
}

impl From<&FileOutcome> for OutcomeRow {
    fn from(outcome: &FileOutcome) -> Self {
        OutcomeRow {
            group: outcome.group.clone(),
            file: outcome.path.display().to_string(),
            result: format_outcome(outcome.outcome),
            detail: outcome.detail.clone(),
        }
    }
}

fn format_outcome(outcome: Outcome) -> String {
    match outcome {
        Outcome::Rotated => "rotated".green().to_string(),
        Outcome::Recovered => "recovered".cyan().to_string(),
        Outcome::Skipped => "skipped".dimmed().to_string(),
        Outcome::Failed => "failed".red().bold().to_string(),
        Outcome::Aborted => "aborted".red().to_string(),
    }
}

/// JSON representation of a finished run
#[derive(Serialize)]
pub struct RunJson<'a> {
    pub success: bool,
    pub outcomes: &'a [FileOutcome],
    pub errors: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl<'a> From<&'a RunReport> for RunJson<'a> {
    fn from(report: &'a RunReport) -> Self {
        RunJson {
            success: report.is_success(),
            outcomes: &report.outcomes,
            errors: report.errors.iter().map(|e| e.to_string()).collect(),
            warnings: report.warnings.clone(),
        }
    }
}

pub fn print_run_report(report: &RunReport) {
    if is_json_mode() {
        print_json(&RunJson::from(report));
        return;
    }

    // Skips are noise in the normal case
    let rows: Vec<OutcomeRow> = report
        .outcomes
        .iter()
        .filter(|o| o.outcome != Outcome::Skipped)
        .map(OutcomeRow::from)
        .collect();
    if !rows.is_empty() {
        println!("{}", render(rows));
    }

    for warning in &report.warnings {
        print_warning(warning);
    }
    for error in &report.errors {
        print_error(&error.to_string());
    }

    let summary = format!(
        "{} rotated, {} recovered, {} skipped, {} failed, {} aborted",
        report.count(Outcome::Rotated),
        report.count(Outcome::Recovered),
        report.count(Outcome::Skipped),
        report.count(Outcome::Failed),
        report.count(Outcome::Aborted),
    );
    if report.is_success() {
        print_success(&summary);
    } else {
        print_error(&summary);
    }
}

#[derive(Tabled)]
pub struct StateRow {
    #[tabled(rename = "rotations")]
    pub rotations: u64,
    #[tabled(rename = "file")]
    pub file: String,
    #[tabled(rename = "last rotated")]
    pub last_rotated: String,
    #[tabled(rename = "age")]
    pub age: String,
}

impl StateRow {
    fn new(record: &StateRecord, now: DateTime<Utc>) -> Self {
        let age = (now - record.last_rotated).num_seconds().max(0) as u64;
        StateRow {
            rotations: record.rotations,
            file: record.path.display().to_string(),
            last_rotated: record
                .last_rotated
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string(),
            age: format_duration(age),
        }
    }
}

/// JSON-friendly state record
#[derive(Serialize)]
pub struct StateJson {
    pub path: String,
    pub last_rotated: DateTime<Utc>,
    pub rotations: u64,
}

impl From<&StateRecord> for StateJson {
    fn from(record: &StateRecord) -> Self {
        StateJson {
            path: record.path.display().to_string(),
            last_rotated: record.last_rotated,
            rotations: record.rotations,
        }
    }
}

pub fn print_state_table(state: &StateStore) {
    if is_json_mode() {
        let records: Vec<StateJson> = state.records().map(StateJson::from).collect();
        print_json(&records);
        return;
    }

    if state.is_empty() {
        println!("No rotations recorded");
        return;
    }

    let now = Utc::now();
    let rows: Vec<StateRow> = state.records().map(|r| StateRow::new(r, now)).collect();
    let table = Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::single(0)).with(Alignment::right()))
        .to_string();

    println!("{}", table);
}

pub fn format_duration(secs: u64) -> String {
    if secs >= 86400 {
        let days = secs / 86400;
        let hours = (secs % 86400) / 3600;
        format!("{}d {}h", days, hours)
    } else if secs >= 3600 {
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        format!("{}h {}m", hours, mins)
    } else if secs >= 60 {
        let mins = secs / 60;
        let s = secs % 60;
        format!("{}m {}s", mins, s)
    } else {
        format!("{}s", secs)
    }
}

pub fn print_success(message: &str) {
    println!("{} {}", "✓".green(), message);
}

pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red(), message);
}

pub fn print_warning(message: &str) {
    eprintln!("{} {}", "!".yellow(), message);
}

pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue(), message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use logrotor_engine::{SkipReason, Trigger};
    use std::path::PathBuf;

    #[test]
    fn test_json_mode_toggle() {
        set_json_mode(false);
        assert!(!is_json_mode());

        set_json_mode(true);
        assert!(is_json_mode());

        set_json_mode(false);
        assert!(!is_json_mode());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(45), "45s");
        assert_eq!(format_duration(125), "2m 5s");
        assert_eq!(format_duration(7260), "2h 1m");
        assert_eq!(format_duration(90000), "1d 1h");
    }

    #[test]
    fn test_plan_row_labels() {
        colored::control::set_override(false);

        let rotate = PlanEntry {
            group: "web".to_string(),
            path: PathBuf::from("/var/log/web.log"),
            decision: Decision::RotateNow(Trigger::Size),
            recover: false,
        };
        let row = PlanRow::from(&rotate);
        assert_eq!(row.action, "rotate (size)");
        assert_eq!(row.file, "/var/log/web.log");

        let recover = PlanEntry {
            decision: Decision::Skip(SkipReason::Missing),
            recover: true,
            ..rotate
        };
        assert_eq!(PlanRow::from(&recover).action, "recover");
    }

    #[test]
    fn test_state_row_age() {
        let now = Utc::now();
        let record = StateRecord::new(
            PathBuf::from("/var/log/app.log"),
            now - Duration::hours(3),
            7,
        );

        let row = StateRow::new(&record, now);
        assert_eq!(row.rotations, 7);
        assert_eq!(row.age, "3h 0m");

        let json = StateJson::from(&record);
        assert_eq!(json.path, "/var/log/app.log");
        assert_eq!(json.rotations, 7);
    }
}
