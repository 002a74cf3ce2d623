use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::LoadError;
use crate::models::AuditRecord;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Fail on the first unparseable timestamp instead of dropping the row.
    #[serde(default)]
    pub strict_timestamps: bool,
}

#[derive(Debug, Clone)]
pub struct LoadOutcome {
    pub records: Vec<AuditRecord>,
    pub dropped_timestamps: usize,
    pub dropped_evaluatees: usize,
}

/// Accepted header names per required column: canonical name first, then the
/// spreadsheet export names.
const REQUIRED_COLUMNS: [(&str, &[&str]); 3] = [
    ("timestamp", &["timestamp", "DATA FUSO BR"]),
    (
        "score",
        &["score", "Internal Score With Bonus And Fatal Error (%)"],
    ),
    ("evaluatee", &["evaluatee", "Auditee"]),
];

const DATETIME_FORMATS: [&str; 5] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M:%S%.f",
    "%d/%m/%Y %H:%M",
];

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%d/%m/%Y"];

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(alias = "DATA FUSO BR")]
    timestamp: Option<String>,
    #[serde(alias = "Internal Score With Bonus And Fatal Error (%)")]
    score: Option<String>,
    #[serde(alias = "Auditee")]
    evaluatee: Option<String>,
    #[serde(default, alias = "Account")]
    account: Option<String>,
    #[serde(default, alias = "SUPERVISOR")]
    supervisor: Option<String>,
    #[serde(default, alias = "COORDENADOR")]
    coordinator: Option<String>,
    #[serde(default, alias = "CÉLULA")]
    cell: Option<String>,
    #[serde(default, alias = "HIERARQUIA AVALIADOR")]
    hierarchy: Option<String>,
    #[serde(default, alias = "TIPO MONITORIA")]
    monitoring_type: Option<String>,
    #[serde(default, alias = "SEMANA")]
    week: Option<String>,
    #[serde(default, alias = "SITUAÇÃO DE CASA")]
    tenure: Option<String>,
    #[serde(default, alias = "FEEDBACK APLICADO")]
    feedback_applied: Option<String>,
    #[serde(default, alias = "FEEDBACK PENDENTE")]
    feedback_pending: Option<String>,
    #[serde(default, alias = "FEEDBACK NÃO APLICADO")]
    feedback_not_applied: Option<String>,
    #[serde(default, alias = "META")]
    target: Option<String>,
}

pub fn load_csv(path: &Path, config: &LoaderConfig) -> Result<LoadOutcome, LoadError> {
    let file = File::open(path).map_err(|source| LoadError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let outcome = load_from_reader(file, config)?;
    info!(
        path = %path.display(),
        records = outcome.records.len(),
        dropped_timestamps = outcome.dropped_timestamps,
        dropped_evaluatees = outcome.dropped_evaluatees,
        "loaded audit records"
    );
    Ok(outcome)
}

pub fn load_from_reader<R: Read>(
    reader: R,
    config: &LoaderConfig,
) -> Result<LoadOutcome, LoadError> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

    let headers = reader.headers()?.clone();
    for (column, accepted) in REQUIRED_COLUMNS {
        if !headers.iter().any(|header| accepted.contains(&header)) {
            return Err(LoadError::MissingColumn(column));
        }
    }

    let mut records = Vec::new();
    let mut dropped = 0usize;
    let mut blank_evaluatees = 0usize;

    for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result?;
        // header is line 1
        let line = index + 2;
        let raw_timestamp = row.timestamp.clone().unwrap_or_default();
        let Some(timestamp) = parse_timestamp(&raw_timestamp) else {
            if config.strict_timestamps {
                return Err(LoadError::UnparseableTimestamp {
                    row: line,
                    value: raw_timestamp,
                });
            }
            warn!(row = line, value = %raw_timestamp, "dropping audit with unparseable timestamp");
            dropped += 1;
            continue;
        };
        let Some(evaluatee) = non_empty(row.evaluatee.clone()) else {
            warn!(row = line, "dropping audit with blank evaluatee");
            blank_evaluatees += 1;
            continue;
        };
        records.push(row.into_record(timestamp, evaluatee));
    }

    if records.is_empty() && dropped + blank_evaluatees > 0 {
        return Err(LoadError::NoUsableRows {
            dropped: dropped + blank_evaluatees,
        });
    }
    if dropped > 0 {
        warn!(dropped, "audit rows dropped for unparseable timestamps");
    }
    if blank_evaluatees > 0 {
        warn!(dropped = blank_evaluatees, "audit rows dropped for blank evaluatee");
    }

    Ok(LoadOutcome {
        records,
        dropped_timestamps: dropped,
        dropped_evaluatees: blank_evaluatees,
    })
}

impl CsvRow {
    fn into_record(self, timestamp: NaiveDateTime, evaluatee: String) -> AuditRecord {
        AuditRecord {
            timestamp,
            score: self.score.as_deref().and_then(parse_number),
            evaluatee: evaluatee.trim().to_string(),
            account: non_empty(self.account),
            supervisor: non_empty(self.supervisor),
            coordinator: non_empty(self.coordinator),
            cell: non_empty(self.cell),
            hierarchy: non_empty(self.hierarchy),
            monitoring_type: non_empty(self.monitoring_type),
            week: non_empty(self.week),
            tenure: non_empty(self.tenure),
            feedback_applied: parse_flag(self.feedback_applied.as_deref()),
            feedback_pending: parse_flag(self.feedback_pending.as_deref()),
            feedback_not_applied: parse_flag(self.feedback_not_applied.as_deref()),
            target: self.target.as_deref().and_then(parse_number),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.trim().is_empty())
}

pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

/// Accepts `95`, `95.5`, `95,5` and `95%`.
pub fn parse_number(value: &str) -> Option<f64> {
    let cleaned = value.trim().trim_end_matches('%').trim().replace(',', ".");
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok()
}

pub fn parse_flag(value: Option<&str>) -> bool {
    let Some(value) = value else {
        return false;
    };
    let value = value.trim().to_lowercase();
    matches!(value.as_str(), "1" | "1.0" | "true" | "sim" | "yes" | "x")
}
