use std::fmt;

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Calendar month names as they appear in the audit spreadsheets.
pub const MONTH_NAMES: [&str; 12] = [
    "Janeiro",
    "Fevereiro",
    "Março",
    "Abril",
    "Maio",
    "Junho",
    "Julho",
    "Agosto",
    "Setembro",
    "Outubro",
    "Novembro",
    "Dezembro",
];

/// One quality audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub timestamp: NaiveDateTime,
    pub score: Option<f64>,
    pub evaluatee: String,
    pub account: Option<String>,
    pub supervisor: Option<String>,
    pub coordinator: Option<String>,
    pub cell: Option<String>,
    pub hierarchy: Option<String>,
    pub monitoring_type: Option<String>,
    pub week: Option<String>,
    pub tenure: Option<String>,
    pub feedback_applied: bool,
    pub feedback_pending: bool,
    pub feedback_not_applied: bool,
    pub target: Option<f64>,
}

impl AuditRecord {
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }

    /// Month number, 1-based.
    pub fn month(&self) -> u32 {
        self.timestamp.month()
    }

    pub fn month_name(&self) -> &'static str {
        month_name(self.month())
    }

    /// The score when it is usable in means: present, finite and in [0, 100].
    pub fn valid_score(&self) -> Option<f64> {
        self.score
            .filter(|value| value.is_finite() && (0.0..=100.0).contains(value))
    }

    /// The evaluatee's name, `None` when blank.
    pub fn named_evaluatee(&self) -> Option<&str> {
        Some(self.evaluatee.trim()).filter(|name| !name.is_empty())
    }

    /// Textual value of a categorical dimension, `None` when the column is absent.
    pub fn dimension_value(&self, dimension: Dimension) -> Option<&str> {
        match dimension {
            Dimension::Month => Some(self.month_name()),
            Dimension::Week => self.week.as_deref(),
            Dimension::Account => self.account.as_deref(),
            Dimension::Supervisor => self.supervisor.as_deref(),
            Dimension::Coordinator => self.coordinator.as_deref(),
            Dimension::Cell => self.cell.as_deref(),
            Dimension::Hierarchy => self.hierarchy.as_deref(),
            Dimension::MonitoringType => self.monitoring_type.as_deref(),
            Dimension::Tenure => self.tenure.as_deref(),
        }
    }
}

pub fn month_name(month: u32) -> &'static str {
    MONTH_NAMES
        .get(month.saturating_sub(1) as usize)
        .copied()
        .unwrap_or("?")
}

/// Categorical axes a viewer can filter or group by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Month,
    Week,
    Account,
    Supervisor,
    Coordinator,
    Cell,
    Hierarchy,
    MonitoringType,
    Tenure,
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Dimension::Month => "month",
            Dimension::Week => "week",
            Dimension::Account => "account",
            Dimension::Supervisor => "supervisor",
            Dimension::Coordinator => "coordinator",
            Dimension::Cell => "cell",
            Dimension::Hierarchy => "hierarchy",
            Dimension::MonitoringType => "monitoring_type",
            Dimension::Tenure => "tenure",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct KpiSummary {
    pub count: usize,
    pub mean_score: f64,
    pub count_feedback_applied: usize,
    pub count_feedback_pending: usize,
    pub pct_feedback_applied: f64,
    pub pct_feedback_pending: f64,
    pub pct_feedback_not_applied: f64,
    pub count_score_100: usize,
    pub count_score_0: usize,
    pub pct_score_100: f64,
    pub pct_score_0: f64,
    pub evaluations_by_hierarchy: Vec<(String, usize)>,
    pub target: f64,
    pub delta_vs_target: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupRow {
    pub keys: Vec<String>,
    pub mean_score: f64,
    pub count: usize,
    pub pct_feedback_applied: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluateeSummary {
    pub evaluatee: String,
    pub mean_score: f64,
    pub audit_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum QuartileBucket {
    Q1,
    Q2,
    Q3,
    Q4,
}

impl QuartileBucket {
    pub const ALL: [QuartileBucket; 4] = [
        QuartileBucket::Q1,
        QuartileBucket::Q2,
        QuartileBucket::Q3,
        QuartileBucket::Q4,
    ];

    pub fn label(self) -> &'static str {
        match self {
            QuartileBucket::Q1 => "Q1",
            QuartileBucket::Q2 => "Q2",
            QuartileBucket::Q3 => "Q3",
            QuartileBucket::Q4 => "Q4",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CutPoints {
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketAssignment {
    pub evaluatee: String,
    pub mean_score: f64,
    pub bucket: QuartileBucket,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketSummary {
    pub bucket: QuartileBucket,
    pub evaluatee_count: usize,
    pub mean_score: f64,
    pub std_dev: f64,
    pub audit_count: usize,
    pub share_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuartileReport {
    pub cut_points: CutPoints,
    pub assignments: Vec<BucketAssignment>,
    pub buckets: Vec<BucketSummary>,
    pub dispersion: f64,
    pub amplitude: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OffenderRow {
    pub evaluatee: String,
    pub supervisor: String,
    pub zero_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SupervisorFeedback {
    pub supervisor: String,
    pub audit_count: usize,
    pub mean_score: f64,
    pub feedback_applied: usize,
    pub feedback_not_applied: usize,
    pub feedback_pending: usize,
    pub pct_feedback_applied: f64,
    pub pct_feedback_not_applied: f64,
}

/// `100 * part / whole`, zero when `whole` is zero.
pub fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// Arithmetic mean, zero for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::audit;
    use super::*;

    #[test]
    fn out_of_range_scores_are_not_valid() {
        let mut record = audit("Avery", 120.0, 2026, 3, 2);
        assert_eq!(record.valid_score(), None);
        record.score = Some(f64::NAN);
        assert_eq!(record.valid_score(), None);
        record.score = Some(100.0);
        assert_eq!(record.valid_score(), Some(100.0));
    }

    #[test]
    fn blank_evaluatee_has_no_name() {
        assert_eq!(audit(" Avery ", 80.0, 2026, 3, 2).named_evaluatee(), Some("Avery"));
        assert_eq!(audit("   ", 80.0, 2026, 3, 2).named_evaluatee(), None);
        assert_eq!(audit("", 80.0, 2026, 3, 2).named_evaluatee(), None);
    }

    #[test]
    fn month_dimension_uses_calendar_name() {
        let record = audit("Avery", 80.0, 2026, 3, 2);
        assert_eq!(record.dimension_value(Dimension::Month), Some("Março"));
        assert_eq!(record.dimension_value(Dimension::Account), None);
    }

    #[test]
    fn percent_and_mean_fall_back_to_zero() {
        assert_eq!(percent(3, 0), 0.0);
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(percent(1, 4), 25.0);
    }
}
