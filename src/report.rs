use std::fmt::Write;

use serde::Serialize;

use crate::config::Config;
use crate::error::EngineError;
use crate::feedback::feedback_by_supervisor;
use crate::filter::{apply_filter, FilterConfig};
use crate::grouping::{group_scores, GroupKey};
use crate::kpi::compute_kpis;
use crate::models::{
    AuditRecord, Dimension, GroupRow, KpiSummary, OffenderRow, QuartileReport, SupervisorFeedback,
};
use crate::offenders::find_offenders;
use crate::quartile::segment;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum QuartileSection {
    Segmented(QuartileReport),
    Insufficient { found: usize, required: usize },
}

/// Everything computed for one filter configuration.
#[derive(Debug, Clone, Serialize)]
pub struct Scorecard {
    pub filter: FilterConfig,
    pub kpis: KpiSummary,
    pub by_month: Vec<GroupRow>,
    pub by_day: Vec<GroupRow>,
    pub by_month_and_account: Vec<GroupRow>,
    pub by_tenure: Vec<GroupRow>,
    pub supervisors: Vec<SupervisorFeedback>,
    pub offenders: Vec<OffenderRow>,
    pub quartiles: QuartileSection,
}

impl Scorecard {
    pub fn compute(
        records: &[AuditRecord],
        filter: &FilterConfig,
        config: &Config,
    ) -> Result<Self, EngineError> {
        let filtered = apply_filter(records, filter)?;
        let target = config.target.to_target_config();

        let quartiles = match segment(&filtered) {
            Ok(report) => QuartileSection::Segmented(report),
            Err(EngineError::InsufficientData { found, required }) => {
                QuartileSection::Insufficient { found, required }
            }
            Err(other) => return Err(other),
        };

        Ok(Self {
            filter: filter.clone(),
            kpis: compute_kpis(&filtered, &target, filter.selection(Dimension::Account)),
            by_month: group_scores(&filtered, &[GroupKey::Month]),
            by_day: group_scores(&filtered, &[GroupKey::Date]),
            by_month_and_account: group_scores(
                &filtered,
                &[GroupKey::Month, GroupKey::Dimension(Dimension::Account)],
            ),
            by_tenure: group_scores(&filtered, &[GroupKey::Dimension(Dimension::Tenure)]),
            supervisors: feedback_by_supervisor(&filtered),
            offenders: find_offenders(&filtered, &config.offenders),
            quartiles,
        })
    }
}

pub fn describe_filter(filter: &FilterConfig) -> String {
    let mut parts: Vec<String> = filter
        .selections
        .iter()
        .map(|(dimension, selection)| format!("{dimension} = {selection}"))
        .collect();
    if let Some(range) = &filter.date_range {
        parts.push(format!("{} to {}", range.start, range.end));
    }
    if parts.is_empty() {
        "all audits".to_string()
    } else {
        parts.join(", ")
    }
}

pub fn render_kpis(output: &mut String, kpis: &KpiSummary) {
    let _ = writeln!(output, "## Summary");
    let _ = writeln!(output, "- Audits: {}", kpis.count);
    let _ = writeln!(output, "- Mean score: {:.1}", kpis.mean_score);
    let _ = writeln!(
        output,
        "- Target {:.1} (delta {:+.1})",
        kpis.target, kpis.delta_vs_target
    );
    for (hierarchy, count) in &kpis.evaluations_by_hierarchy {
        let _ = writeln!(output, "- Audits by {hierarchy}: {count}");
    }
    let _ = writeln!(
        output,
        "- Feedback applied: {:.1}% ({})",
        kpis.pct_feedback_applied, kpis.count_feedback_applied
    );
    let _ = writeln!(
        output,
        "- Feedback pending: {:.1}% ({})",
        kpis.pct_feedback_pending, kpis.count_feedback_pending
    );
    let _ = writeln!(
        output,
        "- Scores of 100: {} ({:.1}%)",
        kpis.count_score_100, kpis.pct_score_100
    );
    let _ = writeln!(
        output,
        "- Scores of 0: {} ({:.1}%)",
        kpis.count_score_0, kpis.pct_score_0
    );
}

fn render_groups(output: &mut String, title: &str, rows: &[GroupRow]) {
    let _ = writeln!(output);
    let _ = writeln!(output, "## {title}");
    if rows.is_empty() {
        let _ = writeln!(output, "No audits in this view.");
        return;
    }
    for row in rows {
        let _ = writeln!(
            output,
            "- {}: {:.1} across {} audits ({:.1}% feedback applied)",
            row.keys.join(" / "),
            row.mean_score,
            row.count,
            row.pct_feedback_applied
        );
    }
}

pub fn render_quartiles(output: &mut String, section: &QuartileSection) {
    let _ = writeln!(output, "## Quartiles");
    match section {
        QuartileSection::Insufficient { found, required } => {
            let _ = writeln!(
                output,
                "Not enough evaluatees for a quartile analysis ({found} of {required})."
            );
        }
        QuartileSection::Segmented(report) => {
            let cuts = &report.cut_points;
            let _ = writeln!(
                output,
                "Cut-points: p25 {:.1}, p50 {:.1}, p75 {:.1}",
                cuts.p25, cuts.p50, cuts.p75
            );
            for bucket in &report.buckets {
                let _ = writeln!(
                    output,
                    "- {}: {} evaluatees ({:.1}%), mean {:.1} (sd {:.1}), {} audits",
                    bucket.bucket.label(),
                    bucket.evaluatee_count,
                    bucket.share_pct,
                    bucket.mean_score,
                    bucket.std_dev,
                    bucket.audit_count
                );
            }
            let _ = writeln!(
                output,
                "Dispersion (Q4 / Q1): {:.1}%",
                report.dispersion * 100.0
            );
            let _ = writeln!(output, "Amplitude (Q1 - Q4 audits): {}", report.amplitude);
        }
    }
}

pub fn render_offenders(output: &mut String, offenders: &[OffenderRow], min_occurrences: usize) {
    let _ = writeln!(output, "## Repeated Zero Scores");
    if offenders.is_empty() {
        let _ = writeln!(
            output,
            "No evaluatee with {min_occurrences} or more zero scores."
        );
        return;
    }
    for row in offenders {
        let _ = writeln!(
            output,
            "- {} (supervisor {}): {} zero scores",
            row.evaluatee, row.supervisor, row.zero_count
        );
    }
}

pub fn build_report(scorecard: &Scorecard, min_occurrences: usize) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Quality Scorecard");
    let _ = writeln!(output, "Generated for {}", describe_filter(&scorecard.filter));
    let _ = writeln!(output);

    render_kpis(&mut output, &scorecard.kpis);
    render_groups(&mut output, "Score by Month", &scorecard.by_month);
    render_groups(&mut output, "Score by Day", &scorecard.by_day);
    render_groups(
        &mut output,
        "Score by Month and Account",
        &scorecard.by_month_and_account,
    );
    render_groups(&mut output, "Score by Tenure", &scorecard.by_tenure);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Feedback by Supervisor");
    if scorecard.supervisors.is_empty() {
        let _ = writeln!(output, "No supervisor data in this view.");
    } else {
        for row in &scorecard.supervisors {
            let _ = writeln!(
                output,
                "- {}: {} audits, mean {:.1}, applied {:.1}%, not applied {:.1}%, pending {}",
                row.supervisor,
                row.audit_count,
                row.mean_score,
                row.pct_feedback_applied,
                row.pct_feedback_not_applied,
                row.feedback_pending
            );
        }
    }

    let _ = writeln!(output);
    render_offenders(&mut output, &scorecard.offenders, min_occurrences);
    let _ = writeln!(output);
    render_quartiles(&mut output, &scorecard.quartiles);

    output
}

pub fn to_json<T: Serialize>(value: &T) -> serde_json::Result<String> {
    serde_json::to_string_pretty(value)
}
