use std::collections::BTreeMap;

use crate::error::EngineError;
use crate::models::{
    mean, percent, AuditRecord, BucketAssignment, BucketSummary, CutPoints, EvaluateeSummary,
    QuartileBucket, QuartileReport,
};

pub const MIN_EVALUATEES: usize = 4;

/// Mean valid score per evaluatee, ordered by name. Audits with a blank
/// evaluatee are ignored. Evaluatees without any valid score have no mean and
/// are left out.
pub fn summarize_evaluatees(records: &[AuditRecord]) -> Vec<EvaluateeSummary> {
    let mut per_evaluatee: BTreeMap<&str, (Vec<f64>, usize)> = BTreeMap::new();

    for record in records {
        let Some(evaluatee) = record.named_evaluatee() else {
            continue;
        };
        let entry = per_evaluatee
            .entry(evaluatee)
            .or_insert_with(|| (Vec::new(), 0));
        entry.1 += 1;
        if let Some(score) = record.valid_score() {
            entry.0.push(score);
        }
    }

    per_evaluatee
        .into_iter()
        .filter(|(_, (scores, _))| !scores.is_empty())
        .map(|(evaluatee, (scores, audit_count))| EvaluateeSummary {
            evaluatee: evaluatee.to_string(),
            mean_score: mean(&scores),
            audit_count,
        })
        .collect()
}

/// Inclusive percentile with linear interpolation between closest ranks.
pub fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let position = p.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}

pub fn cut_points(values: &[f64]) -> CutPoints {
    CutPoints {
        p25: percentile(values, 0.25),
        p50: percentile(values, 0.50),
        p75: percentile(values, 0.75),
    }
}

/// A score equal to a cut-point lands in the lower bucket.
pub fn classify(score: f64, cuts: &CutPoints) -> QuartileBucket {
    if score > cuts.p75 {
        QuartileBucket::Q1
    } else if score > cuts.p50 {
        QuartileBucket::Q2
    } else if score > cuts.p25 {
        QuartileBucket::Q3
    } else {
        QuartileBucket::Q4
    }
}

/// Sample standard deviation, zero below two values.
fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let avg = mean(values);
    let variance =
        values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

/// Bottom-bucket mean over top-bucket mean, zero when undefined.
pub fn dispersion(q1: &BucketSummary, q4: &BucketSummary) -> f64 {
    if q1.evaluatee_count == 0 || q4.evaluatee_count == 0 || q1.mean_score == 0.0 {
        0.0
    } else {
        q4.mean_score / q1.mean_score
    }
}

/// Q1 audit count minus Q4 audit count, zero when either bucket is empty.
pub fn amplitude(q1: &BucketSummary, q4: &BucketSummary) -> i64 {
    if q1.evaluatee_count == 0 || q4.evaluatee_count == 0 {
        0
    } else {
        q1.audit_count as i64 - q4.audit_count as i64
    }
}

/// Splits evaluatees into four performance tiers by their mean score.
pub fn segment(records: &[AuditRecord]) -> Result<QuartileReport, EngineError> {
    let summaries = summarize_evaluatees(records);
    if summaries.len() < MIN_EVALUATEES {
        return Err(EngineError::InsufficientData {
            found: summaries.len(),
            required: MIN_EVALUATEES,
        });
    }

    let means: Vec<f64> = summaries.iter().map(|s| s.mean_score).collect();
    let cuts = cut_points(&means);

    let assignments: Vec<BucketAssignment> = summaries
        .iter()
        .map(|summary| BucketAssignment {
            evaluatee: summary.evaluatee.clone(),
            mean_score: summary.mean_score,
            bucket: classify(summary.mean_score, &cuts),
        })
        .collect();

    let buckets: Vec<BucketSummary> = QuartileBucket::ALL
        .iter()
        .map(|bucket| {
            let members: Vec<(&EvaluateeSummary, &BucketAssignment)> = summaries
                .iter()
                .zip(assignments.iter())
                .filter(|(_, assignment)| assignment.bucket == *bucket)
                .collect();
            let member_means: Vec<f64> = members.iter().map(|(s, _)| s.mean_score).collect();
            BucketSummary {
                bucket: *bucket,
                evaluatee_count: members.len(),
                mean_score: mean(&member_means),
                std_dev: std_dev(&member_means),
                audit_count: members.iter().map(|(s, _)| s.audit_count).sum(),
                share_pct: percent(members.len(), summaries.len()),
            }
        })
        .collect();

    let dispersion = dispersion(&buckets[0], &buckets[3]);
    let amplitude = amplitude(&buckets[0], &buckets[3]);

    tracing::debug!(
        evaluatees = summaries.len(),
        p25 = cuts.p25,
        p50 = cuts.p50,
        p75 = cuts.p75,
        "segmented evaluatees into quartiles"
    );

    Ok(QuartileReport {
        cut_points: cuts,
        assignments,
        buckets,
        dispersion,
        amplitude,
    })
}
