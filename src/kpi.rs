use std::collections::BTreeMap;

use crate::filter::Selection;
use crate::models::{mean, percent, AuditRecord, KpiSummary};

/// Where the quality goal comes from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TargetConfig {
    /// One goal for every view.
    Fixed(f64),
    /// Derived from the records' own `target` column.
    PerRecord,
}

impl Default for TargetConfig {
    fn default() -> Self {
        TargetConfig::Fixed(90.0)
    }
}

/// Goal for the current view.
///
/// Per-record targets are averaged when every account is selected and maxed
/// when a single account is. Views with no target data resolve to 0.
pub fn resolve_target(
    records: &[AuditRecord],
    config: &TargetConfig,
    account: &Selection,
) -> f64 {
    match config {
        TargetConfig::Fixed(value) => *value,
        TargetConfig::PerRecord => {
            let targets: Vec<f64> = records
                .iter()
                .filter_map(|record| record.target)
                .filter(|value| value.is_finite())
                .collect();
            match account {
                Selection::All => mean(&targets),
                Selection::Value(_) => targets.into_iter().reduce(f64::max).unwrap_or(0.0),
            }
        }
    }
}

pub fn compute_kpis(
    records: &[AuditRecord],
    target: &TargetConfig,
    account: &Selection,
) -> KpiSummary {
    let count = records.len();
    let scores: Vec<f64> = records.iter().filter_map(AuditRecord::valid_score).collect();
    let mean_score = mean(&scores);

    let count_feedback_applied = records.iter().filter(|r| r.feedback_applied).count();
    let count_feedback_pending = records.iter().filter(|r| r.feedback_pending).count();
    let count_feedback_not_applied = records.iter().filter(|r| r.feedback_not_applied).count();
    let count_score_100 = scores.iter().filter(|score| **score == 100.0).count();
    let count_score_0 = scores.iter().filter(|score| **score == 0.0).count();

    let mut by_hierarchy: BTreeMap<String, usize> = BTreeMap::new();
    for record in records {
        if let Some(hierarchy) = &record.hierarchy {
            *by_hierarchy.entry(hierarchy.clone()).or_default() += 1;
        }
    }

    let target = resolve_target(records, target, account);

    KpiSummary {
        count,
        mean_score,
        count_feedback_applied,
        count_feedback_pending,
        pct_feedback_applied: percent(count_feedback_applied, count),
        pct_feedback_pending: percent(count_feedback_pending, count),
        pct_feedback_not_applied: percent(count_feedback_not_applied, count),
        count_score_100,
        count_score_0,
        pct_score_100: percent(count_score_100, count),
        pct_score_0: percent(count_score_0, count),
        evaluations_by_hierarchy: by_hierarchy.into_iter().collect(),
        target,
        delta_vs_target: mean_score - target,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::audit;

    fn with_target(mut record: AuditRecord, account: &str, target: f64) -> AuditRecord {
        record.account = Some(account.to_string());
        record.target = Some(target);
        record
    }

    #[test]
    fn empty_set_yields_zeroes() {
        let kpis = compute_kpis(&[], &TargetConfig::PerRecord, &Selection::All);
        assert_eq!(kpis.count, 0);
        assert_eq!(kpis.mean_score, 0.0);
        assert_eq!(kpis.pct_feedback_applied, 0.0);
        assert_eq!(kpis.pct_feedback_pending, 0.0);
        assert_eq!(kpis.pct_feedback_not_applied, 0.0);
        assert_eq!(kpis.pct_score_100, 0.0);
        assert_eq!(kpis.pct_score_0, 0.0);
        assert_eq!(kpis.target, 0.0);
        assert_eq!(kpis.delta_vs_target, 0.0);
    }

    #[test]
    fn counts_and_percentages() {
        let mut a = audit("Avery", 100.0, 2026, 1, 5);
        a.feedback_applied = true;
        a.hierarchy = Some("Qualidade".to_string());
        let mut b = audit("Jules", 0.0, 2026, 1, 6);
        b.feedback_pending = true;
        b.hierarchy = Some("Operação".to_string());
        let mut c = audit("Kiara", 80.0, 2026, 1, 7);
        c.feedback_applied = true;
        c.hierarchy = Some("Qualidade".to_string());
        let mut d = audit("Sam", 60.0, 2026, 1, 8);
        d.score = None;

        let kpis = compute_kpis(&[a, b, c, d], &TargetConfig::Fixed(90.0), &Selection::All);
        assert_eq!(kpis.count, 4);
        assert_eq!(kpis.mean_score, 60.0);
        assert_eq!(kpis.count_feedback_applied, 2);
        assert_eq!(kpis.pct_feedback_applied, 50.0);
        assert_eq!(kpis.count_feedback_pending, 1);
        assert_eq!(kpis.pct_feedback_pending, 25.0);
        assert_eq!(kpis.count_score_100, 1);
        assert_eq!(kpis.count_score_0, 1);
        assert_eq!(
            kpis.evaluations_by_hierarchy,
            vec![("Operação".to_string(), 1), ("Qualidade".to_string(), 2)]
        );
        assert_eq!(kpis.delta_vs_target, -30.0);
    }

    #[test]
    fn mean_stays_within_score_bounds() {
        let records = vec![
            audit("Avery", 72.5, 2026, 1, 5),
            audit("Jules", 91.0, 2026, 1, 6),
            audit("Kiara", 40.0, 2026, 1, 7),
        ];
        let kpis = compute_kpis(&records, &TargetConfig::default(), &Selection::All);
        assert!(kpis.mean_score >= 40.0 && kpis.mean_score <= 91.0);
    }

    #[test]
    fn per_record_target_uses_mean_for_all_and_max_for_one_account() {
        let records = vec![
            with_target(audit("Avery", 90.0, 2026, 1, 5), "Retail", 80.0),
            with_target(audit("Jules", 90.0, 2026, 1, 6), "Retail", 95.0),
            with_target(audit("Kiara", 90.0, 2026, 1, 7), "Business", 92.0),
        ];
        let all = resolve_target(&records, &TargetConfig::PerRecord, &Selection::All);
        assert!((all - 89.0).abs() < 1e-9);

        let retail = Selection::Value("Retail".to_string());
        let retail_records: Vec<AuditRecord> = records[..2].to_vec();
        let one = resolve_target(&retail_records, &TargetConfig::PerRecord, &retail);
        assert_eq!(one, 95.0);

        let kpis = compute_kpis(&retail_records, &TargetConfig::PerRecord, &retail);
        assert_eq!(kpis.delta_vs_target, -5.0);
    }

    #[test]
    fn fixed_target_ignores_record_targets() {
        let records = vec![with_target(audit("Avery", 70.0, 2026, 1, 5), "Retail", 50.0)];
        let kpis = compute_kpis(&records, &TargetConfig::Fixed(90.0), &Selection::All);
        assert_eq!(kpis.target, 90.0);
        assert_eq!(kpis.delta_vs_target, -20.0);
    }
}
