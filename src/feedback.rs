use std::collections::BTreeMap;

use crate::models::{mean, percent, AuditRecord, SupervisorFeedback};

#[derive(Default)]
struct FeedbackTally {
    scores: Vec<f64>,
    audits: usize,
    applied: usize,
    not_applied: usize,
    pending: usize,
}

/// Feedback compliance per supervisor, ordered by supervisor name.
pub fn feedback_by_supervisor(records: &[AuditRecord]) -> Vec<SupervisorFeedback> {
    let mut tallies: BTreeMap<&str, FeedbackTally> = BTreeMap::new();

    for record in records {
        let Some(supervisor) = record.supervisor.as_deref() else {
            continue;
        };
        let tally = tallies.entry(supervisor).or_default();
        tally.audits += 1;
        tally.applied += usize::from(record.feedback_applied);
        tally.not_applied += usize::from(record.feedback_not_applied);
        tally.pending += usize::from(record.feedback_pending);
        if let Some(score) = record.valid_score() {
            tally.scores.push(score);
        }
    }

    tallies
        .into_iter()
        .map(|(supervisor, tally)| SupervisorFeedback {
            supervisor: supervisor.to_string(),
            audit_count: tally.audits,
            mean_score: mean(&tally.scores),
            feedback_applied: tally.applied,
            feedback_not_applied: tally.not_applied,
            feedback_pending: tally.pending,
            pct_feedback_applied: percent(tally.applied, tally.audits),
            pct_feedback_not_applied: percent(tally.not_applied, tally.audits),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::audit;

    #[test]
    fn tallies_feedback_per_supervisor() {
        let mut a = audit("Avery", 90.0, 2026, 1, 5);
        a.supervisor = Some("Noor".to_string());
        a.feedback_applied = true;
        let mut b = audit("Jules", 70.0, 2026, 1, 6);
        b.supervisor = Some("Kiara".to_string());
        b.feedback_not_applied = true;
        let mut c = audit("Sam", 50.0, 2026, 1, 7);
        c.supervisor = Some("Noor".to_string());
        c.feedback_pending = true;
        let d = audit("Lee", 10.0, 2026, 1, 7);

        let rows = feedback_by_supervisor(&[a, b, c, d]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].supervisor, "Kiara");
        assert_eq!(rows[0].pct_feedback_not_applied, 100.0);

        let noor = &rows[1];
        assert_eq!(noor.audit_count, 2);
        assert_eq!(noor.mean_score, 70.0);
        assert_eq!(noor.feedback_applied, 1);
        assert_eq!(noor.feedback_pending, 1);
        assert_eq!(noor.pct_feedback_applied, 50.0);
    }
}
