use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::models::{mean, month_name, percent, AuditRecord, Dimension, GroupRow};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKey {
    /// Calendar month, ordered Janeiro through Dezembro.
    Month,
    /// Calendar date with the time of day discarded.
    Date,
    Dimension(Dimension),
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum KeyPart {
    Month(u32),
    Date(NaiveDate),
    Text(String),
}

impl KeyPart {
    fn label(&self) -> String {
        match self {
            KeyPart::Month(month) => month_name(*month).to_string(),
            KeyPart::Date(date) => date.to_string(),
            KeyPart::Text(text) => text.clone(),
        }
    }
}

fn key_part(record: &AuditRecord, key: GroupKey) -> Option<KeyPart> {
    match key {
        GroupKey::Month | GroupKey::Dimension(Dimension::Month) => {
            Some(KeyPart::Month(record.month()))
        }
        GroupKey::Date => Some(KeyPart::Date(record.date())),
        GroupKey::Dimension(dimension) => record
            .dimension_value(dimension)
            .map(|value| KeyPart::Text(value.to_string())),
    }
}

#[derive(Default)]
struct GroupAccumulator {
    scores: Vec<f64>,
    count: usize,
    feedback_applied: usize,
}

/// Mean score per observed key combination, in key order.
///
/// Records missing any categorical key are left out; combinations never
/// observed produce no row.
pub fn group_scores(records: &[AuditRecord], keys: &[GroupKey]) -> Vec<GroupRow> {
    let mut groups: BTreeMap<Vec<KeyPart>, GroupAccumulator> = BTreeMap::new();

    for record in records {
        let Some(parts) = keys
            .iter()
            .map(|key| key_part(record, *key))
            .collect::<Option<Vec<KeyPart>>>()
        else {
            continue;
        };

        let entry = groups.entry(parts).or_default();
        entry.count += 1;
        if record.feedback_applied {
            entry.feedback_applied += 1;
        }
        if let Some(score) = record.valid_score() {
            entry.scores.push(score);
        }
    }

    groups
        .into_iter()
        .map(|(parts, acc)| GroupRow {
            keys: parts.iter().map(KeyPart::label).collect(),
            mean_score: mean(&acc.scores),
            count: acc.count,
            pct_feedback_applied: percent(acc.feedback_applied, acc.count),
        })
        .collect()
}
