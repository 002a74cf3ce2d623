use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::{AuditRecord, OffenderRow};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OffenderConfig {
    #[serde(default = "default_min_occurrences")]
    pub min_occurrences: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

impl Default for OffenderConfig {
    fn default() -> Self {
        Self {
            min_occurrences: default_min_occurrences(),
            limit: default_limit(),
        }
    }
}

fn default_min_occurrences() -> usize {
    1
}

fn default_limit() -> usize {
    10
}

/// Evaluatee/supervisor pairs with repeated zero scores, most frequent first.
pub fn find_offenders(records: &[AuditRecord], config: &OffenderConfig) -> Vec<OffenderRow> {
    let mut index: HashMap<(&str, &str), usize> = HashMap::new();
    let mut rows: Vec<OffenderRow> = Vec::new();

    for record in records {
        if record.valid_score() != Some(0.0) {
            continue;
        }
        let (Some(evaluatee), Some(supervisor)) =
            (record.named_evaluatee(), record.supervisor.as_deref())
        else {
            continue;
        };

        let key = (evaluatee, supervisor);
        match index.get(&key) {
            Some(&position) => rows[position].zero_count += 1,
            None => {
                index.insert(key, rows.len());
                rows.push(OffenderRow {
                    evaluatee: evaluatee.to_string(),
                    supervisor: supervisor.to_string(),
                    zero_count: 1,
                });
            }
        }
    }

    rows.retain(|row| row.zero_count >= config.min_occurrences);
    // stable: ties keep first-encounter order
    rows.sort_by(|a, b| b.zero_count.cmp(&a.zero_count));
    rows.truncate(config.limit);
    rows
}
