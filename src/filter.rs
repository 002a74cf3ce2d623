use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::EngineError;
use crate::models::{AuditRecord, Dimension};

const ALL_SENTINELS: [&str; 2] = ["all", "TODOS"];

/// A menu choice for one dimension: everything, or one concrete category.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Selection {
    All,
    Value(String),
}

impl Selection {
    /// `None`, "all" and "TODOS" mean no restriction, in any letter case.
    pub fn from_arg(value: Option<&str>) -> Self {
        match value {
            None => Selection::All,
            Some(text) if ALL_SENTINELS.iter().any(|s| text.eq_ignore_ascii_case(s)) => {
                Selection::All
            }
            Some(text) => Selection::Value(text.to_string()),
        }
    }

    pub fn matches(&self, value: Option<&str>) -> bool {
        match self {
            Selection::All => true,
            Selection::Value(wanted) => value == Some(wanted.as_str()),
        }
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selection::All => f.write_str("all"),
            Selection::Value(value) => f.write_str(value),
        }
    }
}

/// Closed interval over calendar dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, EngineError> {
        let range = Self { start, end };
        range.validate()?;
        Ok(range)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.start > self.end {
            return Err(EngineError::InvalidRange {
                start: self.start,
                end: self.end,
            });
        }
        Ok(())
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FilterConfig {
    pub selections: BTreeMap<Dimension, Selection>,
    pub date_range: Option<DateRange>,
}

impl FilterConfig {
    pub fn select(mut self, dimension: Dimension, selection: Selection) -> Self {
        self.selections.insert(dimension, selection);
        self
    }

    pub fn with_range(mut self, range: DateRange) -> Self {
        self.date_range = Some(range);
        self
    }

    pub fn selection(&self, dimension: Dimension) -> &Selection {
        self.selections.get(&dimension).unwrap_or(&Selection::All)
    }

    fn matches_except(&self, record: &AuditRecord, skip: Option<Dimension>) -> bool {
        let dimensions_match = self
            .selections
            .iter()
            .filter(|(dimension, _)| Some(**dimension) != skip)
            .all(|(dimension, selection)| selection.matches(record.dimension_value(*dimension)));

        dimensions_match
            && self
                .date_range
                .map_or(true, |range| range.contains(record.date()))
    }
}

/// Records matching every concrete selection and the date range.
pub fn apply_filter(
    records: &[AuditRecord],
    config: &FilterConfig,
) -> Result<Vec<AuditRecord>, EngineError> {
    if let Some(range) = &config.date_range {
        range.validate()?;
    }

    let filtered: Vec<AuditRecord> = records
        .iter()
        .filter(|record| config.matches_except(record, None))
        .cloned()
        .collect();

    tracing::debug!(
        total = records.len(),
        kept = filtered.len(),
        "applied audit filter"
    );
    Ok(filtered)
}

/// Observed values of `dimension`, sorted ascending, with `All` first.
pub fn distinct_values(records: &[AuditRecord], dimension: Dimension) -> Vec<Selection> {
    collect_values(records.iter(), dimension)
}

/// Values of `dimension` still reachable under every other active selection.
pub fn cascading_values(
    records: &[AuditRecord],
    config: &FilterConfig,
    dimension: Dimension,
) -> Result<Vec<Selection>, EngineError> {
    if let Some(range) = &config.date_range {
        range.validate()?;
    }
    Ok(collect_values(
        records
            .iter()
            .filter(|record| config.matches_except(record, Some(dimension))),
        dimension,
    ))
}

fn collect_values<'a>(
    records: impl Iterator<Item = &'a AuditRecord>,
    dimension: Dimension,
) -> Vec<Selection> {
    let observed: BTreeSet<&str> = records
        .filter_map(|record| record.dimension_value(dimension))
        .collect();

    std::iter::once(Selection::All)
        .chain(observed.into_iter().map(|value| Selection::Value(value.to_string())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::audit;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn sample_records() -> Vec<AuditRecord> {
        let mut first = audit("Avery", 90.0, 2026, 1, 10);
        first.account = Some("Retail".to_string());
        first.supervisor = Some("Kiara".to_string());
        let mut second = audit("Jules", 70.0, 2026, 2, 3);
        second.account = Some("Business".to_string());
        second.supervisor = Some("Kiara".to_string());
        let mut third = audit("Avery", 50.0, 2026, 3, 15);
        third.account = Some("Retail".to_string());
        third.supervisor = Some("Noor".to_string());
        let fourth = audit("Sam", 100.0, 2026, 3, 20);
        vec![first, second, third, fourth]
    }

    #[test]
    fn default_filter_keeps_everything() {
        let records = sample_records();
        let filtered = apply_filter(&records, &FilterConfig::default()).expect("filter");
        assert_eq!(filtered, records);
    }

    #[test]
    fn concrete_selection_excludes_records_without_the_dimension() {
        let records = sample_records();
        let config =
            FilterConfig::default().select(Dimension::Account, Selection::from_arg(Some("Retail")));
        let filtered = apply_filter(&records, &config).expect("filter");
        assert_eq!(filtered.len(), 2);
        assert!(filtered.iter().all(|r| r.account.as_deref() == Some("Retail")));
    }

    #[test]
    fn date_range_is_inclusive_and_ignores_time_of_day() {
        let records = sample_records();
        let range = DateRange::new(date(2026, 2, 3), date(2026, 3, 15)).expect("range");
        let filtered =
            apply_filter(&records, &FilterConfig::default().with_range(range)).expect("filter");
        let names: Vec<&str> = filtered.iter().map(|r| r.evaluatee.as_str()).collect();
        assert_eq!(names, vec!["Jules", "Avery"]);
    }

    #[test]
    fn inverted_range_is_an_error_not_an_empty_set() {
        let records = sample_records();
        let config = FilterConfig {
            date_range: Some(DateRange {
                start: date(2026, 3, 1),
                end: date(2026, 1, 1),
            }),
            ..FilterConfig::default()
        };
        assert_eq!(
            apply_filter(&records, &config),
            Err(EngineError::InvalidRange {
                start: date(2026, 3, 1),
                end: date(2026, 1, 1),
            })
        );
    }

    #[test]
    fn filtering_is_idempotent_and_yields_a_subset() {
        let records = sample_records();
        let config = FilterConfig::default()
            .select(Dimension::Supervisor, Selection::Value("Kiara".to_string()))
            .with_range(DateRange::new(date(2026, 1, 1), date(2026, 12, 31)).expect("range"));
        let once = apply_filter(&records, &config).expect("filter");
        let twice = apply_filter(&once, &config).expect("filter");
        assert_eq!(once, twice);
        assert!(once.iter().all(|r| records.contains(r)));
    }

    #[test]
    fn distinct_values_are_sorted_with_all_first() {
        let records = sample_records();
        let values = distinct_values(&records, Dimension::Account);
        assert_eq!(
            values,
            vec![
                Selection::All,
                Selection::Value("Business".to_string()),
                Selection::Value("Retail".to_string()),
            ]
        );
    }

    #[test]
    fn cascading_values_respect_other_selections() {
        let records = sample_records();
        let config = FilterConfig::default()
            .select(Dimension::Account, Selection::Value("Retail".to_string()))
            .select(Dimension::Supervisor, Selection::Value("Kiara".to_string()));
        let supervisors =
            cascading_values(&records, &config, Dimension::Supervisor).expect("values");
        assert_eq!(
            supervisors,
            vec![
                Selection::All,
                Selection::Value("Kiara".to_string()),
                Selection::Value("Noor".to_string()),
            ]
        );
    }

    #[test]
    fn sentinel_argument_means_all() {
        assert_eq!(Selection::from_arg(Some("ALL")), Selection::All);
        assert_eq!(Selection::from_arg(Some("TODOS")), Selection::All);
        assert_eq!(Selection::from_arg(Some("todos")), Selection::All);
        assert_eq!(
            Selection::from_arg(Some("Todas as contas")),
            Selection::Value("Todas as contas".to_string())
        );
        assert_eq!(Selection::from_arg(None), Selection::All);
    }
}
