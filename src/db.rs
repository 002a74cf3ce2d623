use chrono::NaiveDate;
use sqlx::{PgPool, Row};
use tracing::info;
use uuid::Uuid;

use crate::error::LoadError;
use crate::filter::DateRange;
use crate::models::AuditRecord;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Natural key of an audit over every stored column, so re-importing the
/// same export is a no-op.
pub fn source_key(record: &AuditRecord) -> String {
    let number = |value: Option<f64>| value.map(|v| v.to_string()).unwrap_or_default();
    let text = |value: &Option<String>| value.clone().unwrap_or_default();
    let flag = |value: bool| if value { "1" } else { "0" };

    [
        record.evaluatee.clone(),
        record.timestamp.format("%Y-%m-%dT%H:%M:%S%.f").to_string(),
        text(&record.supervisor),
        number(record.score),
        text(&record.account),
        text(&record.coordinator),
        text(&record.cell),
        text(&record.hierarchy),
        text(&record.monitoring_type),
        text(&record.week),
        text(&record.tenure),
        format!(
            "{}{}{}",
            flag(record.feedback_applied),
            flag(record.feedback_pending),
            flag(record.feedback_not_applied)
        ),
        number(record.target),
    ]
    .join("|")
}

pub async fn import_records(pool: &PgPool, records: &[AuditRecord]) -> Result<usize, LoadError> {
    let mut inserted = 0usize;

    for record in records {
        let result = sqlx::query(
            r#"
            INSERT INTO quality_scorecard.audits
            (id, source_key, audited_at, score, evaluatee, account, supervisor, coordinator,
             cell, hierarchy, monitoring_type, week, tenure,
             feedback_applied, feedback_pending, feedback_not_applied, target)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(source_key(record))
        .bind(record.timestamp)
        .bind(record.score)
        .bind(&record.evaluatee)
        .bind(&record.account)
        .bind(&record.supervisor)
        .bind(&record.coordinator)
        .bind(&record.cell)
        .bind(&record.hierarchy)
        .bind(&record.monitoring_type)
        .bind(&record.week)
        .bind(&record.tenure)
        .bind(record.feedback_applied)
        .bind(record.feedback_pending)
        .bind(record.feedback_not_applied)
        .bind(record.target)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            inserted += 1;
        }
    }

    info!(inserted, skipped = records.len() - inserted, "imported audits");
    Ok(inserted)
}

/// Open ends of a range are carried as calendar extremes, which Postgres
/// cannot represent; they become unbounded.
fn finite_bound(date: NaiveDate) -> Option<NaiveDate> {
    (date != NaiveDate::MIN && date != NaiveDate::MAX).then_some(date)
}

pub async fn fetch_audits(
    pool: &PgPool,
    range: Option<DateRange>,
) -> Result<Vec<AuditRecord>, LoadError> {
    let start = range.and_then(|r| finite_bound(r.start));
    let end = range.and_then(|r| finite_bound(r.end));

    let rows = sqlx::query(
        r#"
        SELECT audited_at, score, evaluatee, account, supervisor, coordinator, cell,
               hierarchy, monitoring_type, week, tenure, feedback_applied, feedback_pending,
               feedback_not_applied, target
        FROM quality_scorecard.audits
        WHERE ($1::date IS NULL OR audited_at::date >= $1)
          AND ($2::date IS NULL OR audited_at::date <= $2)
        ORDER BY audited_at, evaluatee
        "#,
    )
    .bind(start)
    .bind(end);

    let fetched = rows.fetch_all(pool).await?;
    let mut records = Vec::with_capacity(fetched.len());

    for row in fetched {
        records.push(AuditRecord {
            timestamp: row.try_get("audited_at")?,
            score: row.try_get("score")?,
            evaluatee: row.try_get("evaluatee")?,
            account: row.try_get("account")?,
            supervisor: row.try_get("supervisor")?,
            coordinator: row.try_get("coordinator")?,
            cell: row.try_get("cell")?,
            hierarchy: row.try_get("hierarchy")?,
            monitoring_type: row.try_get("monitoring_type")?,
            week: row.try_get("week")?,
            tenure: row.try_get("tenure")?,
            feedback_applied: row.try_get("feedback_applied")?,
            feedback_pending: row.try_get("feedback_pending")?,
            feedback_not_applied: row.try_get("feedback_not_applied")?,
            target: row.try_get("target")?,
        });
    }

    info!(records = records.len(), "fetched audits from store");
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{load_from_reader, LoaderConfig};
    use crate::models::fixtures::audit;

    #[test]
    fn source_key_is_stable_and_distinguishes_audits() {
        let first = audit("Avery", 87.5, 2026, 3, 2);
        let mut second = first.clone();
        assert_eq!(source_key(&first), source_key(&second));

        second.score = Some(60.0);
        assert_ne!(source_key(&first), source_key(&second));
        assert_eq!(
            source_key(&first),
            "Avery|2026-03-02T10:30:00||87.5||||||||000|"
        );
    }

    #[test]
    fn audits_differing_only_by_account_get_distinct_keys() {
        let csv = "timestamp,score,evaluatee,supervisor,account\n\
                   2026-03-03,100,Avery,Kiara,Retail\n\
                   2026-03-03,100,Avery,Kiara,Business\n";
        let outcome = load_from_reader(csv.as_bytes(), &LoaderConfig::default()).expect("load");
        let [retail, business] = outcome.records.as_slice() else {
            panic!("expected two audits");
        };
        assert_ne!(source_key(retail), source_key(business));
    }

    #[test]
    fn every_stored_column_feeds_the_key() {
        let base = audit("Avery", 100.0, 2026, 3, 3);
        let edits: [fn(&mut AuditRecord); 10] = [
            |r| r.coordinator = Some("Rui".into()),
            |r| r.cell = Some("Cell A".into()),
            |r| r.hierarchy = Some("Quality".into()),
            |r| r.monitoring_type = Some("Voice".into()),
            |r| r.week = Some("S1".into()),
            |r| r.tenure = Some("Veteran".into()),
            |r| r.feedback_applied = true,
            |r| r.feedback_pending = true,
            |r| r.feedback_not_applied = true,
            |r| r.target = Some(90.0),
        ];
        for edit in edits {
            let mut variant = base.clone();
            edit(&mut variant);
            assert_ne!(source_key(&base), source_key(&variant), "{variant:?}");
        }
    }

    #[test]
    fn calendar_extremes_are_unbounded() {
        let day = NaiveDate::from_ymd_opt(2026, 3, 2).expect("date");
        assert_eq!(finite_bound(day), Some(day));
        assert_eq!(finite_bound(NaiveDate::MIN), None);
        assert_eq!(finite_bound(NaiveDate::MAX), None);
    }
}
