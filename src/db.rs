use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{debug, info};

use crate::error::SurveyResult;
use crate::models::Sheet;
use crate::report::ReportRow;
use crate::store::TableStore;
use crate::survey::{self, SurveyRecorder};

/// Sheets backed by `customer_survey.worksheet_rows`, ordered by row id.
pub struct PgTableStore {
    pool: PgPool,
}

impl PgTableStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_rows<'e, E>(executor: E, sheet: Sheet) -> SurveyResult<Vec<Vec<String>>>
    where
        E: sqlx::Executor<'e, Database = Postgres>,
    {
        let records = sqlx::query(
            "SELECT cells FROM customer_survey.worksheet_rows WHERE sheet = $1 ORDER BY id",
        )
        .bind(sheet.name())
        .fetch_all(executor)
        .await?;

        let mut rows = Vec::with_capacity(records.len());
        for row in records {
            rows.push(row.try_get::<Vec<String>, _>("cells")?);
        }
        Ok(rows)
    }

    async fn insert_row(
        tx: &mut Transaction<'_, Postgres>,
        sheet: Sheet,
        cells: &[String],
    ) -> SurveyResult<()> {
        sqlx::query("INSERT INTO customer_survey.worksheet_rows (sheet, cells) VALUES ($1, $2)")
            .bind(sheet.name())
            .bind(cells)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Serializes writers of one sheet until the transaction ends.
    async fn lock_sheet(tx: &mut Transaction<'_, Postgres>, sheet: Sheet) -> SurveyResult<()> {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(format!("customer_survey.{}", sheet.name()))
            .execute(&mut **tx)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl TableStore for PgTableStore {
    fn backend_tag(&self) -> &'static str {
        "postgres"
    }

    async fn get_all_values(&self, sheet: Sheet) -> SurveyResult<Vec<Vec<String>>> {
        let rows = Self::fetch_rows(&self.pool, sheet).await?;
        debug!(sheet = sheet.name(), rows = rows.len(), "fetched sheet");
        Ok(rows)
    }

    async fn append_row(&self, sheet: Sheet, cells: Vec<String>) -> SurveyResult<()> {
        let mut tx = self.pool.begin().await?;
        Self::insert_row(&mut tx, sheet, &cells).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn clear(&self, sheet: Sheet) -> SurveyResult<()> {
        let mut tx = self.pool.begin().await?;
        Self::lock_sheet(&mut tx, sheet).await?;
        sqlx::query("DELETE FROM customer_survey.worksheet_rows WHERE sheet = $1")
            .bind(sheet.name())
            .execute(&mut *tx)
            .await?;
        Self::insert_row(&mut tx, sheet, &sheet.header_row()).await?;
        tx.commit().await?;
        info!(sheet = sheet.name(), "cleared sheet");
        Ok(())
    }

    async fn append_numbered_row(&self, sheet: Sheet, cells: Vec<String>) -> SurveyResult<i64> {
        let mut tx = self.pool.begin().await?;
        Self::lock_sheet(&mut tx, sheet).await?;

        let rows = Self::fetch_rows(&mut *tx, sheet).await?;
        let id = survey::last_customer_id(&rows)? + 1;

        let mut row = Vec::with_capacity(cells.len() + 1);
        row.push(id.to_string());
        row.extend(cells);
        Self::insert_row(&mut tx, sheet, &row).await?;
        tx.commit().await?;
        Ok(id)
    }
}

pub async fn init_db(pool: &PgPool) -> SurveyResult<()> {
    sqlx::migrate!("./migrations").run(pool).await?;

    for sheet in Sheet::ALL {
        let present: bool = sqlx::query(
            "SELECT EXISTS (SELECT 1 FROM customer_survey.worksheet_rows WHERE sheet = $1)",
        )
        .bind(sheet.name())
        .fetch_one(pool)
        .await?
        .try_get(0)?;

        if !present {
            sqlx::query(
                "INSERT INTO customer_survey.worksheet_rows (sheet, cells) VALUES ($1, $2)",
            )
            .bind(sheet.name())
            .bind(sheet.header_row())
            .execute(pool)
            .await?;
            info!(sheet = sheet.name(), "wrote header row");
        }
    }

    Ok(())
}

pub async fn seed(store: &dyn TableStore) -> SurveyResult<Vec<i64>> {
    let responses: [[u8; 4]; 5] = [
        [5, 4, 5, 5],
        [4, 4, 3, 4],
        [2, 3, 1, 2],
        [5, 5, 4, 5],
        [3, 4, 2, 3],
    ];

    let recorder = SurveyRecorder::new(store);
    let mut ids = Vec::with_capacity(responses.len());
    for scores in responses {
        ids.push(recorder.record(scores).await?);
    }
    Ok(ids)
}

/// Replaces the report sheet's data rows with the given report rows.
pub async fn import_report(store: &dyn TableStore, rows: &[ReportRow]) -> SurveyResult<usize> {
    store.clear(Sheet::Report).await?;

    let mut inserted = 0usize;
    for row in rows {
        let mut cells = row.to_cells();
        if cells.len() < 3 {
            cells.push(String::new());
        }
        store.append_row(Sheet::Report, cells).await?;
        inserted += 1;
    }

    info!(inserted, backend = store.backend_tag(), "imported report rows");
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AnalysisSnapshot;
    use crate::report::build_rows;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn seed_numbers_rows_after_existing_ids() {
        let store = MemoryStore::new();
        let ids = seed(&store).await.unwrap();
        assert_eq!(ids, vec![2, 3, 4, 5, 6]);
        assert_eq!(store.get_all_values(Sheet::Survey).await.unwrap().len(), 6);
    }

    #[tokio::test]
    async fn import_replaces_previous_report_rows() {
        let store = MemoryStore::new();
        let snapshot = AnalysisSnapshot {
            response_count: 4,
            averages: [4, 3, 3, 5],
        };

        import_report(&store, &build_rows(&snapshot, true)).await.unwrap();
        let inserted = import_report(&store, &build_rows(&snapshot, false))
            .await
            .unwrap();
        assert_eq!(inserted, 5);

        let rows = store.get_all_values(Sheet::Report).await.unwrap();
        assert_eq!(rows.len(), 6);
        assert_eq!(rows[0], Sheet::Report.header_row());
        assert_eq!(rows[1], vec!["Total Responses", "4", ""]);
        assert_eq!(rows[5], vec!["Average Recommendation", "5", ""]);
    }
}
