//! Per-user, per-namespace crawl task state (spec.md §4.2 "Scheduler").

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::Row;

use citescope_core::error::{StoreError, StoreResult};
use citescope_core::types::StageState;

use crate::Store;

#[derive(Debug, Clone)]
pub struct SourceTask {
    pub id: i64,
    pub user_id: i64,
    pub namespace: String,
    pub values: HashMap<String, String>,
    pub stage: StageState,
    pub next_run_at: DateTime<Utc>,
    pub error_count: i32,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for SourceTask {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        let values_json: Value = row.try_get("values")?;
        let stage_json: Value = row.try_get("stage")?;
        Ok(SourceTask {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            namespace: row.try_get("namespace")?,
            values: serde_json::from_value(values_json).unwrap_or_default(),
            stage: serde_json::from_value(stage_json)
                .map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
            next_run_at: row.try_get("next_run_at")?,
            error_count: row.try_get("error_count")?,
        })
    }
}

const SOURCE_TASK_COLUMNS: &str =
    "id, user_id, namespace, values, stage, next_run_at, error_count";

impl Store {
    /// The single soonest-due source across every user (spec.md §4.2 "the
    /// scheduler always picks the globally soonest-due row"). `None` means
    /// nothing is due to run right now.
    pub async fn next_source_task(&self) -> StoreResult<Option<SourceTask>> {
        let row = sqlx::query_as::<_, SourceTask>(&format!(
            "SELECT {SOURCE_TASK_COLUMNS} FROM sources ORDER BY next_run_at ASC LIMIT 1"
        ))
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn get_source_values(
        &self,
        user_id: i64,
        namespace: &str,
    ) -> StoreResult<Option<HashMap<String, String>>> {
        let row: Option<(Value,)> =
            sqlx::query_as("SELECT values FROM sources WHERE user_id = $1 AND namespace = $2")
                .bind(user_id)
                .bind(namespace)
                .fetch_optional(&self.pool)
                .await?;

        Ok(match row {
            Some((values,)) => Some(serde_json::from_value(values).map_err(|e| {
                StoreError::Export(format!("corrupt source values: {e}"))
            })?),
            None => None,
        })
    }

    /// Upsert the user-supplied field values for one source. On any change —
    /// creation or update — the row resets to `initial_stage` with
    /// `next_run_at = now()`, so the scheduler's next decision for this row
    /// sees it as immediately due (spec.md §4.4 "on change, reset `due` to
    /// 0... set `task_json=null`", §8 "after updating source fields, the
    /// next scheduler decision for that row sees `due = 0`").
    pub async fn update_source_values(
        &self,
        user_id: i64,
        namespace: &str,
        values: &HashMap<String, String>,
        initial_stage: &StageState,
    ) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sources (user_id, namespace, values, stage, next_run_at)
            VALUES ($1, $2, $3, $4, now())
            ON CONFLICT (user_id, namespace)
            DO UPDATE SET values = EXCLUDED.values, stage = EXCLUDED.stage,
                          next_run_at = now(), error_count = 0, updated_at = now()
            "#,
        )
        .bind(user_id)
        .bind(namespace)
        .bind(serde_json::to_value(values).unwrap_or_default())
        .bind(serde_json::to_value(initial_stage).unwrap_or_default())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn delete_source(&self, user_id: i64, namespace: &str) -> StoreResult<()> {
        sqlx::query("DELETE FROM sources WHERE user_id = $1 AND namespace = $2")
            .bind(user_id)
            .bind(namespace)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn list_sources(&self, user_id: i64) -> StoreResult<Vec<SourceTask>> {
        let rows = sqlx::query_as::<_, SourceTask>(&format!(
            "SELECT {SOURCE_TASK_COLUMNS} FROM sources WHERE user_id = $1 ORDER BY namespace"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
