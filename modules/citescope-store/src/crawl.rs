//! Persisting one adapter `Step` (spec.md §4.1, §4.4 "save_crawler_step"):
//! upsert discovered authors/publications, record citation edges, and
//! advance the owning source's stage/schedule in a single transaction.

use std::time::Duration;

use serde_json::Value;
use sqlx::{Postgres, Transaction};

use citescope_core::error::StoreResult;
use citescope_core::types::{AuthorRecord, PublicationRecord, StageState, Step};

use crate::Store;

impl Store {
    pub async fn save_crawler_step(
        &self,
        user_id: i64,
        namespace: &str,
        next_stage: &StageState,
        delay: Duration,
        error_count: u32,
        step: &Step,
    ) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        for author in &step.authors {
            upsert_author(&mut tx, user_id, namespace, author).await?;
        }
        for publication in &step.self_publications {
            upsert_publication(&mut tx, user_id, namespace, publication).await?;
        }
        for (cited_path, citing) in &step.citations {
            for publication in citing {
                upsert_publication(&mut tx, user_id, namespace, publication).await?;
                sqlx::query(
                    "INSERT INTO cites (citing_path, cited_path, source, user_id) VALUES ($1, $2, $3, $4)
                     ON CONFLICT DO NOTHING",
                )
                .bind(&publication.path)
                .bind(cited_path)
                .bind(namespace)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
            }
        }

        sqlx::query(
            r#"
            UPDATE sources
            SET stage = $1,
                next_run_at = now() + make_interval(secs => $2),
                error_count = $3,
                updated_at = now()
            WHERE user_id = $4 AND namespace = $5
            "#,
        )
        .bind(serde_json::to_value(next_stage).unwrap_or(Value::Null))
        .bind(delay.as_secs_f64())
        .bind(error_count as i32)
        .bind(user_id)
        .bind(namespace)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
}

async fn upsert_author(
    tx: &mut Transaction<'_, Postgres>,
    user_id: i64,
    source: &str,
    author: &AuthorRecord,
) -> StoreResult<()> {
    sqlx::query(
        r#"
        INSERT INTO authors (path, source, user_id, full_name, external_id, first_name, last_name, extra)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (path, source, user_id) DO UPDATE SET
            full_name = EXCLUDED.full_name,
            external_id = COALESCE(EXCLUDED.external_id, authors.external_id),
            first_name = EXCLUDED.first_name,
            last_name = EXCLUDED.last_name,
            extra = EXCLUDED.extra
        "#,
    )
    .bind(&author.path)
    .bind(source)
    .bind(user_id)
    .bind(&author.full_name)
    .bind(&author.id)
    .bind(&author.first_name)
    .bind(&author.last_name)
    .bind(&author.extra)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn upsert_publication(
    tx: &mut Transaction<'_, Postgres>,
    user_id: i64,
    source: &str,
    publication: &PublicationRecord,
) -> StoreResult<()> {
    sqlx::query(
        r#"
        INSERT INTO publications (path, source, user_id, by_self, name, external_id, year, reference, extra)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ON CONFLICT (path, source, user_id) DO UPDATE SET
            by_self = publications.by_self OR EXCLUDED.by_self,
            name = EXCLUDED.name,
            external_id = COALESCE(EXCLUDED.external_id, publications.external_id),
            year = EXCLUDED.year,
            reference = EXCLUDED.reference,
            extra = EXCLUDED.extra
        "#,
    )
    .bind(&publication.path)
    .bind(source)
    .bind(user_id)
    .bind(publication.by_self)
    .bind(&publication.name)
    .bind(&publication.id)
    .bind(publication.year)
    .bind(&publication.reference)
    .bind(&publication.extra)
    .execute(&mut **tx)
    .await?;

    for author_ref in &publication.authors {
        sqlx::query(
            "INSERT INTO publication_authors (publication_path, author_path, source, user_id)
             VALUES ($1, $2, $3, $4) ON CONFLICT DO NOTHING",
        )
        .bind(&publication.path)
        .bind(author_ref.path())
        .bind(source)
        .bind(user_id)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}
