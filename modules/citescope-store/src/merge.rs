//! Per-user merge locking and the `merges` edge table (spec.md §4.3
//! "Merger", §4.4 "save_merges").
//!
//! `acquire_lock`/`release_lock` mirror the teacher's supervisor lock
//! (`rootsignal-scout-supervisor::state::SupervisorState`): clean up stale
//! locks left behind by a crashed run, then an atomic check-and-set.

use chrono::{Duration as ChronoDuration, Utc};
use sqlx::FromRow;

use citescope_core::error::StoreResult;

use crate::Store;

/// A cross-source equivalence edge between two `by_self` publications
/// (spec.md §3 "Merge"). `source_a < source_b` lexicographically.
#[derive(Debug, Clone)]
pub struct MergeEdge {
    pub source_a: String,
    pub source_b: String,
    pub pub_a: String,
    pub pub_b: String,
    pub similarity: f64,
}

#[derive(Debug, Clone, FromRow)]
pub struct MergePartner {
    pub source: String,
    pub path: String,
}

const STALE_LOCK_AFTER: i64 = 30; // minutes

impl Store {
    /// Returns `true` if the lock was acquired, `false` if another merge run
    /// already holds it.
    pub async fn acquire_merge_lock(&self, user_id: i64) -> StoreResult<bool> {
        let stale_before = Utc::now() - ChronoDuration::minutes(STALE_LOCK_AFTER);
        sqlx::query(
            "UPDATE merge_runs SET locked_at = NULL WHERE user_id = $1 AND locked_at < $2",
        )
        .bind(user_id)
        .bind(stale_before)
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO merge_runs (user_id, locked_at) VALUES ($1, now())
            ON CONFLICT (user_id) DO UPDATE SET locked_at = now()
            WHERE merge_runs.locked_at IS NULL
            "#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map(|result| result.rows_affected() > 0)
        .map_err(Into::into)
    }

    pub async fn release_merge_lock(&self, user_id: i64) -> StoreResult<()> {
        sqlx::query("UPDATE merge_runs SET locked_at = NULL, last_run_at = now() WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Replace all of a user's merge edges in one transaction: merges are
    /// derived state, recomputed from scratch every cycle rather than
    /// patched incrementally (spec.md §4.3 "Derived merges", §4.4
    /// "save_merges... replace all merges for owner atomically").
    pub async fn save_merges(&self, user_id: i64, edges: &[MergeEdge]) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM merges WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        for edge in edges {
            sqlx::query(
                r#"
                INSERT INTO merges (user_id, source_a, source_b, pub_a, pub_b, similarity)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(user_id)
            .bind(&edge.source_a)
            .bind(&edge.source_b)
            .bind(&edge.pub_a)
            .bind(&edge.pub_b)
            .bind(edge.similarity)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// MergeCheck view (spec.md §GLOSSARY): given `(source, path)`, return
    /// every `(other_source, other_path)` it's paired with. Used by read-side
    /// code to collapse duplicate publications across sources.
    pub async fn merge_partners(&self, user_id: i64, source: &str, path: &str) -> StoreResult<Vec<MergePartner>> {
        let rows = sqlx::query_as::<_, MergePartner>(
            r#"
            SELECT source_b AS source, pub_b AS path FROM merges
            WHERE user_id = $1 AND source_a = $2 AND pub_a = $3
            UNION ALL
            SELECT source_a AS source, pub_a AS path FROM merges
            WHERE user_id = $1 AND source_b = $2 AND pub_b = $3
            "#,
        )
        .bind(user_id)
        .bind(source)
        .bind(path)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Every merge edge for a user, used to build the full equivalence-class
    /// partition once per `/rest/publications` request rather than issuing
    /// one `merge_partners` query per publication.
    pub async fn all_merges(&self, user_id: i64) -> StoreResult<Vec<MergeEdge>> {
        #[derive(FromRow)]
        struct Row {
            source_a: String,
            source_b: String,
            pub_a: String,
            pub_b: String,
            similarity: f64,
        }
        let rows = sqlx::query_as::<_, Row>(
            "SELECT source_a, source_b, pub_a, pub_b, similarity FROM merges WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| MergeEdge {
                source_a: r.source_a,
                source_b: r.source_b,
                pub_a: r.pub_a,
                pub_b: r.pub_b,
                similarity: r.similarity,
            })
            .collect())
    }
}
