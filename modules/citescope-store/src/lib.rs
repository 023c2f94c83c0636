//! Postgres-backed persistence for users, sources, and the publication graph
//! (spec.md §4.4). Mirrors the teacher's split between a thin `Store` handle
//! over a shared `PgPool` and per-concern query modules
//! (`rootsignal-events::EventStore`, `rootsignal-domains::scraping::source`).

pub mod catalog;
pub mod crawl;
pub mod export;
pub mod merge;
pub mod metrics;
pub mod source;
pub mod user;

use sqlx::PgPool;

pub use citescope_core::error::{StoreError, StoreResult};
pub use source::SourceTask;
pub use user::UserRow;

#[derive(Clone)]
pub struct Store {
    pool: PgPool,
}

impl Store {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
