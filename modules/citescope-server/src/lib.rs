//! The `/rest` façade: axum handlers wrapping `citescope-store` and
//! `citescope-scheduler` behind signed-cookie auth (spec.md §6). Mirrors the
//! teacher's split between `AppState`/`routes.rs` and a thin `main.rs`
//! (`rootsignal-server`).

pub mod auth;
pub mod routes;

use std::sync::Arc;

use tokio::sync::Notify;

use citescope_core::rate_limit::RateLimiter;
use citescope_core::AdapterRegistry;
use citescope_scheduler::Merger;
use citescope_store::Store;

pub struct AppState {
    pub store: Arc<Store>,
    pub registry: Arc<AdapterRegistry>,
    pub merger: Arc<Merger>,
    pub session_secret: String,
    pub secure_cookies: bool,
    /// Wakes the scheduler early after a user edits a source's fields, so the
    /// next crawl doesn't wait out the rest of a capped sleep.
    pub scheduler_waker: Arc<Notify>,
    /// Per-remote-address rate limiter shared by `/rest/user/register` and
    /// `/rest/user/login` (spec.md §5 "Shared-resource policy").
    pub rate_limiter: RateLimiter,
    /// Optional comma-separated username whitelist gating registration.
    pub whitelist: Option<Vec<String>>,
}
