//! The `Adapter` contract (spec.md §4.1, design note "Adapter as static
//! dispatch"): a fixed method set, one implementation per publication index,
//! registered by name rather than looked up through any dynamic class
//! hierarchy.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::error::{CrawlError, CrawlResult};
use crate::types::{FieldSpec, StageState, Step};

/// One per-site crawler. Implementations are stateless: all per-crawl state
/// lives in the `StageState` that round-trips through the Store between
/// invocations.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Stable key identifying this adapter, e.g. `"scholar"`.
    fn namespace(&self) -> &'static str;

    /// Human-readable name for the profile form / assessment UI.
    fn display_name(&self) -> &'static str;

    /// User-supplied input fields this adapter needs (typically a profile URL).
    fn fields(&self) -> &'static [FieldSpec];

    /// Validate one field value before it's written to `Source.values`.
    fn validate_field(&self, key: &str, value: &str) -> Result<(), CrawlError>;

    /// The zero-state every crawl for this adapter starts from.
    fn initial_stage(&self) -> StageState;

    /// Run exactly one step of this adapter's state machine. Must issue at
    /// most one outbound HTTP request (a few adapters make two
    /// strictly-correlated requests, e.g. a token fetch) and must not mutate
    /// `stage` — the scheduler relies on this to retry safely after a
    /// transient failure (spec.md §4.1 "Purely functional").
    async fn step(
        &self,
        values: &HashMap<String, String>,
        stage: StageState,
        http: &reqwest::Client,
    ) -> CrawlResult<Step>;
}

/// Registry of adapters keyed by namespace (spec.md §9 "Adapter as static
/// dispatch" design note).
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: HashMap<&'static str, std::sync::Arc<dyn Adapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, adapter: std::sync::Arc<dyn Adapter>) {
        self.adapters.insert(adapter.namespace(), adapter);
    }

    pub fn get(&self, namespace: &str) -> Option<std::sync::Arc<dyn Adapter>> {
        self.adapters.get(namespace).cloned()
    }

    pub fn namespaces(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.adapters.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &std::sync::Arc<dyn Adapter>> {
        self.adapters.values()
    }
}
