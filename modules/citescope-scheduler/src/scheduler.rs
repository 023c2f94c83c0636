//! The cooperative single-threaded crawl loop (spec.md §4.2 "Scheduler"):
//! pick the globally soonest-due source, sleep until it's due (capped at
//! `MAX_SLEEP`, woken early by a signal), run one `Adapter::step`, persist
//! the result, repeat.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Notify;
use tracing::{error, warn};

use citescope_core::types::Step;
use citescope_core::AdapterRegistry;
use citescope_store::{SourceTask, Store};

use crate::backoff;

const MAX_SLEEP: Duration = Duration::from_secs(60);
const DB_ERROR_RETRY: Duration = Duration::from_secs(5);

pub struct Scheduler {
    store: Arc<Store>,
    registry: Arc<AdapterRegistry>,
    http: reqwest::Client,
    wake: Arc<Notify>,
}

impl Scheduler {
    pub fn new(store: Arc<Store>, registry: Arc<AdapterRegistry>, http: reqwest::Client) -> Self {
        Self { store, registry, http, wake: Arc::new(Notify::new()) }
    }

    /// A handle that lets other components (e.g. the `/rest` façade, after a
    /// user edits their source fields) wake the scheduler early instead of
    /// waiting out the rest of a capped sleep.
    pub fn waker(&self) -> Arc<Notify> {
        self.wake.clone()
    }

    pub async fn run(&self) {
        loop {
            match self.store.next_source_task().await {
                Ok(Some(task)) => self.handle_due_or_wait(task).await,
                Ok(None) => self.sleep_capped(MAX_SLEEP).await,
                Err(err) => {
                    error!(error = %err, "failed to query next source task");
                    tokio::time::sleep(DB_ERROR_RETRY).await;
                }
            }
        }
    }

    async fn handle_due_or_wait(&self, task: SourceTask) {
        let now = Utc::now();
        if task.next_run_at > now {
            let wait = (task.next_run_at - now).to_std().unwrap_or(Duration::ZERO);
            self.sleep_capped(wait.min(MAX_SLEEP)).await;
            return;
        }
        self.run_one(task).await;
    }

    async fn sleep_capped(&self, duration: Duration) {
        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = self.wake.notified() => {}
        }
    }

    async fn run_one(&self, task: SourceTask) {
        let Some(adapter) = self.registry.get(&task.namespace) else {
            error!(namespace = %task.namespace, "no adapter registered for source namespace");
            return;
        };

        match adapter.step(&task.values, task.stage.clone(), &self.http).await {
            Ok(mut step) => {
                step.fix_authors();
                let next_stage = step.stage.clone().unwrap_or_else(|| adapter.initial_stage());
                if let Err(err) = self
                    .store
                    .save_crawler_step(task.user_id, &task.namespace, &next_stage, step.delay, 0, &step)
                    .await
                {
                    error!(error = %err, user_id = task.user_id, namespace = %task.namespace, "failed to persist crawl step");
                }
            }
            Err(err) => {
                let delay = backoff::next_delay(task.error_count as u32);
                warn!(
                    error = %err,
                    user_id = task.user_id,
                    namespace = %task.namespace,
                    error_count = task.error_count + 1,
                    retry_in_secs = delay.as_secs(),
                    "adapter step failed, backing off"
                );
                if let Err(store_err) = self
                    .store
                    .save_crawler_step(
                        task.user_id,
                        &task.namespace,
                        &task.stage,
                        delay,
                        task.error_count as u32 + 1,
                        &Step::default(),
                    )
                    .await
                {
                    error!(error = %store_err, "failed to persist backoff state after adapter error");
                }
            }
        }
    }
}
