//! Merges near-duplicate publications discovered across sources into
//! cross-source equivalence edges per user (spec.md §4.3 "Merger"). Runs
//! periodically and on-demand (`/rest/force-merge`), guarded by a per-user
//! single-flight lock so overlapping runs for the same user never race.

use std::time::Duration;

use tracing::{info, warn};

use citescope_store::catalog::PublicationRow;
use citescope_store::merge::MergeEdge;
use citescope_store::Store;

/// Two publications merge when their token-normalized names compare equal
/// (spec.md §4.3 "Similarity (baseline)": 1.0 on an exact token-sequence
/// match, 0.0 otherwise) at or above this threshold.
const SIMILARITY_THRESHOLD: f64 = 0.9;

pub struct Merger {
    store: std::sync::Arc<Store>,
}

impl Merger {
    pub fn new(store: std::sync::Arc<Store>) -> Self {
        Self { store }
    }

    /// Periodic sweep across every user with at least one source; call this
    /// from a background task on an interval timer.
    pub async fn run_all_due(&self, user_ids: &[i64]) {
        for &user_id in user_ids {
            self.merge_user(user_id).await;
            // Yield between users so a large merge backlog doesn't starve
            // the scheduler's single-threaded crawl loop.
            tokio::task::yield_now().await;
        }
    }

    /// Force a merge for one user (spec.md §6 `/rest/force-merge`). Returns
    /// `false` without doing anything if a merge for this user is already
    /// running.
    pub async fn merge_user(&self, user_id: i64) -> bool {
        match self.store.acquire_merge_lock(user_id).await {
            Ok(true) => {}
            Ok(false) => {
                info!(user_id, "merge already running for this user, skipping");
                return false;
            }
            Err(err) => {
                warn!(error = %err, user_id, "failed to acquire merge lock");
                return false;
            }
        }

        let result = self.run_merge(user_id).await;
        if let Err(err) = result {
            warn!(error = %err, user_id, "merge run failed");
        }

        if let Err(err) = self.store.release_merge_lock(user_id).await {
            warn!(error = %err, user_id, "failed to release merge lock");
        }
        true
    }

    async fn run_merge(&self, user_id: i64) -> anyhow::Result<()> {
        let publications = self.store.self_publications(user_id).await?;
        let edges = compute_edges(&publications).await;

        if edges.is_empty() {
            self.store.save_merges(user_id, &[]).await?;
            return Ok(());
        }

        self.store.save_merges(user_id, &edges).await?;
        info!(user_id, edges = edges.len(), "merged near-duplicate publications");
        Ok(())
    }
}

/// For every unordered pair of distinct sources, compare every pair of
/// `by_self` publications between them and record an edge when their
/// token-normalized names match (spec.md §4.3). Yields between every
/// publication-pair comparison so the scheduler stays responsive.
async fn compute_edges(publications: &[PublicationRow]) -> Vec<MergeEdge> {
    let mut edges = Vec::new();
    for (i, a) in publications.iter().enumerate() {
        for b in publications.iter().skip(i + 1) {
            if a.source == b.source {
                tokio::task::yield_now().await;
                continue;
            }
            let similarity = name_similarity(&a.name, &b.name);
            if similarity >= SIMILARITY_THRESHOLD {
                let (source_a, source_b, pub_a, pub_b) = if a.source < b.source {
                    (a.source.clone(), b.source.clone(), a.path.clone(), b.path.clone())
                } else {
                    (b.source.clone(), a.source.clone(), b.path.clone(), a.path.clone())
                };
                edges.push(MergeEdge { source_a, source_b, pub_a, pub_b, similarity });
            }
            tokio::task::yield_now().await;
        }
    }
    edges
}

/// Split on non-word characters, lowercase, compare token sequences for
/// equality: 1.0 on match, 0.0 otherwise (spec.md §4.3 "Similarity
/// (baseline)"). Kept deliberately simple and replaceable; the only contract
/// the rest of the system relies on is symmetry and the `[0,1]` codomain.
fn name_similarity(a: &str, b: &str) -> f64 {
    if tokenize(a) == tokenize(b) {
        1.0
    } else {
        0.0
    }
}

fn tokenize(title: &str) -> Vec<String> {
    title
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// How often the periodic sweep should run (spec.md §4.3 "default every 24h").
pub const PERIODIC_INTERVAL: Duration = Duration::from_secs(24 * 3600);

#[cfg(test)]
mod tests {
    use super::*;

    fn pub_row(source: &str, path: &str, name: &str) -> PublicationRow {
        PublicationRow {
            source: source.to_string(),
            path: path.to_string(),
            name: name.to_string(),
            year: None,
            citation_count: 0,
            author_count: 0,
        }
    }

    #[test]
    fn identical_token_sequences_have_similarity_one() {
        assert_eq!(name_similarity("Attention Is All You Need", "attention is all you need"), 1.0);
    }

    #[test]
    fn differing_token_sequences_have_similarity_zero() {
        assert_eq!(name_similarity("Attention Is All You Need", "A Survey of Distributed Databases"), 0.0);
    }

    #[tokio::test]
    async fn compute_edges_pairs_same_named_publications_across_sources() {
        let publications = vec![
            pub_row("academics", "pub/a", "Attention Is All You Need"),
            pub_row("scholar", "pub/b", "Attention Is All You Need"),
            pub_row("scholar", "pub/c", "Unrelated Paper"),
        ];
        let edges = compute_edges(&publications).await;
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].source_a, "academics");
        assert_eq!(edges[0].source_b, "scholar");
    }

    #[tokio::test]
    async fn compute_edges_never_pairs_publications_from_the_same_source() {
        let publications = vec![
            pub_row("scholar", "pub/a", "Same Title"),
            pub_row("scholar", "pub/b", "Same Title"),
        ];
        let edges = compute_edges(&publications).await;
        assert!(edges.is_empty());
    }
}
