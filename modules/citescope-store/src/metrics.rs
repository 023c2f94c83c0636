//! Bibliometric indices (spec.md §6 `/rest/metrics`): pure functions over a
//! merged-publication list, plus the query that assembles it.

use serde::Serialize;

use citescope_core::error::StoreResult;

use crate::catalog::MergedPublication;
use crate::Store;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Metrics {
    pub h_index: i64,
    pub g_index: i64,
    pub e_index: f64,
    /// `i_indices[k]` = number of publications with at least `k + 1`
    /// citations (spec.md §8 scenario 2's "histogram cascade").
    pub i_indices: [i64; 20],
    pub avg_author_count: f64,
    pub pub_count: i64,
}

pub fn compute_metrics(publications: &[MergedPublication]) -> Metrics {
    let mut counts: Vec<i64> = publications.iter().map(|p| p.citation_count).collect();
    counts.sort_unstable_by(|a, b| b.cmp(a));

    let avg_author_count = if publications.is_empty() {
        0.0
    } else {
        publications.iter().map(|p| p.author_count as f64).sum::<f64>() / publications.len() as f64
    };

    Metrics {
        h_index: h_index(&counts),
        g_index: g_index(&counts),
        e_index: e_index(&counts),
        i_indices: i_indices(&counts),
        avg_author_count,
        pub_count: publications.len() as i64,
    }
}

/// Largest `h` such that `h` publications have at least `h` citations each.
fn h_index(sorted_desc: &[i64]) -> i64 {
    let mut h = 0;
    for (i, &count) in sorted_desc.iter().enumerate() {
        if count >= (i as i64 + 1) {
            h = i as i64 + 1;
        } else {
            break;
        }
    }
    h
}

/// Largest `g` such that the top `g` publications together have at least
/// `g^2` citations (Egghe's g-index; always >= h-index).
fn g_index(sorted_desc: &[i64]) -> i64 {
    let mut cumulative: i64 = 0;
    let mut g = 0;
    for (i, &count) in sorted_desc.iter().enumerate() {
        cumulative += count;
        let rank = i as i64 + 1;
        if cumulative >= rank * rank {
            g = rank;
        } else {
            break;
        }
    }
    g
}

/// sqrt of the citations in the h-core beyond what the h-index alone needed
/// (Zhang's e-index; distinguishes authors with the same h-index).
fn e_index(sorted_desc: &[i64]) -> f64 {
    let h = h_index(sorted_desc);
    let excess: i64 = sorted_desc.iter().take(h as usize).map(|&count| count - h).sum();
    (excess.max(0) as f64).sqrt()
}

/// Cell `k` counts publications with `>= k + 1` citations (cascading: cell 0
/// is "at least one citation", cell 19 is "at least twenty").
fn i_indices(sorted_desc: &[i64]) -> [i64; 20] {
    let mut cells = [0i64; 20];
    for (k, cell) in cells.iter_mut().enumerate() {
        let threshold = k as i64 + 1;
        *cell = sorted_desc.iter().filter(|&&count| count >= threshold).count() as i64;
    }
    cells
}

impl Store {
    pub async fn metrics_for_user(&self, user_id: i64) -> StoreResult<Metrics> {
        let publications = self.merged_publications(user_id).await?;
        Ok(compute_metrics(&publications))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn publication(citation_count: i64, author_count: i64) -> MergedPublication {
        MergedPublication {
            name: "Paper".to_string(),
            year: Some(2020),
            sources: vec!["scholar".to_string()],
            citation_count,
            author_count,
        }
    }

    #[test]
    fn h_index_of_classic_example() {
        // 10, 8, 5, 4, 3 citations -> h-index 4 (4 papers with >= 4 citations each)
        let pubs: Vec<_> = [10, 8, 5, 4, 3].iter().map(|&c| publication(c, 1)).collect();
        let metrics = compute_metrics(&pubs);
        assert_eq!(metrics.h_index, 4);
    }

    #[test]
    fn g_index_is_at_least_h_index() {
        let pubs: Vec<_> = [25, 8, 5, 3, 3, 2, 0].iter().map(|&c| publication(c, 1)).collect();
        let metrics = compute_metrics(&pubs);
        assert!(metrics.g_index >= metrics.h_index);
    }

    #[test]
    fn e_index_is_zero_when_h_core_is_exactly_h_each() {
        let pubs: Vec<_> = [3, 3, 3].iter().map(|&c| publication(c, 1)).collect();
        let metrics = compute_metrics(&pubs);
        assert_eq!(metrics.h_index, 3);
        assert_eq!(metrics.e_index, 0.0);
    }

    #[test]
    fn empty_catalog_yields_zeroed_metrics() {
        let metrics = compute_metrics(&[]);
        assert_eq!(metrics.h_index, 0);
        assert_eq!(metrics.g_index, 0);
        assert_eq!(metrics.e_index, 0.0);
        assert_eq!(metrics.i_indices, [0i64; 20]);
        assert_eq!(metrics.avg_author_count, 0.0);
        assert_eq!(metrics.pub_count, 0);
    }

    #[test]
    fn single_publication_with_three_citations_cascades_histogram() {
        // spec.md §8 scenario 2: one by-self publication with 3 citations.
        let pubs = vec![publication(3, 2)];
        let metrics = compute_metrics(&pubs);
        assert_eq!(metrics.h_index, 1);
        assert_eq!(metrics.g_index, 1);
        assert_eq!(&metrics.i_indices[0..3], &[1, 1, 1]);
        assert!(metrics.i_indices[3..].iter().all(|&c| c == 0));
    }

    #[test]
    fn avg_author_count_averages_across_publications() {
        let pubs = vec![publication(1, 2), publication(1, 4)];
        let metrics = compute_metrics(&pubs);
        assert_eq!(metrics.avg_author_count, 3.0);
    }
}
