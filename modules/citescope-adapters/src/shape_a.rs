//! "Pubs-then-cites" stage graph (spec.md §4.1): a publication-list
//! pagination loop, then a per-publication citation-list pagination loop,
//! consuming `missing_ids` one at a time. Shared by the AMiner, Dimensions,
//! IEEE Xplore, and ResearchGate adapters — they differ only in endpoint
//! shape and timing, never in this state machine.

use std::collections::HashMap;
use std::time::Duration;

use serde_json::{json, Map};

use citescope_core::error::{CrawlError, CrawlResult};
use citescope_core::types::{FieldSpec, StageState, Step};

use crate::remote::{fetch_list, to_publication_record};

pub const PROFILE_FIELD: FieldSpec = FieldSpec {
    key: "profile_url",
    description: "Public profile URL on this source",
};

pub struct SiteConfig {
    pub page_size: u32,
    pub paginate_delay: Duration,
    pub phase_delay: Duration,
    pub full_cycle_delay: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    FetchPublications { offset: u32, known_ids: Vec<String> },
    FetchCitations { missing_ids: Vec<String>, offset: u32 },
}

impl Stage {
    const INDEX_FETCH_PUBLICATIONS: u32 = 0;
    const INDEX_FETCH_CITATIONS: u32 = 1;

    pub fn initial() -> Self {
        Stage::FetchPublications { offset: 0, known_ids: Vec::new() }
    }

    pub fn encode(&self) -> StageState {
        match self {
            Stage::FetchPublications { offset, known_ids } => StageState::new(
                Self::INDEX_FETCH_PUBLICATIONS,
                Map::from_iter([
                    ("offset".to_string(), json!(offset)),
                    ("known_ids".to_string(), json!(known_ids)),
                ]),
            ),
            Stage::FetchCitations { missing_ids, offset } => StageState::new(
                Self::INDEX_FETCH_CITATIONS,
                Map::from_iter([
                    ("missing_ids".to_string(), json!(missing_ids)),
                    ("offset".to_string(), json!(offset)),
                ]),
            ),
        }
    }

    pub fn decode(state: &StageState) -> CrawlResult<Self> {
        let field = |key: &str| -> CrawlResult<serde_json::Value> {
            state
                .fields
                .get(key)
                .cloned()
                .ok_or_else(|| CrawlError::InvalidField {
                    field: key.to_string(),
                    reason: "missing from stored stage".to_string(),
                })
        };
        match state.index {
            Self::INDEX_FETCH_PUBLICATIONS => Ok(Stage::FetchPublications {
                offset: serde_json::from_value(field("offset")?).unwrap_or(0),
                known_ids: serde_json::from_value(field("known_ids")?).unwrap_or_default(),
            }),
            Self::INDEX_FETCH_CITATIONS => Ok(Stage::FetchCitations {
                missing_ids: serde_json::from_value(field("missing_ids")?).unwrap_or_default(),
                offset: serde_json::from_value(field("offset")?).unwrap_or(0),
            }),
            other => Err(CrawlError::FatalSignal(format!("unknown stage index {other}"))),
        }
    }
}

pub async fn step(
    config: &SiteConfig,
    values: &HashMap<String, String>,
    stage: StageState,
    http: &reqwest::Client,
) -> CrawlResult<Step> {
    let profile_url = values.get(PROFILE_FIELD.key).ok_or_else(|| CrawlError::InvalidField {
        field: PROFILE_FIELD.key.to_string(),
        reason: "no profile URL on record".to_string(),
    })?;

    match Stage::decode(&stage)? {
        Stage::FetchPublications { offset, mut known_ids } => {
            let url = format!(
                "{profile_url}?cs_mode=publications&cs_offset={offset}&cs_limit={}",
                config.page_size
            );
            let list = fetch_list(http, &url).await?;

            let mut step = Step::new(config.paginate_delay, None);
            for item in &list.items {
                if known_ids.contains(&item.id) {
                    continue;
                }
                known_ids.push(item.id.clone());
                step.self_publications.push(to_publication_record(item, true));
            }

            let next = if list.items.is_empty() {
                step.delay = config.phase_delay;
                Stage::FetchCitations { missing_ids: known_ids, offset: 0 }
            } else {
                Stage::FetchPublications { offset: offset + list.items.len() as u32, known_ids }
            };
            step.stage = Some(next.encode());
            Ok(step)
        }

        Stage::FetchCitations { mut missing_ids, offset } => {
            let Some(pub_id) = missing_ids.first().cloned() else {
                return Ok(Step::new(config.full_cycle_delay, None));
            };

            let url = format!(
                "{profile_url}?cs_mode=citations&cs_for={pub_id}&cs_offset={offset}&cs_limit={}",
                config.page_size
            );
            let list = fetch_list(http, &url).await?;

            let mut step = Step::new(config.paginate_delay, None);
            let citing = list.items.iter().map(|item| to_publication_record(item, false)).collect();
            let pub_path = citescope_core::content_address::publication_path(Some(&pub_id), "");
            step.citations.insert(pub_path, citing);

            let exhausted = list.items.is_empty() || list.next_cursor.is_none();
            let next = if exhausted {
                missing_ids.remove(0);
                Stage::FetchCitations { missing_ids, offset: 0 }
            } else {
                Stage::FetchCitations { missing_ids, offset: offset + list.items.len() as u32 }
            };
            step.stage = Some(next.encode());
            Ok(step)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publications_stage_round_trips_through_encode_decode() {
        let stage = Stage::FetchPublications { offset: 20, known_ids: vec!["a".into(), "b".into()] };
        let decoded = Stage::decode(&stage.encode()).unwrap();
        assert_eq!(stage, decoded);
    }

    #[test]
    fn citations_stage_round_trips_through_encode_decode() {
        let stage = Stage::FetchCitations { missing_ids: vec!["p1".into()], offset: 40 };
        let decoded = Stage::decode(&stage.encode()).unwrap();
        assert_eq!(stage, decoded);
    }

    #[test]
    fn initial_stage_is_fetch_publications_at_offset_zero() {
        assert_eq!(Stage::initial(), Stage::FetchPublications { offset: 0, known_ids: vec![] });
    }

    #[test]
    fn unknown_index_is_rejected() {
        let bad = StageState::new(9, Map::new());
        assert!(Stage::decode(&bad).is_err());
    }
}
