//! "Paginated-then-detail-then-cites" stage graph (spec.md §4.1): an initial
//! profile fetch yields per-source query handles, a pagination loop over
//! those handles accumulates publication ids, a detail fetch resolves each
//! id to a full record, and finally a per-publication citation-pagination
//! loop runs (identical to `shape_a`'s citations phase). Shared by the
//! Scholar and Academics adapters.

use std::collections::HashMap;
use std::time::Duration;

use serde_json::{json, Map};

use citescope_core::error::{CrawlError, CrawlResult};
use citescope_core::types::{FieldSpec, StageState, Step};

use crate::remote::{fetch_json, fetch_list, to_publication_record, RemoteItem, RemoteProfile};

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
    FetchProfile,
    Paginate { query_handles: Vec<String>, handle_idx: u32, cursor: Option<String>, known_ids: Vec<String> },
    FetchDetail { pending_ids: Vec<String>, done_ids: Vec<String> },
    FetchCitations { missing_ids: Vec<String>, offset: u32 },
}

impl Stage {
    const INDEX_FETCH_PROFILE: u32 = 0;
    const INDEX_PAGINATE: u32 = 1;
    const INDEX_FETCH_DETAIL: u32 = 2;
    const INDEX_FETCH_CITATIONS: u32 = 3;

    pub fn initial() -> Self {
        Stage::FetchProfile
    }

    pub fn encode(&self) -> StageState {
        match self {
            Stage::FetchProfile => StageState::new(Self::INDEX_FETCH_PROFILE, Map::new()),
            Stage::Paginate { query_handles, handle_idx, cursor, known_ids } => StageState::new(
                Self::INDEX_PAGINATE,
                Map::from_iter([
                    ("query_handles".to_string(), json!(query_handles)),
                    ("handle_idx".to_string(), json!(handle_idx)),
                    ("cursor".to_string(), json!(cursor)),
                    ("known_ids".to_string(), json!(known_ids)),
                ]),
            ),
            Stage::FetchDetail { pending_ids, done_ids } => StageState::new(
                Self::INDEX_FETCH_DETAIL,
                Map::from_iter([
                    ("pending_ids".to_string(), json!(pending_ids)),
                    ("done_ids".to_string(), json!(done_ids)),
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
            Self::INDEX_FETCH_PROFILE => Ok(Stage::FetchProfile),
            Self::INDEX_PAGINATE => Ok(Stage::Paginate {
                query_handles: serde_json::from_value(field("query_handles")?).unwrap_or_default(),
                handle_idx: serde_json::from_value(field("handle_idx")?).unwrap_or(0),
                cursor: field("cursor").ok().and_then(|v| serde_json::from_value(v).ok()),
                known_ids: serde_json::from_value(field("known_ids")?).unwrap_or_default(),
            }),
            Self::INDEX_FETCH_DETAIL => Ok(Stage::FetchDetail {
                pending_ids: serde_json::from_value(field("pending_ids")?).unwrap_or_default(),
                done_ids: serde_json::from_value(field("done_ids")?).unwrap_or_default(),
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
        Stage::FetchProfile => {
            let url = format!("{profile_url}?cs_mode=profile");
            let profile: RemoteProfile = fetch_json(http, &url).await?;
            let step = Step::new(
                config.paginate_delay,
                Some(
                    Stage::Paginate {
                        query_handles: profile.query_handles,
                        handle_idx: 0,
                        cursor: None,
                        known_ids: Vec::new(),
                    }
                    .encode(),
                ),
            );
            Ok(step)
        }

        Stage::Paginate { query_handles, handle_idx, cursor, mut known_ids } => {
            if handle_idx as usize >= query_handles.len() {
                let step = Step::new(
                    config.phase_delay,
                    Some(Stage::FetchDetail { pending_ids: known_ids, done_ids: Vec::new() }.encode()),
                );
                return Ok(step);
            }

            let handle = &query_handles[handle_idx as usize];
            let url = format!(
                "{profile_url}?cs_mode=paginate&cs_handle={handle}&cs_cursor={}",
                cursor.as_deref().unwrap_or("")
            );
            let list = fetch_list(http, &url).await?;

            for item in &list.items {
                if !known_ids.contains(&item.id) {
                    known_ids.push(item.id.clone());
                }
            }

            let next = if list.items.is_empty() || list.next_cursor.is_none() {
                Stage::Paginate { query_handles, handle_idx: handle_idx + 1, cursor: None, known_ids }
            } else {
                Stage::Paginate { query_handles, handle_idx, cursor: list.next_cursor, known_ids }
            };
            Ok(Step::new(config.paginate_delay, Some(next.encode())))
        }

        Stage::FetchDetail { mut pending_ids, mut done_ids } => {
            let Some(pub_id) = pending_ids.first().cloned() else {
                let step = Step::new(
                    config.phase_delay,
                    Some(Stage::FetchCitations { missing_ids: done_ids, offset: 0 }.encode()),
                );
                return Ok(step);
            };
            pending_ids.remove(0);

            let url = format!("{profile_url}?cs_mode=detail&cs_id={pub_id}");
            let item: RemoteItem = fetch_json(http, &url).await?;

            let mut step = Step::new(config.paginate_delay, None);
            step.self_publications.push(to_publication_record(&item, true));
            done_ids.push(pub_id);
            step.stage = Some(Stage::FetchDetail { pending_ids, done_ids }.encode());
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
    fn profile_stage_round_trips() {
        let decoded = Stage::decode(&Stage::FetchProfile.encode()).unwrap();
        assert_eq!(decoded, Stage::FetchProfile);
    }

    #[test]
    fn paginate_stage_round_trips_with_cursor() {
        let stage = Stage::Paginate {
            query_handles: vec!["h1".into(), "h2".into()],
            handle_idx: 1,
            cursor: Some("cur".into()),
            known_ids: vec!["p1".into()],
        };
        assert_eq!(Stage::decode(&stage.encode()).unwrap(), stage);
    }

    #[test]
    fn fetch_detail_stage_round_trips() {
        let stage = Stage::FetchDetail { pending_ids: vec!["p2".into()], done_ids: vec!["p1".into()] };
        assert_eq!(Stage::decode(&stage.encode()).unwrap(), stage);
    }

    #[test]
    fn initial_stage_is_fetch_profile() {
        assert_eq!(Stage::initial(), Stage::FetchProfile);
    }
}
