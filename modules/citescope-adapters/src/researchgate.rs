use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use citescope_core::error::{CrawlError, CrawlResult};
use citescope_core::types::{FieldSpec, StageState, Step};
use citescope_core::Adapter;

use crate::shape_a::{self, SiteConfig, Stage, PROFILE_FIELD};
use crate::validate_profile_url;

const FIELDS: &[FieldSpec] = &[PROFILE_FIELD];

pub struct ResearchGateAdapter {
    config: SiteConfig,
}

impl Default for ResearchGateAdapter {
    fn default() -> Self {
        Self {
            config: SiteConfig {
                page_size: 20,
                paginate_delay: Duration::from_secs(3),
                phase_delay: Duration::from_secs(5),
                full_cycle_delay: Duration::from_secs(7 * 86_400),
            },
        }
    }
}

#[async_trait]
impl Adapter for ResearchGateAdapter {
    fn namespace(&self) -> &'static str {
        "researchgate"
    }

    fn display_name(&self) -> &'static str {
        "ResearchGate"
    }

    fn fields(&self) -> &'static [FieldSpec] {
        FIELDS
    }

    fn validate_field(&self, key: &str, value: &str) -> Result<(), CrawlError> {
        validate_profile_url(key, value)
    }

    fn initial_stage(&self) -> StageState {
        Stage::initial().encode()
    }

    async fn step(
        &self,
        values: &HashMap<String, String>,
        stage: StageState,
        http: &reqwest::Client,
    ) -> CrawlResult<Step> {
        shape_a::step(&self.config, values, stage, http).await
    }
}
