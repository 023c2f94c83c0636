//! One pooled HTTP client shared by the scheduler and every adapter for the
//! lifetime of the process (spec.md §5 "Shared-resource policy").

use std::time::Duration;

pub const USER_AGENT: &str = "CitescopeBot/1.0 (+https://citescope.example/bot)";

pub fn build_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(30))
        .pool_max_idle_per_host(4)
        .build()
}

/// Strip HTML down to plain text for adapters that scrape rendered pages.
pub fn html_to_plain_text(html: &str) -> String {
    html2text::from_read(html.as_bytes(), 120).unwrap_or_default()
}
