//! Shared wire shapes and fetch helpers used by every adapter. Per-site HTML
//! and JSON selector logic is deliberately out of scope (spec.md "Non-goals")
//! — these types model the uniform list/detail contract the two stage-graph
//! shapes consume, the way the teacher's `HttpIngestor` consumed a uniform
//! page-fetch contract regardless of which site it crawled.

use serde::Deserialize;
use std::sync::OnceLock;

use citescope_core::error::{CrawlError, CrawlResult};
use citescope_core::types::{AuthorRef, PublicationRecord};
use citescope_core::UrlValidator;

#[derive(Debug, Deserialize)]
pub struct RemoteAuthor {
    pub id: Option<String>,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct RemoteItem {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default, rename = "ref")]
    pub reference: Option<String>,
    #[serde(default)]
    pub authors: Vec<RemoteAuthor>,
}

#[derive(Debug, Deserialize)]
pub struct RemoteList {
    #[serde(default)]
    pub items: Vec<RemoteItem>,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RemoteProfile {
    pub query_handles: Vec<String>,
}

fn validator() -> &'static UrlValidator {
    static V: OnceLock<UrlValidator> = OnceLock::new();
    V.get_or_init(UrlValidator::new)
}

fn http_error(err: reqwest::Error) -> CrawlError {
    CrawlError::Http(Box::new(err))
}

/// GET `url`, validating it against the SSRF blocklist first, and decode the
/// body as JSON of type `T`.
pub async fn fetch_json<T: for<'de> Deserialize<'de>>(
    http: &reqwest::Client,
    url: &str,
) -> CrawlResult<T> {
    validator().validate_with_dns(url).await?;
    let response = http.get(url).send().await.map_err(http_error)?;
    let response = response.error_for_status().map_err(http_error)?;
    response.json::<T>().await.map_err(http_error)
}

pub async fn fetch_list(http: &reqwest::Client, url: &str) -> CrawlResult<RemoteList> {
    fetch_json(http, url).await
}

/// Turn one remote item into a `PublicationRecord`, embedding its authors
/// (resolved to plain paths later by `Step::fix_authors`).
pub fn to_publication_record(item: &RemoteItem, by_self: bool) -> PublicationRecord {
    let authors = item
        .authors
        .iter()
        .map(|a| {
            AuthorRef::Embedded(citescope_core::types::AuthorRecord::new(
                a.id.clone(),
                a.name.clone(),
            ))
        })
        .collect();

    PublicationRecord::new(Some(item.id.clone()), item.title.clone(), by_self)
        .with_year(item.year)
        .with_authors(authors)
        .tap_reference(item.reference.clone())
}

/// Small extension so `to_publication_record` can stay a single expression;
/// `PublicationRecord` has no public setter for `reference` beyond its builders.
trait TapReference {
    fn tap_reference(self, reference: Option<String>) -> Self;
}

impl TapReference for PublicationRecord {
    fn tap_reference(mut self, reference: Option<String>) -> Self {
        self.reference = reference;
        self
    }
}
