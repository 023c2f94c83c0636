//! Core domain types shared between adapters, the scheduler, and the store:
//! `Stage`/`Step` (spec.md §4.1), and the record shapes a `Step` harvests.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::time::Duration;

/// A user-declared input field an adapter needs (e.g. a profile URL),
/// surfaced by `/rest/user/profile`.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub key: &'static str,
    pub description: &'static str,
}

/// The on-disk shape of an adapter's persisted task state: the adapter's own
/// fields flattened alongside a stable stage discriminator and an optional
/// consecutive-error counter (spec.md §6 "Stored task-state format").
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct StageState {
    #[serde(rename = "_index")]
    pub index: u32,
    #[serde(rename = "_error", skip_serializing_if = "Option::is_none")]
    pub error: Option<u32>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl StageState {
    pub fn new(index: u32, fields: Map<String, Value>) -> Self {
        Self {
            index,
            error: None,
            fields,
        }
    }

    pub fn error_count(&self) -> u32 {
        self.error.unwrap_or(0)
    }

    pub fn with_error(mut self, error: Option<u32>) -> Self {
        self.error = error;
        self
    }
}

/// Year 0 (and other unparseable year strings) are normalized to `None`
/// rather than propagated as an error (spec.md §4.1 "Year 0 is normalized").
pub fn normalize_year(year: Option<i32>) -> Option<i32> {
    match year {
        Some(0) => None,
        other => other,
    }
}

/// An author record as discovered by an adapter. May appear embedded inside
/// a `PublicationRecord.authors` slot before `Step::fix_authors` runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthorRecord {
    pub path: String,
    pub full_name: String,
    pub id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[serde(default)]
    pub extra: Value,
}

impl AuthorRecord {
    pub fn new(id: Option<String>, full_name: impl Into<String>) -> Self {
        let full_name = full_name.into();
        let path = crate::content_address::author_path(id.as_deref(), &full_name);
        Self {
            path,
            full_name,
            id,
            first_name: None,
            last_name: None,
            extra: Value::Null,
        }
    }
}

/// A reference to an author from a publication: either already resolved to a
/// `path`, or still carrying the full embedded record (spec.md §4.1's author
/// path embedding convenience — must be gone after `fix_authors`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum AuthorRef {
    Path(String),
    Embedded(AuthorRecord),
}

impl AuthorRef {
    pub fn path(&self) -> &str {
        match self {
            AuthorRef::Path(p) => p,
            AuthorRef::Embedded(rec) => &rec.path,
        }
    }
}

/// A publication record as discovered by an adapter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublicationRecord {
    pub path: String,
    pub by_self: bool,
    pub name: String,
    pub id: Option<String>,
    pub year: Option<i32>,
    #[serde(rename = "ref")]
    pub reference: Option<String>,
    #[serde(default)]
    pub authors: Vec<AuthorRef>,
    #[serde(default)]
    pub extra: Value,
}

impl PublicationRecord {
    pub fn new(id: Option<String>, name: impl Into<String>, by_self: bool) -> Self {
        let name = name.into();
        let path = crate::content_address::publication_path(id.as_deref(), &name);
        Self {
            path,
            by_self,
            name,
            id,
            year: None,
            reference: None,
            authors: Vec::new(),
            extra: Value::Null,
        }
    }

    pub fn with_year(mut self, year: Option<i32>) -> Self {
        self.year = normalize_year(year);
        self
    }

    pub fn with_authors(mut self, authors: Vec<AuthorRef>) -> Self {
        self.authors = authors;
        self
    }
}

/// The value an adapter returns from one `step` invocation (spec.md §4.1).
#[derive(Debug, Clone, Default)]
pub struct Step {
    /// Seconds until the adapter should run again.
    pub delay: Duration,
    /// Next stage; `None` means "restart from `initial_stage` with the
    /// adapter's full-cycle delay".
    pub stage: Option<StageState>,
    pub authors: Vec<AuthorRecord>,
    pub self_publications: Vec<PublicationRecord>,
    /// `pub_path -> publications that cite it`.
    pub citations: HashMap<String, Vec<PublicationRecord>>,
    /// Consecutive-error counter; `None` on a normal successful step (the
    /// counter resets implicitly). Only the scheduler's retry path sets this.
    pub error: Option<u32>,
}

impl Step {
    pub fn new(delay: Duration, stage: Option<StageState>) -> Self {
        Self {
            delay,
            stage,
            ..Default::default()
        }
    }

    /// Normalize embedded `Author` records inside publication `authors`
    /// slots into plain `path` references, moving the full records into
    /// `Step.authors` and deduplicating by path (spec.md §4.1, §8).
    pub fn fix_authors(&mut self) {
        let mut seen: std::collections::HashSet<String> =
            self.authors.iter().map(|a| a.path.clone()).collect();
        let mut discovered = Vec::new();

        let pubs = self
            .self_publications
            .iter_mut()
            .chain(self.citations.values_mut().flatten());

        for publication in pubs {
            for author_ref in publication.authors.iter_mut() {
                if let AuthorRef::Embedded(record) = author_ref {
                    let path = record.path.clone();
                    if seen.insert(path.clone()) {
                        discovered.push(record.clone());
                    }
                    *author_ref = AuthorRef::Path(path);
                }
            }
        }

        self.authors.extend(discovered);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn embedded_publication() -> PublicationRecord {
        let author = AuthorRecord::new(Some("a1".into()), "Ada Lovelace");
        PublicationRecord::new(Some("p1".into()), "On Computation", true)
            .with_authors(vec![AuthorRef::Embedded(author)])
    }

    #[test]
    fn fix_authors_resolves_embedded_records_to_paths() {
        let mut step = Step::new(Duration::from_secs(60), None);
        step.self_publications.push(embedded_publication());

        step.fix_authors();

        for publication in &step.self_publications {
            for author_ref in &publication.authors {
                assert!(matches!(author_ref, AuthorRef::Path(_)));
            }
        }
        assert_eq!(step.authors.len(), 1);
    }

    #[test]
    fn fix_authors_deduplicates_by_path() {
        let mut step = Step::new(Duration::from_secs(60), None);
        step.self_publications.push(embedded_publication());
        step.self_publications.push(embedded_publication());

        step.fix_authors();

        assert_eq!(step.authors.len(), 1);
    }

    #[test]
    fn year_zero_normalizes_to_none() {
        assert_eq!(normalize_year(Some(0)), None);
        assert_eq!(normalize_year(Some(2020)), Some(2020));
        assert_eq!(normalize_year(None), None);
    }
}
