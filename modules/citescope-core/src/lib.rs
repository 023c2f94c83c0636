pub mod adapter;
pub mod config;
pub mod content_address;
pub mod error;
pub mod http_client;
pub mod rate_limit;
pub mod security;
pub mod types;

pub use adapter::{Adapter, AdapterRegistry};
pub use config::{AppConfig, FileConfig};
pub use error::{AuthError, AuthResult, CrawlError, CrawlResult, SecurityError, SecurityResult, StoreError, StoreResult};
pub use http_client::{build_client, html_to_plain_text};
pub use rate_limit::RateLimiter;
pub use security::UrlValidator;
pub use types::{AuthorRecord, AuthorRef, FieldSpec, PublicationRecord, StageState, Step};
