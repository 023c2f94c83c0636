//! Typed errors shared across the crawl, store, and auth paths.

use thiserror::Error;

/// Errors that can occur while a source adapter executes a single `step`.
#[derive(Debug, Error)]
pub enum CrawlError {
    /// Security validation failed (SSRF guard, disallowed scheme, ...).
    #[error("security error: {0}")]
    Security(#[from] SecurityError),

    /// The remote HTTP request failed or returned a non-success status.
    #[error("HTTP error: {0}")]
    Http(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The adapter detected a page shape it can't parse (e.g. a CAPTCHA wall).
    #[error("fatal remote signal: {0}")]
    FatalSignal(String),

    /// Malformed URL supplied as a source field value.
    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },

    /// An adapter-declared field failed validation.
    #[error("invalid field {field}: {reason}")]
    InvalidField { field: String, reason: String },
}

/// Result type alias for crawl operations.
pub type CrawlResult<T> = std::result::Result<T, CrawlError>;

/// Security-related errors, primarily for SSRF protection.
#[derive(Debug, Error)]
pub enum SecurityError {
    #[error("disallowed URL scheme: {0}")]
    DisallowedScheme(String),

    #[error("blocked host: {0}")]
    BlockedHost(String),

    #[error("blocked IP range: {0}")]
    BlockedCidr(String),

    #[error("URL has no host")]
    NoHost,

    #[error("DNS resolution failed: {0}")]
    DnsResolution(String),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
}

pub type SecurityResult<T> = std::result::Result<T, SecurityError>;

/// Errors surfaced by the Store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("zip export failed: {0}")]
    Export(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors surfaced by user registration/login/session handling.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("username must match ^[a-z]+$ and be at most 128 characters")]
    InvalidUsername,

    #[error("password must be between 5 and 128 characters")]
    InvalidPassword,

    #[error("username already registered")]
    UsernameTaken,

    #[error("invalid username or password")]
    WrongCredentials,

    #[error("missing or invalid auth token")]
    MissingToken,

    #[error("registration is not open to this address")]
    NotWhitelisted,

    #[error("too many requests, try again later")]
    RateLimited,

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type AuthResult<T> = std::result::Result<T, AuthError>;
