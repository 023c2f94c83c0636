//! INI-style configuration file (spec.md §6) plus environment-sourced
//! secrets, mirroring the teacher's split between a checked-in file config
//! and env-var secrets (`file_config::FileConfig` / `config::AppConfig`).

use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Config loaded from the INI file passed on the command line.
#[derive(Debug, Clone, Default)]
pub struct FileConfig {
    pub storage: StorageConfig,
    pub www: WwwConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default)]
pub struct StorageConfig {
    pub path: String,
    /// Read-only mode toggle: when `false` the Scheduler never steps sources.
    pub crawler: bool,
}

#[derive(Debug, Clone, Default)]
pub struct WwwConfig {
    pub root: String,
    pub port: u16,
    pub unix_socket_path: Option<String>,
    pub chown_unix_socket: bool,
    pub secure: bool,
}

#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    pub fail_retry_delay: Duration,
    pub whitelist: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
    /// Per-module override string fed straight into `tracing_subscriber::EnvFilter`.
    pub levels: Option<String>,
}

/// Parse a delay string: a bare integer is seconds; an integer with suffix
/// `s|m|h|d` scales accordingly (spec.md §6 "Delay strings").
pub fn parse_delay(raw: &str) -> Result<Duration> {
    let raw = raw.trim();
    if raw.is_empty() {
        bail!("empty delay string");
    }
    let (number, unit) = match raw.chars().last().unwrap() {
        c if c.is_ascii_digit() => (raw, 's'),
        c @ ('s' | 'm' | 'h' | 'd') => (&raw[..raw.len() - 1], c),
        other => bail!("unknown delay suffix: {other}"),
    };
    let value: u64 = number
        .parse()
        .with_context(|| format!("invalid delay number: {raw}"))?;
    let seconds = match unit {
        's' => value,
        'm' => value * 60,
        'h' => value * 3600,
        'd' => value * 86_400,
        _ => unreachable!(),
    };
    Ok(Duration::from_secs(seconds))
}

/// Minimal INI parser: `[section]` headers, `key = value` lines, `#`/`;` comments.
fn parse_ini(content: &str) -> HashMap<String, HashMap<String, String>> {
    let mut sections: HashMap<String, HashMap<String, String>> = HashMap::new();
    let mut current = String::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(stripped) = line.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            current = stripped.trim().to_string();
            sections.entry(current.clone()).or_default();
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            sections
                .entry(current.clone())
                .or_default()
                .insert(key.trim().to_string(), value.trim().to_string());
        }
    }

    sections
}

fn get<'a>(sections: &'a HashMap<String, HashMap<String, String>>, section: &str, key: &str) -> Option<&'a str> {
    sections.get(section)?.get(key).map(|s| s.as_str())
}

fn get_bool(sections: &HashMap<String, HashMap<String, String>>, section: &str, key: &str, default: bool) -> bool {
    match get(sections, section, key) {
        Some(v) => matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        None => default,
    }
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let sections = parse_ini(content);

        let storage = StorageConfig {
            path: get(&sections, "storage", "path").unwrap_or("./citescope.sqlite").to_string(),
            crawler: get_bool(&sections, "storage", "crawler", true),
        };

        let www = WwwConfig {
            root: get(&sections, "www", "root").unwrap_or("./public").to_string(),
            port: get(&sections, "www", "port")
                .map(|p| p.parse())
                .transpose()
                .context("www.port must be a valid u16")?
                .unwrap_or(8080),
            unix_socket_path: get(&sections, "www", "unix_socket_path").map(String::from),
            chown_unix_socket: get_bool(&sections, "www", "chown_unix_socket", false),
            secure: get_bool(&sections, "www", "secure", false),
        };

        let auth = AuthConfig {
            fail_retry_delay: match get(&sections, "auth", "fail_retry_delay") {
                Some(raw) => parse_delay(raw)?,
                None => Duration::from_secs(1),
            },
            whitelist: get(&sections, "auth", "whitelist").map(|raw| {
                raw.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            }),
        };

        let logging = LoggingConfig {
            level: get(&sections, "logging", "level").unwrap_or("info").to_string(),
            file: get(&sections, "logging", "file").map(String::from),
            levels: get(&sections, "logging", "levels").map(String::from),
        };

        Ok(Self { storage, www, auth, logging })
    }
}

/// Secrets and env-specific values that never belong in the checked-in INI
/// file (mirrors the teacher's `AppConfig::from_env` split).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    /// HMAC key signing session cookies (spec.md §6). Rotating it invalidates
    /// every outstanding session at once, same as bumping every user's
    /// `token_version`.
    pub session_secret: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Ok(Self {
            database_url: std::env::var("DATABASE_URL")
                .context("DATABASE_URL must be set")?,
            session_secret: std::env::var("SESSION_SECRET")
                .context("SESSION_SECRET must be set")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_integer_as_seconds() {
        assert_eq!(parse_delay("30").unwrap(), Duration::from_secs(30));
    }

    #[test]
    fn parses_suffixed_delays() {
        assert_eq!(parse_delay("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_delay("2h").unwrap(), Duration::from_secs(7200));
        assert_eq!(parse_delay("1d").unwrap(), Duration::from_secs(86_400));
        assert_eq!(parse_delay("10s").unwrap(), Duration::from_secs(10));
    }

    #[test]
    fn rejects_unknown_suffix() {
        assert!(parse_delay("5x").is_err());
    }

    #[test]
    fn parses_full_config() {
        let content = r#"
            [storage]
            path = /var/lib/citescope/db
            crawler = true

            [www]
            root = /srv/citescope
            secure = yes

            [auth]
            fail_retry_delay = 2s
            whitelist = alice,bob

            [logging]
            level = info
            file = /var/log/citescope.log
            levels = citescope_scheduler=debug
        "#;
        let config = FileConfig::parse(content).unwrap();
        assert_eq!(config.storage.path, "/var/lib/citescope/db");
        assert!(config.storage.crawler);
        assert!(config.www.secure);
        assert_eq!(config.auth.fail_retry_delay, Duration::from_secs(2));
        assert_eq!(config.auth.whitelist, Some(vec!["alice".to_string(), "bob".to_string()]));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn whitelist_is_none_when_unset() {
        let config = FileConfig::parse("[auth]\nfail_retry_delay = 1s\n").unwrap();
        assert_eq!(config.auth.whitelist, None);
    }
}
