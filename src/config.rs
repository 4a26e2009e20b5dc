//! # Configuration Module
//!
//! Runtime configuration for the bot, read once at startup from the
//! environment (optionally populated from a `.env` file) and passed down
//! explicitly to the components that need it.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_SESSION_TTL_SECS: u64 = 24 * 60 * 60;
pub const DEFAULT_COMPANY_PAGE_SIZE: usize = 8;
pub const MAX_COMPANY_PAGE_SIZE: usize = 50;
pub const DEFAULT_STATION_SEARCH_RADIUS_M: f64 = 1000.0;
pub const DEFAULT_WEBHOOK_PORT: u16 = 8443;

/// Errors raised while building [`BotConfig`]
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A required variable is not set
    Missing(&'static str),
    /// A variable is set but cannot be parsed
    Invalid { name: &'static str, value: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Missing(name) => write!(f, "{name} must be set"),
            ConfigError::Invalid { name, value } => {
                write!(f, "{name} has an invalid value: {value:?}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Where durable photo references come from
#[derive(Debug, Clone, PartialEq)]
pub enum MediaMode {
    /// Keep the photo on Telegram and store a token-free file reference
    TelegramFile,
    /// Download the file and keep it under the given directory
    Archive(PathBuf),
}

/// How updates reach the bot
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Transport {
    /// Long polling `getUpdates`
    #[default]
    Polling,
    /// Telegram pushes updates to `url`, served locally on `port`
    Webhook { url: reqwest::Url, port: u16 },
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

/// Bot configuration
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub telegram_token: String,
    pub database_url: String,
    pub database_max_connections: u32,
    pub media: MediaMode,
    pub transport: Transport,
    /// `None` keeps sessions forever
    pub session_ttl: Option<Duration>,
    pub company_page_size: usize,
    pub station_search_radius_m: f64,
    pub log_format: LogFormat,
}

impl BotConfig {
    /// Build the configuration from process environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .ok_or(ConfigError::Missing(name))
        };

        let telegram_token = required("TELEGRAM_BOT_TOKEN")?;
        let database_url = required("DATABASE_URL")?;

        let database_max_connections = parse_or(
            &lookup,
            "DATABASE_MAX_CONNECTIONS",
            DEFAULT_DATABASE_MAX_CONNECTIONS,
        )?;
        if database_max_connections == 0 {
            return Err(ConfigError::Invalid {
                name: "DATABASE_MAX_CONNECTIONS",
                value: "0".to_string(),
            });
        }

        let media = match lookup("MEDIA_ARCHIVE_DIR").filter(|dir| !dir.trim().is_empty()) {
            Some(dir) => MediaMode::Archive(PathBuf::from(dir)),
            None => MediaMode::TelegramFile,
        };

        let transport = match lookup("WEBHOOK_URL").filter(|url| !url.trim().is_empty()) {
            Some(raw) => {
                let url = reqwest::Url::parse(raw.trim()).map_err(|_| ConfigError::Invalid {
                    name: "WEBHOOK_URL",
                    value: raw.clone(),
                })?;
                let port = parse_or(&lookup, "PORT", DEFAULT_WEBHOOK_PORT)?;
                Transport::Webhook { url, port }
            }
            None => Transport::Polling,
        };

        let ttl_secs = parse_or(&lookup, "SESSION_TTL_SECS", DEFAULT_SESSION_TTL_SECS)?;
        let session_ttl = (ttl_secs > 0).then(|| Duration::from_secs(ttl_secs));

        let company_page_size =
            parse_or(&lookup, "COMPANY_PAGE_SIZE", DEFAULT_COMPANY_PAGE_SIZE)?;
        if company_page_size == 0 || company_page_size > MAX_COMPANY_PAGE_SIZE {
            return Err(ConfigError::Invalid {
                name: "COMPANY_PAGE_SIZE",
                value: company_page_size.to_string(),
            });
        }

        let station_search_radius_m = parse_or(
            &lookup,
            "STATION_SEARCH_RADIUS_M",
            DEFAULT_STATION_SEARCH_RADIUS_M,
        )?;
        if !station_search_radius_m.is_finite() || station_search_radius_m <= 0.0 {
            return Err(ConfigError::Invalid {
                name: "STATION_SEARCH_RADIUS_M",
                value: station_search_radius_m.to_string(),
            });
        }

        let log_format = match lookup("LOG_FORMAT").as_deref().map(str::trim) {
            None | Some("") | Some("plain") => LogFormat::Plain,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "LOG_FORMAT",
                    value: other.to_string(),
                })
            }
        };

        Ok(Self {
            telegram_token,
            database_url,
            database_max_connections,
            media,
            transport,
            session_ttl,
            company_page_size,
            station_search_radius_m,
            log_format,
        })
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        None => Ok(default),
        Some(value) if value.trim().is_empty() => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    const BASE: [(&str, &str); 2] = [
        ("TELEGRAM_BOT_TOKEN", "123:abc"),
        ("DATABASE_URL", "postgres://localhost/stella"),
    ];

    #[test]
    fn test_defaults() {
        let config = BotConfig::from_lookup(lookup_from(&BASE)).unwrap();

        assert_eq!(config.telegram_token, "123:abc");
        assert_eq!(config.database_max_connections, DEFAULT_DATABASE_MAX_CONNECTIONS);
        assert_eq!(config.media, MediaMode::TelegramFile);
        assert_eq!(config.transport, Transport::Polling);
        assert_eq!(
            config.session_ttl,
            Some(Duration::from_secs(DEFAULT_SESSION_TTL_SECS))
        );
        assert_eq!(config.company_page_size, DEFAULT_COMPANY_PAGE_SIZE);
        assert_eq!(config.log_format, LogFormat::Plain);
    }

    #[test]
    fn test_missing_token() {
        let result = BotConfig::from_lookup(lookup_from(&[("DATABASE_URL", "postgres://x")]));
        assert_eq!(result.unwrap_err(), ConfigError::Missing("TELEGRAM_BOT_TOKEN"));
    }

    #[test]
    fn test_overrides() {
        let mut pairs = BASE.to_vec();
        pairs.extend([
            ("MEDIA_ARCHIVE_DIR", "/var/lib/stella/photos"),
            ("SESSION_TTL_SECS", "0"),
            ("COMPANY_PAGE_SIZE", "12"),
            ("LOG_FORMAT", "json"),
        ]);
        let config = BotConfig::from_lookup(lookup_from(&pairs)).unwrap();

        assert_eq!(
            config.media,
            MediaMode::Archive(PathBuf::from("/var/lib/stella/photos"))
        );
        assert_eq!(config.session_ttl, None);
        assert_eq!(config.company_page_size, 12);
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_invalid_values() {
        let mut pairs = BASE.to_vec();
        pairs.push(("COMPANY_PAGE_SIZE", "lots"));
        let err = BotConfig::from_lookup(lookup_from(&pairs)).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                name: "COMPANY_PAGE_SIZE",
                value: "lots".to_string()
            }
        );
        assert_eq!(
            err.to_string(),
            "COMPANY_PAGE_SIZE has an invalid value: \"lots\""
        );

        let mut pairs = BASE.to_vec();
        pairs.push(("COMPANY_PAGE_SIZE", "0"));
        assert!(BotConfig::from_lookup(lookup_from(&pairs)).is_err());
    }

    #[test]
    fn test_webhook_transport() {
        let mut pairs = BASE.to_vec();
        pairs.extend([
            ("WEBHOOK_URL", "https://stella.example.org/webhook"),
            ("PORT", "8080"),
        ]);
        let config = BotConfig::from_lookup(lookup_from(&pairs)).unwrap();
        assert_eq!(
            config.transport,
            Transport::Webhook {
                url: reqwest::Url::parse("https://stella.example.org/webhook").unwrap(),
                port: 8080,
            }
        );

        let mut pairs = BASE.to_vec();
        pairs.push(("WEBHOOK_URL", "https://stella.example.org/webhook"));
        let config = BotConfig::from_lookup(lookup_from(&pairs)).unwrap();
        assert!(matches!(
            config.transport,
            Transport::Webhook { port: DEFAULT_WEBHOOK_PORT, .. }
        ));

        // PORT alone does not switch away from polling
        let mut pairs = BASE.to_vec();
        pairs.push(("PORT", "8080"));
        let config = BotConfig::from_lookup(lookup_from(&pairs)).unwrap();
        assert_eq!(config.transport, Transport::Polling);
    }

    #[test]
    fn test_invalid_webhook_settings() {
        let mut pairs = BASE.to_vec();
        pairs.push(("WEBHOOK_URL", "not a url"));
        assert_eq!(
            BotConfig::from_lookup(lookup_from(&pairs)).unwrap_err(),
            ConfigError::Invalid {
                name: "WEBHOOK_URL",
                value: "not a url".to_string()
            }
        );

        let mut pairs = BASE.to_vec();
        pairs.extend([
            ("WEBHOOK_URL", "https://stella.example.org/webhook"),
            ("PORT", "70000"),
        ]);
        assert_eq!(
            BotConfig::from_lookup(lookup_from(&pairs)).unwrap_err(),
            ConfigError::Invalid {
                name: "PORT",
                value: "70000".to_string()
            }
        );
    }
}
