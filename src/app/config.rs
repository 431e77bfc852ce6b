use core::time::Duration;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::app::constant::*;
use crate::common::utils::{ParseFromEnv, lookup_trimmed, parse_from_lookup};

/// How reply text is obtained from the assistant service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpstreamMode {
    /// Consume the run's incremental event stream.
    #[default]
    Stream,
    /// Start the run, poll until it is terminal, then fetch the reply once.
    Poll,
}

impl UpstreamMode {
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stream => "stream",
            Self::Poll => "poll",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "stream" | "streaming" => Some(Self::Stream),
            "poll" | "polling" => Some(Self::Poll),
            _ => None,
        }
    }
}

/// Bearer credential for the assistant service. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    #[inline]
    pub fn new(key: impl Into<String>) -> Self { Self(key.into()) }

    #[inline]
    pub fn expose(&self) -> &str { &self.0 }
}

impl core::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result { f.write_str("ApiKey(***)") }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    pub max_attempts: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub ttl: Duration,
    pub idempotency_limit: usize,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: ApiKey,
    pub assistant_id: String,
    pub host: String,
    pub port: u16,
    pub upstream_base_url: String,
    pub upstream_mode: UpstreamMode,
    pub poll: PollConfig,
    pub session: SessionConfig,
    pub request_body_limit: usize,
}

/// Optional tunables read from a TOML file. Secrets are env-only.
#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub upstream_base_url: Option<String>,
    pub upstream_mode: Option<UpstreamMode>,
    pub poll_interval_ms: Option<u64>,
    pub poll_max_attempts: Option<u32>,
    pub session_ttl_secs: Option<u64>,
    pub idempotency_limit: Option<usize>,
    pub request_body_limit: Option<usize>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required configuration: {}", .0.join(", "))]
    Missing(Vec<&'static str>),

    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },

    #[error("failed to read config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl FileConfig {
    pub fn from_toml(path: &Path, text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse { path: path.to_owned(), source })
    }

    /// Reads `path`. A missing file is only an error when it was named explicitly.
    pub fn load(path: &Path, explicit: bool) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::from_toml(path, &text),
            Err(e) if !explicit && e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Io { path: path.to_owned(), source }),
        }
    }
}

impl Config {
    /// Loads configuration from the process environment and the optional config file.
    pub fn load() -> Result<Self, ConfigError> {
        let lookup = |key: &str| ::std::env::var(key).ok();
        let (path, explicit) = match lookup_trimmed(lookup, ENV_CONFIG_FILE) {
            Some(path) => (PathBuf::from(path), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };
        let file = FileConfig::load(&path, explicit)?;
        Self::from_lookup(lookup, file)
    }

    /// Builds a configuration from `lookup` layered over `file`.
    ///
    /// Every missing secret is reported at once.
    pub fn from_lookup<L>(lookup: L, file: FileConfig) -> Result<Self, ConfigError>
    where L: Fn(&str) -> Option<String> {
        let api_key = lookup_trimmed(&lookup, ENV_OPENAI_API_KEY);
        let assistant_id = lookup_trimmed(&lookup, ENV_ASSISTANT_ID);

        let (api_key, assistant_id) = match (api_key, assistant_id) {
            (Some(key), Some(id)) => (ApiKey(key), id),
            (key, id) => {
                let mut missing = Vec::with_capacity(2);
                if key.is_none() {
                    missing.push(ENV_OPENAI_API_KEY);
                }
                if id.is_none() {
                    missing.push(ENV_ASSISTANT_ID);
                }
                return Err(ConfigError::Missing(missing));
            }
        };

        let upstream_mode = match lookup_trimmed(&lookup, ENV_UPSTREAM_MODE) {
            Some(value) => UpstreamMode::parse(&value)
                .ok_or(ConfigError::Invalid { key: ENV_UPSTREAM_MODE, value })?,
            None => file.upstream_mode.unwrap_or_default(),
        };

        let port = strict(&lookup, ENV_PORT, file.port.unwrap_or(DEFAULT_PORT))?;

        let poll = PollConfig {
            interval: Duration::from_millis(layered(
                &lookup,
                ENV_POLL_INTERVAL_MS,
                file.poll_interval_ms,
                DEFAULT_POLL_INTERVAL_MS,
            )),
            max_attempts: layered(
                &lookup,
                ENV_POLL_MAX_ATTEMPTS,
                file.poll_max_attempts,
                DEFAULT_POLL_MAX_ATTEMPTS,
            )
            .max(1),
        };

        let session = SessionConfig {
            ttl: Duration::from_secs(
                layered(&lookup, ENV_SESSION_TTL_SECS, file.session_ttl_secs, DEFAULT_SESSION_TTL_SECS)
                    .max(1),
            ),
            idempotency_limit: layered(
                &lookup,
                ENV_IDEMPOTENCY_LIMIT,
                file.idempotency_limit,
                DEFAULT_IDEMPOTENCY_LIMIT,
            )
            .max(1),
        };

        let upstream_base_url = lookup_trimmed(&lookup, ENV_UPSTREAM_BASE_URL)
            .or(file.upstream_base_url)
            .unwrap_or_else(|| DEFAULT_UPSTREAM_BASE_URL.to_owned());

        Ok(Self {
            api_key,
            assistant_id,
            host: lookup_trimmed(&lookup, ENV_HOST)
                .or(file.host)
                .unwrap_or_else(|| DEFAULT_HOST.to_owned()),
            port,
            upstream_base_url: upstream_base_url.trim_end_matches('/').to_owned(),
            upstream_mode,
            poll,
            session,
            request_body_limit: layered(
                &lookup,
                ENV_REQUEST_BODY_LIMIT,
                file.request_body_limit,
                DEFAULT_REQUEST_BODY_LIMIT,
            ),
        })
    }
}

/// env > file > built-in default; unparsable env values fall back.
#[inline]
fn layered<T, L>(lookup: L, key: &str, file: Option<T>, default: T) -> T
where
    T: ParseFromEnv,
    L: Fn(&str) -> Option<String>,
{
    parse_from_lookup(lookup, key, file.unwrap_or(default))
}

/// Like [`layered`], but a present value that does not parse is an error.
fn strict<T, L>(lookup: L, key: &'static str, fallback: T) -> Result<T, ConfigError>
where
    T: ParseFromEnv,
    L: Fn(&str) -> Option<String>,
{
    match lookup_trimmed(lookup, key) {
        Some(value) => T::parse_value(&value).ok_or(ConfigError::Invalid { key, value }),
        None => Ok(fallback),
    }
}
