//! Aggregator configuration.
//!
//! A configuration is either built in code (`Config { .. }`) or loaded from a
//! file. Files are JSON unless the extension is `.toml`. Every top-level key
//! is optional; unknown keys are accepted and logged as warnings.
//!
//! ```json
//! {
//!   "providers": [
//!     { "name": "rss", "feed_url": "https://example.org/feed.xml" },
//!     { "name": "medium", "user": "@someone" },
//!     { "name": "twitter", "screen_name": "@someone", "bearer_token": "..." },
//!     { "name": "instagram", "access_token": "..." },
//!     { "name": "facebook", "page_id": "12345", "app_id": "...", "app_secret": "..." }
//!   ],
//!   "default_count": 10
//! }
//! ```
use secrecy::SecretString;
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid TOML in config: {0}")]
    Toml(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    /// The config parsed but describes something unusable.
    #[error("Invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// How the aggregator reacts when some providers fail and others succeed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Any provider failure fails the whole call
    #[default]
    FailFast,
    /// Failed providers are logged and left out of the merge
    Partial,
}

/// Top-level configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    pub providers: Vec<ProviderConfig>,

    /// Number of posts returned when the caller does not ask for a count.
    pub default_count: usize,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,

    /// Upper bound on simultaneous provider fetches.
    pub max_concurrent_fetches: usize,

    pub failure_policy: FailurePolicy,

    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            providers: Vec::new(),
            default_count: 10,
            timeout_secs: 30,
            max_concurrent_fetches: 10,
            failure_policy: FailurePolicy::FailFast,
            user_agent: concat!("feedmux/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// One configured feed source, tagged by its `name`.
///
/// Secrets are wrapped in [`SecretString`] so `Debug` output of a config
/// never reveals them.
#[derive(Debug, Deserialize)]
#[serde(tag = "name", rename_all = "lowercase")]
pub enum ProviderConfig {
    /// Any RSS 0.9x/2.0, Atom or JSON Feed URL.
    Rss { feed_url: String },

    /// A Medium feed. Exactly one of `user`, `publication` or
    /// `custom_domain` must be set.
    Medium {
        #[serde(default)]
        user: Option<String>,
        #[serde(default)]
        publication: Option<String>,
        #[serde(default)]
        custom_domain: Option<String>,
        #[serde(default)]
        api_base_url: Option<String>,
    },

    /// A user timeline. Authenticates with `bearer_token`, or exchanges
    /// `consumer_key`/`consumer_secret` for one.
    Twitter {
        screen_name: String,
        #[serde(default, deserialize_with = "optional_secret")]
        bearer_token: Option<SecretString>,
        #[serde(default)]
        consumer_key: Option<String>,
        #[serde(default, deserialize_with = "optional_secret")]
        consumer_secret: Option<SecretString>,
        #[serde(default)]
        api_base_url: Option<String>,
    },

    /// Recent media of the account owning `access_token`.
    Instagram {
        #[serde(deserialize_with = "secret")]
        access_token: SecretString,
        #[serde(default)]
        api_base_url: Option<String>,
    },

    /// A page feed, read with an app access token obtained from
    /// `app_id`/`app_secret`.
    Facebook {
        page_id: String,
        app_id: String,
        #[serde(deserialize_with = "secret")]
        app_secret: SecretString,
        #[serde(default)]
        api_base_url: Option<String>,
    },
}

fn secret<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(SecretString::from)
}

fn optional_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.map(SecretString::from))
}

/// Where an aggregator gets its configuration from.
#[derive(Debug)]
pub enum ConfigSource {
    Inline(Config),
    File(PathBuf),
}

impl ConfigSource {
    /// Resolves the source into a config, reading the file if there is one.
    pub fn load(self) -> Result<Config, ConfigError> {
        match self {
            ConfigSource::Inline(config) => Ok(config),
            ConfigSource::File(path) => Config::load(&path),
        }
    }
}

impl From<Config> for ConfigSource {
    fn from(config: Config) -> Self {
        ConfigSource::Inline(config)
    }
}

impl From<PathBuf> for ConfigSource {
    fn from(path: PathBuf) -> Self {
        ConfigSource::File(path)
    }
}

impl From<&Path> for ConfigSource {
    fn from(path: &Path) -> Self {
        ConfigSource::File(path.to_path_buf())
    }
}

impl From<&str> for ConfigSource {
    fn from(path: &str) -> Self {
        ConfigSource::File(PathBuf::from(path))
    }
}

impl From<String> for ConfigSource {
    fn from(path: String) -> Self {
        ConfigSource::File(PathBuf::from(path))
    }
}

const KNOWN_KEYS: [&str; 6] = [
    "providers",
    "default_count",
    "timeout_secs",
    "max_concurrent_fetches",
    "failure_policy",
    "user_agent",
];

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load configuration from a JSON or TOML file.
    ///
    /// - Missing or unreadable file → `Err(ConfigError::Io)`
    /// - Empty file → `Ok(Config::default())`
    /// - Extension `.toml` → parsed as TOML, anything else as JSON
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };

        // Check file size before reading to avoid slurping something huge
        let meta = std::fs::metadata(path).map_err(io_err)?;
        if meta.len() > Self::MAX_FILE_SIZE {
            return Err(ConfigError::TooLarge(format!(
                "Config file is {} bytes (max {} bytes)",
                meta.len(),
                Self::MAX_FILE_SIZE
            )));
        }

        let content = std::fs::read_to_string(path).map_err(io_err)?;

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        let is_toml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("toml"));

        let config = if is_toml {
            Self::from_toml(&content)?
        } else {
            Self::from_json(&content)?
        };

        tracing::info!(
            path = %path.display(),
            providers = config.providers.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Parse a JSON document.
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        if let Ok(serde_json::Value::Object(raw)) = serde_json::from_str(content) {
            warn_unknown_keys(raw.keys().map(String::as_str));
        }
        Ok(serde_json::from_str(content)?)
    }

    /// Parse a TOML document. Providers go in `[[providers]]` tables.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        if let Ok(raw) = content.parse::<toml::Table>() {
            warn_unknown_keys(raw.keys().map(String::as_str));
        }
        Ok(toml::from_str(content)?)
    }

    /// Config with the given providers and default settings.
    pub fn with_providers(providers: Vec<ProviderConfig>) -> Self {
        Self {
            providers,
            ..Self::default()
        }
    }
}

fn warn_unknown_keys<'a>(keys: impl Iterator<Item = &'a str>) {
    for key in keys {
        if !KNOWN_KEYS.contains(&key) {
            tracing::warn!(key = %key, "Unknown key in config, ignoring");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
