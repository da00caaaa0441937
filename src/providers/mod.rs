//! Per-service adapters.
//!
//! Each adapter knows how to build the request(s) for one kind of service
//! and how to turn that service's payload into [`Post`]s. [`Provider`] is the
//! closed set of adapters a config can name.

mod facebook;
mod instagram;
mod medium;
mod rss;
mod twitter;

pub use facebook::FacebookPage;
pub use instagram::InstagramMedia;
pub use medium::MediumFeed;
pub use rss::RssFeed;
pub use twitter::TwitterTimeline;

use serde::de::DeserializeOwned;

use crate::config::{ConfigError, ProviderConfig};
use crate::feed::{FetchContext, FetchErrorKind};
use crate::post::{Post, ProviderKind};
use crate::util::validate_api_base;

/// Request-independent half of an adapter: identity and payload parsing.
pub trait FeedAdapter {
    fn kind(&self) -> ProviderKind;

    /// Endpoint the posts come from, safe to log (no credentials).
    fn endpoint(&self) -> String;

    /// Normalizes a raw response body into posts.
    fn parse(&self, body: &[u8]) -> Result<Vec<Post>, FetchErrorKind>;
}

/// A validated, ready-to-fetch provider.
#[derive(Debug)]
pub enum Provider {
    Rss(RssFeed),
    Medium(MediumFeed),
    Twitter(TwitterTimeline),
    Instagram(InstagramMedia),
    Facebook(FacebookPage),
}

impl Provider {
    /// Validates a provider config and builds its adapter.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] when a URL does not parse, an authenticated
    /// API base is not https, or required credentials are missing.
    pub fn from_config(config: ProviderConfig) -> Result<Self, ConfigError> {
        let provider = match config {
            ProviderConfig::Rss { feed_url } => Provider::Rss(RssFeed::new(&feed_url)?),
            ProviderConfig::Medium {
                user,
                publication,
                custom_domain,
                api_base_url,
            } => Provider::Medium(MediumFeed::new(
                user,
                publication,
                custom_domain,
                api_base_url,
            )?),
            ProviderConfig::Twitter {
                screen_name,
                bearer_token,
                consumer_key,
                consumer_secret,
                api_base_url,
            } => Provider::Twitter(TwitterTimeline::new(
                screen_name,
                bearer_token,
                consumer_key,
                consumer_secret,
                api_base_url,
            )?),
            ProviderConfig::Instagram {
                access_token,
                api_base_url,
            } => Provider::Instagram(InstagramMedia::new(access_token, api_base_url)?),
            ProviderConfig::Facebook {
                page_id,
                app_id,
                app_secret,
                api_base_url,
            } => Provider::Facebook(FacebookPage::new(page_id, app_id, app_secret, api_base_url)?),
        };
        Ok(provider)
    }

    fn adapter(&self) -> &dyn FeedAdapter {
        match self {
            Provider::Rss(a) => a,
            Provider::Medium(a) => a,
            Provider::Twitter(a) => a,
            Provider::Instagram(a) => a,
            Provider::Facebook(a) => a,
        }
    }

    pub fn kind(&self) -> ProviderKind {
        self.adapter().kind()
    }

    pub fn endpoint(&self) -> String {
        self.adapter().endpoint()
    }

    /// Runs the adapter's request(s) and parses the result.
    pub async fn fetch(&self, ctx: &FetchContext<'_>) -> Result<Vec<Post>, FetchErrorKind> {
        match self {
            Provider::Rss(a) => a.fetch(ctx).await,
            Provider::Medium(a) => a.fetch(ctx).await,
            Provider::Twitter(a) => a.fetch(ctx).await,
            Provider::Instagram(a) => a.fetch(ctx).await,
            Provider::Facebook(a) => a.fetch(ctx).await,
        }
    }
}

/// Resolves an adapter's API base: the override if given, else the default.
fn api_base(
    kind: ProviderKind,
    override_url: Option<String>,
    default: &str,
) -> Result<String, ConfigError> {
    let raw = override_url.as_deref().unwrap_or(default);
    validate_api_base(raw)
        .map_err(|e| ConfigError::Invalid(format!("{} api_base_url: {}", kind, e)))
}

/// Builds a URL under a validated API base.
fn api_url(kind: ProviderKind, base: &str, path: &str) -> Result<url::Url, ConfigError> {
    url::Url::parse(&format!("{}{}", base, path))
        .map_err(|e| ConfigError::Invalid(format!("{} endpoint: {}", kind, e)))
}

fn parse_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, FetchErrorKind> {
    serde_json::from_slice(body).map_err(|e| FetchErrorKind::Parse(e.to_string()))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
