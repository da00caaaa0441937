use url::Url;

use super::FeedAdapter;
use crate::config::ConfigError;
use crate::feed::{parse_feed, FetchContext, FetchErrorKind};
use crate::post::{Post, ProviderKind};
use crate::util::validate_feed_url;

/// A plain RSS/Atom/JSON Feed URL.
#[derive(Debug)]
pub struct RssFeed {
    url: Url,
}

impl RssFeed {
    pub fn new(feed_url: &str) -> Result<Self, ConfigError> {
        let url = validate_feed_url(feed_url)
            .map_err(|e| ConfigError::Invalid(format!("rss feed_url {:?}: {}", feed_url, e)))?;
        Ok(Self { url })
    }

    pub async fn fetch(&self, ctx: &FetchContext<'_>) -> Result<Vec<Post>, FetchErrorKind> {
        let body = ctx.get_bytes(ctx.client.get(self.url.clone())).await?;
        self.parse(&body)
    }
}

impl FeedAdapter for RssFeed {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Rss
    }

    fn endpoint(&self) -> String {
        self.url.to_string()
    }

    fn parse(&self, body: &[u8]) -> Result<Vec<Post>, FetchErrorKind> {
        parse_feed(body, ProviderKind::Rss).map_err(|e| FetchErrorKind::Parse(e.to_string()))
    }
}
