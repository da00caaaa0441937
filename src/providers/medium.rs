use url::Url;

use super::{non_empty, FeedAdapter};
use crate::config::ConfigError;
use crate::feed::{parse_feed, FetchContext, FetchErrorKind};
use crate::post::{Media, Post, ProviderKind};
use crate::util::{first_image_src, validate_feed_url};

const DEFAULT_BASE: &str = "https://medium.com";

/// A Medium RSS feed: a user's, a publication's, or a publication on its
/// own domain.
#[derive(Debug)]
pub struct MediumFeed {
    url: Url,
}

impl MediumFeed {
    /// Exactly one of `user`, `publication` and `custom_domain` must be set.
    ///
    /// Users resolve to `{base}/feed/@user` (the `@` is optional in config),
    /// publications to `{base}/feed/{publication}` and custom domains to
    /// `{custom_domain}/feed`.
    pub fn new(
        user: Option<String>,
        publication: Option<String>,
        custom_domain: Option<String>,
        api_base_url: Option<String>,
    ) -> Result<Self, ConfigError> {
        let base = || -> Result<String, ConfigError> {
            let raw = api_base_url.as_deref().unwrap_or(DEFAULT_BASE);
            let url = validate_feed_url(raw)
                .map_err(|e| ConfigError::Invalid(format!("medium api_base_url: {}", e)))?;
            Ok(url.as_str().trim_end_matches('/').to_string())
        };

        let raw = match (non_empty(user), non_empty(publication), non_empty(custom_domain)) {
            (Some(user), None, None) => {
                format!("{}/feed/@{}", base()?, user.trim_start_matches('@'))
            }
            (None, Some(publication), None) => {
                format!("{}/feed/{}", base()?, publication.trim_matches('/'))
            }
            (None, None, Some(domain)) => format!("{}/feed", domain.trim_end_matches('/')),
            _ => {
                return Err(ConfigError::Invalid(
                    "medium provider needs exactly one of user, publication or custom_domain"
                        .to_string(),
                ))
            }
        };

        let url = validate_feed_url(&raw)
            .map_err(|e| ConfigError::Invalid(format!("medium feed {:?}: {}", raw, e)))?;
        Ok(Self { url })
    }

    pub async fn fetch(&self, ctx: &FetchContext<'_>) -> Result<Vec<Post>, FetchErrorKind> {
        let body = ctx.get_bytes(ctx.client.get(self.url.clone())).await?;
        self.parse(&body)
    }
}

impl FeedAdapter for MediumFeed {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Medium
    }

    fn endpoint(&self) -> String {
        self.url.to_string()
    }

    fn parse(&self, body: &[u8]) -> Result<Vec<Post>, FetchErrorKind> {
        let mut posts = parse_feed(body, ProviderKind::Medium)
            .map_err(|e| FetchErrorKind::Parse(e.to_string()))?;

        // Medium has no enclosures; the lead image lives in the HTML body
        for post in posts.iter_mut().filter(|p| p.media.is_empty()) {
            if let Some(src) = post.body.as_deref().and_then(first_image_src) {
                post.media.push(Media::image(src));
            }
        }

        Ok(posts)
    }
}
