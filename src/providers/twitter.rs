use chrono::{DateTime, Utc};
use reqwest::header::CONTENT_TYPE;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use url::Url;

use super::{api_base, api_url, non_empty, parse_json, FeedAdapter};
use crate::config::ConfigError;
use crate::feed::{FetchContext, FetchErrorKind};
use crate::post::{Media, Post, ProviderKind};

const DEFAULT_BASE: &str = "https://api.twitter.com";
/// Largest page the timeline endpoint serves
const MAX_PAGE: usize = 200;
const DATE_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

#[derive(Debug)]
enum TwitterAuth {
    Bearer(SecretString),
    /// App credentials exchanged for a bearer token on every fetch
    Consumer { key: String, secret: SecretString },
}

/// A user's timeline via the v1.1 REST API with app-only auth.
#[derive(Debug)]
pub struct TwitterTimeline {
    screen_name: String,
    auth: TwitterAuth,
    timeline_url: Url,
    token_url: Url,
}

impl TwitterTimeline {
    pub fn new(
        screen_name: String,
        bearer_token: Option<SecretString>,
        consumer_key: Option<String>,
        consumer_secret: Option<SecretString>,
        api_base_url: Option<String>,
    ) -> Result<Self, ConfigError> {
        let screen_name = non_empty(Some(screen_name)).ok_or_else(|| {
            ConfigError::Invalid("twitter screen_name must not be empty".to_string())
        })?;

        let auth = match (bearer_token, non_empty(consumer_key), consumer_secret) {
            (Some(token), _, _) => TwitterAuth::Bearer(token),
            (None, Some(key), Some(secret)) => TwitterAuth::Consumer { key, secret },
            _ => {
                return Err(ConfigError::Invalid(
                    "twitter provider needs bearer_token or consumer_key + consumer_secret"
                        .to_string(),
                ))
            }
        };

        let base = api_base(ProviderKind::Twitter, api_base_url, DEFAULT_BASE)?;
        Ok(Self {
            screen_name,
            auth,
            timeline_url: api_url(
                ProviderKind::Twitter,
                &base,
                "/1.1/statuses/user_timeline.json",
            )?,
            token_url: api_url(ProviderKind::Twitter, &base, "/oauth2/token")?,
        })
    }

    /// Timeline request for `count` tweets, without auth attached.
    pub fn request(&self, ctx: &FetchContext<'_>) -> reqwest::RequestBuilder {
        let count = ctx.count.clamp(1, MAX_PAGE);
        let mut url = self.timeline_url.clone();
        url.query_pairs_mut()
            .append_pair("screen_name", &self.screen_name)
            .append_pair("count", &count.to_string());
        ctx.client.get(url)
    }

    pub async fn fetch(&self, ctx: &FetchContext<'_>) -> Result<Vec<Post>, FetchErrorKind> {
        let exchanged;
        let token = match &self.auth {
            TwitterAuth::Bearer(token) => token,
            TwitterAuth::Consumer { key, secret } => {
                exchanged = self.exchange_token(ctx, key, secret).await?;
                &exchanged
            }
        };

        let request = self.request(ctx).bearer_auth(token.expose_secret());
        let body = ctx.get_bytes(request).await?;
        self.parse(&body)
    }

    /// Trades consumer credentials for an app-only bearer token.
    async fn exchange_token(
        &self,
        ctx: &FetchContext<'_>,
        key: &str,
        secret: &SecretString,
    ) -> Result<SecretString, FetchErrorKind> {
        #[derive(Deserialize)]
        struct TokenResponse {
            token_type: String,
            access_token: String,
        }

        let request = ctx
            .client
            .post(self.token_url.clone())
            .basic_auth(key, Some(secret.expose_secret()))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded;charset=UTF-8")
            .body("grant_type=client_credentials");
        let body = ctx.get_bytes(request).await?;

        let token: TokenResponse = parse_json(&body)?;
        if !token.token_type.eq_ignore_ascii_case("bearer") || token.access_token.is_empty() {
            return Err(FetchErrorKind::Auth(format!(
                "unexpected token type {:?}",
                token.token_type
            )));
        }
        tracing::debug!("Twitter bearer token obtained");
        Ok(SecretString::from(token.access_token))
    }
}

impl FeedAdapter for TwitterTimeline {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Twitter
    }

    fn endpoint(&self) -> String {
        format!("{}?screen_name={}", self.timeline_url, self.screen_name)
    }

    fn parse(&self, body: &[u8]) -> Result<Vec<Post>, FetchErrorKind> {
        let tweets: Vec<Tweet> = parse_json(body)?;
        Ok(tweets.into_iter().map(tweet_to_post).collect())
    }
}

// ============================================================================
// Payload
// ============================================================================

#[derive(Debug, Deserialize)]
struct Tweet {
    id_str: String,
    #[serde(default)]
    full_text: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    user: Option<TwitterUser>,
    #[serde(default)]
    entities: Option<Entities>,
    #[serde(default)]
    extended_entities: Option<Entities>,
}

#[derive(Debug, Deserialize)]
struct TwitterUser {
    screen_name: String,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Entities {
    #[serde(default)]
    urls: Vec<TweetUrl>,
    #[serde(default)]
    media: Vec<TweetMedia>,
}

#[derive(Debug, Deserialize)]
struct TweetUrl {
    url: String,
    #[serde(default)]
    expanded_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TweetMedia {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    media_url_https: Option<String>,
    #[serde(default)]
    media_url: Option<String>,
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    video_info: Option<VideoInfo>,
}

#[derive(Debug, Deserialize)]
struct VideoInfo {
    #[serde(default)]
    variants: Vec<VideoVariant>,
}

#[derive(Debug, Deserialize)]
struct VideoVariant {
    url: String,
    #[serde(default)]
    content_type: Option<String>,
    #[serde(default)]
    bitrate: Option<u64>,
}

fn tweet_to_post(tweet: Tweet) -> Post {
    let entities = tweet.entities.unwrap_or_default();
    // extended_entities carries every photo of a multi-photo tweet
    let media_entities = tweet
        .extended_entities
        .map(|e| e.media)
        .filter(|m| !m.is_empty())
        .unwrap_or(entities.media);

    let mut text = tweet.full_text.or(tweet.text).unwrap_or_default();
    for link in &entities.urls {
        if let Some(expanded) = &link.expanded_url {
            text = text.replace(&link.url, expanded);
        }
    }
    // The media t.co link only points back at the tweet itself
    for item in &media_entities {
        if let Some(short) = &item.url {
            text = text.replace(short.as_str(), "");
        }
    }

    let date = tweet
        .created_at
        .as_deref()
        .and_then(|s| DateTime::parse_from_str(s, DATE_FORMAT).ok())
        .map(|d| d.with_timezone(&Utc));

    let (source, author, link) = match &tweet.user {
        Some(user) => (
            Some(format!("@{}", user.screen_name)),
            user.name.clone().or_else(|| Some(user.screen_name.clone())),
            Some(format!(
                "https://twitter.com/{}/status/{}",
                user.screen_name, tweet.id_str
            )),
        ),
        None => (None, None, None),
    };

    let mut post =
        Post::new(ProviderKind::Twitter, tweet.id_str).with_text_body(Some(text.trim().to_string()));
    post.source = source;
    post.author = author;
    post.link = link;
    post.date = date;
    post.media = media_entities.into_iter().filter_map(tweet_media).collect();
    post
}

fn tweet_media(item: TweetMedia) -> Option<Media> {
    let is_video = matches!(item.kind.as_deref(), Some("video") | Some("animated_gif"));
    if is_video {
        let best = item.video_info.and_then(|info| {
            info.variants
                .into_iter()
                .filter(|v| v.content_type.as_deref() == Some("video/mp4"))
                .max_by_key(|v| v.bitrate.unwrap_or(0))
        });
        if let Some(variant) = best {
            return Some(Media::video(variant.url));
        }
    }
    item.media_url_https.or(item.media_url).map(Media::image)
}
