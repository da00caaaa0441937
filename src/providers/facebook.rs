use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use url::Url;

use super::{api_base, api_url, non_empty, parse_json, FeedAdapter};
use crate::config::ConfigError;
use crate::feed::{FetchContext, FetchErrorKind};
use crate::post::{Media, Post, ProviderKind};

const DEFAULT_BASE: &str = "https://graph.facebook.com";
const FIELDS: &str =
    "message,link,message_tags,name,picture,full_picture,type,created_time,source,story_tags";
const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

/// A page's feed via the Graph API, authenticated with an app access token.
#[derive(Debug)]
pub struct FacebookPage {
    page_id: String,
    app_id: String,
    app_secret: SecretString,
    feed_url: Url,
    token_url: Url,
}

impl FacebookPage {
    pub fn new(
        page_id: String,
        app_id: String,
        app_secret: SecretString,
        api_base_url: Option<String>,
    ) -> Result<Self, ConfigError> {
        let page_id = non_empty(Some(page_id))
            .filter(|id| !id.contains(['/', '?', '#']))
            .ok_or_else(|| {
                ConfigError::Invalid("facebook page_id must be a non-empty page id".to_string())
            })?;
        let app_id = non_empty(Some(app_id)).ok_or_else(|| {
            ConfigError::Invalid("facebook app_id must not be empty".to_string())
        })?;
        if app_secret.expose_secret().trim().is_empty() {
            return Err(ConfigError::Invalid(
                "facebook app_secret must not be empty".to_string(),
            ));
        }

        let base = api_base(ProviderKind::Facebook, api_base_url, DEFAULT_BASE)?;
        Ok(Self {
            feed_url: api_url(ProviderKind::Facebook, &base, &format!("/{}/feed", page_id))?,
            token_url: api_url(ProviderKind::Facebook, &base, "/oauth/access_token")?,
            page_id,
            app_id,
            app_secret,
        })
    }

    /// Feed request for the page. The app token travels in the
    /// `access-token` header so it stays out of the URL.
    pub fn request(&self, ctx: &FetchContext<'_>, token: &SecretString) -> reqwest::RequestBuilder {
        let mut url = self.feed_url.clone();
        url.query_pairs_mut().append_pair("fields", FIELDS);
        ctx.client
            .get(url)
            .header("access-token", token.expose_secret())
    }

    pub async fn fetch(&self, ctx: &FetchContext<'_>) -> Result<Vec<Post>, FetchErrorKind> {
        let token = self.exchange_token(ctx).await?;
        let body = ctx.get_bytes(self.request(ctx, &token)).await?;
        self.parse(&body)
    }

    /// Trades the app id and secret for an app access token.
    async fn exchange_token(&self, ctx: &FetchContext<'_>) -> Result<SecretString, FetchErrorKind> {
        let mut url = self.token_url.clone();
        url.query_pairs_mut()
            .append_pair("client_id", &self.app_id)
            .append_pair("client_secret", self.app_secret.expose_secret())
            .append_pair("grant_type", "client_credentials");
        let body = ctx.get_bytes(ctx.client.get(url)).await?;

        let token = parse_token(&body).ok_or_else(|| {
            FetchErrorKind::Auth("token response carried no access_token".to_string())
        })?;
        tracing::debug!(page = %self.page_id, "Facebook app token obtained");
        Ok(token)
    }
}

/// Older Graph versions answer with a form body, newer ones with JSON.
fn parse_token(body: &[u8]) -> Option<SecretString> {
    #[derive(Deserialize)]
    struct TokenResponse {
        access_token: String,
    }

    let token = match serde_json::from_slice::<TokenResponse>(body) {
        Ok(json) => json.access_token,
        Err(_) => url::form_urlencoded::parse(body)
            .find(|(key, _)| key == "access_token")
            .map(|(_, value)| value.into_owned())?,
    };
    let token = token.trim().to_string();
    (!token.is_empty()).then(|| SecretString::from(token))
}

impl FeedAdapter for FacebookPage {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Facebook
    }

    fn endpoint(&self) -> String {
        self.feed_url.to_string()
    }

    fn parse(&self, body: &[u8]) -> Result<Vec<Post>, FetchErrorKind> {
        let page: PageFeed = parse_json(body)?;
        Ok(page.data.into_iter().map(entry_to_post).collect())
    }
}

// ============================================================================
// Payload
// ============================================================================

#[derive(Debug, Deserialize)]
struct PageFeed {
    data: Vec<PageEntry>,
}

#[derive(Debug, Deserialize)]
struct PageEntry {
    id: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    story: Option<String>,
    #[serde(default)]
    link: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    picture: Option<String>,
    #[serde(default)]
    full_picture: Option<String>,
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    created_time: Option<String>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    from: Option<Author>,
}

#[derive(Debug, Deserialize)]
struct Author {
    #[serde(default)]
    name: Option<String>,
}

fn entry_to_post(entry: PageEntry) -> Post {
    let date = entry
        .created_time
        .as_deref()
        .and_then(|s| DateTime::parse_from_str(s, DATE_FORMAT).ok())
        .map(|d| d.with_timezone(&Utc));

    let mut media = Vec::new();
    if let Some(picture) = non_empty(entry.full_picture).or(non_empty(entry.picture)) {
        media.push(Media::image(picture));
    }
    if entry.kind.as_deref() == Some("video") {
        if let Some(source) = non_empty(entry.source) {
            media.push(Media::video(source));
        }
    }

    let link = non_empty(entry.link)
        .unwrap_or_else(|| format!("https://www.facebook.com/{}", entry.id));
    let body = non_empty(entry.message).or(non_empty(entry.story));

    let mut post = Post::new(ProviderKind::Facebook, entry.id).with_text_body(body);
    post.title = non_empty(entry.name);
    post.author = entry.from.and_then(|f| non_empty(f.name));
    post.source = post.author.clone();
    post.link = Some(link);
    post.date = date;
    post.media = media;
    post
}
