use chrono::DateTime;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use url::Url;

use super::{api_base, api_url, parse_json, FeedAdapter};
use crate::config::ConfigError;
use crate::feed::{FetchContext, FetchErrorKind};
use crate::post::{Media, Post, ProviderKind};

const DEFAULT_BASE: &str = "https://api.instagram.com";

/// Recent media of the account that owns the access token.
#[derive(Debug)]
pub struct InstagramMedia {
    access_token: SecretString,
    recent_url: Url,
}

impl InstagramMedia {
    pub fn new(
        access_token: SecretString,
        api_base_url: Option<String>,
    ) -> Result<Self, ConfigError> {
        if access_token.expose_secret().trim().is_empty() {
            return Err(ConfigError::Invalid(
                "instagram access_token must not be empty".to_string(),
            ));
        }
        let base = api_base(ProviderKind::Instagram, api_base_url, DEFAULT_BASE)?;
        Ok(Self {
            access_token,
            recent_url: api_url(ProviderKind::Instagram, &base, "/v1/users/self/media/recent/")?,
        })
    }

    pub fn request(&self, ctx: &FetchContext<'_>) -> reqwest::RequestBuilder {
        let mut url = self.recent_url.clone();
        url.query_pairs_mut()
            .append_pair("access_token", self.access_token.expose_secret());
        ctx.client.get(url)
    }

    pub async fn fetch(&self, ctx: &FetchContext<'_>) -> Result<Vec<Post>, FetchErrorKind> {
        let body = ctx.get_bytes(self.request(ctx)).await?;
        self.parse(&body)
    }
}

impl FeedAdapter for InstagramMedia {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Instagram
    }

    fn endpoint(&self) -> String {
        self.recent_url.to_string()
    }

    fn parse(&self, body: &[u8]) -> Result<Vec<Post>, FetchErrorKind> {
        let page: RecentMedia = parse_json(body)?;
        Ok(page.data.into_iter().map(item_to_post).collect())
    }
}

// ============================================================================
// Payload
// ============================================================================

#[derive(Debug, Deserialize)]
struct RecentMedia {
    data: Vec<MediaItem>,
}

#[derive(Debug, Deserialize)]
struct MediaItem {
    id: String,
    #[serde(default)]
    link: Option<String>,
    /// Unix seconds, as a string
    #[serde(default)]
    created_time: Option<String>,
    #[serde(default)]
    caption: Option<Caption>,
    #[serde(default)]
    user: Option<InstagramUser>,
    #[serde(flatten)]
    renditions: Renditions,
    #[serde(default)]
    carousel_media: Vec<Renditions>,
}

#[derive(Debug, Deserialize)]
struct Caption {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InstagramUser {
    username: String,
    #[serde(default)]
    full_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Renditions {
    #[serde(default)]
    images: Option<Resolutions>,
    #[serde(default)]
    videos: Option<Resolutions>,
}

#[derive(Debug, Deserialize)]
struct Resolutions {
    #[serde(default)]
    standard_resolution: Option<Rendition>,
}

#[derive(Debug, Deserialize)]
struct Rendition {
    url: String,
}

impl Renditions {
    /// The video if there is one, else the image.
    fn best(self) -> Option<Media> {
        let pick = |r: Option<Resolutions>| r.and_then(|r| r.standard_resolution).map(|s| s.url);
        pick(self.videos)
            .map(Media::video)
            .or_else(|| pick(self.images).map(Media::image))
    }
}

fn item_to_post(item: MediaItem) -> Post {
    let date = item
        .created_time
        .as_deref()
        .and_then(|s| s.trim().parse::<i64>().ok())
        .and_then(|secs| DateTime::from_timestamp(secs, 0));

    let mut media: Vec<Media> = if item.carousel_media.is_empty() {
        item.renditions.best().into_iter().collect()
    } else {
        item.carousel_media
            .into_iter()
            .filter_map(Renditions::best)
            .collect()
    };
    media.dedup();

    let (source, author) = match item.user {
        Some(user) => (
            Some(format!("@{}", user.username)),
            user.full_name.filter(|n| !n.trim().is_empty()).or(Some(user.username)),
        ),
        None => (None, None),
    };

    let mut post =
        Post::new(ProviderKind::Instagram, item.id).with_text_body(item.caption.and_then(|c| c.text));
    post.source = source;
    post.author = author;
    post.link = item.link;
    post.date = date;
    post.media = media;
    post
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::time::Duration;

    const RECENT: &str = r#"{
      "pagination": {},
      "data": [
        {
          "id": "1517863914862137183_9370826248",
          "user": { "id": "9370826248", "full_name": "Some One", "username": "someone" },
          "images": {
            "thumbnail": { "width": 150, "height": 150, "url": "https://scontent.cdninstagram.com/t.jpg" },
            "standard_resolution": { "width": 640, "height": 640, "url": "https://scontent.cdninstagram.com/s.jpg" }
          },
          "created_time": "1496341433",
          "caption": { "id": "1", "text": "Sunset #beach" },
          "type": "image",
          "link": "https://www.instagram.com/p/BUQUfzzl2xf/"
        },
        {
          "id": "2",
          "user": { "username": "someone", "full_name": "" },
          "videos": { "standard_resolution": { "url": "https://scontent.cdninstagram.com/v.mp4" } },
          "images": { "standard_resolution": { "url": "https://scontent.cdninstagram.com/v.jpg" } },
          "created_time": "1496341000",
          "caption": null,
          "type": "video"
        },
        {
          "id": "3",
          "type": "carousel",
          "carousel_media": [
            { "images": { "standard_resolution": { "url": "https://scontent.cdninstagram.com/c1.jpg" } }, "type": "image" },
            { "images": { "standard_resolution": { "url": "https://scontent.cdninstagram.com/c2.jpg" } }, "type": "image" }
          ]
        }
      ]
    }"#;

    fn adapter() -> InstagramMedia {
        InstagramMedia::new(SecretString::from("9370826248.6384ed0".to_string()), None).unwrap()
    }

    #[test]
    fn test_parse_image_post() {
        let posts = adapter().parse(RECENT.as_bytes()).unwrap();
        assert_eq!(posts.len(), 3);

        let first = &posts[0];
        assert_eq!(first.provider, ProviderKind::Instagram);
        assert_eq!(first.source.as_deref(), Some("@someone"));
        assert_eq!(first.author.as_deref(), Some("Some One"));
        assert_eq!(first.body.as_deref(), Some("Sunset #beach"));
        assert_eq!(
            first.date,
            Some(Utc.with_ymd_and_hms(2017, 6, 1, 18, 23, 53).unwrap())
        );
        assert_eq!(
            first.media,
            vec![Media::image("https://scontent.cdninstagram.com/s.jpg")]
        );
    }

    #[test]
    fn test_video_preferred_and_null_caption() {
        let posts = adapter().parse(RECENT.as_bytes()).unwrap();
        let video = &posts[1];
        assert!(video.body.is_none());
        assert_eq!(video.author.as_deref(), Some("someone"));
        assert_eq!(
            video.media,
            vec![Media::video("https://scontent.cdninstagram.com/v.mp4")]
        );
    }

    #[test]
    fn test_carousel_collects_every_image() {
        let posts = adapter().parse(RECENT.as_bytes()).unwrap();
        let carousel = &posts[2];
        assert_eq!(carousel.media.len(), 2);
        assert!(carousel.date.is_none());
        assert!(carousel.source.is_none());
    }

    #[test]
    fn test_caption_is_not_treated_as_markup() {
        let payload = r#"{ "data": [
            { "id": "9", "caption": { "text": "I <3 this beach, back next summer" }, "type": "image" }
        ] }"#;
        let posts = adapter().parse(payload.as_bytes()).unwrap();
        assert_eq!(
            posts[0].excerpt.as_deref(),
            Some("I <3 this beach, back next summer")
        );
    }

    #[test]
    fn test_request_carries_token() {
        let client = reqwest::Client::new();
        let ctx = FetchContext {
            client: &client,
            timeout: Duration::from_secs(1),
            count: 2,
        };
        let request = adapter().request(&ctx).build().unwrap();
        assert_eq!(
            request.url().as_str(),
            "https://api.instagram.com/v1/users/self/media/recent/?access_token=9370826248.6384ed0"
        );
    }

    #[test]
    fn test_empty_token_rejected() {
        let result = InstagramMedia::new(SecretString::from(" ".to_string()), None);
        assert!(result.is_err());
    }
}
