use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

use crate::util::{plain_text, strip_html, truncate_chars, EXCERPT_MAX_CHARS};

/// The kind of service a provider talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Rss,
    Medium,
    Twitter,
    Instagram,
    Facebook,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Rss => "rss",
            ProviderKind::Medium => "medium",
            ProviderKind::Twitter => "twitter",
            ProviderKind::Instagram => "instagram",
            ProviderKind::Facebook => "facebook",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Other,
}

/// A media attachment (photo, video, enclosure) referenced by a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Media {
    pub url: String,
    pub kind: MediaKind,
}

impl Media {
    pub fn image(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind: MediaKind::Image,
        }
    }

    pub fn video(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind: MediaKind::Video,
        }
    }
}

/// A normalized feed item.
///
/// Every provider adapter produces `Post`s regardless of the shape of the
/// upstream payload. Fields a service does not supply are `None` (or empty
/// for `media`); `date` is `None` when the upstream timestamp is missing or
/// unparseable, which sorts the post after all dated ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    /// Upstream identifier, or a content hash when the upstream has none
    pub id: String,
    /// Which adapter produced this post
    pub provider: ProviderKind,
    /// Human-readable origin: feed title, screen name, page name
    pub source: Option<String>,
    pub title: Option<String>,
    pub link: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub author: Option<String>,
    /// Body as delivered upstream (may contain HTML)
    pub body: Option<String>,
    /// Plain-text body, truncated for display
    pub excerpt: Option<String>,
    pub media: Vec<Media>,
}

impl Post {
    /// Starts a post with only the required fields set.
    pub(crate) fn new(provider: ProviderKind, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            provider,
            source: None,
            title: None,
            link: None,
            date: None,
            author: None,
            body: None,
            excerpt: None,
            media: Vec::new(),
        }
    }

    /// Sets `body` and derives `excerpt` from it.
    ///
    /// Blank bodies leave both fields `None`.
    pub(crate) fn with_body(self, body: Option<String>) -> Self {
        self.with_excerpt_from(body, strip_html)
    }

    /// Like [`Post::with_body`] for bodies that are plain text, not HTML.
    pub(crate) fn with_text_body(self, body: Option<String>) -> Self {
        self.with_excerpt_from(body, plain_text)
    }

    fn with_excerpt_from(
        mut self,
        body: Option<String>,
        flatten: fn(&str) -> Cow<'_, str>,
    ) -> Self {
        let body = body.filter(|b| !b.trim().is_empty());
        self.excerpt = body.as_deref().and_then(|b| {
            let text = flatten(b);
            let text = truncate_chars(&text, EXCERPT_MAX_CHARS);
            (!text.is_empty()).then(|| text.into_owned())
        });
        self.body = body;
        self
    }
}
