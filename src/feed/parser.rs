use feed_rs::model::{Entry, MediaObject};
use feed_rs::parser;
use sha2::{Digest, Sha256};

use crate::post::{Media, MediaKind, Post, ProviderKind};

/// Parses an RSS, Atom or JSON Feed document into posts.
///
/// Entries without a usable id get a stable SHA-256 id derived from link,
/// title and publish time. The feed title becomes each post's `source`.
pub fn parse_feed(bytes: &[u8], provider: ProviderKind) -> Result<Vec<Post>, parser::ParseFeedError> {
    let feed = parser::parse(bytes)?;
    let source = feed
        .title
        .map(|t| t.content.trim().to_string())
        .filter(|t| !t.is_empty());

    let posts = feed
        .entries
        .into_iter()
        .map(|entry| entry_to_post(entry, provider, source.clone()))
        .collect();

    Ok(posts)
}

fn entry_to_post(entry: Entry, provider: ProviderKind, source: Option<String>) -> Post {
    let link = entry.links.first().map(|l| l.href.clone());
    let date = entry.published.or(entry.updated);
    let title = entry
        .title
        .map(|t| t.content.trim().to_string())
        .filter(|t| !t.is_empty());
    let author = entry
        .authors
        .first()
        .map(|a| a.name.trim().to_string())
        .filter(|a| !a.is_empty());
    // Full content (content:encoded, atom:content) wins over the summary
    let body = entry
        .content
        .and_then(|c| c.body)
        .or_else(|| entry.summary.map(|s| s.content));
    let media = collect_media(&entry.media);

    let existing_id = if entry.id.is_empty() {
        None
    } else {
        Some(entry.id.as_str())
    };
    let id = generate_guid(
        existing_id,
        link.as_deref(),
        title.as_deref().unwrap_or(""),
        date.map(|d| d.timestamp()),
    );

    let mut post = Post::new(provider, id).with_body(body);
    post.source = source;
    post.title = title;
    post.link = link;
    post.date = date;
    post.author = author;
    post.media = media;
    post
}

fn collect_media(objects: &[MediaObject]) -> Vec<Media> {
    let mut media = Vec::new();
    for object in objects {
        for content in &object.content {
            let Some(url) = &content.url else { continue };
            let kind = match content.content_type.as_ref().map(|m| m.to_string()) {
                Some(t) if t.starts_with("image/") => MediaKind::Image,
                Some(t) if t.starts_with("video/") => MediaKind::Video,
                _ => MediaKind::Other,
            };
            push_unique(&mut media, Media { url: url.to_string(), kind });
        }
        for thumbnail in &object.thumbnails {
            push_unique(&mut media, Media::image(thumbnail.image.uri.clone()));
        }
    }
    media
}

fn push_unique(media: &mut Vec<Media>, item: Media) {
    if !media.iter().any(|m| m.url == item.url) {
        media.push(item);
    }
}

/// Returns the upstream id when present, otherwise a hash of the entry's
/// identifying fields.
fn generate_guid(
    existing: Option<&str>,
    url: Option<&str>,
    title: &str,
    published: Option<i64>,
) -> String {
    if let Some(guid) = existing {
        let trimmed = guid.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let input = format!(
        "{}|{}|{}",
        url.unwrap_or(""),
        title,
        published.map(|p| p.to_string()).unwrap_or_default()
    );
    let hash = Sha256::digest(input.as_bytes());
    format!("{:x}", hash)
}
