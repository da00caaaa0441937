use scraper::{Html, Node, Selector};
use std::borrow::Cow;

/// Ellipsis appended to truncated excerpts
const ELLIPSIS: &str = "...";

/// Elements whose boundaries separate words when flattened to text
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "blockquote", "br", "dd", "div", "dl", "dt", "figcaption", "figure",
    "footer", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "ol", "p", "pre",
    "section", "table", "td", "th", "tr", "ul",
];

/// Flattens an HTML fragment to plain text and collapses runs of whitespace.
///
/// Markup is parsed with `scraper`, so entities are decoded and a stray `<`
/// that does not open a tag stays in the text. Block boundaries become
/// spaces. Returns `Cow::Borrowed` when the input has no markup, no entities
/// and no redundant whitespace.
///
/// # Examples
///
/// ```
/// use feedmux::util::strip_html;
///
/// assert_eq!(strip_html("<p>Hello <b>world</b></p>"), "Hello world");
/// assert_eq!(strip_html("fish &amp; chips"), "fish & chips");
/// assert_eq!(strip_html("plain text"), "plain text");
/// ```
pub fn strip_html(html: &str) -> Cow<'_, str> {
    if !html.contains(['<', '&']) {
        return collapse_whitespace(html);
    }
    Cow::Owned(fragment_text(&Html::parse_fragment(html)))
}

/// Normalizes a plain-text body: decodes entities and collapses whitespace.
///
/// Unlike [`strip_html`], every `<` is kept as text, so captions such as
/// `"I <3 this"` survive intact.
pub fn plain_text(text: &str) -> Cow<'_, str> {
    if !text.contains('&') {
        return collapse_whitespace(text);
    }
    let escaped = text.replace('<', "&lt;");
    Cow::Owned(fragment_text(&Html::parse_fragment(&escaped)))
}

fn fragment_text(fragment: &Html) -> String {
    let mut text = String::new();
    for node in fragment.root_element().descendants() {
        match node.value() {
            Node::Text(t) => text.push_str(t),
            Node::Element(el) if BLOCK_ELEMENTS.contains(&el.name()) => text.push(' '),
            _ => {}
        }
    }
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn collapse_whitespace(s: &str) -> Cow<'_, str> {
    let tidy = !s.contains("  ")
        && !s.contains(['\n', '\t', '\r'])
        && !s.starts_with(char::is_whitespace)
        && !s.ends_with(char::is_whitespace);
    if tidy {
        Cow::Borrowed(s)
    } else {
        Cow::Owned(s.split_whitespace().collect::<Vec<_>>().join(" "))
    }
}

/// Truncates text to at most `max_chars` characters, appending "..." when cut.
///
/// Prefers to cut at the last word boundary inside the limit so excerpts do
/// not end mid-word. The ellipsis counts toward the limit.
///
/// # Examples
///
/// ```
/// use feedmux::util::truncate_chars;
///
/// assert_eq!(truncate_chars("Short", 10), "Short");
/// assert_eq!(truncate_chars("Hello brave new world", 14), "Hello brave...");
/// assert_eq!(truncate_chars("Test", 0), "");
/// ```
pub fn truncate_chars(s: &str, max_chars: usize) -> Cow<'_, str> {
    if max_chars == 0 {
        return Cow::Borrowed("");
    }
    if s.chars().count() <= max_chars {
        return Cow::Borrowed(s);
    }

    // Too narrow for char + ellipsis: hard cut without one
    let ellipsis_len = ELLIPSIS.chars().count();
    if max_chars <= ellipsis_len {
        return Cow::Owned(s.chars().take(max_chars).collect());
    }

    let keep = max_chars - ellipsis_len;
    let cut = s
        .char_indices()
        .nth(keep)
        .map(|(idx, _)| idx)
        .unwrap_or(s.len());
    let head = &s[..cut];
    let at_boundary = s[cut..].starts_with(char::is_whitespace);
    let head = match head.rfind(char::is_whitespace) {
        _ if at_boundary => head.trim_end(),
        Some(space) if space > 0 => head[..space].trim_end(),
        _ => head,
    };
    Cow::Owned(format!("{}{}", head, ELLIPSIS))
}

/// Returns the `src` of the first `<img>` tag in an HTML fragment.
///
/// Medium embeds the lead image in the post body rather than in an
/// enclosure, so this is how its media gets surfaced.
pub fn first_image_src(html: &str) -> Option<String> {
    let selector = Selector::parse("img[src]").ok()?;
    let fragment = Html::parse_fragment(html);
    let src = fragment
        .select(&selector)
        .filter_map(|img| img.value().attr("src"))
        .map(str::trim)
        .find(|src| !src.is_empty())
        .map(str::to_string);
    src
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_plain_text_borrowed() {
        let result = strip_html("nothing to strip");
        assert!(matches!(result, Cow::Borrowed(_)));
    }

    #[test]
    fn test_strip_nested_tags() {
        let html = r#"<div class="x"><p>First <a href="/y">link</a>.</p><p>Second</p></div>"#;
        assert_eq!(strip_html(html), "First link. Second");
    }

    #[test]
    fn test_strip_br_separates_words() {
        assert_eq!(strip_html("one<br/>two"), "one two");
    }

    #[test]
    fn test_numeric_entities() {
        assert_eq!(strip_html("it&#39;s &#x263A;"), "it's ☺");
    }

    #[test]
    fn test_named_entities_decoded() {
        assert_eq!(
            strip_html("it&rsquo;s here &mdash; &ldquo;now&rdquo;"),
            "it\u{2019}s here \u{2014} \u{201c}now\u{201d}"
        );
    }

    #[test]
    fn test_unknown_entity_kept_literally() {
        assert_eq!(strip_html("AT&T &bogus; rocks"), "AT&T &bogus; rocks");
    }

    #[test]
    fn test_lone_ampersand() {
        assert_eq!(strip_html("a & b"), "a & b");
    }

    #[test]
    fn test_stray_angle_bracket_kept() {
        assert_eq!(
            strip_html("I <3 this place, see you soon"),
            "I <3 this place, see you soon"
        );
    }

    #[test]
    fn test_plain_text_keeps_markup_like_text() {
        assert_eq!(plain_text("a <b>bold</b> claim"), "a <b>bold</b> claim");
        assert_eq!(plain_text("fish &amp; chips &lt;3"), "fish & chips <3");
        assert!(matches!(plain_text("nothing to do"), Cow::Borrowed(_)));
        assert_eq!(plain_text(" spaced\n out "), "spaced out");
    }

    #[test]
    fn test_truncate_prefers_word_boundary() {
        assert_eq!(truncate_chars("The quick brown fox", 12), "The quick...");
    }

    #[test]
    fn test_truncate_single_long_word() {
        assert_eq!(truncate_chars("Supercalifragilistic", 8), "Super...");
    }

    #[test]
    fn test_truncate_narrow_widths() {
        assert_eq!(truncate_chars("Testing", 3), "Tes");
        assert_eq!(truncate_chars("Testing", 1), "T");
    }

    #[test]
    fn test_truncate_multibyte() {
        let result = truncate_chars("日本語のテキストです", 6);
        assert_eq!(result, "日本語...");
    }

    #[test]
    fn test_first_image_src() {
        let html = r#"<figure><img alt="cover" src="https://cdn.example.org/a.png"></figure><img src="https://cdn.example.org/b.png">"#;
        assert_eq!(
            first_image_src(html).as_deref(),
            Some("https://cdn.example.org/a.png")
        );
    }

    #[test]
    fn test_first_image_src_single_quotes_and_case() {
        let html = "<IMG SRC='https://cdn.example.org/c.jpg?w=1&amp;h=2'/>";
        assert_eq!(
            first_image_src(html).as_deref(),
            Some("https://cdn.example.org/c.jpg?w=1&h=2")
        );
    }

    #[test]
    fn test_first_image_src_skips_data_src() {
        let html = r#"<img data-src="https://cdn.example.org/lazy.gif" src="https://cdn.example.org/real.png">"#;
        assert_eq!(
            first_image_src(html).as_deref(),
            Some("https://cdn.example.org/real.png")
        );
    }

    #[test]
    fn test_first_image_src_none() {
        assert!(first_image_src("<p>No pictures here</p>").is_none());
        assert!(first_image_src("<img alt=\"no source\">").is_none());
    }
}
