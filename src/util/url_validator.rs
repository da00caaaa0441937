use std::net::IpAddr;
use thiserror::Error;
use url::Url;

/// Errors that can occur during URL validation.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// The URL has no host component.
    #[error("URL has no host")]
    MissingHost,
    /// Credentials would be sent in cleartext to a non-local host.
    #[error("Insecure API base {0}: HTTPS required (except localhost)")]
    Insecure(String),
}

/// Validates a URL string for use as a feed source.
///
/// Accepts any `http` or `https` URL with a host. Feeds are configured by the
/// operator, so private and loopback hosts are allowed.
///
/// # Examples
///
/// ```
/// use feedmux::util::validate_feed_url;
///
/// let url = validate_feed_url("https://example.com/feed.xml").unwrap();
/// assert_eq!(url.host_str(), Some("example.com"));
///
/// assert!(validate_feed_url("file:///etc/passwd").is_err());
/// assert!(validate_feed_url("not a url").is_err());
/// ```
pub fn validate_feed_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str.trim())?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlValidationError::MissingHost);
    }

    Ok(url)
}

/// Validates the base URL of an authenticated API.
///
/// Access tokens and client secrets travel in the query string or headers
/// of requests made against this base, so plain `http` is only accepted for
/// loopback hosts (local mirrors and test servers). A trailing slash is
/// removed so paths can be appended with `format!("{base}/...")`.
///
/// # Examples
///
/// ```
/// use feedmux::util::validate_api_base;
///
/// assert!(validate_api_base("https://graph.facebook.com").is_ok());
/// assert!(validate_api_base("http://127.0.0.1:8080").is_ok());
/// assert!(validate_api_base("http://api.example.com").is_err());
/// ```
pub fn validate_api_base(url_str: &str) -> Result<String, UrlValidationError> {
    let url = validate_feed_url(url_str)?;

    if url.scheme() == "http" && !is_loopback_host(&url) {
        return Err(UrlValidationError::Insecure(url.to_string()));
    }

    Ok(url.as_str().trim_end_matches('/').to_string())
}

fn is_loopback_host(url: &Url) -> bool {
    let Some(host) = url.host_str() else {
        return false;
    };
    if host == "localhost" {
        return true;
    }

    // Strip brackets from IPv6 addresses for parsing
    let host_for_parse = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);

    host_for_parse
        .parse::<IpAddr>()
        .map(|ip| ip.is_loopback())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_feed_urls() {
        assert!(validate_feed_url("https://example.com/feed.xml").is_ok());
        assert!(validate_feed_url("http://www.example.org/export/1").is_ok());
        assert!(validate_feed_url("http://127.0.0.1:8080/rss").is_ok());
    }

    #[test]
    fn test_invalid_schemes() {
        assert!(matches!(
            validate_feed_url("ftp://example.com"),
            Err(UrlValidationError::UnsupportedScheme(_))
        ));
        assert!(validate_feed_url("file:///etc/passwd").is_err());
    }

    #[test]
    fn test_unparseable_url() {
        assert!(matches!(
            validate_feed_url("example.com/feed"),
            Err(UrlValidationError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_api_base_https_accepted() {
        let base = validate_api_base("https://api.twitter.com/").unwrap();
        assert_eq!(base, "https://api.twitter.com");
    }

    #[test]
    fn test_api_base_keeps_path_prefix() {
        let base = validate_api_base("https://proxy.example.com/twitter/").unwrap();
        assert_eq!(base, "https://proxy.example.com/twitter");
    }

    #[test]
    fn test_api_base_plain_http_rejected() {
        assert!(matches!(
            validate_api_base("http://graph.facebook.com"),
            Err(UrlValidationError::Insecure(_))
        ));
    }

    #[test]
    fn test_api_base_loopback_http_allowed() {
        assert!(validate_api_base("http://localhost:3000").is_ok());
        assert!(validate_api_base("http://127.0.0.1:3000").is_ok());
        assert!(validate_api_base("http://[::1]:3000").is_ok());
    }
}
