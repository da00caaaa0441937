use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::post::{Post, ProviderKind};
use crate::providers::Provider;

const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// What went wrong while fetching or parsing one provider's feed.
#[derive(Debug, Error)]
pub enum FetchErrorKind {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// Payload could not be decoded into posts
    #[error("Parse error: {0}")]
    Parse(String),
    /// Token exchange returned no usable token
    #[error("Authentication failed: {0}")]
    Auth(String),
    /// Response body exceeded the 10MB size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
}

/// A provider's feed could not be fetched.
///
/// Carries the provider that failed and, for HTTP failures, the status code
/// via [`FeedRequestError::status`].
#[derive(Debug, Error)]
#[error("{provider} feed request failed: {kind}")]
pub struct FeedRequestError {
    pub provider: ProviderKind,
    pub kind: FetchErrorKind,
}

impl FeedRequestError {
    pub fn new(provider: ProviderKind, kind: FetchErrorKind) -> Self {
        Self { provider, kind }
    }

    /// HTTP status code of the failed response, if the server answered.
    pub fn status(&self) -> Option<u16> {
        match &self.kind {
            FetchErrorKind::HttpStatus(status) => Some(*status),
            FetchErrorKind::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Result of a single provider fetch.
///
/// Contains the provider kind for correlation and either the provider's
/// posts or the error that occurred.
#[derive(Debug)]
pub struct FeedResult {
    pub provider: ProviderKind,
    pub result: Result<Vec<Post>, FeedRequestError>,
}

/// Everything a provider adapter needs to make its requests.
#[derive(Debug, Clone, Copy)]
pub struct FetchContext<'a> {
    pub client: &'a reqwest::Client,
    /// Applies to each request individually, body included
    pub timeout: Duration,
    /// Number of posts the caller asked for; services that page server-side
    /// use it to size the request
    pub count: usize,
}

impl FetchContext<'_> {
    /// Sends a request and returns the body of a 2xx response.
    ///
    /// # Errors
    ///
    /// - [`FetchErrorKind::Timeout`] - request plus body exceeded the timeout
    /// - [`FetchErrorKind::Network`] - connection or TLS errors
    /// - [`FetchErrorKind::HttpStatus`] - non-2xx response
    /// - [`FetchErrorKind::ResponseTooLarge`] - body exceeded 10MB
    /// - [`FetchErrorKind::IncompleteResponse`] - body shorter than Content-Length
    pub async fn get_bytes(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<Vec<u8>, FetchErrorKind> {
        tokio::time::timeout(self.timeout, send_and_read(request))
            .await
            .map_err(|_| FetchErrorKind::Timeout)?
    }
}

async fn send_and_read(request: reqwest::RequestBuilder) -> Result<Vec<u8>, FetchErrorKind> {
    let response = request.send().await?;

    if !response.status().is_success() {
        return Err(FetchErrorKind::HttpStatus(response.status().as_u16()));
    }

    read_limited_bytes(response, MAX_FEED_SIZE).await
}

/// Fetches every provider concurrently and waits for all of them to settle.
///
/// Runs up to `max_concurrent` fetches at a time. Results are returned in
/// the same order as `providers`, one per provider, so a failure is always
/// attributable to the provider that caused it. Each in-flight fetch holds
/// its own `Arc` of the provider, which keeps the returned future `Send`
/// for `tokio::spawn`.
pub async fn fetch_all(
    ctx: FetchContext<'_>,
    providers: &[Arc<Provider>],
    max_concurrent: usize,
) -> Vec<FeedResult> {
    if providers.is_empty() {
        return Vec::new();
    }

    let providers: Vec<Arc<Provider>> = providers.to_vec();
    stream::iter(providers)
        .map(move |provider| async move {
            let result = fetch_one(ctx, &provider).await;
            FeedResult {
                provider: provider.kind(),
                result,
            }
        })
        .buffered(max_concurrent.max(1))
        .collect()
        .await
}

/// Fetches and normalizes a single provider's feed.
pub async fn fetch_one(
    ctx: FetchContext<'_>,
    provider: &Provider,
) -> Result<Vec<Post>, FeedRequestError> {
    let kind = provider.kind();
    tracing::debug!(provider = %kind, endpoint = %provider.endpoint(), "Fetching feed");

    match provider.fetch(&ctx).await {
        Ok(posts) => {
            tracing::debug!(provider = %kind, posts = posts.len(), "Feed fetched");
            Ok(posts)
        }
        Err(e) => {
            tracing::warn!(
                provider = %kind,
                endpoint = %provider.endpoint(),
                error = %e,
                "Feed request failed"
            );
            Err(FeedRequestError::new(kind, e))
        }
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchErrorKind> {
    // Capture Content-Length for completeness check
    let expected_length = response.content_length();

    // Fast path: check Content-Length header
    if let Some(len) = expected_length {
        if len > limit as u64 {
            return Err(FetchErrorKind::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchErrorKind::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchErrorKind::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderConfig;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const VALID_RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
    <item><guid>1</guid><title>Test</title></item>
</channel></rss>"#;

    fn rss_provider(url: String) -> Provider {
        Provider::from_config(ProviderConfig::Rss { feed_url: url }).unwrap()
    }

    fn ctx(client: &reqwest::Client) -> FetchContext<'_> {
        FetchContext {
            client,
            timeout: Duration::from_secs(5),
            count: 10,
        }
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(VALID_RSS)
                    .insert_header("Content-Type", "application/xml"),
            )
            .mount(&mock_server)
            .await;

        let client = reqwest::Client::new();
        let provider = rss_provider(format!("{}/feed", mock_server.uri()));

        let posts = fetch_one(ctx(&client), &provider).await.unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].title.as_deref(), Some("Test"));
    }

    #[tokio::test]
    async fn test_fetch_404_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let client = reqwest::Client::new();
        let provider = rss_provider(format!("{}/feed", mock_server.uri()));

        let err = fetch_one(ctx(&client), &provider).await.unwrap_err();
        assert_eq!(err.provider, ProviderKind::Rss);
        assert_eq!(err.status(), Some(404));
        assert!(matches!(err.kind, FetchErrorKind::HttpStatus(404)));
    }

    #[tokio::test]
    async fn test_500_is_not_retried() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = reqwest::Client::new();
        let provider = rss_provider(format!("{}/feed", mock_server.uri()));

        let err = fetch_one(ctx(&client), &provider).await.unwrap_err();
        assert_eq!(err.status(), Some(500));
    }

    #[tokio::test]
    async fn test_malformed_feed_parse_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<not valid xml"))
            .mount(&mock_server)
            .await;

        let client = reqwest::Client::new();
        let provider = rss_provider(format!("{}/feed", mock_server.uri()));

        let err = fetch_one(ctx(&client), &provider).await.unwrap_err();
        assert!(matches!(err.kind, FetchErrorKind::Parse(_)));
        assert_eq!(err.status(), None);
    }

    #[tokio::test]
    async fn test_empty_feed_success() {
        let empty_rss = r#"<?xml version="1.0"?>
<rss version="2.0"><channel></channel></rss>"#;

        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(empty_rss))
            .mount(&mock_server)
            .await;

        let client = reqwest::Client::new();
        let provider = rss_provider(format!("{}/feed", mock_server.uri()));

        let posts = fetch_one(ctx(&client), &provider).await.unwrap();
        assert!(posts.is_empty());
    }

    #[tokio::test]
    async fn test_slow_response_times_out() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(VALID_RSS)
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&mock_server)
            .await;

        let client = reqwest::Client::new();
        let provider = rss_provider(format!("{}/feed", mock_server.uri()));
        let ctx = FetchContext {
            client: &client,
            timeout: Duration::from_millis(100),
            count: 10,
        };

        let err = fetch_one(ctx, &provider).await.unwrap_err();
        assert!(matches!(err.kind, FetchErrorKind::Timeout));
    }

    #[tokio::test]
    async fn test_fetch_all_keeps_provider_order() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ok"))
            .respond_with(ResponseTemplate::new(200).set_body_string(VALID_RSS))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let client = reqwest::Client::new();
        let providers = vec![
            Arc::new(rss_provider(format!("{}/missing", mock_server.uri()))),
            Arc::new(rss_provider(format!("{}/ok", mock_server.uri()))),
        ];

        let results = fetch_all(ctx(&client), &providers, 4).await;
        assert_eq!(results.len(), 2);
        assert!(results[0].result.is_err());
        assert_eq!(results[1].result.as_ref().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_all_empty() {
        let client = reqwest::Client::new();
        let results = fetch_all(ctx(&client), &[], 4).await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_all_on_spawned_task() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(VALID_RSS))
            .mount(&mock_server)
            .await;

        let providers = vec![
            Arc::new(rss_provider(format!("{}/a", mock_server.uri()))),
            Arc::new(rss_provider(format!("{}/b", mock_server.uri()))),
        ];
        let handle = tokio::spawn(async move {
            let client = reqwest::Client::new();
            fetch_all(ctx(&client), &providers, 1).await
        });

        let results = handle.await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.result.is_ok()));
    }

    #[tokio::test]
    async fn test_content_length_over_limit_rejected() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("0123456789"))
            .mount(&mock_server)
            .await;

        let response = reqwest::get(format!("{}/big", mock_server.uri()))
            .await
            .unwrap();
        let err = read_limited_bytes(response, 4).await.unwrap_err();
        assert!(matches!(err, FetchErrorKind::ResponseTooLarge));
    }
}
