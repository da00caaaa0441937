//! The aggregator facade.
//!
//! An [`Aggregator`] owns the validated providers and one shared HTTP client.
//! Each [`get_feed`](Aggregator::get_feed) call fetches every provider
//! concurrently, then merges the results into a single list sorted newest
//! first and truncated to the requested count.

use std::sync::Arc;
use std::time::Duration;

use reqwest::redirect::Policy;
use tokio::task::JoinHandle;

use crate::config::{Config, ConfigError, ConfigSource, FailurePolicy};
use crate::error::Error;
use crate::feed::{self, FeedRequestError, FeedResult, FetchContext};
use crate::post::Post;
use crate::providers::Provider;

/// Maximum redirect hops followed per request
const MAX_REDIRECTS: usize = 5;

/// Fetches and merges feeds from the configured providers.
///
/// Cloning is cheap; clones share providers and the HTTP client.
///
/// # Examples
///
/// ```no_run
/// # async fn run() -> Result<(), feedmux::Error> {
/// let aggregator = feedmux::Aggregator::new("feeds.json");
/// for post in aggregator.get_feed(Some(5)).await? {
///     println!("{} {:?}", post.provider, post.title);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Aggregator {
    inner: Arc<Result<Resolved, Arc<ConfigError>>>,
}

#[derive(Debug)]
struct Resolved {
    providers: Vec<Arc<Provider>>,
    client: reqwest::Client,
    default_count: usize,
    timeout: Duration,
    max_concurrent: usize,
    policy: FailurePolicy,
}

impl Resolved {
    fn from_config(config: Config) -> Result<Self, ConfigError> {
        let providers = config
            .providers
            .into_iter()
            .map(|p| Provider::from_config(p).map(Arc::new))
            .collect::<Result<Vec<_>, _>>()?;

        let timeout = Duration::from_secs(config.timeout_secs.max(1));
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent)
            .redirect(Policy::limited(MAX_REDIRECTS))
            .pool_idle_timeout(Duration::from_secs(30))
            .connect_timeout(timeout)
            .build()
            .map_err(|e| ConfigError::Invalid(format!("HTTP client: {}", e)))?;

        tracing::debug!(
            providers = providers.len(),
            default_count = config.default_count,
            policy = ?config.failure_policy,
            "Aggregator ready"
        );

        Ok(Self {
            providers,
            client,
            default_count: config.default_count,
            timeout,
            max_concurrent: config.max_concurrent_fetches,
            policy: config.failure_policy,
        })
    }
}

impl Aggregator {
    /// Builds an aggregator from an inline config or a config file path.
    ///
    /// Never fails. A config that cannot be loaded or validated is kept and
    /// returned as [`Error::Config`] from every later call, before any
    /// request is made.
    pub fn new(source: impl Into<ConfigSource>) -> Self {
        let resolved = source
            .into()
            .load()
            .and_then(Resolved::from_config)
            .map_err(|e| {
                tracing::warn!(error = %e, "Aggregator configuration rejected");
                Arc::new(e)
            });
        Self {
            inner: Arc::new(resolved),
        }
    }

    /// An aggregator with no providers and default settings.
    pub fn empty() -> Self {
        Self::new(Config::default())
    }

    /// Like [`new`](Self::new), but reports a bad config immediately.
    pub fn try_new(source: impl Into<ConfigSource>) -> Result<Self, ConfigError> {
        let resolved = source.into().load().and_then(Resolved::from_config)?;
        Ok(Self {
            inner: Arc::new(Ok(resolved)),
        })
    }

    fn resolved(&self) -> Result<&Resolved, Error> {
        match &*self.inner {
            Ok(resolved) => Ok(resolved),
            Err(e) => Err(Error::Config(Arc::clone(e))),
        }
    }

    /// Number of posts returned when no count is given.
    pub fn default_count(&self) -> Option<usize> {
        self.resolved().ok().map(|r| r.default_count)
    }

    /// Fetches every provider and returns up to `count` posts, newest first.
    ///
    /// `None` uses the configured `default_count`.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] - the aggregator was built from a bad config
    /// - [`Error::FeedRequest`] - a provider failed and the failure policy
    ///   is `fail_fast`
    pub async fn get_feed(&self, count: Option<usize>) -> Result<Vec<Post>, Error> {
        let resolved = self.resolved()?;
        let count = count.unwrap_or(resolved.default_count);

        let results = self.fetch_with(resolved, count).await;
        let posts = merge(results, count, resolved.policy)?;

        tracing::info!(posts = posts.len(), count, "Feed aggregated");
        Ok(posts)
    }

    /// Callback form of [`get_feed`](Self::get_feed).
    ///
    /// Spawns the fetch on the current tokio runtime and calls `callback`
    /// exactly once with the outcome. Must be called from within a runtime.
    pub fn get_feed_with<F>(&self, count: Option<usize>, callback: F) -> JoinHandle<()>
    where
        F: FnOnce(Result<Vec<Post>, Error>) + Send + 'static,
    {
        let aggregator = self.clone();
        tokio::spawn(async move {
            let result = aggregator.get_feed(count).await;
            callback(result);
        })
    }

    /// Per-provider results in configuration order, before merging.
    ///
    /// Provider failures are returned inside the results rather than as an
    /// error, whatever the failure policy.
    pub async fn fetch_all(&self, count: Option<usize>) -> Result<Vec<FeedResult>, Error> {
        let resolved = self.resolved()?;
        let count = count.unwrap_or(resolved.default_count);
        Ok(self.fetch_with(resolved, count).await)
    }

    async fn fetch_with(&self, resolved: &Resolved, count: usize) -> Vec<FeedResult> {
        let ctx = FetchContext {
            client: &resolved.client,
            timeout: resolved.timeout,
            count,
        };
        feed::fetch_all(ctx, &resolved.providers, resolved.max_concurrent).await
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::empty()
    }
}

/// Merges per-provider results into one list, newest first.
///
/// Undated posts sort after all dated ones; ties keep configuration order.
/// Under [`FailurePolicy::FailFast`] the first failure (in configuration
/// order) is returned instead; under [`FailurePolicy::Partial`] failures are
/// logged and skipped.
pub fn merge(
    results: Vec<FeedResult>,
    count: usize,
    policy: FailurePolicy,
) -> Result<Vec<Post>, FeedRequestError> {
    let mut posts = Vec::new();
    let mut skipped = 0usize;

    for FeedResult { provider, result } in results {
        match result {
            Ok(batch) => posts.extend(batch),
            Err(e) => match policy {
                FailurePolicy::FailFast => return Err(e),
                FailurePolicy::Partial => {
                    tracing::warn!(provider = %provider, error = %e, "Skipping failed provider");
                    skipped += 1;
                }
            },
        }
    }

    // Option<DateTime> orders None first, so reversing puts undated posts last
    posts.sort_by(|a, b| b.date.cmp(&a.date));
    posts.truncate(count);

    if skipped > 0 {
        tracing::info!(skipped, posts = posts.len(), "Merged with failed providers left out");
    }
    Ok(posts)
}
