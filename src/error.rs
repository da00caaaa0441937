use std::sync::Arc;
use thiserror::Error;

use crate::config::ConfigError;
use crate::feed::FeedRequestError;

/// Errors returned by [`Aggregator`](crate::Aggregator) calls.
///
/// Config errors are shared behind an `Arc` because an aggregator built from
/// a bad config reports the same failure on every call.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(Arc<ConfigError>),

    #[error(transparent)]
    FeedRequest(#[from] FeedRequestError),
}

impl Error {
    /// Stable error-kind name: `"ConfigError"` or `"FeedRequestError"`.
    pub fn name(&self) -> &'static str {
        match self {
            Error::Config(_) => "ConfigError",
            Error::FeedRequest(_) => "FeedRequestError",
        }
    }

    /// HTTP status of the failed provider request, when there was one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::FeedRequest(e) => e.status(),
            Error::Config(_) => None,
        }
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(Arc::new(err))
    }
}
