//! Merges posts from RSS, Medium, Twitter, Instagram and Facebook into one
//! feed.
//!
//! Providers are described by a [`Config`], either built in code or loaded
//! from a JSON/TOML file. An [`Aggregator`] fetches all of them concurrently,
//! normalizes every payload into [`Post`]s and returns them newest first.
//!
//! ```no_run
//! use feedmux::{Aggregator, Config, ProviderConfig};
//!
//! # async fn run() -> Result<(), feedmux::Error> {
//! let config = Config::with_providers(vec![ProviderConfig::Rss {
//!     feed_url: "https://blog.rust-lang.org/feed.xml".to_string(),
//! }]);
//! let posts = Aggregator::new(config).get_feed(Some(5)).await?;
//! # Ok(())
//! # }
//! ```

pub mod aggregator;
pub mod config;
pub mod error;
pub mod feed;
pub mod post;
pub mod providers;
pub mod util;

pub use aggregator::{merge, Aggregator};
pub use config::{Config, ConfigError, ConfigSource, FailurePolicy, ProviderConfig};
pub use error::Error;
pub use feed::{FeedRequestError, FeedResult, FetchErrorKind};
pub use post::{Media, MediaKind, Post, ProviderKind};
