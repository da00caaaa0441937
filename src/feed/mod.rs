//! Feed fetching and RSS/Atom parsing.
//!
//! - [`parser`] - turns RSS/Atom/JSON Feed documents into posts using `feed-rs`
//! - [`fetcher`] - concurrent HTTP retrieval with per-provider error capture
//!
//! # Example
//!
//! ```ignore
//! use crate::feed::{fetch_all, FetchContext};
//!
//! let ctx = FetchContext { client: &client, timeout, count: 10 };
//! let results = fetch_all(ctx, &providers, 10).await;
//! ```

mod fetcher;
mod parser;

pub use fetcher::{
    fetch_all, fetch_one, FeedRequestError, FeedResult, FetchContext, FetchErrorKind,
};
pub use parser::parse_feed;
