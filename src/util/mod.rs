//! Utility functions shared by the provider adapters.
//!
//! - **URL validation**: feed URLs must be http(s); authenticated API bases
//!   must be https unless they point at loopback
//! - **Text processing**: HTML stripping and excerpt truncation for post bodies
//!
//! # Examples
//!
//! ```
//! use feedmux::util::{strip_html, truncate_chars, validate_feed_url};
//!
//! let url = validate_feed_url("https://example.com/feed.xml").unwrap();
//! let text = strip_html("<p>Hello <em>there</em></p>");
//! let excerpt = truncate_chars(&text, 8);
//! assert_eq!(excerpt, "Hello...");
//! ```

mod text;
mod url_validator;

pub use text::{first_image_src, plain_text, strip_html, truncate_chars};
pub use url_validator::{validate_api_base, validate_feed_url, UrlValidationError};

/// Maximum excerpt length in characters
pub const EXCERPT_MAX_CHARS: usize = 280;
