//! Browser collaborators: starting a browser, loading pages, querying elements.
//!
//! - [`ChromeDriver`]: headless Chrome over the DevTools protocol, for pages that need JavaScript
//! - [`StaticDriver`]: plain HTTP fetch parsed as HTML, or fixed in-memory documents

pub mod chrome;
pub mod config;
pub mod static_page;

pub use chrome::ChromeDriver;
pub use config::{ConnectionOptions, LaunchOptions};
pub use static_page::{StaticDriver, StaticPage};

use crate::dom::ElementNode;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Starts browser sessions
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    async fn start(&self) -> Result<Box<dyn BrowserSession>>;
}

/// A running browser
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Open `url` in a new page and wait until it has loaded
    async fn navigate(&self, url: &str) -> Result<Box<dyn Page>>;

    /// Shut the browser down. Stopping twice is a no-op.
    async fn stop(&mut self) -> Result<()>;

    fn is_stopped(&self) -> bool;
}

/// A loaded document
#[async_trait]
pub trait Page: Send + Sync {
    fn url(&self) -> &str;

    /// Snapshot of the first element matching `selector`
    async fn query_selector(&self, selector: &str) -> Result<Option<Arc<ElementNode>>>;

    /// Snapshots of every element matching `selector`, in document order
    async fn query_selector_all(&self, selector: &str) -> Result<Vec<Arc<ElementNode>>>;

    /// Close the page. Closing twice is a no-op.
    async fn close(&mut self) -> Result<()>;

    fn is_closed(&self) -> bool;
}

/// Normalize an incomplete URL by adding missing protocol and handling common patterns
pub fn normalize_url(url: &str) -> String {
    let trimmed = url.trim();

    // If already has a protocol, return as-is
    if trimmed.starts_with("http://")
        || trimmed.starts_with("https://")
        || trimmed.starts_with("file://")
        || trimmed.starts_with("data:")
        || trimmed.starts_with("about:")
    {
        return trimmed.to_string();
    }

    // localhost special case - use http by default
    if trimmed.starts_with("localhost") || trimmed.starts_with("127.0.0.1") {
        return format!("http://{}", trimmed);
    }

    format!("https://{}", trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_url_complete() {
        assert_eq!(normalize_url("https://example.com"), "https://example.com");
        assert_eq!(normalize_url("http://example.com/shop"), "http://example.com/shop");
        assert_eq!(normalize_url("about:blank"), "about:blank");
        assert_eq!(normalize_url("data:text/html,<p>x</p>"), "data:text/html,<p>x</p>");
    }

    #[test]
    fn test_normalize_url_missing_protocol() {
        assert_eq!(normalize_url("example.com/shop"), "https://example.com/shop");
        assert_eq!(normalize_url("  shop.example.com  "), "https://shop.example.com");
    }

    #[test]
    fn test_normalize_url_localhost() {
        assert_eq!(normalize_url("localhost:3000"), "http://localhost:3000");
        assert_eq!(normalize_url("127.0.0.1:8080/list"), "http://127.0.0.1:8080/list");
    }
}
