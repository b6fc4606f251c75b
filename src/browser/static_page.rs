use crate::browser::{BrowserDriver, BrowserSession, Page};
use crate::dom::{ElementNode, SnapshotEntry, build_forest};
use crate::error::{Result, ScrapeError};
use async_trait::async_trait;
use scraper::{ElementRef, Html, Node, Selector};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
enum Source {
    Http(reqwest::Client),
    Fixed(Arc<HashMap<String, String>>),
}

/// Loads pages without a browser: markup is fetched over HTTP (or taken from
/// a fixed set of documents) and queried as served, without running scripts.
#[derive(Debug, Clone)]
pub struct StaticDriver {
    source: Source,
}

impl StaticDriver {
    /// Fetch pages over HTTP
    pub fn http(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko)")
            .build()
            .map_err(|e| ScrapeError::LaunchFailed(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            source: Source::Http(client),
        })
    }

    /// Serve a fixed set of documents keyed by URL; any other URL fails to navigate
    pub fn fixed<I, U, H>(pages: I) -> Self
    where
        I: IntoIterator<Item = (U, H)>,
        U: Into<String>,
        H: Into<String>,
    {
        let pages = pages
            .into_iter()
            .map(|(url, html)| (url.into(), html.into()))
            .collect();

        Self {
            source: Source::Fixed(Arc::new(pages)),
        }
    }
}

#[async_trait]
impl BrowserDriver for StaticDriver {
    async fn start(&self) -> Result<Box<dyn BrowserSession>> {
        Ok(Box::new(StaticSession {
            source: self.source.clone(),
            stopped: false,
        }))
    }
}

struct StaticSession {
    source: Source,
    stopped: bool,
}

impl StaticSession {
    async fn fetch(&self, url: &str) -> Result<String> {
        let navigation_failed = |reason: String| ScrapeError::NavigationFailed {
            url: url.to_string(),
            reason,
        };

        match &self.source {
            Source::Fixed(pages) => pages
                .get(url)
                .cloned()
                .ok_or_else(|| navigation_failed("no such document".to_string())),
            Source::Http(client) => {
                let response = client
                    .get(url)
                    .send()
                    .await
                    .map_err(|e| navigation_failed(e.to_string()))?;

                if !response.status().is_success() {
                    return Err(navigation_failed(format!("HTTP {}", response.status())));
                }

                response.text().await.map_err(|e| navigation_failed(e.to_string()))
            }
        }
    }
}

#[async_trait]
impl BrowserSession for StaticSession {
    async fn navigate(&self, url: &str) -> Result<Box<dyn Page>> {
        if self.stopped {
            return Err(ScrapeError::NavigationFailed {
                url: url.to_string(),
                reason: "session has been stopped".to_string(),
            });
        }

        let html = self.fetch(url).await?;
        log::debug!("Loaded {} ({} bytes)", url, html.len());
        Ok(Box::new(StaticPage::from_html(url, html)))
    }

    async fn stop(&mut self) -> Result<()> {
        self.stopped = true;
        Ok(())
    }

    fn is_stopped(&self) -> bool {
        self.stopped
    }
}

/// An HTML document queried with CSS selectors
pub struct StaticPage {
    url: String,
    html: String,
    closed: bool,
}

impl StaticPage {
    pub fn from_html(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            html: html.into(),
            closed: false,
        }
    }

    fn select(&self, selector: &str, limit: Option<usize>) -> Result<Vec<Arc<ElementNode>>> {
        if self.closed {
            return Err(ScrapeError::EvaluationFailed(format!(
                "page {} has been closed",
                self.url
            )));
        }

        let parsed = Selector::parse(selector)
            .map_err(|e| ScrapeError::InvalidSelector(format!("{}: {:?}", selector, e)))?;

        let document = Html::parse_document(&self.html);
        let mut entries = Vec::new();
        for element in document.select(&parsed).take(limit.unwrap_or(usize::MAX)) {
            snapshot_entries(element, &mut entries);
        }

        build_forest(entries)
    }
}

/// Flatten an element and its descendants into snapshot entries, in document order
fn snapshot_entries(element: ElementRef<'_>, entries: &mut Vec<SnapshotEntry>) {
    let root = *element;
    let mut indices = HashMap::new();

    for node in root.descendants() {
        let parent = node
            .parent()
            .filter(|_| node.id() != root.id())
            .and_then(|parent| indices.get(&parent.id()).copied());

        match node.value() {
            Node::Element(value) => {
                indices.insert(node.id(), entries.len());
                entries.push(SnapshotEntry::Element {
                    parent,
                    tag_name: value.name().to_string(),
                    attributes: value
                        .attrs()
                        .map(|(name, value)| (name.to_string(), value.to_string()))
                        .collect(),
                });
            }
            Node::Text(text) => {
                if let Some(parent) = parent {
                    entries.push(SnapshotEntry::Text {
                        parent,
                        text: String::from(&**text),
                    });
                }
            }
            _ => {}
        }
    }
}

#[async_trait]
impl Page for StaticPage {
    fn url(&self) -> &str {
        &self.url
    }

    async fn query_selector(&self, selector: &str) -> Result<Option<Arc<ElementNode>>> {
        Ok(self.select(selector, Some(1))?.into_iter().next())
    }

    async fn query_selector_all(&self, selector: &str) -> Result<Vec<Arc<ElementNode>>> {
        self.select(selector, None)
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}
