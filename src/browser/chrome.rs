use crate::browser::config::{ConnectionOptions, LaunchOptions};
use crate::browser::{BrowserDriver, BrowserSession, Page};
use crate::dom::{self, ElementNode};
use crate::error::{Result, ScrapeError};
use async_trait::async_trait;
use headless_chrome::{Browser, Tab};
use std::{ffi::OsStr, sync::Arc, time::Duration};

/// Run a blocking DevTools call off the async executor
async fn blocking<T, F>(task: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| ScrapeError::EvaluationFailed(format!("Browser task did not complete: {}", e)))?
}

#[derive(Debug, Clone)]
enum Target {
    Launch(LaunchOptions),
    Connect(ConnectionOptions),
}

/// Drives a Chrome/Chromium instance through the DevTools protocol
#[derive(Debug, Clone)]
pub struct ChromeDriver {
    target: Target,
}

impl ChromeDriver {
    /// Launch a new browser for every session
    pub fn launch(options: LaunchOptions) -> Self {
        Self {
            target: Target::Launch(options),
        }
    }

    /// Attach to an existing browser via WebSocket
    pub fn connect(options: ConnectionOptions) -> Self {
        Self {
            target: Target::Connect(options),
        }
    }

    fn launch_browser(options: LaunchOptions) -> Result<Browser> {
        let mut launch_opts = headless_chrome::LaunchOptions::default();

        // Ignore default arguments to prevent detection by anti-bot services
        launch_opts.ignore_default_args.push(OsStr::new("--enable-automation"));
        launch_opts.args.push(OsStr::new("--disable-blink-features=AutomationControlled"));

        // Model generation between page queries can take minutes; keep the browser alive
        launch_opts.idle_browser_timeout = Duration::from_secs(60 * 60);

        launch_opts.headless = options.headless;
        launch_opts.window_size = Some((options.window_width, options.window_height));
        launch_opts.path = options.chrome_path;
        launch_opts.user_data_dir = options.user_data_dir;
        launch_opts.sandbox = options.sandbox;

        Browser::new(launch_opts).map_err(|e| ScrapeError::LaunchFailed(e.to_string()))
    }

    fn connect_browser(options: ConnectionOptions) -> Result<Browser> {
        Browser::connect_with_timeout(options.ws_url, Duration::from_millis(options.timeout))
            .map_err(|e| ScrapeError::LaunchFailed(format!("Failed to connect: {}", e)))
    }
}

impl Default for ChromeDriver {
    fn default() -> Self {
        Self::launch(LaunchOptions::default())
    }
}

#[async_trait]
impl BrowserDriver for ChromeDriver {
    async fn start(&self) -> Result<Box<dyn BrowserSession>> {
        let target = self.target.clone();
        let browser = blocking(move || match target {
            Target::Launch(options) => {
                log::debug!("Launching browser (headless: {})", options.headless);
                Self::launch_browser(options)
            }
            Target::Connect(options) => {
                log::debug!("Connecting to browser at {}", options.ws_url);
                Self::connect_browser(options)
            }
        })
        .await?;

        Ok(Box::new(ChromeSession {
            browser: Some(browser),
        }))
    }
}

/// A running Chrome instance; dropping the `Browser` handle shuts it down
pub struct ChromeSession {
    browser: Option<Browser>,
}

#[async_trait]
impl BrowserSession for ChromeSession {
    async fn navigate(&self, url: &str) -> Result<Box<dyn Page>> {
        let browser = self.browser.clone().ok_or_else(|| ScrapeError::NavigationFailed {
            url: url.to_string(),
            reason: "browser has been stopped".to_string(),
        })?;

        let target = url.to_string();
        let tab = blocking(move || {
            let navigation_failed = |e: anyhow::Error| ScrapeError::NavigationFailed {
                url: target.clone(),
                reason: e.to_string(),
            };

            let tab = browser.new_tab().map_err(navigation_failed)?;
            tab.navigate_to(&target).map_err(navigation_failed)?;
            tab.wait_until_navigated().map_err(navigation_failed)?;
            Ok(tab)
        })
        .await?;

        Ok(Box::new(ChromePage {
            tab,
            url: url.to_string(),
            closed: false,
        }))
    }

    async fn stop(&mut self) -> Result<()> {
        if let Some(browser) = self.browser.take() {
            log::debug!("Stopping browser");
            // headless_chrome shuts the process down once the last handle is dropped
            blocking(move || {
                drop(browser);
                Ok(())
            })
            .await?;
        }
        Ok(())
    }

    fn is_stopped(&self) -> bool {
        self.browser.is_none()
    }
}

/// A tab holding a loaded document
pub struct ChromePage {
    tab: Arc<Tab>,
    url: String,
    closed: bool,
}

impl ChromePage {
    async fn snapshot(&self, selector: &str, all: bool) -> Result<Vec<Arc<ElementNode>>> {
        if self.closed {
            return Err(ScrapeError::EvaluationFailed(format!(
                "page {} has been closed",
                self.url
            )));
        }

        let script = dom::snapshot_script(selector, all)?;
        let tab = self.tab.clone();
        let selector = selector.to_string();

        let json_str = blocking(move || {
            let result = tab
                .evaluate(&script, false)
                .map_err(|e| ScrapeError::EvaluationFailed(format!("Failed to query '{}': {}", selector, e)))?;

            let json_value = result
                .value
                .ok_or_else(|| ScrapeError::DomParseFailed("No value returned from DOM snapshot".to_string()))?;

            // The script returns a JSON string, so it is decoded as a string first
            serde_json::from_value::<String>(json_value)
                .map_err(|e| ScrapeError::DomParseFailed(format!("Failed to get JSON string: {}", e)))
        })
        .await?;

        dom::parse_snapshot(&json_str)
    }
}

#[async_trait]
impl Page for ChromePage {
    fn url(&self) -> &str {
        &self.url
    }

    async fn query_selector(&self, selector: &str) -> Result<Option<Arc<ElementNode>>> {
        Ok(self.snapshot(selector, false).await?.into_iter().next())
    }

    async fn query_selector_all(&self, selector: &str) -> Result<Vec<Arc<ElementNode>>> {
        self.snapshot(selector, true).await
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let tab = self.tab.clone();
        blocking(move || {
            // The tab may already be gone with its browser
            if let Err(e) = tab.close(true) {
                log::debug!("Failed to close tab: {}", e);
            }
            Ok(())
        })
        .await
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}
