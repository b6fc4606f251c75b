//! gpt-scrape command line interface
//!
//! Loads a page, finds the region matching the query, and prints one JSON record per
//! extracted element on stdout.

use anyhow::Context;
use clap::Parser;
use gpt_scrape::browser::normalize_url;
use gpt_scrape::config::{BrowserBackend, DEFAULT_CONFIG_FILE, SemanticBackend};
use gpt_scrape::llm::ollama::Device;
use gpt_scrape::{
    BrowserDriver, ChromeDriver, ConnectionOptions, OllamaModel, Scraper, ScraperConfig, StaticDriver,
};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "gpt-scrape")]
#[command(version)]
#[command(about = "Extract structured records from the part of a page that matches a query", long_about = None)]
struct Cli {
    /// Page to scrape
    url: String,

    /// Text describing the content to look for
    query: String,

    /// Configuration file; created with defaults when missing
    #[arg(long, short = 'c', value_name = "PATH", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Fetch the served HTML instead of rendering the page in Chrome
    #[arg(long = "static")]
    static_html: bool,

    /// Launch browser in headed mode (default: headless)
    #[arg(long, short = 'H')]
    headed: bool,

    /// Path to custom browser executable
    #[arg(long, value_name = "PATH")]
    executable_path: Option<PathBuf>,

    /// WebSocket endpoint URL for remote browser connection
    #[arg(long, value_name = "URL")]
    ws_endpoint: Option<String>,

    /// Persistent browser profile directory
    #[arg(long, value_name = "DIR")]
    user_data_dir: Option<PathBuf>,

    /// Model name served by the local model server
    #[arg(long, short = 'm')]
    model: Option<String>,

    /// Where the model runs
    #[arg(long, value_enum, ignore_case = true)]
    device: Option<Device>,

    /// How page text is compared with the query
    #[arg(long, value_enum, ignore_case = true)]
    semantic: Option<SemanticBackend>,

    /// Embedding model used by the ollama semantic backend
    #[arg(long, value_name = "NAME")]
    embedding_model: Option<String>,
}

fn apply_overrides(cli: &Cli, config: &mut ScraperConfig) {
    if cli.static_html {
        config.browser.backend = BrowserBackend::Static;
    }
    if cli.headed {
        config.browser.launch.headless = false;
    }
    if let Some(path) = &cli.executable_path {
        config.browser.launch.chrome_path = Some(path.clone());
    }
    if let Some(dir) = &cli.user_data_dir {
        config.browser.launch.user_data_dir = Some(dir.clone());
    }
    if let Some(model) = &cli.model {
        config.llm.model_name = model.clone();
    }
    if let Some(device) = cli.device {
        config.llm.device = device;
    }
    if let Some(backend) = cli.semantic {
        config.semantic.backend = backend;
    }
    if let Some(model) = &cli.embedding_model {
        config.semantic.model_name = model.clone();
    }
}

fn build_driver(cli: &Cli, config: &ScraperConfig) -> anyhow::Result<Box<dyn BrowserDriver>> {
    let driver: Box<dyn BrowserDriver> = match (config.browser.backend, &cli.ws_endpoint) {
        (BrowserBackend::Static, _) => Box::new(StaticDriver::http(Duration::from_secs(config.browser.timeout_secs))?),
        (BrowserBackend::Chrome, Some(endpoint)) => Box::new(ChromeDriver::connect(ConnectionOptions::new(endpoint))),
        (BrowserBackend::Chrome, None) => Box::new(ChromeDriver::launch(config.browser.launch.clone())),
    };
    Ok(driver)
}

async fn scrape(scraper: &mut Scraper, url: &str, query: &str) -> anyhow::Result<()> {
    let mut extraction = scraper
        .extract(url, query)
        .await
        .with_context(|| format!("Failed to scrape {}", url))?;

    let mut records = 0;
    let mut skipped = 0;

    while let Some(outcome) = extraction.next().await {
        match outcome {
            Ok(record) => {
                println!("{}", record.to_json());
                records += 1;
            }
            Err(e) if e.is_per_record() => skipped += 1,
            Err(e) => return Err(e).context("Extraction aborted"),
        }
    }

    log::info!("Extracted {} records ({} skipped)", records, skipped);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let mut config = ScraperConfig::load_or_init(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    apply_overrides(&cli, &mut config);

    log::debug!("Using model {} on {:?}", config.llm.model_name, config.llm.device);
    if config.semantic.backend == SemanticBackend::Ollama {
        log::debug!("Using embedding model {}", config.semantic.model_name);
    }

    let mut scraper = Scraper::new(
        build_driver(&cli, &config)?,
        config.semantic.build_engine()?,
        Box::new(OllamaModel::new(&config.llm.base_url, &config.llm.model_name, config.llm.device)?),
    )
    .with_system_prompt(config.llm.system_prompt.clone())
    .with_generation_options(config.generation);

    let url = normalize_url(&cli.url);

    let result = tokio::select! {
        result = scrape(&mut scraper, &url, &cli.query) => result,
        _ = tokio::signal::ctrl_c() => {
            log::warn!("Interrupted, shutting down");
            Ok(())
        }
    };

    if let Err(e) = scraper.quit().await {
        log::warn!("Failed to release resources: {}", e);
    }

    result
}
