//! # gpt-scrape
//!
//! Find the region of a rendered web page that best matches a text query, collect the
//! repeated elements of that region, and turn each one into a flat JSON record with a
//! local language model.
//!
//! ## How it works
//!
//! 1. The page is loaded through a [`BrowserDriver`] (headless Chrome or a static HTML fetch)
//! 2. Every node under `<body>` is scored against the query with a [`SemanticEngine`];
//!    `div` and `a` elements get a small bonus
//! 3. The best node is turned back into a coarse CSS selector (`html body #content p`)
//! 4. The selector is re-run on the page, which picks up the best node's siblings
//! 5. Each sibling's text is normalized and sent through one chat session of a
//!    [`LanguageModel`]; the fenced JSON in every reply becomes an [`ExtractedRecord`]
//!
//! ## Library Usage
//!
//! ```rust,no_run
//! use gpt_scrape::{ChromeDriver, LaunchOptions, OllamaEmbedding, OllamaModel, Scraper};
//! use gpt_scrape::llm::ollama::Device;
//!
//! # async fn run() -> gpt_scrape::Result<()> {
//! let mut scraper = Scraper::new(
//!     Box::new(ChromeDriver::launch(LaunchOptions::new().headless(true))),
//!     Box::new(OllamaEmbedding::new("http://localhost:11434", "nomic-embed-text")?),
//!     Box::new(OllamaModel::new("http://localhost:11434", "llama3", Device::Gpu)?),
//! );
//!
//! let mut extraction = scraper.extract("https://example.com/shop", "product name and price").await?;
//! while let Some(outcome) = extraction.next().await {
//!     match outcome {
//!         Ok(record) => println!("{}", record.to_json()),
//!         Err(e) => eprintln!("skipped: {}", e),
//!     }
//! }
//! drop(extraction);
//!
//! scraper.quit().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Overview
//!
//! - [`browser`]: Browser collaborators (headless Chrome, static HTML) and launch options
//! - [`dom`]: Element snapshots and selector synthesis
//! - [`text`]: Text normalization
//! - [`semantic`]: Embeddings, the Ollama embedding engine and the offline hashing engine
//! - [`matching`]: Node scoring and best-match search
//! - [`llm`]: Chat model collaborators and the Ollama backend
//! - [`record`]: Fenced JSON parsing into flat records
//! - [`pipeline`]: The [`Scraper`] tying it all together
//! - [`config`]: TOML configuration
//! - [`error`]: Error types and result aliases

pub mod browser;
pub mod config;
pub mod dom;
pub mod error;
pub mod llm;
pub mod matching;
pub mod pipeline;
pub mod record;
pub mod semantic;
pub mod text;

pub use browser::{BrowserDriver, BrowserSession, ChromeDriver, ConnectionOptions, LaunchOptions, Page, StaticDriver};
pub use config::ScraperConfig;
pub use dom::{CssSelector, ElementNode, ElementSpec};
pub use error::{Result, ScrapeError};
pub use llm::{ChatSession, GenerationOptions, LanguageModel, OllamaModel};
pub use matching::{MatchResult, find_best_match};
pub use pipeline::{Extraction, ExtractionReport, Scraper};
pub use record::ExtractedRecord;
pub use semantic::{Embedding, HashingEngine, OllamaEmbedding, SemanticEngine};
