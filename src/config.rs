//! Scraper configuration, persisted as TOML.

use crate::browser::LaunchOptions;
use crate::error::{Result, ScrapeError};
use crate::llm::ollama::{DEFAULT_BASE_URL, DEFAULT_MODEL, Device};
use crate::llm::{DEFAULT_SYSTEM_PROMPT, GenerationOptions};
use crate::semantic::hashing::DEFAULT_DIMENSIONS;
use crate::semantic::ollama::{DEFAULT_BATCH_SIZE, DEFAULT_EMBEDDING_MODEL};
use crate::semantic::{HashingEngine, OllamaEmbedding, SemanticEngine};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const DEFAULT_CONFIG_FILE: &str = "gpt-scrape.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ScraperConfig {
    #[serde(default)]
    pub semantic: SemanticConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub generation: GenerationOptions,

    #[serde(default)]
    pub browser: BrowserConfig,
}

/// Which semantic engine scores page text against the query
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum SemanticBackend {
    /// Embedding model served by Ollama
    #[default]
    Ollama,
    /// Offline lexical feature hashing
    Hashing,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SemanticConfig {
    #[serde(default)]
    pub backend: SemanticBackend,

    /// Embedding model for the `ollama` backend
    #[serde(default = "default_embedding_model")]
    pub model_name: String,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Texts per embedding request
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Vector size of the `hashing` backend
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
}

fn default_embedding_model() -> String {
    DEFAULT_EMBEDDING_MODEL.to_string()
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_dimensions() -> usize {
    DEFAULT_DIMENSIONS
}

impl Default for SemanticConfig {
    fn default() -> Self {
        Self {
            backend: SemanticBackend::default(),
            model_name: default_embedding_model(),
            base_url: default_base_url(),
            batch_size: DEFAULT_BATCH_SIZE,
            dimensions: DEFAULT_DIMENSIONS,
        }
    }
}

impl SemanticConfig {
    /// Build the configured engine
    pub fn build_engine(&self) -> Result<Box<dyn SemanticEngine>> {
        let engine: Box<dyn SemanticEngine> = match self.backend {
            SemanticBackend::Ollama => Box::new(
                OllamaEmbedding::new(&self.base_url, &self.model_name)?.with_batch_size(self.batch_size),
            ),
            SemanticBackend::Hashing => Box::new(HashingEngine::new(self.dimensions)?),
        };
        Ok(engine)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LlmConfig {
    #[serde(default = "default_model_name")]
    pub model_name: String,

    #[serde(default)]
    pub device: Device,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

fn default_model_name() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model_name: default_model_name(),
            device: Device::default(),
            base_url: default_base_url(),
            system_prompt: default_system_prompt(),
        }
    }
}

/// Which page loader to use
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BrowserBackend {
    /// Headless Chrome; runs page scripts
    #[default]
    Chrome,
    /// Plain HTTP fetch of the served markup
    Static,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BrowserConfig {
    #[serde(default)]
    pub backend: BrowserBackend,

    /// Timeout for the static backend's HTTP requests, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(flatten)]
    pub launch: LaunchOptions,
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            backend: BrowserBackend::default(),
            timeout_secs: default_timeout_secs(),
            launch: LaunchOptions::default(),
        }
    }
}

impl ScraperConfig {
    /// Parse configuration from a TOML string; missing keys take their defaults
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| ScrapeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Load `path`, or write the defaults there first when it does not exist
    pub fn load_or_init(path: &Path) -> Result<Self> {
        if path.exists() {
            log::debug!("Loading configuration from {}", path.display());
            return Self::load(path);
        }

        let config = Self::default();
        fs::write(path, config.to_toml()?)?;
        log::info!("Wrote default configuration to {}", path.display());
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| ScrapeError::Config(e.to_string()))
    }

    fn validate(&self) -> Result<()> {
        if self.semantic.dimensions == 0 {
            return Err(ScrapeError::Config("semantic.dimensions must be greater than zero".to_string()));
        }
        if self.semantic.batch_size == 0 {
            return Err(ScrapeError::Config("semantic.batch_size must be greater than zero".to_string()));
        }
        if self.semantic.backend == SemanticBackend::Ollama && self.semantic.model_name.trim().is_empty() {
            return Err(ScrapeError::Config("semantic.model_name must not be empty".to_string()));
        }
        if self.generation.max_tokens == 0 {
            return Err(ScrapeError::Config("generation.max_tokens must be greater than zero".to_string()));
        }
        if self.llm.model_name.trim().is_empty() {
            return Err(ScrapeError::Config("llm.model_name must not be empty".to_string()));
        }
        Ok(())
    }
}
