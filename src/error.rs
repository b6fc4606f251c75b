use thiserror::Error;

/// Errors produced while scraping a page
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// The browser process could not be started
    #[error("Failed to launch browser: {0}")]
    LaunchFailed(String),

    /// The page at `url` could not be reached
    #[error("Failed to navigate to {url}: {reason}")]
    NavigationFailed { url: String, reason: String },

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    /// A script could not be evaluated in the page
    #[error("Script evaluation failed: {0}")]
    EvaluationFailed(String),

    #[error("Failed to parse DOM: {0}")]
    DomParseFailed(String),

    #[error("Invalid CSS selector '{0}'")]
    InvalidSelector(String),

    /// The semantic engine could not embed a text
    #[error("Embedding failed: {0}")]
    Embedding(String),

    /// A model call failed; no further records are produced
    #[error("Language model generation failed: {0}")]
    Generation(String),

    /// One model response could not be turned into a record
    #[error("Malformed model output for element {index}: {reason}")]
    MalformedModelOutput { index: usize, reason: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ScrapeError {
    /// Whether this error only affects a single record of an extraction
    pub fn is_per_record(&self) -> bool {
        matches!(self, ScrapeError::MalformedModelOutput { .. })
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, ScrapeError>;
