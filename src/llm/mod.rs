//! Chat-style language model collaborators.

pub mod ollama;

pub use ollama::OllamaModel;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Instruction that makes the model answer with one flat, all-string JSON object in a code fence
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a text-to-JSON converter. Your task is to analyze input text and convert it into a structured JSON object that describes the content.\n\
You only respond with the json output in a codeblock!\n\
The JSON output must:\n\
- Be valid JSON and not include any comments or extraneous text.\n\
- Be flat, containing no nested objects. Each piece of data must be a separate key-value pair.\n\
- Store everything as strings, NO MATTER WHAT!";

/// Sampling parameters for one generation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GenerationOptions {
    /// Upper bound on generated tokens
    pub max_tokens: u32,

    /// Sampling temperature; near zero keeps output close to deterministic
    pub temperature: f32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            max_tokens: 256,
            temperature: 0.01,
        }
    }
}

/// A conversation with the model; each call sees the earlier turns.
///
/// Must be driven by one caller at a time.
#[async_trait]
pub trait ChatSession: Send {
    /// Submit `prompt` as a user turn and return the model's reply
    async fn generate(&mut self, prompt: &str, options: &GenerationOptions) -> Result<String>;

    /// End the conversation. Closing twice is a no-op.
    fn close(&mut self);

    fn is_closed(&self) -> bool;
}

/// A loaded language model
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Open a fresh conversation primed with `system_prompt`
    async fn open_chat_session(&self, system_prompt: &str) -> Result<Box<dyn ChatSession>>;

    /// Release the model. Closing twice is a no-op.
    fn close(&mut self) {}
}

/// Owns a chat session and closes it when dropped
pub struct ChatGuard {
    session: Box<dyn ChatSession>,
}

impl ChatGuard {
    pub fn new(session: Box<dyn ChatSession>) -> Self {
        Self { session }
    }

    pub async fn generate(&mut self, prompt: &str, options: &GenerationOptions) -> Result<String> {
        self.session.generate(prompt, options).await
    }

    pub fn close(&mut self) {
        if !self.session.is_closed() {
            log::debug!("Closing chat session");
            self.session.close();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.session.is_closed()
    }
}

impl Drop for ChatGuard {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSession {
        closes: Arc<AtomicUsize>,
        closed: bool,
    }

    #[async_trait]
    impl ChatSession for CountingSession {
        async fn generate(&mut self, prompt: &str, _options: &GenerationOptions) -> Result<String> {
            Ok(format!("echo: {}", prompt))
        }

        fn close(&mut self) {
            self.closed = true;
            self.closes.fetch_add(1, Ordering::SeqCst);
        }

        fn is_closed(&self) -> bool {
            self.closed
        }
    }

    #[test]
    fn test_default_generation_options() {
        let options = GenerationOptions::default();
        assert_eq!(options.max_tokens, 256);
        assert_eq!(options.temperature, 0.01);
    }

    #[test]
    fn test_system_prompt_demands_flat_strings() {
        assert!(DEFAULT_SYSTEM_PROMPT.contains("codeblock"));
        assert!(DEFAULT_SYSTEM_PROMPT.contains("flat"));
        assert!(DEFAULT_SYSTEM_PROMPT.contains("strings"));
    }

    #[tokio::test]
    async fn test_guard_closes_once_on_drop() {
        let closes = Arc::new(AtomicUsize::new(0));
        {
            let mut guard = ChatGuard::new(Box::new(CountingSession {
                closes: closes.clone(),
                closed: false,
            }));
            let reply = guard.generate("hi", &GenerationOptions::default()).await.unwrap();
            assert_eq!(reply, "echo: hi");
            guard.close();
            assert!(guard.is_closed());
        }
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }
}
