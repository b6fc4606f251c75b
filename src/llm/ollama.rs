//! Local model served through an Ollama-compatible `/api/chat` endpoint.

use crate::error::{Result, ScrapeError};
use crate::llm::{ChatSession, GenerationOptions, LanguageModel};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "llama3:8b-instruct-q4_0";

/// Where the model runs
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum Device {
    #[default]
    Gpu,
    Cpu,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct ChatMessage {
    role: String,
    content: String,
}

impl ChatMessage {
    fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: RequestOptions,
}

#[derive(Debug, Serialize)]
struct RequestOptions {
    num_predict: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_gpu: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

/// Language model backed by an Ollama server
pub struct OllamaModel {
    client: reqwest::Client,
    base_url: String,
    model_name: String,
    device: Device,
    closed: bool,
}

impl OllamaModel {
    pub fn new(base_url: impl Into<String>, model_name: impl Into<String>, device: Device) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| ScrapeError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model_name: model_name.into(),
            device,
            closed: false,
        })
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[async_trait]
impl LanguageModel for OllamaModel {
    async fn open_chat_session(&self, system_prompt: &str) -> Result<Box<dyn ChatSession>> {
        if self.closed {
            return Err(ScrapeError::Generation(format!(
                "model {} has been closed",
                self.model_name
            )));
        }

        log::debug!("Opening chat session with {}", self.model_name);
        Ok(Box::new(OllamaChatSession {
            client: self.client.clone(),
            endpoint: format!("{}/api/chat", self.base_url),
            model_name: self.model_name.clone(),
            num_gpu: match self.device {
                Device::Cpu => Some(0),
                Device::Gpu => None,
            },
            history: vec![ChatMessage::new("system", system_prompt)],
            closed: false,
        }))
    }

    fn close(&mut self) {
        if !self.closed {
            log::debug!("Closing model {}", self.model_name);
            self.closed = true;
        }
    }
}

/// Conversation state held on the client side and replayed on every request
struct OllamaChatSession {
    client: reqwest::Client,
    endpoint: String,
    model_name: String,
    num_gpu: Option<u32>,
    history: Vec<ChatMessage>,
    closed: bool,
}

#[async_trait]
impl ChatSession for OllamaChatSession {
    async fn generate(&mut self, prompt: &str, options: &GenerationOptions) -> Result<String> {
        if self.closed {
            return Err(ScrapeError::Generation("chat session is closed".to_string()));
        }

        self.history.push(ChatMessage::new("user", prompt));

        let request = ChatRequest {
            model: &self.model_name,
            messages: &self.history,
            stream: false,
            options: RequestOptions {
                num_predict: options.max_tokens,
                temperature: options.temperature,
                num_gpu: self.num_gpu,
            },
        };

        let sent = self.client.post(&self.endpoint).json(&request).send().await;
        let response = match sent {
            Ok(response) => response,
            Err(e) => {
                self.history.pop();
                return Err(ScrapeError::Generation(e.to_string()));
            }
        };

        if !response.status().is_success() {
            self.history.pop();
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ScrapeError::Generation(format!("HTTP {}: {}", status, body)));
        }

        let reply: ChatResponse = response
            .json()
            .await
            .map_err(|e| ScrapeError::Generation(format!("Failed to decode chat response: {}", e)))?;

        let content = reply.message.content.clone();
        self.history.push(reply.message);
        Ok(content)
    }

    fn close(&mut self) {
        self.closed = true;
        self.history.clear();
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}
