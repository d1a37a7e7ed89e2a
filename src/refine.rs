//! Query refinement
//!
//! Rewrites a free-text query into a concise place search with a single
//! chat-completion call. Refinement is best effort: any failure falls back to
//! the trimmed input.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::Result;
use crate::config::LlmConfig;
use crate::error::DiscoveryError;
use crate::http::{read_json, with_timeout};

const PROVIDER: &str = "LLM";

/// Something that can answer a single prompt
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// OpenAI-compatible `/chat/completions` client
pub struct OpenAiChatClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

impl OpenAiChatClient {
    /// Returns `None` when no API key is configured
    #[must_use]
    pub fn from_config(client: Client, config: &LlmConfig) -> Option<Self> {
        let api_key = config.api_key.clone()?;
        Some(Self {
            client,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl ChatCompletion for OpenAiChatClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let parsed: ChatResponse = read_json(PROVIDER, response).await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| DiscoveryError::upstream(PROVIDER, "no choices in response"))
    }
}

fn refine_prompt(query: &str) -> String {
    format!("Rewrite this as a concise place search query (no extra words): {query}")
}

/// Best-effort query rewriting with a safe fallback
pub struct QueryRefiner {
    llm: Option<Arc<dyn ChatCompletion>>,
    timeout: Duration,
    max_chars: usize,
}

impl QueryRefiner {
    #[must_use]
    pub fn new(llm: Option<Arc<dyn ChatCompletion>>, timeout: Duration, max_chars: usize) -> Self {
        Self {
            llm,
            timeout,
            max_chars: max_chars.max(1),
        }
    }

    /// A refiner that never calls out
    #[must_use]
    pub fn passthrough() -> Self {
        Self::new(None, Duration::from_secs(1), 200)
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.llm.is_some()
    }

    /// Refine `query`, falling back to the trimmed input on any failure
    #[instrument(name = "refine_query", level = "debug", skip(self))]
    pub async fn refine(&self, query: &str) -> String {
        let fallback = self.fallback(query);
        let Some(llm) = &self.llm else {
            return fallback;
        };

        let prompt = refine_prompt(query.trim());
        match with_timeout("query refinement", self.timeout, llm.complete(&prompt)).await {
            Ok(reply) => match self.clean(&reply) {
                Some(refined) => {
                    debug!(%refined, "Refined query");
                    refined
                }
                None => {
                    warn!(reply_chars = reply.chars().count(), "Discarding unusable refinement");
                    fallback
                }
            },
            Err(e) => {
                warn!("Query refinement failed, using original query: {}", e);
                fallback
            }
        }
    }

    /// First non-empty line, unquoted, within the length ceiling
    fn clean(&self, reply: &str) -> Option<String> {
        let line = reply.lines().map(str::trim).find(|l| !l.is_empty())?;
        let unquoted = line
            .trim_matches(|c| matches!(c, '"' | '\'' | '`' | '“' | '”'))
            .trim();
        let count = unquoted.chars().count();
        (count > 0 && count <= self.max_chars).then(|| unquoted.to_string())
    }

    fn fallback(&self, query: &str) -> String {
        let trimmed = query.trim();
        if trimmed.chars().count() <= self.max_chars {
            trimmed.to_string()
        } else {
            trimmed.chars().take(self.max_chars).collect::<String>().trim_end().to_string()
        }
    }
}
