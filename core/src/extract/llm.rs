//! LLM-based extraction via an Ollama-compatible chat API.
//!
//! One inference call per transcript with deterministic decoding
//! (temperature zero, bounded output length). The model's reply is
//! scavenged for its first JSON object; anything unparseable is a
//! terminal `ExtractionParseFailed` for the item, never guessed around.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{ExtractionStrategy, RawExtraction};
use crate::error::PipelineError;
use crate::quote::ExtractionMethod;

const CHAT_TIMEOUT: Duration = Duration::from_secs(60);

/// A warmed chat-model session the registry can cache as a handle.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Model identifier this session is bound to.
    fn model(&self) -> &str;

    /// Run one deterministic chat completion.
    async fn complete(&self, system: &str, user: &str, max_tokens: u32) -> Result<String>;
}

impl std::fmt::Debug for dyn ChatModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn ChatModel")
    }
}

/// Chat session against an Ollama server.
pub struct OllamaChat {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
}

impl OllamaChat {
    /// Connect to the server and verify the model is present.
    ///
    /// Errors here mean the identifier cannot be resolved; the registry
    /// reports that as `ModelUnavailable` without retrying.
    pub async fn connect(base_url: &str, model: &str) -> Result<Self> {
        let client = reqwest::Client::new();
        let url = format!("{}/api/tags", base_url.trim_end_matches('/'));

        let response = client
            .get(&url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    anyhow!(
                        "Cannot connect to Ollama at {}. Is Ollama running? Start with: ollama serve",
                        base_url
                    )
                } else {
                    anyhow!("Ollama request failed: {}", e)
                }
            })?;

        if !response.status().is_success() {
            return Err(anyhow!("Ollama tag listing failed: HTTP {}", response.status()));
        }

        let tags: TagsResponse = response.json().await?;
        let known = tags
            .models
            .iter()
            .any(|m| m.name == model || m.name.split(':').next() == Some(model));
        if !known {
            return Err(anyhow!(
                "Model '{}' not found on Ollama server. Pull it with: ollama pull {}",
                model,
                model
            ));
        }

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl ChatModel for OllamaChat {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, system: &str, user: &str, max_tokens: u32) -> Result<String> {
        let url = format!("{}/api/chat", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({
                "model": self.model,
                "messages": [
                    {"role": "system", "content": system},
                    {"role": "user", "content": user}
                ],
                "stream": false,
                "options": {
                    "temperature": 0.0,
                    "num_predict": max_tokens
                }
            }))
            .timeout(CHAT_TIMEOUT)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(anyhow!("Ollama chat call failed: {}", error_text));
        }

        let chat_response: ChatResponse = response.json().await?;
        Ok(chat_response.message.content.trim().to_string())
    }
}

/// LLM extraction backend bound to a cached chat session and a
/// caller-supplied instruction prompt.
pub struct LlmExtractor {
    session: Arc<dyn ChatModel>,
    prompt: String,
    max_tokens: u32,
}

impl LlmExtractor {
    /// The prompt must be validated non-empty before construction; mode
    /// resolution rejects an absent prompt with `PromptRequired`.
    pub fn new(session: Arc<dyn ChatModel>, prompt: String, max_tokens: u32) -> Self {
        Self {
            session,
            prompt,
            max_tokens,
        }
    }
}

#[async_trait]
impl ExtractionStrategy for LlmExtractor {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Llm
    }

    async fn extract(&self, transcript: &str) -> Result<RawExtraction, PipelineError> {
        let user = format!("Transcript:\n{transcript}");
        let reply = self
            .session
            .complete(&self.prompt, &user, self.max_tokens)
            .await
            .map_err(|e| PipelineError::ExtractionParseFailed(format!("{e:#}")))?;

        debug!(model = self.session.model(), chars = reply.len(), "LLM reply received");

        let value = parse_reply(&reply)?;
        Ok(RawExtraction::Llm(value))
    }
}

/// Pull the first JSON object out of the model's free-text reply.
///
/// Models wrap their answer in chatter often enough that requiring a
/// bare object would fail routinely; requiring at least one well-formed
/// object keeps the contract strict without being brittle.
pub fn parse_reply(reply: &str) -> Result<serde_json::Value, PipelineError> {
    let start = reply.find('{').ok_or_else(|| {
        PipelineError::ExtractionParseFailed("no JSON object in model output".to_string())
    })?;

    // Scan for the matching close brace, respecting string literals.
    let bytes = reply.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, &b) in bytes[start..].iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match b {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            b'{' if !in_string => depth += 1,
            b'}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    let candidate = &reply[start..start + offset + 1];
                    let value: serde_json::Value =
                        serde_json::from_str(candidate).map_err(|e| {
                            PipelineError::ExtractionParseFailed(format!(
                                "malformed JSON in model output: {e}"
                            ))
                        })?;
                    if !value.is_object() {
                        return Err(PipelineError::ExtractionParseFailed(
                            "model output is not a JSON object".to_string(),
                        ));
                    }
                    return Ok(value);
                }
            }
            _ => {}
        }
    }

    Err(PipelineError::ExtractionParseFailed(
        "unterminated JSON object in model output".to_string(),
    ))
}

#[cfg(test)]
#[path = "llm_test.rs"]
mod tests;
