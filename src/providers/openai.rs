// src/providers/openai.rs
// Embedding and summarization over OpenAI-compatible HTTP APIs.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{MemoryError, Result};
use crate::memory::traits::{Embedder, Summarizer};
use crate::memory::types::Message;

/// Connection settings shared by both adapters.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout: Duration,
}

impl ProviderConfig {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            timeout,
        }
    }
}

pub struct OpenAiEmbedder {
    client: Client,
    config: ProviderConfig,
    dimension: usize,
}

impl OpenAiEmbedder {
    pub fn new(config: ProviderConfig, dimension: usize) -> Self {
        Self {
            client: Client::new(),
            config,
            dimension,
        }
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = json!({
            "model": self.config.model,
            "input": text,
            "dimensions": self.dimension,
        });
        debug!(chars = text.len(), model = %self.config.model, "requesting embedding");

        let request = self
            .client
            .post(format!("{}/v1/embeddings", self.config.base_url))
            .header(header::AUTHORIZATION, format!("Bearer {}", self.config.api_key))
            .header(header::CONTENT_TYPE, "application/json")
            .json(&body)
            .send();

        let response = tokio::time::timeout(self.config.timeout, request)
            .await
            .map_err(|_| MemoryError::Timeout(self.config.timeout))?
            .map_err(|e| MemoryError::EmbeddingFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_else(|_| "<no body>".into());
            return Err(MemoryError::EmbeddingFailed(format!(
                "embedding API error ({status}): {error_text}"
            )));
        }

        let result: Value = response
            .json()
            .await
            .map_err(|e| MemoryError::EmbeddingFailed(e.to_string()))?;
        let embedding: Vec<f32> = result["data"][0]["embedding"]
            .as_array()
            .ok_or_else(|| MemoryError::EmbeddingFailed("no embedding in response".into()))?
            .iter()
            .filter_map(|v| v.as_f64().map(|f| f as f32))
            .collect();

        if embedding.len() != self.dimension {
            return Err(MemoryError::EmbeddingFailed(format!(
                "provider returned {} dimensions, expected {}",
                embedding.len(),
                self.dimension
            )));
        }
        Ok(embedding)
    }
}

pub struct OpenAiSummarizer {
    client: Client,
    config: ProviderConfig,
    max_tokens: usize,
}

impl OpenAiSummarizer {
    pub fn new(config: ProviderConfig, max_tokens: usize) -> Self {
        Self {
            client: Client::new(),
            config,
            max_tokens,
        }
    }

    fn build_prompt(messages: &[Message]) -> String {
        let mut transcript = String::new();
        for message in messages {
            transcript.push_str(&format!("{}: {}\n", message.role.as_str(), message.content));
        }
        format!(
            "Summarize the key points of the following conversation. \
             Keep the facts, decisions, and preferences worth remembering; \
             be concise:\n\n{transcript}"
        )
    }
}

#[async_trait]
impl Summarizer for OpenAiSummarizer {
    async fn summarize(&self, messages: &[Message]) -> Result<String> {
        if messages.is_empty() {
            return Err(MemoryError::SummarizationFailed(
                "no messages to summarize".into(),
            ));
        }

        let body = json!({
            "model": self.config.model,
            "max_tokens": self.max_tokens,
            "messages": [
                { "role": "user", "content": Self::build_prompt(messages) }
            ],
        });
        debug!(messages = messages.len(), model = %self.config.model, "requesting summary");

        let request = self
            .client
            .post(format!("{}/v1/chat/completions", self.config.base_url))
            .header(header::AUTHORIZATION, format!("Bearer {}", self.config.api_key))
            .header(header::CONTENT_TYPE, "application/json")
            .json(&body)
            .send();

        let response = tokio::time::timeout(self.config.timeout, request)
            .await
            .map_err(|_| MemoryError::Timeout(self.config.timeout))?
            .map_err(|e| MemoryError::SummarizationFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_else(|_| "<no body>".into());
            return Err(MemoryError::SummarizationFailed(format!(
                "chat API error ({status}): {error_text}"
            )));
        }

        let result: Value = response
            .json()
            .await
            .map_err(|e| MemoryError::SummarizationFailed(e.to_string()))?;
        let summary = result["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| MemoryError::SummarizationFailed("no content in response".into()))?
            .trim()
            .to_string();

        if summary.is_empty() {
            return Err(MemoryError::SummarizationFailed("empty summary".into()));
        }
        Ok(summary)
    }
}
