
use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::EmbeddingFunction;
use crate::config::Config;
use crate::gemini::{Content, GeminiClient};
use crate::{RagError, Result};

/// Embedding function backed by the Gemini `batchEmbedContents` endpoint
#[derive(Debug, Clone)]
pub struct GeminiEmbeddings {
    client: GeminiClient,
    model: String,
    batch_size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum TaskType {
    RetrievalDocument,
    RetrievalQuery,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest<'a> {
    model: &'a str,
    content: Content<'a>,
    task_type: TaskType,
}

#[derive(Debug, Serialize)]
struct BatchEmbedRequest<'a> {
    requests: Vec<EmbedContentRequest<'a>>,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

#[derive(Debug, Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

impl GeminiEmbeddings {
    /// Build the embedding function from configuration.
    ///
    /// Fails with `RagError::Config` when no API key is available.
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        let api_key = config.api_key()?;
        let client = GeminiClient::new(&config.gemini, api_key)?;
        Ok(Self::with_client(
            client,
            &config.gemini.embedding_model,
            config.gemini.batch_size as usize,
        ))
    }

    #[inline]
    pub fn with_client(client: GeminiClient, model: &str, batch_size: usize) -> Self {
        Self {
            client,
            model: format!("models/{}", model.trim_start_matches("models/")),
            batch_size: batch_size.max(1),
        }
    }

    fn embed_batch(&self, texts: &[&str], task_type: TaskType) -> anyhow::Result<Vec<Vec<f32>>> {
        let url = self
            .client
            .model_method_url(&self.model, "batchEmbedContents")?;

        let request = BatchEmbedRequest {
            requests: texts
                .iter()
                .map(|text| EmbedContentRequest {
                    model: &self.model,
                    content: Content::text(text),
                    task_type,
                })
                .collect(),
        };

        let response: BatchEmbedResponse = self
            .client
            .post_json(&url, &request)
            .with_context(|| format!("Failed to embed batch of {} texts", texts.len()))?;

        if response.embeddings.len() != texts.len() {
            return Err(anyhow::anyhow!(
                "Mismatch between request and response counts: {} vs {}",
                texts.len(),
                response.embeddings.len()
            ));
        }

        Ok(response
            .embeddings
            .into_iter()
            .map(|embedding| embedding.values)
            .collect())
    }
}

impl EmbeddingFunction for GeminiEmbeddings {
    #[inline]
    fn model_name(&self) -> &str {
        &self.model
    }

    #[inline]
    fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Generating embeddings for {} documents", texts.len());

        let mut vectors = Vec::with_capacity(texts.len());

        // The API caps the number of inputs per call
        for chunk in texts.chunks(self.batch_size) {
            let inputs: Vec<&str> = chunk.iter().map(String::as_str).collect();
            let batch = self
                .embed_batch(&inputs, TaskType::RetrievalDocument)
                .map_err(|e| RagError::Embedding(format!("{e:#}")))?;
            vectors.extend(batch);
        }

        debug!("Generated {} embeddings total", vectors.len());
        Ok(vectors)
    }

    #[inline]
    fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        debug!("Embedding query (length: {})", text.len());

        self.embed_batch(&[text], TaskType::RetrievalQuery)
            .map_err(|e| RagError::Embedding(format!("{e:#}")))?
            .pop()
            .ok_or_else(|| RagError::Embedding("Empty embedding response".to_string()))
    }
}
