
use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::TextGenerator;
use crate::config::Config;
use crate::gemini::{Content, GeminiClient};
use crate::{RagError, Result};

/// Text generator backed by the Gemini `generateContent` endpoint
#[derive(Debug, Clone)]
pub struct GeminiGenerator {
    client: GeminiClient,
    model: String,
    temperature: f32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text parts of the first candidate
    fn into_text(self) -> anyhow::Result<String> {
        let Some(candidate) = self.candidates.into_iter().next() else {
            let reason = self
                .prompt_feedback
                .and_then(|feedback| feedback.block_reason)
                .unwrap_or_else(|| "unknown".to_string());
            return Err(anyhow::anyhow!(
                "Model returned no candidates (block reason: {reason})"
            ));
        };

        let texts: Vec<String> = candidate
            .content
            .map(|content| content.parts)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|part| part.text)
            .collect();

        if texts.is_empty() {
            let reason = candidate
                .finish_reason
                .unwrap_or_else(|| "unknown".to_string());
            return Err(anyhow::anyhow!(
                "Model returned no text (finish reason: {reason})"
            ));
        }

        Ok(texts.concat())
    }
}

impl GeminiGenerator {
    /// Build the generator from configuration.
    ///
    /// Fails with `RagError::Config` when no API key is available. Each
    /// prompt is sent once; a failed turn is reported, never resent.
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        let api_key = config.api_key()?;
        let client = GeminiClient::new(&config.gemini, api_key)?.with_retry_attempts(1);
        Ok(Self::with_client(
            client,
            &config.gemini.generation_model,
            config.gemini.temperature,
        ))
    }

    #[inline]
    pub fn with_client(client: GeminiClient, model: &str, temperature: f32) -> Self {
        Self {
            client,
            model: model.trim_start_matches("models/").to_string(),
            temperature,
        }
    }

    #[inline]
    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    fn generate_content(&self, prompt: &str) -> anyhow::Result<String> {
        let url = self.client.model_method_url(&self.model, "generateContent")?;

        let request = GenerateContentRequest {
            contents: vec![Content::user(prompt)],
            generation_config: GenerationConfig {
                temperature: self.temperature,
            },
        };

        let response: GenerateContentResponse = self
            .client
            .post_json(&url, &request)
            .context("Failed to generate content")?;

        response.into_text()
    }
}

impl TextGenerator for GeminiGenerator {
    #[inline]
    fn model_name(&self) -> &str {
        &self.model
    }

    #[inline]
    fn generate(&self, prompt: &str) -> Result<String> {
        debug!(
            "Generating answer with {} (prompt length: {})",
            self.model,
            prompt.len()
        );

        self.generate_content(prompt).map_err(|e| {
            warn!("Generation failed: {:#}", e);
            RagError::Generation(format!("{e:#}"))
        })
    }
}
