// Deterministic stand-ins for the hosted services

use std::sync::Mutex;

use crate::embeddings::EmbeddingFunction;
use crate::generation::TextGenerator;
use crate::{RagError, Result};

/// Embeds text as a normalized letter histogram over `a..=h`, so texts sharing
/// letters land close together
pub(crate) struct LetterEmbedder;

impl LetterEmbedder {
    pub(crate) fn vector(text: &str) -> Vec<f32> {
        let mut counts = vec![0.0_f32; 8];
        for c in text.to_ascii_lowercase().chars() {
            if ('a'..='h').contains(&c) {
                counts[(c as u8 - b'a') as usize] += 1.0;
            }
        }
        let norm = counts.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            counts.iter_mut().for_each(|v| *v /= norm);
        }
        counts
    }
}

impl EmbeddingFunction for LetterEmbedder {
    fn model_name(&self) -> &str {
        "letter-histogram"
    }

    fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| Self::vector(text)).collect())
    }

    fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        Ok(Self::vector(text))
    }
}

pub(crate) struct FailingEmbedder;

impl EmbeddingFunction for FailingEmbedder {
    fn model_name(&self) -> &str {
        "failing"
    }

    fn embed_documents(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(RagError::Embedding("embedding service unavailable".to_string()))
    }

    fn embed_query(&self, _text: &str) -> Result<Vec<f32>> {
        Err(RagError::Embedding("embedding service unavailable".to_string()))
    }
}

/// Records every prompt and answers with a fixed reply or a fixed error
pub(crate) struct RecordingGenerator {
    reply: std::result::Result<String, String>,
    pub(crate) prompts: Mutex<Vec<String>>,
}

impl RecordingGenerator {
    pub(crate) fn answering(reply: &str) -> Self {
        Self {
            reply: Ok(reply.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("prompt log lock").clone()
    }
}

impl TextGenerator for RecordingGenerator {
    fn model_name(&self) -> &str {
        "recording"
    }

    fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts
            .lock()
            .expect("prompt log lock")
            .push(prompt.to_string());
        self.reply.clone().map_err(RagError::Generation)
    }
}
