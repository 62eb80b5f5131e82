// Shared fixtures: a mock Gemini API and throwaway source directories
#![allow(dead_code, reason = "each test binary uses a subset of the fixtures")]

use std::fs;
use std::path::Path;

use docs_rag::config::{Config, GeminiConfig};
use serde_json::{Value, json};
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

pub const TEST_API_KEY: &str = "integration-key";
pub const EMBED_PATH: &str = "/v1beta/models/text-embedding-004:batchEmbedContents";
pub const GENERATE_PATH: &str = "/v1beta/models/gemini-2.5-flash:generateContent";

/// Letter histogram over `a..=h`, normalized, so related texts embed close together
pub fn letter_vector(text: &str) -> Vec<f32> {
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

/// Embeds every text of a `batchEmbedContents` request with [`letter_vector`]
pub struct LetterEmbeddings;

impl Respond for LetterEmbeddings {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = serde_json::from_slice(&request.body).expect("request body is json");
        let embeddings: Vec<Value> = body["requests"]
            .as_array()
            .expect("requests array")
            .iter()
            .map(|entry| {
                let text = entry["content"]["parts"][0]["text"]
                    .as_str()
                    .expect("text part");
                json!({ "values": letter_vector(text) })
            })
            .collect();
        ResponseTemplate::new(200).set_body_json(json!({ "embeddings": embeddings }))
    }
}

pub async fn mount_embeddings(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(EMBED_PATH))
        .and(header("x-goog-api-key", TEST_API_KEY))
        .respond_with(LetterEmbeddings)
        .mount(server)
        .await;
}

pub async fn mount_generation(server: &MockServer, answer: &str) {
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .and(header("x-goog-api-key", TEST_API_KEY))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": answer}]},
                "finishReason": "STOP"
            }]
        })))
        .mount(server)
        .await;
}

/// Prompts sent to `generateContent`, in order
pub async fn generation_prompts(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.url.path() == GENERATE_PATH)
        .map(|request| {
            let body: Value =
                serde_json::from_slice(&request.body).expect("request body is json");
            body["contents"][0]["parts"][0]["text"]
                .as_str()
                .expect("prompt text")
                .to_string()
        })
        .collect()
}

pub fn create_test_config(server: &MockServer, base_dir: &Path) -> Config {
    Config {
        gemini: GeminiConfig {
            base_url: server.uri(),
            api_key: Some(TEST_API_KEY.to_string()),
            retry_attempts: 1,
            timeout_seconds: 10,
            ..GeminiConfig::default()
        },
        base_dir: base_dir.to_path_buf(),
        ..Config::default()
    }
}

pub fn create_source_dir(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().expect("should create source dir");
    for (name, content) in files {
        fs::write(dir.path().join(name), content).expect("should write source file");
    }
    dir
}
