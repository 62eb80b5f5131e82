// Chat session
// Keeps the conversation transcript and turns answer failures into apologies


use async_trait::async_trait;
use serde::Serialize;
use tracing::{error, info};

use crate::Result;

/// Anything that can answer a single question
#[async_trait]
pub trait Responder: Send + Sync {
    async fn respond(&self, question: &str) -> Result<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Whether an assistant entry holds a generated answer or an apology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Answered,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// Set on assistant entries only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
}

impl Message {
    #[inline]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            outcome: None,
        }
    }

    #[inline]
    pub fn assistant(content: impl Into<String>, outcome: Outcome) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            outcome: Some(outcome),
        }
    }
}

/// Append-only record of one session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    #[inline]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// What to show the user for one turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutput {
    pub answer: String,
    pub outcome: Outcome,
}

/// Text shown in place of an answer when generation fails
#[inline]
pub fn apology(error: &impl std::fmt::Display) -> String {
    format!("Sorry, an error occurred while generating the answer: {error}")
}

#[derive(Debug, Default)]
pub struct ChatSession {
    transcript: Transcript,
}

impl ChatSession {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Record the question, answer it and record exactly one assistant entry.
    ///
    /// Errors never escape: they become an apology with outcome `Failed`.
    #[inline]
    pub async fn handle_turn(&mut self, responder: &dyn Responder, input: &str) -> TurnOutput {
        self.transcript.push(Message::user(input));

        let output = match responder.respond(input).await {
            Ok(answer) => {
                info!("Answered question ({} chars)", answer.len());
                TurnOutput {
                    answer,
                    outcome: Outcome::Answered,
                }
            }
            Err(e) => {
                error!("Failed to generate answer: {}", e);
                TurnOutput {
                    answer: apology(&e),
                    outcome: Outcome::Failed,
                }
            }
        };

        self.transcript
            .push(Message::assistant(output.answer.clone(), output.outcome));
        output
    }
}
