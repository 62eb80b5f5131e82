// Generation module
// The text-generation seam and its Gemini implementation

pub mod gemini;

pub use gemini::GeminiGenerator;

use crate::Result;

/// Produces an answer for a fully formatted prompt
pub trait TextGenerator: Send + Sync {
    fn model_name(&self) -> &str;

    fn generate(&self, prompt: &str) -> Result<String>;
}
