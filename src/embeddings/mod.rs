// Embeddings module
// The embedding-function seam bound to collections, and its Gemini implementation

pub mod gemini;

pub use gemini::GeminiEmbeddings;

use crate::Result;

/// Turns text into vectors for storage and for query-time similarity search.
///
/// Implementations must return exactly one vector per input, in input order.
pub trait EmbeddingFunction: Send + Sync {
    fn model_name(&self) -> &str;

    /// Embed documents that will be stored in a collection
    fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a question before searching a collection
    fn embed_query(&self, text: &str) -> Result<Vec<f32>>;
}
