// LanceDB vector database module
// Handles collection storage and similarity search for document embeddings


pub mod vector_store;

pub use vector_store::{Collection, CollectionInfo, QueryMatch, VectorStore};

use serde::{Deserialize, Serialize};

/// One embedded document as stored in a collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Sequential id assigned at ingestion time
    pub id: String,
    /// The vector embedding, all records of a collection share its dimension
    pub vector: Vec<f32>,
    /// Full document text
    pub document: String,
    /// File name the document was read from
    pub source: String,
    /// Timestamp when this document was ingested
    pub ingested_at: String,
}
