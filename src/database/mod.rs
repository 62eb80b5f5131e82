// Database module
// LanceDB-backed persistent collections of embedded documents

pub mod lancedb;

pub use lancedb::{Collection, CollectionInfo, DocumentRecord, QueryMatch, VectorStore};
