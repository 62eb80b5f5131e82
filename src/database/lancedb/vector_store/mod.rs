#[cfg(test)]
mod tests;

use super::DocumentRecord;
use crate::config::Config;
use crate::embeddings::EmbeddingFunction;
use crate::{RagError, Result};
use arrow::array::{Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use lancedb::database::CreateTableMode;
use lancedb::{
    Connection, Table,
    query::{ExecutableQuery, QueryBase},
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Persistent vector store holding named collections
pub struct VectorStore {
    connection: Connection,
    path: PathBuf,
}

/// Handle to one collection, bound to the embedding function used for queries
#[derive(Clone)]
pub struct Collection {
    table: Table,
    name: String,
    embedding_function: Arc<dyn EmbeddingFunction>,
}

/// Size and shape of a stored collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionInfo {
    pub name: String,
    pub count: u64,
    pub vector_dimension: usize,
}

/// A stored document returned by a similarity query
#[derive(Debug, Clone, PartialEq)]
pub struct QueryMatch {
    pub id: String,
    pub document: String,
    pub source: String,
    pub distance: f32,
}

impl VectorStore {
    /// Open (or create) the store at the configured path
    #[inline]
    pub async fn open(config: &Config) -> Result<Self> {
        Self::open_at(&config.vector_database_path()).await
    }

    #[inline]
    pub async fn open_at(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path).map_err(|e| {
            RagError::Database(format!(
                "Failed to create vector database directory {}: {}",
                path.display(),
                e
            ))
        })?;
        let path = std::fs::canonicalize(path)?;
        debug!("Opening LanceDB at path: {:?}", path);

        let connection = lancedb::connect(&path.to_string_lossy())
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to connect to LanceDB: {}", e)))?;

        Ok(Self { connection, path })
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    pub async fn collection_names(&self) -> Result<Vec<String>> {
        self.connection
            .table_names()
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to list collections: {}", e)))
    }

    #[inline]
    pub async fn has_collection(&self, name: &str) -> Result<bool> {
        Ok(self.collection_names().await?.iter().any(|n| n == name))
    }

    /// Open an existing collection, failing with `NotFound` when it does not exist
    #[inline]
    pub async fn open_collection(
        &self,
        name: &str,
        embedding_function: Arc<dyn EmbeddingFunction>,
    ) -> Result<Collection> {
        if !self.has_collection(name).await? {
            return Err(RagError::NotFound(format!(
                "Collection '{}' does not exist in {}",
                name,
                self.path.display()
            )));
        }

        let table = self
            .connection
            .open_table(name)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to open collection: {}", e)))?;

        Ok(Collection {
            table,
            name: name.to_string(),
            embedding_function,
        })
    }

    /// Describe the named collection without binding an embedding function
    #[inline]
    pub async fn collection_info(&self, name: &str) -> Result<Option<CollectionInfo>> {
        if !self.has_collection(name).await? {
            return Ok(None);
        }

        let table = self
            .connection
            .open_table(name)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to open collection: {}", e)))?;

        Ok(Some(CollectionInfo {
            name: name.to_string(),
            count: table_row_count(&table).await?,
            vector_dimension: table_vector_dimension(&table).await?,
        }))
    }

    /// Replace the named collection with one holding exactly `records`.
    ///
    /// The new contents are committed as a single overwrite, so a failure leaves
    /// the previous collection readable.
    #[inline]
    pub async fn replace_collection(
        &self,
        name: &str,
        records: &[DocumentRecord],
        embedding_function: Arc<dyn EmbeddingFunction>,
    ) -> Result<Collection> {
        let batch = create_record_batch(records)?;
        let schema = batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(batch)), schema);

        if self.has_collection(name).await? {
            info!("Replacing existing collection: {}", name);
        } else {
            info!("Creating collection: {}", name);
        }

        let table = self
            .connection
            .create_table(name, reader)
            .mode(CreateTableMode::Overwrite)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to write collection: {}", e)))?;

        info!("Stored {} documents in collection {}", records.len(), name);

        Ok(Collection {
            table,
            name: name.to_string(),
            embedding_function,
        })
    }
}

impl Collection {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of documents stored
    #[inline]
    pub async fn count(&self) -> Result<u64> {
        table_row_count(&self.table).await
    }

    /// Dimension of the stored vectors, read from the table schema
    #[inline]
    pub async fn vector_dimension(&self) -> Result<usize> {
        table_vector_dimension(&self.table).await
    }

    /// Embed `query_text` with the bound embedding function and return the
    /// `n_results` nearest documents, most similar first
    #[inline]
    pub async fn query(&self, query_text: &str, n_results: usize) -> Result<Vec<QueryMatch>> {
        if n_results == 0 {
            return Ok(Vec::new());
        }

        let query_vector = self.embedding_function.embed_query(query_text)?;
        self.query_by_vector(&query_vector, n_results).await
    }

    #[inline]
    pub async fn query_by_vector(
        &self,
        query_vector: &[f32],
        n_results: usize,
    ) -> Result<Vec<QueryMatch>> {
        debug!(
            "Searching collection {} for {} nearest documents",
            self.name, n_results
        );

        let mut results = self
            .table
            .vector_search(query_vector)
            .map_err(|e| RagError::Database(format!("Failed to create vector search: {}", e)))?
            .column("vector")
            .limit(n_results)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to execute search: {}", e)))?;

        let mut matches = Vec::new();
        while let Some(batch) = results
            .try_next()
            .await
            .map_err(|e| RagError::Database(format!("Failed to read result stream: {}", e)))?
        {
            matches.extend(parse_search_batch(&batch)?);
        }

        matches.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        matches.truncate(n_results);

        debug!("Found {} matching documents", matches.len());
        Ok(matches)
    }
}

async fn table_row_count(table: &Table) -> Result<u64> {
    let count = table
        .count_rows(None)
        .await
        .map_err(|e| RagError::Database(format!("Failed to count rows: {}", e)))?;

    Ok(count as u64)
}

async fn table_vector_dimension(table: &Table) -> Result<usize> {
    let schema = table
        .schema()
        .await
        .map_err(|e| RagError::Database(format!("Failed to get table schema: {}", e)))?;

    schema
        .fields()
        .iter()
        .find(|field| field.name() == "vector")
        .and_then(|field| match field.data_type() {
            DataType::FixedSizeList(_, size) => usize::try_from(*size).ok(),
            _ => None,
        })
        .ok_or_else(|| {
            RagError::Database("Could not find vector column or determine dimension".to_string())
        })
}

fn create_schema(vector_dim: i32) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new(
            "vector",
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, true)),
                vector_dim,
            ),
            false,
        ),
        Field::new("document", DataType::Utf8, false),
        Field::new("source", DataType::Utf8, false),
        Field::new("ingested_at", DataType::Utf8, false),
    ]))
}

/// Build a RecordBatch from document records, all vectors must share one dimension
fn create_record_batch(records: &[DocumentRecord]) -> Result<RecordBatch> {
    let Some(first) = records.first() else {
        return Err(RagError::EmptyInput(
            "Cannot create a collection without documents".to_string(),
        ));
    };

    let vector_dim = first.vector.len();
    if vector_dim == 0 {
        return Err(RagError::Embedding("Embedding vectors are empty".to_string()));
    }
    if let Some(record) = records.iter().find(|r| r.vector.len() != vector_dim) {
        return Err(RagError::Embedding(format!(
            "Document {} has a {}-dimensional vector, expected {}",
            record.id,
            record.vector.len(),
            vector_dim
        )));
    }
    let list_size = i32::try_from(vector_dim)
        .map_err(|_| RagError::Embedding(format!("Vector dimension {vector_dim} is too large")))?;

    let mut flat_values = Vec::with_capacity(records.len() * vector_dim);
    for record in records {
        flat_values.extend_from_slice(&record.vector);
    }
    let field = Arc::new(Field::new("item", DataType::Float32, true));
    let vector_array = FixedSizeListArray::try_new(
        field,
        list_size,
        Arc::new(Float32Array::from(flat_values)),
        None,
    )
    .map_err(|e| RagError::Database(format!("Failed to create vector array: {}", e)))?;

    let arrays: Vec<Arc<dyn Array>> = vec![
        Arc::new(StringArray::from_iter_values(
            records.iter().map(|r| r.id.as_str()),
        )),
        Arc::new(vector_array),
        Arc::new(StringArray::from_iter_values(
            records.iter().map(|r| r.document.as_str()),
        )),
        Arc::new(StringArray::from_iter_values(
            records.iter().map(|r| r.source.as_str()),
        )),
        Arc::new(StringArray::from_iter_values(
            records.iter().map(|r| r.ingested_at.as_str()),
        )),
    ];

    RecordBatch::try_new(create_schema(list_size), arrays)
        .map_err(|e| RagError::Database(format!("Failed to create record batch: {}", e)))
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .ok_or_else(|| RagError::Database(format!("Missing {name} column")))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| RagError::Database(format!("Invalid {name} column type")))
}

/// Parse a single record batch from search results
fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<QueryMatch>> {
    let ids = string_column(batch, "id")?;
    let documents = string_column(batch, "document")?;
    let sources = string_column(batch, "source")?;

    let distances = batch
        .column_by_name("_distance")
        .and_then(|col| col.as_any().downcast_ref::<Float32Array>());

    Ok((0..batch.num_rows())
        .map(|row| QueryMatch {
            id: ids.value(row).to_string(),
            document: documents.value(row).to_string(),
            source: sources.value(row).to_string(),
            distance: distances
                .map_or(0.0, |d| if d.is_null(row) { 0.0 } else { d.value(row) }),
        })
        .collect())
}
