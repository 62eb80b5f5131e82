// Query engine
// Retrieves the nearest documents for a question and asks the generator to answer from them


use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::chat::Responder;
use crate::config::Config;
use crate::database::lancedb::{Collection, VectorStore};
use crate::embeddings::{EmbeddingFunction, GeminiEmbeddings};
use crate::generation::{GeminiGenerator, TextGenerator};
use crate::{RagError, Result};

/// Separates retrieved documents inside the context block
pub const CONTEXT_DELIMITER: &str = "\n---\n";

/// Sentence the model is asked to reply with when the context has no answer
pub const FALLBACK_ANSWER: &str = "I cannot find an answer to this question in the available Python documentation.";

/// Join retrieved documents in retrieval order
#[inline]
pub fn assemble_context<S: AsRef<str>>(documents: &[S]) -> String {
    documents
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(CONTEXT_DELIMITER)
}

/// Fill the instruction template with the context block and the raw question
#[inline]
pub fn format_prompt(context: &str, question: &str) -> String {
    format!(
        "\nYou are an expert instructor and assistant for the Python programming language.\n\
         Answer the user's questions using only information from the documents in the CONTEXT below.\n\
         If the context does not contain the answer, say \"{FALLBACK_ANSWER}\"\n\
         \n\
         CONTEXT: {context}\n\
         \n\
         QUESTION: {question}\n"
    )
}

/// An opened collection paired with the generator that answers from it
pub struct QueryEngine {
    collection: Collection,
    generator: Arc<dyn TextGenerator>,
    top_k: usize,
}

impl QueryEngine {
    #[inline]
    pub fn new(collection: Collection, generator: Arc<dyn TextGenerator>, top_k: usize) -> Self {
        Self {
            collection,
            generator,
            top_k,
        }
    }

    #[inline]
    pub fn collection(&self) -> &Collection {
        &self.collection
    }

    #[inline]
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Text of the `top_k` documents nearest to `question`, most similar first
    #[inline]
    pub async fn retrieve(&self, question: &str) -> Result<Vec<String>> {
        let matches = self.collection.query(question, self.top_k).await?;
        debug!(
            "Retrieved documents: {:?}",
            matches.iter().map(|m| m.id.as_str()).collect::<Vec<_>>()
        );
        Ok(matches.into_iter().map(|m| m.document).collect())
    }

    /// Retrieve, assemble the context, format the prompt and generate.
    ///
    /// The generator's text is returned unmodified.
    #[inline]
    pub async fn generate_response(&self, question: &str) -> Result<String> {
        let documents = self.retrieve(question).await?;
        let context = assemble_context(&documents);
        let prompt = format_prompt(&context, question);

        info!(
            "Generating answer with {} from {} documents",
            self.generator.model_name(),
            documents.len()
        );
        self.generator.generate(&prompt)
    }
}

#[async_trait]
impl Responder for QueryEngine {
    async fn respond(&self, question: &str) -> Result<String> {
        self.generate_response(question).await
    }
}

/// Outcome of opening the query engine
#[derive(Clone)]
pub enum Availability {
    Ready(Arc<QueryEngine>),
    Unavailable {
        reason: String,
        cause: UnavailableCause,
    },
}

/// Why the query engine could not be opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnavailableCause {
    /// Missing API key or unusable Gemini settings
    Configuration,
    /// The collection has not been ingested yet
    MissingCollection,
    /// The vector database could not be opened or read
    Store,
}

impl UnavailableCause {
    fn of(error: &RagError) -> Self {
        match error {
            RagError::Config(_) => Self::Configuration,
            RagError::NotFound(_) => Self::MissingCollection,
            _ => Self::Store,
        }
    }

    /// The error a caller that needs an engine should fail with
    #[inline]
    pub fn into_error(self, reason: String) -> RagError {
        match self {
            Self::Configuration => RagError::Config(reason),
            Self::MissingCollection => RagError::NotFound(reason),
            Self::Store => RagError::Database(reason),
        }
    }
}

impl Availability {
    #[inline]
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

/// Open the configured collection with the Gemini services.
///
/// Never fails: every error becomes `Availability::Unavailable`.
#[inline]
pub async fn initialize(config: &Config) -> Availability {
    let services = GeminiEmbeddings::new(config).and_then(|embeddings| {
        GeminiGenerator::new(config).map(|generator| (embeddings, generator))
    });

    match services {
        Ok((embeddings, generator)) => {
            initialize_with(config, Arc::new(embeddings), Arc::new(generator)).await
        }
        Err(e) => unavailable(
            format!("Failed to load RAG components: {e}"),
            UnavailableCause::Configuration,
        ),
    }
}

/// Open the configured collection with the given services
#[inline]
pub async fn initialize_with(
    config: &Config,
    embedding_function: Arc<dyn EmbeddingFunction>,
    generator: Arc<dyn TextGenerator>,
) -> Availability {
    match open_engine(config, embedding_function, generator).await {
        Ok(Some(engine)) => Availability::Ready(Arc::new(engine)),
        Ok(None) => unavailable(
            format!(
                "Collection '{}' does not exist. Run `docs-rag ingest` first.",
                config.store.collection
            ),
            UnavailableCause::MissingCollection,
        ),
        Err(e) => unavailable(
            format!("Failed to load RAG components: {e}"),
            UnavailableCause::of(&e),
        ),
    }
}

async fn open_engine(
    config: &Config,
    embedding_function: Arc<dyn EmbeddingFunction>,
    generator: Arc<dyn TextGenerator>,
) -> Result<Option<QueryEngine>> {
    let store = VectorStore::open(config).await?;
    let name = &config.store.collection;

    if !store.has_collection(name).await? {
        return Ok(None);
    }

    let collection = store.open_collection(name, embedding_function).await?;
    if collection.count().await? == 0 {
        warn!(
            "Collection '{}' looks empty. Make sure ingestion has been run.",
            name
        );
    }

    info!("Query engine ready on collection {}", name);
    Ok(Some(QueryEngine::new(
        collection,
        generator,
        config.retrieval.top_k,
    )))
}

fn unavailable(reason: String, cause: UnavailableCause) -> Availability {
    error!("{}", reason);
    Availability::Unavailable { reason, cause }
}

static SHARED_ENGINE: Mutex<Option<Arc<QueryEngine>>> = Mutex::const_new(None);

/// Process-wide query engine, opened on first use.
///
/// Only a ready engine is kept, so a later call retries after `Unavailable`.
#[inline]
pub async fn shared(config: &Config) -> Availability {
    shared_with(|| initialize(config)).await
}

pub(crate) async fn shared_with<F, Fut>(init: F) -> Availability
where
    F: FnOnce() -> Fut + Send,
    Fut: Future<Output = Availability> + Send,
{
    let mut slot = SHARED_ENGINE.lock().await;
    if let Some(engine) = slot.as_ref() {
        return Availability::Ready(Arc::clone(engine));
    }

    let availability = init().await;
    if let Availability::Ready(engine) = &availability {
        *slot = Some(Arc::clone(engine));
    }
    availability
}

/// Release the process-wide query engine
#[inline]
pub async fn teardown() {
    if SHARED_ENGINE.lock().await.take().is_some() {
        debug!("Shared query engine released");
    }
}
