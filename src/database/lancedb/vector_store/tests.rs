use super::*;
use crate::test_support::{FailingEmbedder, LetterEmbedder};
use tempfile::TempDir;

fn create_test_config() -> (Config, TempDir) {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = Config {
        base_dir: temp_dir.path().to_path_buf(),
        ..Config::default()
    };
    (config, temp_dir)
}

fn create_test_record(id: &str, document: &str) -> DocumentRecord {
    DocumentRecord {
        id: id.to_string(),
        vector: LetterEmbedder::vector(document),
        document: document.to_string(),
        source: format!("{id}.txt"),
        ingested_at: "2024-01-01T00:00:00Z".to_string(),
    }
}

fn letter_embedder() -> Arc<dyn EmbeddingFunction> {
    Arc::new(LetterEmbedder)
}

#[tokio::test]
async fn vector_store_initialization() {
    let (config, _temp_dir) = create_test_config();

    let store = VectorStore::open(&config)
        .await
        .expect("should open vector store");

    assert!(store.path().ends_with("vectors"));
    assert!(store.path().exists());
    assert!(
        store
            .collection_names()
            .await
            .expect("should list collections")
            .is_empty()
    );
}

#[tokio::test]
async fn replace_collection_stores_all_records() {
    let (config, _temp_dir) = create_test_config();
    let store = VectorStore::open(&config)
        .await
        .expect("should open vector store");

    let records = vec![
        create_test_record("0", "aaaa"),
        create_test_record("1", "bbbb"),
        create_test_record("2", "cccc"),
    ];
    let collection = store
        .replace_collection("python_docs", &records, letter_embedder())
        .await
        .expect("should create collection");

    assert_eq!(collection.name(), "python_docs");
    assert_eq!(collection.count().await.expect("should count"), 3);
    assert_eq!(
        collection
            .vector_dimension()
            .await
            .expect("should detect dimension"),
        8
    );
    assert!(
        store
            .has_collection("python_docs")
            .await
            .expect("should check collection")
    );
}

#[tokio::test]
async fn replacing_twice_does_not_accumulate() {
    let (config, _temp_dir) = create_test_config();
    let store = VectorStore::open(&config)
        .await
        .expect("should open vector store");

    let records = vec![create_test_record("0", "abc"), create_test_record("1", "def")];
    store
        .replace_collection("python_docs", &records, letter_embedder())
        .await
        .expect("first write");
    let collection = store
        .replace_collection("python_docs", &records, letter_embedder())
        .await
        .expect("second write");

    assert_eq!(collection.count().await.expect("should count"), 2);

    let reopened = store
        .open_collection("python_docs", letter_embedder())
        .await
        .expect("should reopen");
    assert_eq!(reopened.count().await.expect("should count"), 2);
}

#[tokio::test]
async fn replacing_with_new_dimension_succeeds() {
    let (config, _temp_dir) = create_test_config();
    let store = VectorStore::open(&config)
        .await
        .expect("should open vector store");

    store
        .replace_collection("docs", &[create_test_record("0", "abc")], letter_embedder())
        .await
        .expect("first write");

    let wide = DocumentRecord {
        vector: vec![0.5; 16],
        ..create_test_record("0", "abc")
    };
    let collection = store
        .replace_collection("docs", &[wide], letter_embedder())
        .await
        .expect("second write");

    assert_eq!(
        collection
            .vector_dimension()
            .await
            .expect("should detect dimension"),
        16
    );
}

#[tokio::test]
async fn mismatched_dimensions_are_rejected_before_writing() {
    let (config, _temp_dir) = create_test_config();
    let store = VectorStore::open(&config)
        .await
        .expect("should open vector store");

    let mut short = create_test_record("1", "bbb");
    short.vector.truncate(4);
    let result = store
        .replace_collection(
            "docs",
            &[create_test_record("0", "aaa"), short],
            letter_embedder(),
        )
        .await;

    assert!(matches!(result, Err(RagError::Embedding(_))));
    assert!(!store.has_collection("docs").await.expect("should check"));
}

#[tokio::test]
async fn empty_records_are_rejected() {
    let (config, _temp_dir) = create_test_config();
    let store = VectorStore::open(&config)
        .await
        .expect("should open vector store");

    let result = store
        .replace_collection("docs", &[], letter_embedder())
        .await;

    assert!(matches!(result, Err(RagError::EmptyInput(_))));
}

#[tokio::test]
async fn open_missing_collection_is_not_found() {
    let (config, _temp_dir) = create_test_config();
    let store = VectorStore::open(&config)
        .await
        .expect("should open vector store");

    let result = store
        .open_collection("python_docs", letter_embedder())
        .await;

    assert!(matches!(result, Err(RagError::NotFound(_))));
}

#[tokio::test]
async fn query_returns_nearest_documents_first() {
    let (config, _temp_dir) = create_test_config();
    let store = VectorStore::open(&config)
        .await
        .expect("should open vector store");

    let records = vec![
        create_test_record("0", "aaaa aaaa"),
        create_test_record("1", "bbbb bbbb"),
        create_test_record("2", "aaab aaab"),
        create_test_record("3", "hhhh hhhh"),
    ];
    let collection = store
        .replace_collection("docs", &records, letter_embedder())
        .await
        .expect("should create collection");

    let matches = collection.query("aaaa", 2).await.expect("should query");

    assert_eq!(matches.len(), 2);
    assert_eq!(matches[0].id, "0");
    assert_eq!(matches[0].document, "aaaa aaaa");
    assert_eq!(matches[0].source, "0.txt");
    assert_eq!(matches[1].id, "2");
    assert!(matches[0].distance <= matches[1].distance);
}

#[tokio::test]
async fn query_with_more_results_than_documents() {
    let (config, _temp_dir) = create_test_config();
    let store = VectorStore::open(&config)
        .await
        .expect("should open vector store");

    let collection = store
        .replace_collection(
            "docs",
            &[create_test_record("0", "abc"), create_test_record("1", "cde")],
            letter_embedder(),
        )
        .await
        .expect("should create collection");

    let matches = collection.query("abc", 3).await.expect("should query");
    assert_eq!(matches.len(), 2);

    let none = collection.query("abc", 0).await.expect("should query");
    assert!(none.is_empty());
}

#[tokio::test]
async fn query_propagates_embedding_failures() {
    let (config, _temp_dir) = create_test_config();
    let store = VectorStore::open(&config)
        .await
        .expect("should open vector store");

    store
        .replace_collection("docs", &[create_test_record("0", "abc")], letter_embedder())
        .await
        .expect("should create collection");
    let collection = store
        .open_collection("docs", Arc::new(FailingEmbedder))
        .await
        .expect("should open collection");

    let result = collection.query("abc", 3).await;
    assert!(matches!(result, Err(RagError::Embedding(_))));
}

#[tokio::test]
async fn failed_replacement_keeps_previous_collection() {
    let (config, _temp_dir) = create_test_config();
    let store = VectorStore::open(&config)
        .await
        .expect("should open vector store");
    store
        .replace_collection(
            "docs",
            &[create_test_record("0", "aaaa"), create_test_record("1", "bbbb")],
            letter_embedder(),
        )
        .await
        .expect("should create collection");

    let mut short = create_test_record("3", "dddd");
    short.vector.truncate(4);
    let mismatched = store
        .replace_collection(
            "docs",
            &[create_test_record("2", "cccc"), short],
            letter_embedder(),
        )
        .await;
    assert!(matches!(mismatched, Err(RagError::Embedding(_))));

    let empty = store
        .replace_collection("docs", &[], letter_embedder())
        .await;
    assert!(matches!(empty, Err(RagError::EmptyInput(_))));

    let reopened = VectorStore::open(&config)
        .await
        .expect("should reopen vector store");
    let collection = reopened
        .open_collection("docs", letter_embedder())
        .await
        .expect("collection should survive");
    assert_eq!(collection.count().await.expect("should count"), 2);
    let matches = collection.query("aaaa", 1).await.expect("should query");
    assert_eq!(matches[0].document, "aaaa");
}

#[tokio::test]
async fn collection_info_describes_stored_collection() {
    let (config, _temp_dir) = create_test_config();
    let store = VectorStore::open(&config)
        .await
        .expect("should open vector store");

    assert_eq!(
        store
            .collection_info("python_docs")
            .await
            .expect("should describe"),
        None
    );

    store
        .replace_collection(
            "python_docs",
            &[create_test_record("0", "abc"), create_test_record("1", "def")],
            letter_embedder(),
        )
        .await
        .expect("should create collection");

    let info = store
        .collection_info("python_docs")
        .await
        .expect("should describe")
        .expect("collection should exist");
    assert_eq!(info.name, "python_docs");
    assert_eq!(info.count, 2);
    assert_eq!(info.vector_dimension, 8);
}
