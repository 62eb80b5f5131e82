use super::*;
use crate::test_support::{FailingEmbedder, LetterEmbedder};
use tempfile::TempDir;

fn create_source_dir(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().expect("should create source dir");
    for (name, content) in files {
        fs::write(dir.path().join(name), content).expect("should write source file");
    }
    dir
}

fn create_test_ingestor(base_dir: &Path) -> Ingestor {
    let config = Config {
        base_dir: base_dir.to_path_buf(),
        ..Config::default()
    };
    Ingestor::with_embedding_function(config, Arc::new(LetterEmbedder))
}

#[test]
fn load_documents_skips_blank_and_non_text_files() {
    let source = create_source_dir(&[
        ("a.txt", "  Lists are mutable sequences.\n"),
        ("b.txt", "   \n\t"),
        ("c.md", "# not text"),
        ("d.txt", "Tuples are immutable."),
    ]);
    fs::create_dir(source.path().join("nested.txt")).expect("should create dir");

    let loaded = load_documents(source.path(), true).expect("should load documents");

    assert_eq!(loaded.documents.len(), 2);
    assert_eq!(loaded.skipped, 3);
    assert_eq!(loaded.documents[0].text, "Lists are mutable sequences.");
    assert_eq!(loaded.documents[0].source, "a.txt");
    assert_eq!(loaded.documents[1].source, "d.txt");
}

#[test]
fn ids_are_sequential_over_qualifying_files() {
    let source = create_source_dir(&[
        ("1.txt", "one"),
        ("2.txt", ""),
        ("3.txt", "three"),
        ("4.txt", "four"),
    ]);

    let loaded = load_documents(source.path(), true).expect("should load documents");
    let ids: Vec<&str> = loaded.documents.iter().map(|d| d.id.as_str()).collect();

    assert_eq!(ids, vec!["0", "1", "2"]);
    let sources: Vec<&str> = loaded.documents.iter().map(|d| d.source.as_str()).collect();
    assert_eq!(sources, vec!["1.txt", "3.txt", "4.txt"]);
}

#[test]
fn listing_order_yields_unique_ids() {
    let source = create_source_dir(&[("x.txt", "x"), ("y.txt", "y"), ("z.txt", "z")]);

    let loaded = load_documents(source.path(), false).expect("should load documents");

    let mut ids: Vec<&str> = loaded.documents.iter().map(|d| d.id.as_str()).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec!["0", "1", "2"]);
}

#[test]
fn missing_directory_is_not_found() {
    let parent = TempDir::new().expect("should create temp dir");
    let result = load_documents(&parent.path().join("missing"), false);

    assert!(matches!(result, Err(RagError::NotFound(_))));
}

#[test]
fn directory_without_documents_is_empty_input() {
    let source = create_source_dir(&[("blank.txt", "\n\n"), ("notes.md", "text")]);

    let result = load_documents(source.path(), false);

    assert!(matches!(result, Err(RagError::EmptyInput(_))));
}

#[test]
fn missing_credential_is_a_configuration_error() {
    let result = Ingestor::new(Config::default());
    assert!(matches!(result, Err(RagError::Config(_))));
}

#[tokio::test]
async fn ingestion_stores_one_document_per_non_empty_file() {
    let base = TempDir::new().expect("should create base dir");
    let source = create_source_dir(&[
        ("a.txt", "alpha"),
        ("b.txt", "beta"),
        ("c.txt", " "),
        ("d.txt", "delta"),
    ]);

    let report = create_test_ingestor(base.path())
        .run(source.path())
        .await
        .expect("ingestion should succeed");

    assert_eq!(report.collection, "python_docs");
    assert_eq!(report.documents_stored, 3);
    assert_eq!(report.files_skipped, 1);
    assert_eq!(report.vector_dimension, 8);
}

#[tokio::test]
async fn rerunning_ingestion_replaces_instead_of_appending() {
    let base = TempDir::new().expect("should create base dir");
    let source = create_source_dir(&[("a.txt", "alpha"), ("b.txt", "beta")]);
    let ingestor = create_test_ingestor(base.path());

    let first = ingestor.run(source.path()).await.expect("first run");
    let second = ingestor.run(source.path()).await.expect("second run");

    assert_eq!(first.documents_stored, 2);
    assert_eq!(second.documents_stored, 2);
}

#[tokio::test]
async fn missing_source_directory_leaves_store_untouched() {
    let base = TempDir::new().expect("should create base dir");
    let source = create_source_dir(&[("a.txt", "alpha")]);
    let ingestor = create_test_ingestor(base.path());
    ingestor.run(source.path()).await.expect("initial run");

    let missing = source.path().to_path_buf();
    drop(source);
    let result = ingestor.run(&missing).await;
    assert!(matches!(result, Err(RagError::NotFound(_))));

    let store = VectorStore::open(&ingestor.config)
        .await
        .expect("should open store");
    let collection = store
        .open_collection("python_docs", Arc::new(LetterEmbedder))
        .await
        .expect("collection should survive");
    assert_eq!(collection.count().await.expect("should count"), 1);
}

#[tokio::test]
async fn missing_source_directory_creates_no_collection() {
    let base = TempDir::new().expect("should create base dir");
    let ingestor = create_test_ingestor(base.path());

    let result = ingestor.run(&base.path().join("does-not-exist")).await;

    assert!(matches!(result, Err(RagError::NotFound(_))));
    assert!(!ingestor.config.vector_database_path().exists());
}

#[tokio::test]
async fn embedding_failure_keeps_previous_collection() {
    let base = TempDir::new().expect("should create base dir");
    let source = create_source_dir(&[("a.txt", "alpha"), ("b.txt", "beta")]);
    create_test_ingestor(base.path())
        .run(source.path())
        .await
        .expect("initial run");

    fs::write(source.path().join("c.txt"), "gamma").expect("should add file");
    let failing = Ingestor::with_embedding_function(
        Config {
            base_dir: base.path().to_path_buf(),
            ..Config::default()
        },
        Arc::new(FailingEmbedder),
    );
    let result = failing.run(source.path()).await;
    assert!(matches!(result, Err(RagError::Embedding(_))));

    let store = VectorStore::open(&failing.config)
        .await
        .expect("should open store");
    let collection = store
        .open_collection("python_docs", Arc::new(LetterEmbedder))
        .await
        .expect("collection should survive");
    assert_eq!(collection.count().await.expect("should count"), 2);
}
