use super::*;
use crate::documents::FileLoader;
use crate::test_support::{HashingEmbedder, MockLanguageModel, TEST_DIMENSION};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const SR_11_7: &str = "Model validation requires independent review under SR 11-7.\n\n\
    Ongoing monitoring confirms that a model continues to perform as intended.";
const INVENTORY: &str = "The model inventory records every model in use, its owner and its risk tier.";

fn test_config(base: &Path) -> Config {
    let mut config = Config {
        base_dir: base.to_path_buf(),
        ..Config::default()
    };
    config.ollama.embedding_dimension = TEST_DIMENSION as u32;
    config.ollama.batch_size = 2;
    config.chunking.chunk_size = 50;
    config
}

fn write_docs(config: &Config) {
    let docs = config.docs_dir();
    fs::create_dir_all(&docs).expect("should create docs dir");
    fs::write(docs.join("sr11-7.txt"), SR_11_7).expect("should write doc");
    fs::write(docs.join("inventory.md"), INVENTORY).expect("should write doc");
}

fn store_with(config: Config, embeddings: HashingEmbedder) -> DocumentStore {
    DocumentStore::new(
        config,
        Arc::new(FileLoader),
        Arc::new(embeddings),
        Arc::new(MockLanguageModel::new()),
        ActiveRetriever::new(),
    )
    .expect("store should build")
}

fn store(config: Config) -> DocumentStore {
    store_with(config, HashingEmbedder::new())
}

#[tokio::test]
async fn process_builds_index_and_installs_retriever() {
    let temp = TempDir::new().expect("should create temp dir");
    let config = test_config(temp.path());
    write_docs(&config);
    let store = store(config);

    let stats = store
        .process(None, 50, Backend::Flat)
        .await
        .expect("processing should succeed");

    assert_eq!(stats.documents_loaded, 2);
    assert!(stats.chunks_created >= 2);
    assert_eq!(stats.backend, Backend::Flat);
    assert_eq!(stats.index_path, store.config().backend_path(Backend::Flat));
    assert!(store.active_retriever().is_ready().await);

    let manifest = IndexManifest::read_from(&stats.index_path).expect("manifest should exist");
    assert_eq!(manifest.backend, Backend::Flat);
    assert_eq!(manifest.embedding_model, "hashing-test-embedder");
    assert_eq!(manifest.dimension, TEST_DIMENSION);
    assert_eq!(manifest.chunk_count, stats.chunks_created);
}

#[tokio::test]
async fn process_explicit_paths_only_loads_those_files() {
    let temp = TempDir::new().expect("should create temp dir");
    let config = test_config(temp.path());
    write_docs(&config);
    let only = config.docs_dir().join("inventory.md");
    let store = store(config);

    let stats = store
        .process(Some(vec![only]), 50, Backend::Flat)
        .await
        .expect("processing should succeed");

    assert_eq!(stats.documents_loaded, 1);
    assert_eq!(stats.chunks_created, 1);
}

#[tokio::test]
async fn process_without_documents_fails() {
    let temp = TempDir::new().expect("should create temp dir");
    let store = store(test_config(temp.path()));

    let result = store.process(None, 50, Backend::Flat).await;

    assert!(matches!(result, Err(RagError::Load(_))));
    assert!(!store.active_retriever().is_ready().await);
}

#[tokio::test]
async fn failed_process_keeps_previous_retriever() {
    let temp = TempDir::new().expect("should create temp dir");
    let config = test_config(temp.path());
    write_docs(&config);
    let store = store(config);

    store
        .process(None, 50, Backend::Flat)
        .await
        .expect("first run should succeed");
    let before = store
        .active_retriever()
        .snapshot()
        .await
        .expect("retriever should be installed");

    let missing = temp.path().join("missing.pdf");
    let result = store.process(Some(vec![missing]), 50, Backend::Flat).await;
    assert!(result.is_err());

    let after = store
        .active_retriever()
        .snapshot()
        .await
        .expect("retriever should still be installed");
    assert!(Arc::ptr_eq(&before, &after));
}

#[tokio::test(flavor = "multi_thread")]
async fn held_lance_snapshot_survives_reprocessing() {
    let temp = TempDir::new().expect("should create temp dir");
    let config = test_config(temp.path());
    write_docs(&config);
    let store = store(config);

    store
        .process(None, 50, Backend::Lance)
        .await
        .expect("first run should succeed");
    let held = store
        .active_retriever()
        .snapshot()
        .await
        .expect("retriever should be installed");

    store
        .process(None, 20, Backend::Lance)
        .await
        .expect("second run should succeed");

    let chunks = held
        .retrieve("model validation independent review")
        .await
        .expect("held snapshot should still retrieve");
    assert!(!chunks.is_empty());

    let current = store
        .active_retriever()
        .snapshot()
        .await
        .expect("retriever should be installed");
    assert!(!Arc::ptr_eq(&held, &current));
    current
        .retrieve("model inventory risk tier")
        .await
        .expect("new snapshot should retrieve");

    let reopened = store_with(test_config(temp.path()), HashingEmbedder::new());
    reopened
        .load_existing(Backend::Lance)
        .await
        .expect("rewritten index should reload");
}

#[tokio::test]
async fn invalid_chunk_size_creates_no_chunks() {
    let temp = TempDir::new().expect("should create temp dir");
    let mut config = test_config(temp.path());
    config.chunking.chunk_overlap = 10;
    write_docs(&config);
    let store = store(config);

    let result = store.process(None, 5, Backend::Flat).await;

    assert!(matches!(result, Err(RagError::Chunking(_))));
}

#[tokio::test]
async fn embedding_dimension_mismatch_fails() {
    let temp = TempDir::new().expect("should create temp dir");
    let config = test_config(temp.path());
    write_docs(&config);
    let store = store_with(config, HashingEmbedder::with_dimension(32));

    let result = store.process(None, 50, Backend::Flat).await;

    assert!(matches!(result, Err(RagError::Embedding(_))));
    assert!(!store.active_retriever().is_ready().await);
}

#[tokio::test]
async fn embedding_failure_fails_processing() {
    let temp = TempDir::new().expect("should create temp dir");
    let config = test_config(temp.path());
    write_docs(&config);
    let store = store_with(config, HashingEmbedder::failing());

    let result = store.process(None, 50, Backend::Flat).await;

    assert!(matches!(result, Err(RagError::Embedding(_))));
}

#[tokio::test]
async fn load_existing_reopens_persisted_index() {
    let temp = TempDir::new().expect("should create temp dir");
    let config = test_config(temp.path());
    write_docs(&config);

    let stats = store(config.clone())
        .process(None, 50, Backend::Flat)
        .await
        .expect("processing should succeed");

    let embedder = HashingEmbedder::new();
    let fresh = store_with(config, embedder);
    let chunks = fresh
        .load_existing(Backend::Flat)
        .await
        .expect("index should load");

    assert_eq!(chunks, stats.chunks_created);
    let retriever = fresh
        .active_retriever()
        .snapshot()
        .await
        .expect("retriever should be installed");
    assert_eq!(retriever.backend(), Backend::Flat);
    assert!(retriever.is_compressing());
}

#[tokio::test]
async fn load_existing_without_index_is_not_found() {
    let temp = TempDir::new().expect("should create temp dir");
    let store = store(test_config(temp.path()));

    let result = store.load_existing(Backend::Flat).await;

    assert!(matches!(result, Err(RagError::IndexNotFound(_))));
    assert!(!store.active_retriever().is_ready().await);
}

#[tokio::test]
async fn load_existing_rejects_other_dimension() {
    let temp = TempDir::new().expect("should create temp dir");
    let config = test_config(temp.path());
    write_docs(&config);
    store(config.clone())
        .process(None, 50, Backend::Flat)
        .await
        .expect("processing should succeed");

    let mut wider = config;
    wider.ollama.embedding_dimension = 128;
    let store = store_with(wider, HashingEmbedder::with_dimension(128));

    let result = store.load_existing(Backend::Flat).await;

    assert!(matches!(result, Err(RagError::IncompatibleIndex(_))));
}

#[tokio::test]
async fn compression_can_be_disabled() {
    let temp = TempDir::new().expect("should create temp dir");
    let mut config = test_config(temp.path());
    config.retrieval.compress = false;
    write_docs(&config);
    let store = store(config);

    store
        .process(None, 50, Backend::Flat)
        .await
        .expect("processing should succeed");

    let retriever = store
        .active_retriever()
        .snapshot()
        .await
        .expect("retriever should be installed");
    assert!(!retriever.is_compressing());
}

#[tokio::test]
async fn system_info_before_and_after_processing() {
    let temp = TempDir::new().expect("should create temp dir");
    let config = test_config(temp.path());
    write_docs(&config);
    let store = store(config);

    let info = store.system_info().await;
    assert!(!info.retriever_ready);
    assert_eq!(info.backend_type, Backend::Lance);
    assert_eq!(info.document_count, 2);
    assert_eq!(info.indexed_chunks, None);
    assert_eq!(info.embedding_model, "hashing-test-embedder");
    assert_eq!(info.generator_model, "mock-mrm-model");

    let stats = store
        .process(None, 50, Backend::Flat)
        .await
        .expect("processing should succeed");

    let info = store.system_info().await;
    assert!(info.retriever_ready);
    assert_eq!(info.backend_type, Backend::Flat);
    assert_eq!(info.index_path, stats.index_path);
    assert_eq!(info.indexed_chunks, Some(stats.chunks_created));
    assert!(info.document_list.iter().any(|doc| doc.ends_with("sr11-7.txt")));
}
