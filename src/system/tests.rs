use super::*;
use crate::config::OllamaConfig;
use crate::generation::REFUSAL_MESSAGE;
use crate::pipeline::NO_RETRIEVER_ERROR;
use crate::test_support::{HashingEmbedder, MockLanguageModel, TEST_DIMENSION};
use std::fs;
use tempfile::TempDir;

fn system_in(temp: &TempDir) -> RagSystem {
    let mut config = Config {
        base_dir: temp.path().to_path_buf(),
        ..Config::default()
    };
    config.ollama.embedding_dimension = TEST_DIMENSION as u32;

    let docs = config.docs_dir();
    fs::create_dir_all(&docs).expect("should create docs dir");
    fs::write(
        docs.join("sr11-7.txt"),
        "Model validation requires independent review under SR 11-7.",
    )
    .expect("should write doc");

    RagSystem::with_services(
        config,
        Arc::new(FileLoader),
        Arc::new(HashingEmbedder::new()),
        Arc::new(MockLanguageModel::new()),
    )
    .expect("system should build")
}

#[test]
fn new_accepts_default_ollama_config() {
    let temp = TempDir::new().expect("should create temp dir");
    let config = Config {
        base_dir: temp.path().to_path_buf(),
        ollama: OllamaConfig::default(),
        ..Config::default()
    };

    let system = RagSystem::new(config).expect("system should build");
    assert_eq!(system.config().ollama.chat_model, "llama3.1:8b");
}

#[tokio::test]
async fn process_reports_success() {
    let temp = TempDir::new().expect("should create temp dir");
    let system = system_in(&temp);

    let outcome = system.process_documents(None, 750, Backend::Flat).await;

    assert!(outcome.success, "{}", outcome.message);
    assert_eq!(outcome.documents_loaded, 1);
    assert_eq!(outcome.chunks_created, 1);
    assert!(outcome.message.contains("1 documents into 1 chunks"));
}

#[tokio::test]
async fn process_reports_failure_as_data() {
    let temp = TempDir::new().expect("should create temp dir");
    let system = system_in(&temp);

    let outcome = system
        .process_documents(Some(vec![temp.path().join("absent.pdf")]), 750, Backend::Flat)
        .await;

    assert!(!outcome.success);
    assert_eq!(outcome.documents_loaded, 0);
    assert_eq!(outcome.chunks_created, 0);
    assert!(outcome.message.starts_with("Failed to process documents"));
}

#[tokio::test]
async fn load_missing_index_reports_failure() {
    let temp = TempDir::new().expect("should create temp dir");
    let system = system_in(&temp);

    let outcome = system.load_existing_index(Backend::Flat).await;

    assert!(!outcome.success);
    assert!(outcome.message.contains("No persisted index found"));
}

#[tokio::test]
async fn query_before_processing_refuses() {
    let temp = TempDir::new().expect("should create temp dir");
    let system = system_in(&temp);

    let response = system.query("What does SR 11-7 require?").await;

    assert_eq!(response.answer, REFUSAL_MESSAGE);
    assert_eq!(response.metadata.error.as_deref(), Some(NO_RETRIEVER_ERROR));
}

#[tokio::test]
async fn query_after_processing_answers() {
    let temp = TempDir::new().expect("should create temp dir");
    let system = system_in(&temp);
    assert!(system.process_documents(None, 750, Backend::Flat).await.success);

    let response = system.query("What does SR 11-7 require for model validation?").await;

    assert_eq!(response.documents_retrieved, 1);
    assert!(response.answer.contains("independent review"));
}

#[tokio::test]
async fn outcomes_serialize_for_json_output() {
    let temp = TempDir::new().expect("should create temp dir");
    let system = system_in(&temp);

    let outcome = system.load_existing_index(Backend::Lance).await;
    let json = serde_json::to_value(&outcome).expect("should serialize");
    assert_eq!(json["success"], serde_json::json!(false));

    let info = serde_json::to_value(system.system_info().await).expect("should serialize");
    assert_eq!(info["backend_type"], serde_json::json!("lance"));
    assert_eq!(info["document_count"], serde_json::json!(1));
    assert_eq!(info["retriever_ready"], serde_json::json!(false));
}
