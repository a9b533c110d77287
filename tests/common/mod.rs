// Sample documents and system builders shared by the integration tests

#![allow(dead_code, reason = "each test binary uses a different subset")]

use std::fs;
use std::path::Path;
use std::sync::Arc;

use mrm_rag::RagSystem;
use mrm_rag::config::Config;
use mrm_rag::documents::FileLoader;
use mrm_rag::embeddings::EmbeddingService;
use mrm_rag::generation::LanguageModel;
pub use mrm_rag::test_support::{HashingEmbedder, MockLanguageModel, TEST_DIMENSION};

pub const SR_11_7_TEXT: &str = "Supervisory Guidance on Model Risk Management (SR 11-7).\n\n\
    Model validation is the set of processes and activities intended to verify that models \
    are performing as expected. Validation requires independent review by staff with the \
    competence and influence to provide effective challenge.\n\n\
    Banks should maintain a comprehensive model inventory and apply ongoing monitoring to \
    confirm that models continue to perform as intended.";

pub const GOVERNANCE_TEXT: &str = "Board oversight of model risk sets the risk appetite. \
    Senior management establishes policies for model development, implementation and use.";

pub fn test_config(base: &Path) -> Config {
    let mut config = Config {
        base_dir: base.to_path_buf(),
        ..Config::default()
    };
    config.ollama.embedding_dimension = TEST_DIMENSION as u32;
    config.ollama.batch_size = 4;
    config
}

/// Write the two sample documents into the configured docs directory
pub fn write_sample_docs(config: &Config) {
    let docs = config.docs_dir();
    fs::create_dir_all(&docs).expect("should create docs dir");
    fs::write(docs.join("sr11-7.txt"), SR_11_7_TEXT).expect("should write document");
    fs::write(docs.join("governance.md"), GOVERNANCE_TEXT).expect("should write document");
}

pub fn system_with(
    config: Config,
    embeddings: Arc<dyn EmbeddingService>,
    model: Arc<dyn LanguageModel>,
) -> RagSystem {
    RagSystem::with_services(config, Arc::new(FileLoader), embeddings, model)
        .expect("system should build")
}

pub fn test_system(config: Config) -> RagSystem {
    system_with(
        config,
        Arc::new(HashingEmbedder::new()),
        Arc::new(MockLanguageModel::new()),
    )
}
