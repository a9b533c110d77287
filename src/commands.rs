use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::{info, warn};

use crate::RagSystem;
use crate::config::{Config, OllamaConfig, get_config_dir};
use crate::database::Backend;
use crate::embeddings::OllamaClient;
use crate::pipeline::QueryResponse;
use crate::system::SystemInfo;

/// Resolve the configuration directory, falling back to `~/.mrm-rag`
#[inline]
pub fn resolve_config_dir(config_dir: Option<PathBuf>) -> Result<PathBuf> {
    match config_dir {
        Some(dir) => Ok(dir),
        None => get_config_dir().context("Failed to locate configuration directory"),
    }
}

#[inline]
pub fn load_config(config_dir: &Path) -> Result<Config> {
    Config::load(config_dir)
        .with_context(|| format!("Failed to load configuration from {}", config_dir.display()))
}

fn build_system(config: Config) -> Result<RagSystem> {
    RagSystem::new(config).context("Failed to initialize the RAG system")
}

/// Check that Ollama answers and has both configured models pulled
async fn ollama_health(config: &OllamaConfig) -> Result<()> {
    let client = OllamaClient::new(config)?.with_retry_attempts(1);
    tokio::task::spawn_blocking(move || client.health_check())
        .await
        .context("Ollama health check task failed")?
}

/// Index documents from the docs directory, or only the given files
#[inline]
pub async fn process_documents(
    config: Config,
    files: Vec<PathBuf>,
    chunk_size: Option<usize>,
    backend: Option<Backend>,
) -> Result<()> {
    let chunk_size = chunk_size.unwrap_or(config.chunking.chunk_size);
    let backend = backend.unwrap_or(config.storage.default_backend);
    let file_paths = (!files.is_empty()).then_some(files);

    if let Err(e) = ollama_health(&config.ollama).await {
        warn!("Ollama is not ready: {:#}", e);
        eprintln!("⚠️  Ollama may not be ready. Embedding will likely fail: {:#}", e);
    }

    let system = build_system(config)?;
    let outcome = system
        .process_documents(file_paths, chunk_size, backend)
        .await;

    if !outcome.success {
        bail!(outcome.message);
    }

    println!("✅ {}", outcome.message);
    println!("   📄 Documents loaded: {}", outcome.documents_loaded);
    println!("   🧩 Chunks created: {}", outcome.chunks_created);
    Ok(())
}

/// Check that a persisted index can be opened with the current configuration
#[inline]
pub async fn load_index(config: Config, backend: Option<Backend>) -> Result<()> {
    let backend = backend.unwrap_or(config.storage.default_backend);
    let system = build_system(config)?;

    let outcome = system.load_existing_index(backend).await;
    if !outcome.success {
        bail!(outcome.message);
    }

    println!("✅ {}", outcome.message);
    Ok(())
}

/// Answer a question against the persisted index for `backend`
#[inline]
pub async fn ask(config: Config, question: &str, backend: Option<Backend>, json: bool) -> Result<()> {
    let backend = backend.unwrap_or(config.storage.default_backend);
    let system = build_system(config)?;

    let outcome = system.load_existing_index(backend).await;
    if !outcome.success {
        warn!("{}", outcome.message);
        eprintln!("⚠️  {}", outcome.message);
        eprintln!("   Run 'mrm-rag process' to build an index first.");
    }

    info!("Answering question with {} index", backend);
    let response = system.query(question).await;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&response).context("Failed to serialize response")?
        );
    } else {
        print_response(&response);
    }
    Ok(())
}

fn print_response(response: &QueryResponse) {
    println!("{}", response.answer);
    println!();
    println!("📚 Documents retrieved: {}", response.documents_retrieved);
    if let Some(error) = &response.metadata.error {
        println!("⚠️  Retrieval error: {}", error);
    }
}

/// Show configuration, documents and index state
#[inline]
pub async fn show_info(config: Config, backend: Option<Backend>, json: bool) -> Result<()> {
    let ollama = config.ollama.clone();
    let system = build_system(config)?;

    if let Some(backend) = backend {
        let outcome = system.load_existing_index(backend).await;
        if !outcome.success {
            warn!("{}", outcome.message);
        }
    }

    let info = system.system_info().await;
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&info).context("Failed to serialize system info")?
        );
    } else {
        print_info(&info);
        println!();
        print_ollama_status(&ollama, &ollama_health(&ollama).await);
        print_next_steps();
    }
    Ok(())
}

fn print_info(info: &SystemInfo) {
    println!("📊 MRM RAG System Info");
    println!("{}", "=".repeat(50));
    println!();

    println!("🤖 Models:");
    println!("   Embedding: {}", info.embedding_model);
    println!("   Generator: {}", info.generator_model);
    println!();

    println!("🔍 Index:");
    println!("   Backend: {}", info.backend_type);
    println!("   Path: {}", info.index_path.display());
    if info.retriever_ready {
        println!("   ✅ Retriever: Ready");
    } else {
        println!("   💤 Retriever: Not loaded");
    }
    match info.indexed_chunks {
        Some(chunks) => println!("   🧩 Indexed Chunks: {}", chunks),
        None => println!("   📭 No index built yet"),
    }
    println!();

    println!("📚 Documents ({}):", info.docs_directory.display());
    if info.document_list.is_empty() {
        println!("   📭 No supported documents found");
    } else {
        for document in &info.document_list {
            println!("   📄 {}", document);
        }
    }
    println!("   Total: {}", info.document_count);
}

fn print_ollama_status(config: &OllamaConfig, health: &Result<()>) {
    println!("🤖 Ollama Status:");
    match health {
        Ok(()) => {
            println!("   ✅ Ollama: Connected ({}:{})", config.host, config.port);
            println!("   📋 Embedding Model: {}", config.embedding_model);
            println!("   📋 Chat Model: {}", config.chat_model);
        }
        Err(e) => {
            println!("   ⚠️  Ollama: Not ready - {:#}", e);
        }
    }
}

fn print_next_steps() {
    println!();
    println!("💡 Next Steps:");
    println!("   • Use 'mrm-rag process' to index the documents directory");
    println!("   • Use 'mrm-rag query \"<question>\"' to ask about MRM topics");
}
