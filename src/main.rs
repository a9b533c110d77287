use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use mrm_rag::commands::{
    ask, load_config, load_index, process_documents, resolve_config_dir, show_info,
};
use mrm_rag::config::{run_interactive_config, show_config};
use mrm_rag::database::Backend;

#[derive(Parser)]
#[command(name = "mrm-rag")]
#[command(about = "Question answering over Model Risk Management documents")]
#[command(version)]
struct Cli {
    /// Configuration directory (defaults to ~/.mrm-rag)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure Ollama connection and indexing settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Load, chunk, embed and index documents
    Process {
        /// Files to index; the whole documents directory when omitted
        files: Vec<PathBuf>,
        /// Maximum chunk length in tokens, estimated unless chunking.tokenizer_path is set
        #[arg(long)]
        chunk_size: Option<usize>,
        #[arg(long, value_enum)]
        backend: Option<Backend>,
    },
    /// Open a previously built index
    Load {
        #[arg(long, value_enum)]
        backend: Option<Backend>,
    },
    /// Ask a question about the indexed documents
    Query {
        question: String,
        #[arg(long, value_enum)]
        backend: Option<Backend>,
        /// Print the full response as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show configuration, documents and index state
    Info {
        #[arg(long, value_enum)]
        backend: Option<Backend>,
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_dir = resolve_config_dir(cli.config_dir)?;

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config(&config_dir)?;
            } else {
                run_interactive_config(&config_dir)?;
            }
        }
        Commands::Process {
            files,
            chunk_size,
            backend,
        } => {
            process_documents(load_config(&config_dir)?, files, chunk_size, backend).await?;
        }
        Commands::Load { backend } => {
            load_index(load_config(&config_dir)?, backend).await?;
        }
        Commands::Query {
            question,
            backend,
            json,
        } => {
            ask(load_config(&config_dir)?, &question, backend, json).await?;
        }
        Commands::Info { backend, json } => {
            show_info(load_config(&config_dir)?, backend, json).await?;
        }
    }

    Ok(())
}
