use std::path::PathBuf;

use clap::{Parser, Subcommand};
use docs_rag::commands::{ask_question, ingest_documents, run_chat, show_status};
use docs_rag::config::{Config, get_config_dir, run_interactive_config, show_config};
use docs_rag::{RagError, Result};

#[derive(Parser)]
#[command(name = "docs-rag")]
#[command(about = "Question answering over a documentation corpus with Gemini and LanceDB")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml and the vector database (defaults to ~/.docs-rag)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the Gemini connection and the knowledge base
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Embed the documentation files and rebuild the collection
    Ingest {
        /// Directory of .txt files, overrides ingest.source_dir
        #[arg(long)]
        source: Option<PathBuf>,
    },
    /// Start an interactive chat over the ingested documentation
    Chat,
    /// Answer a single question and exit
    Ask {
        /// The question to answer
        question: String,
    },
    /// Show the configuration, Gemini connectivity and collection status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    dotenv::dotenv().ok();

    let cli = Cli::parse();
    let config_dir = match cli.config_dir {
        Some(dir) => dir,
        None => get_config_dir()?,
    };

    if let Commands::Config { show: false } = cli.command {
        run_interactive_config(&config_dir)?;
        return Ok(());
    }

    let config =
        Config::load(&config_dir).map_err(|e| RagError::Config(format!("{e:#}")))?;

    match cli.command {
        Commands::Config { .. } => {
            show_config(&config)?;
        }
        Commands::Ingest { source } => {
            ingest_documents(config, source).await?;
        }
        Commands::Chat => {
            run_chat(&config).await?;
        }
        Commands::Ask { question } => {
            ask_question(&config, &question).await?;
        }
        Commands::Status => {
            show_status(&config).await?;
        }
    }

    Ok(())
}
