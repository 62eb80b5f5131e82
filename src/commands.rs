use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use console::style;
use dialoguer::Input;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::chat::{ChatSession, Outcome, TurnOutput};
use crate::config::Config;
use crate::database::lancedb::VectorStore;
use crate::gemini::{GeminiClient, ModelInfo};
use crate::ingest::{IngestReport, Ingestor};
use crate::rag::{self, Availability, QueryEngine};
use crate::Result;

const EXIT_COMMANDS: [&str; 2] = ["/exit", "/quit"];

/// Embed every document in the source directory and replace the collection
#[inline]
pub async fn ingest_documents(config: Config, source: Option<PathBuf>) -> Result<IngestReport> {
    let source_dir = source.unwrap_or_else(|| config.ingest.source_dir.clone());

    eprintln!("{}", style("🚀 Starting ingestion...").bold().cyan());
    eprintln!(
        "📘 Loading documents from {}",
        style(source_dir.display()).cyan()
    );

    let ingestor = Ingestor::new(config)?;
    let report = ingestor.run(&source_dir).await?;

    eprintln!("{}", style("✅ Vector database built successfully!").green());
    println!("📂 Store: {}", report.store_path.display());
    println!("📚 Collection: {}", report.collection);
    println!("   Documents: {}", report.documents_stored);
    println!("   Vector dimension: {}", report.vector_dimension);
    if report.files_skipped > 0 {
        println!("   Skipped entries: {}", report.files_skipped);
    }

    Ok(report)
}

/// Interactive question loop over the shared query engine
#[inline]
pub async fn run_chat(config: &Config) -> Result<()> {
    let Ok(engine) = open_shared_engine(config).await else {
        return Ok(());
    };

    eprintln!("{}", style("🐍 Python Docs RAG Chat").bold().cyan());
    eprintln!(
        "{}",
        style("Ask a question about Python. Type /exit to quit.").dim()
    );
    eprintln!();

    let mut session = ChatSession::new();

    loop {
        let question = match Input::<String>::new()
            .with_prompt("You")
            .allow_empty(true)
            .interact_text()
        {
            Ok(question) => question,
            Err(e) => {
                info!("Input closed: {}", e);
                break;
            }
        };

        let question = question.trim();
        if question.is_empty() {
            continue;
        }
        if EXIT_COMMANDS.contains(&question) {
            break;
        }

        let output = answer_with_spinner(&mut session, &engine, question).await;
        print_answer(&output);
    }

    info!("Chat ended after {} messages", session.transcript().len());
    rag::teardown().await;
    Ok(())
}

/// Answer a single question through the same per-turn handler as the chat
#[inline]
pub async fn ask_question(config: &Config, question: &str) -> Result<TurnOutput> {
    let engine = open_shared_engine(config).await?;

    let mut session = ChatSession::new();
    let output = answer_with_spinner(&mut session, &engine, question).await;
    print_answer(&output);

    rag::teardown().await;
    Ok(output)
}

async fn open_shared_engine(config: &Config) -> Result<Arc<QueryEngine>> {
    match rag::shared(config).await {
        Availability::Ready(engine) => {
            if matches!(engine.collection().count().await, Ok(0)) {
                eprintln!(
                    "{}",
                    style("⚠ The vector database looks empty. Make sure you have run `docs-rag ingest`.")
                        .yellow()
                );
            }
            Ok(engine)
        }
        Availability::Unavailable { reason, cause } => {
            eprintln!("{}", style(format!("❌ {reason}")).red());
            Err(cause.into_error(reason))
        }
    }
}

async fn answer_with_spinner(
    session: &mut ChatSession,
    engine: &QueryEngine,
    question: &str,
) -> TurnOutput {
    let spinner = if console::user_attended_stderr() {
        let spinner = ProgressBar::new_spinner().with_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.set_message("Searching for an answer...");
        spinner.enable_steady_tick(Duration::from_millis(100));
        spinner
    } else {
        ProgressBar::hidden()
    };

    let output = session.handle_turn(engine, question).await;
    spinner.finish_and_clear();
    output
}

fn print_answer(output: &TurnOutput) {
    match output.outcome {
        Outcome::Answered => println!("{}\n", output.answer),
        Outcome::Failed => println!("{}\n", style(&output.answer).red()),
    }
}

/// Show the store location, the collection and the Gemini connection
#[inline]
pub async fn show_status(config: &Config) -> Result<()> {
    println!("📊 Docs RAG Status Report");
    println!("{}", "=".repeat(50));
    println!();

    println!("🔧 Configuration:");
    println!("   Config file: {}", config.config_file_path().display());
    println!(
        "   Source directory: {}",
        config.ingest.source_dir.display()
    );
    println!();

    println!("🤖 Gemini Status:");
    match config.api_key() {
        Ok(api_key) => match GeminiClient::new(&config.gemini, api_key) {
            Ok(client) => match client.get_model(&config.gemini.embedding_model) {
                Ok(model) => {
                    println!("   ✅ Gemini: Connected ({})", config.gemini.base_url);
                    println!(
                        "   📋 Embedding model: {}",
                        describe_model(&model)
                    );
                    println!(
                        "   💬 Generation model: {}",
                        config.gemini.generation_model
                    );
                }
                Err(e) => println!("   ⚠️  Gemini: Unreachable - {e:#}"),
            },
            Err(e) => println!("   ❌ Gemini: Invalid client settings - {e:#}"),
        },
        Err(e) => println!("   ❌ Gemini: {e}"),
    }
    println!();

    println!("🔍 Vector Database Status:");
    print_store_status(config, &config.vector_database_path()).await;

    Ok(())
}

/// Display name, resource name and input limit when the API reports them
pub(crate) fn describe_model(model: &ModelInfo) -> String {
    let mut description = model.display_name.as_ref().map_or_else(
        || model.name.clone(),
        |display_name| format!("{display_name} ({})", model.name),
    );
    if let Some(limit) = model.input_token_limit {
        let _ = write!(description, ", {limit} input tokens");
    }
    description
}

async fn print_store_status(config: &Config, path: &Path) {
    if !path.exists() {
        println!("   ⚠️  No vector database at {}", path.display());
        println!("   Run 'docs-rag ingest' to build it.");
        return;
    }

    let store = match VectorStore::open_at(path).await {
        Ok(store) => {
            println!("   ✅ LanceDB: Connected ({})", store.path().display());
            store
        }
        Err(e) => {
            println!("   ❌ LanceDB: Failed to connect - {}", e);
            return;
        }
    };

    match store.collection_info(&config.store.collection).await {
        Ok(Some(info)) => {
            println!("   📚 Collection: {}", info.name);
            println!("   📄 Documents: {}", info.count);
            println!("   🔢 Vector dimension: {}", info.vector_dimension);
            if info.count == 0 {
                warn!("Collection {} is empty", info.name);
                println!("   ⚠️  The collection is empty. Run 'docs-rag ingest'.");
            }
        }
        Ok(None) => {
            println!(
                "   ⚠️  Collection '{}' does not exist. Run 'docs-rag ingest'.",
                config.store.collection
            );
        }
        Err(e) => println!("   ❌ Failed to read collection - {}", e),
    }
}
