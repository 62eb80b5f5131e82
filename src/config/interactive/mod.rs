
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Password};

use super::settings::MAX_EMBEDDING_BATCH_SIZE;
use super::{API_KEY_ENV_VAR, Config, GeminiConfig, StoreConfig};
use crate::gemini::GeminiClient;

#[inline]
pub fn run_interactive_config(config_dir: &Path) -> Result<()> {
    eprintln!("{}", style("🔧 Docs RAG Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config(config_dir);

    eprintln!("{}", style("Gemini Configuration").bold().yellow());
    eprintln!("Configure the hosted embedding and generation models.");
    eprintln!();

    configure_gemini(&mut config.gemini)?;

    eprintln!();
    eprintln!("{}", style("Knowledge Base").bold().yellow());
    eprintln!();

    configure_store(&mut config)?;

    eprintln!();
    eprintln!("{}", style("Testing configuration...").yellow());

    match test_gemini_connection(&config) {
        Ok(()) => eprintln!("{}", style("✓ Gemini connection successful!").green()),
        Err(e) => {
            eprintln!(
                "{}",
                style(format!("⚠ Warning: Could not reach Gemini ({e:#})")).yellow()
            );
            eprintln!("You can continue, but check the API key before ingesting.");
        }
    }

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config(config: &Config) -> Result<()> {
    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Gemini Settings:").bold().yellow());
    eprintln!("  Base URL: {}", style(&config.gemini.base_url).cyan());
    let key_source = if config.env_api_key.is_some() {
        API_KEY_ENV_VAR
    } else {
        "config.toml"
    };
    match config.api_key() {
        Ok(key) => eprintln!(
            "  API Key: {} (from {})",
            style(mask_api_key(key)).cyan(),
            key_source
        ),
        Err(_) => eprintln!("  API Key: {}", style("not set").red()),
    }
    eprintln!(
        "  Embedding Model: {}",
        style(&config.gemini.embedding_model).cyan()
    );
    eprintln!(
        "  Generation Model: {}",
        style(&config.gemini.generation_model).cyan()
    );
    eprintln!("  Temperature: {}", style(config.gemini.temperature).cyan());
    eprintln!("  Batch Size: {}", style(config.gemini.batch_size).cyan());

    eprintln!();
    eprintln!("{}", style("Knowledge Base:").bold().yellow());
    eprintln!(
        "  Vector Store: {}",
        style(config.vector_database_path().display()).cyan()
    );
    eprintln!("  Collection: {}", style(&config.store.collection).cyan());
    eprintln!(
        "  Source Directory: {}",
        style(config.ingest.source_dir.display()).cyan()
    );
    eprintln!("  Top K: {}", style(config.retrieval.top_k).cyan());

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}

/// Keep the last four characters of a credential visible
pub(crate) fn mask_api_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let visible: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{}", "*".repeat(chars.len() - 4), visible)
}

fn load_existing_config(config_dir: &Path) -> Config {
    Config::load(config_dir).unwrap_or_else(|_| {
        eprintln!(
            "{}",
            style("No existing configuration found. Using defaults.").yellow()
        );
        Config {
            base_dir: config_dir.to_path_buf(),
            ..Config::default()
        }
    })
}

fn configure_gemini(gemini: &mut GeminiConfig) -> Result<()> {
    let base_url: String = Input::new()
        .with_prompt("Gemini API base URL")
        .default(gemini.base_url.clone())
        .validate_with(|input: &String| -> Result<(), String> {
            let temp_config = GeminiConfig {
                base_url: input.clone(),
                ..GeminiConfig::default()
            };
            temp_config.api_url().map(|_| ()).map_err(|e| e.to_string())
        })
        .interact_text()?;

    let api_key: String = Password::new()
        .with_prompt(format!(
            "Gemini API key (leave empty to keep the current one or use {API_KEY_ENV_VAR})"
        ))
        .allow_empty_password(true)
        .interact()?;

    let embedding_model: String = Input::new()
        .with_prompt("Embedding model")
        .default(gemini.embedding_model.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Model name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let generation_model: String = Input::new()
        .with_prompt("Generation model")
        .default(gemini.generation_model.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Model name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let temperature: f32 = Input::new()
        .with_prompt("Sampling temperature")
        .default(gemini.temperature)
        .validate_with(|input: &f32| -> Result<(), &str> {
            if (0.0..=2.0).contains(input) {
                Ok(())
            } else {
                Err("Temperature must be between 0.0 and 2.0")
            }
        })
        .interact_text()?;

    let batch_size: u32 = Input::new()
        .with_prompt(format!(
            "Texts per embedding request (1-{MAX_EMBEDDING_BATCH_SIZE})"
        ))
        .default(gemini.batch_size)
        .validate_with(|input: &u32| -> Result<(), String> {
            if (1..=MAX_EMBEDDING_BATCH_SIZE).contains(input) {
                Ok(())
            } else {
                Err(format!(
                    "Batch size must be between 1 and {MAX_EMBEDDING_BATCH_SIZE}"
                ))
            }
        })
        .interact_text()?;

    gemini.set_base_url(base_url)?;
    if !api_key.trim().is_empty() {
        gemini.set_api_key(Some(api_key));
    }
    gemini.set_embedding_model(embedding_model)?;
    gemini.set_generation_model(generation_model)?;
    gemini.set_temperature(temperature)?;
    gemini.set_batch_size(batch_size)?;

    Ok(())
}

fn configure_store(config: &mut Config) -> Result<()> {
    let collection: String = Input::new()
        .with_prompt("Collection name")
        .default(config.store.collection.clone())
        .validate_with(|input: &String| -> Result<(), String> {
            let temp_store = StoreConfig {
                collection: input.clone(),
                ..StoreConfig::default()
            };
            temp_store.validate().map_err(|e| e.to_string())
        })
        .interact_text()?;

    let source_dir: String = Input::new()
        .with_prompt("Directory of .txt documents to ingest")
        .default(config.ingest.source_dir.display().to_string())
        .interact_text()?;

    let top_k: usize = Input::new()
        .with_prompt("Documents retrieved per question")
        .default(config.retrieval.top_k)
        .validate_with(|input: &usize| -> Result<(), &str> {
            if (1..=50).contains(input) {
                Ok(())
            } else {
                Err("Must be between 1 and 50")
            }
        })
        .interact_text()?;

    config.store.set_collection(collection)?;
    config.ingest.source_dir = PathBuf::from(source_dir);
    config.retrieval.set_top_k(top_k)?;

    Ok(())
}

fn test_gemini_connection(config: &Config) -> Result<()> {
    let api_key = config.api_key()?;
    let client = GeminiClient::new(&config.gemini, api_key)?.with_retry_attempts(1);
    client.get_model(&config.gemini.generation_model)?;
    Ok(())
}
