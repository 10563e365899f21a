//! The `lexiloop init` command.

use std::path::PathBuf;

use anyhow::Result;

use lexiloop_providers::config::load_config_from;
use lexiloop_store::MemoryStore;

use crate::GlobalArgs;

pub async fn execute(global: &GlobalArgs) -> Result<()> {
    let config_path = global
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from("lexiloop.toml"));
    if config_path.exists() {
        println!("{} already exists, skipping.", config_path.display());
    } else {
        std::fs::write(&config_path, SAMPLE_CONFIG)?;
        println!("Created {}", config_path.display());
    }

    let store_path = match &global.store {
        Some(path) => path.clone(),
        None => load_config_from(Some(&config_path))?.store_path,
    };
    if store_path.exists() {
        println!("{} already exists, skipping.", store_path.display());
    } else {
        MemoryStore::new().save_snapshot(&store_path).await?;
        println!("Created {}", store_path.display());
    }

    println!("\nNext steps:");
    println!("  1. Edit {} with your API keys", config_path.display());
    println!("  2. Run: lexiloop add perro dog --deck animals");
    println!("  3. Run: lexiloop queue");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# lexiloop configuration

default_provider = "anthropic"
default_model = "claude-sonnet-4-20250514"
temperature = 0.7
max_tokens = 1024
generation_concurrency = 2
review_limit = 20
new_limit = 10
store_path = "./lexiloop-store.json"

[providers.anthropic]
type = "anthropic"
api_key = "${ANTHROPIC_API_KEY}"

[providers.openai]
type = "openai"
api_key = "${OPENAI_API_KEY}"

[providers.offline]
type = "mock"
text = "A short practice story."
"#;
