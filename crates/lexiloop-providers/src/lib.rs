//! lexiloop-providers: Story generator integrations.
//!
//! Implements the `ContentGenerator` trait for Anthropic and OpenAI-compatible
//! APIs, plus a mock generator, and loads the `lexiloop.toml` configuration.

pub mod anthropic;
pub mod config;
pub mod error;
pub mod mock;
pub mod openai;

pub use config::{create_generator, load_config, LexiloopConfig, ProviderConfig};
pub use error::ProviderError;
