// Text translation
//
// - Ollama: local LLM translation over the Ollama HTTP API

pub mod ollama;

use async_trait::async_trait;
use std::collections::BTreeMap;

pub use ollama::OllamaTranslator;
use crate::config::TranslateConfig;
use crate::error::Result;

/// Text translation capability
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate `text` from `source_language` into `target_language`
    async fn translate(
        &self,
        text: &str,
        source_language: &str,
        target_language: &str,
    ) -> Result<String>;
}

/// Factory for creating translator instances
pub struct TranslatorFactory;

impl TranslatorFactory {
    /// Create the default translator (Ollama)
    pub fn create_translator(
        config: TranslateConfig,
        language_names: BTreeMap<String, String>,
    ) -> Result<Box<dyn Translator>> {
        Ok(Box::new(OllamaTranslator::new(config, language_names)?))
    }
}
