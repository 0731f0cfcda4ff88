use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::TranslateConfig;
use crate::error::{DubError, Result};
use super::Translator;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    pub stream: bool,
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub response: String,
    pub done: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationResult {
    pub text: String,
}

/// Translator backed by an Ollama-served LLM
pub struct OllamaTranslator {
    client: Client,
    config: TranslateConfig,
    language_names: BTreeMap<String, String>,
}

impl OllamaTranslator {
    pub fn new(config: TranslateConfig, language_names: BTreeMap<String, String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DubError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            language_names,
        })
    }

    fn language_name<'a>(&'a self, code: &'a str) -> &'a str {
        self.language_names.get(code).map(String::as_str).unwrap_or(code)
    }

    fn build_prompt(&self, text: &str, source_language: &str, target_language: &str) -> String {
        format!(
            "Translate the following {} text into {}. The translation will be spoken by a \
             voice actor, so keep it natural and close in length to the original. \
             Respond with JSON of the form {{\"text\": \"<translation>\"}} and nothing else.\n\n{}",
            self.language_name(source_language),
            self.language_name(target_language),
            text
        )
    }
}

/// Strip wrapping quotes and code fences some models add around the answer
fn clean_response(response: &str) -> String {
    let trimmed = response.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix("```").unwrap_or(trimmed).trim();

    if let Ok(result) = serde_json::from_str::<TranslationResult>(trimmed) {
        return result.text.trim().to_string();
    }
    trimmed.trim_matches('"').trim().to_string()
}

#[async_trait]
impl Translator for OllamaTranslator {
    async fn translate(
        &self,
        text: &str,
        source_language: &str,
        target_language: &str,
    ) -> Result<String> {
        if text.trim().is_empty() {
            return Err(DubError::Translation("Nothing to translate".to_string()));
        }
        info!(
            "Translating {} characters {} -> {}",
            text.chars().count(),
            source_language,
            target_language
        );

        let request = GenerateRequest {
            model: self.config.model.clone(),
            prompt: self.build_prompt(text, source_language, target_language),
            stream: false,
            format: "json".to_string(),
        };
        let url = format!("{}/api/generate", self.config.endpoint.trim_end_matches('/'));
        debug!("Sending translation request to: {}", url);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| DubError::Translation(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(DubError::Translation(format!(
                "Ollama API error {}: {}",
                status, error_text
            )));
        }

        let generated: GenerateResponse = response
            .json()
            .await
            .map_err(|e| DubError::Translation(format!("Failed to parse response: {}", e)))?;
        debug!("Raw Ollama response: {}", generated.response);

        let translation = clean_response(&generated.response);
        if translation.is_empty() {
            return Err(DubError::Translation("Empty translation received".to_string()));
        }
        Ok(translation)
    }
}
