use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};

use super::Translator;
use crate::config::TranslateConfig;
use crate::error::{AmareloError, Result};

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
    #[serde(default)]
    pub done: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationResult {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionResult {
    pub language: String,
}

/// Translator backed by a model served through Ollama's `/api/generate`
pub struct OllamaTranslator {
    client: Client,
    config: TranslateConfig,
}

impl OllamaTranslator {
    pub fn new(config: TranslateConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    async fn generate(&self, prompt: String) -> Result<String> {
        let request = GenerateRequest {
            model: self.config.model.clone(),
            prompt,
            stream: false,
            format: "json".to_string(),
        };

        let url = format!("{}/api/generate", self.config.endpoint.trim_end_matches('/'));
        debug!("Sending generate request to: {}", url);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| AmareloError::Translation(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AmareloError::Translation(format!("Ollama API error {}: {}", status, error_text)));
        }

        let generated: GenerateResponse = response
            .json()
            .await
            .map_err(|e| AmareloError::Translation(format!("Failed to parse response: {}", e)))?;

        let raw = generated.response.trim().to_string();
        debug!("Raw Ollama response: {}", raw);
        if raw.is_empty() {
            return Err(AmareloError::Translation("Empty response received".to_string()));
        }
        Ok(raw)
    }
}

#[async_trait]
impl Translator for OllamaTranslator {
    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String> {
        if text.trim().is_empty() {
            return Ok(text.to_string());
        }

        let raw = self.generate(build_translation_prompt(text, source, target)).await?;
        if let Ok(result) = serde_json::from_str::<TranslationResult>(&raw) {
            let translated = result.text.trim();
            if !translated.is_empty() {
                return Ok(translated.to_string());
            }
        }

        let cleaned = clean_translation_response(&raw);
        if cleaned.is_empty() {
            return Err(AmareloError::Translation("Empty translation received".to_string()));
        }
        Ok(cleaned)
    }

    async fn detect_language(&self, text: &str) -> Result<Option<String>> {
        if text.trim().is_empty() {
            return Ok(None);
        }
        let raw = self.generate(build_detection_prompt(text)).await?;
        Ok(parse_detection_response(&raw))
    }
}

/// Build the JSON-mode translation prompt.
pub fn build_translation_prompt(text: &str, source: &str, target: &str) -> String {
    let source_name = language_code_to_name(source);
    let target_name = language_code_to_name(target);

    format!(
        "You are a professional subtitle translator.\n\
         \n\
         Translate the subtitle line below from {} to {} ONLY.\n\
         The target language is: {} (language code: {})\n\
         Keep line breaks where they are and keep it short enough to read on screen.\n\
         \n\
         Return ONLY the translation in JSON format as {{\"text\":\"your {} translation here\"}}.\n\
         Do not include any explanations, alternatives, or text in other languages.\n\
         \n\
         [Subtitle to translate]\n\
         {}\n",
        source_name, target_name, target_name, target, target_name, text
    )
}

fn build_detection_prompt(text: &str) -> String {
    format!(
        "Identify the language of the text below.\n\
         Return ONLY JSON as {{\"language\":\"two-letter ISO 639-1 code\"}}.\n\
         \n\
         [Text]\n\
         {}\n",
        text
    )
}

/// Language code from a detection answer, if it looks like one.
pub fn parse_detection_response(raw: &str) -> Option<String> {
    let code = serde_json::from_str::<DetectionResult>(raw)
        .map(|r| r.language)
        .unwrap_or_else(|_| raw.to_string());
    let code = code.trim().trim_matches('"').to_ascii_lowercase();

    let valid = (2..=3).contains(&code.len()) && code.chars().all(|c| c.is_ascii_alphabetic());
    valid.then_some(code)
}

/// Full language name for clearer prompts; unknown codes pass through.
pub fn language_code_to_name(code: &str) -> String {
    let name = match super::primary_subtag(code).as_str() {
        "ar" => "Arabic",
        "bg" => "Bulgarian",
        "ca" => "Catalan",
        "cs" => "Czech",
        "da" => "Danish",
        "de" => "German",
        "el" => "Greek",
        "en" => "English",
        "es" => "Spanish",
        "fi" => "Finnish",
        "fr" => "French",
        "he" => "Hebrew",
        "hi" => "Hindi",
        "hu" => "Hungarian",
        "id" => "Indonesian",
        "it" => "Italian",
        "ja" => "Japanese",
        "ko" => "Korean",
        "nl" => "Dutch",
        "no" => "Norwegian",
        "pl" => "Polish",
        "pt" => "Portuguese",
        "ro" => "Romanian",
        "ru" => "Russian",
        "sv" => "Swedish",
        "th" => "Thai",
        "tr" => "Turkish",
        "uk" => "Ukrainian",
        "vi" => "Vietnamese",
        "zh" => "Chinese",
        _ => return code.to_string(),
    };
    name.to_string()
}

/// Pull the translation out of a chatty, non-JSON answer.
pub fn clean_translation_response(response: &str) -> String {
    let lines: Vec<&str> = response.lines().collect();

    for &line in &lines {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if trimmed.starts_with("Here are")
            || trimmed.starts_with("Here is")
            || trimmed.starts_with("Option")
            || trimmed.starts_with("**Option")
            || trimmed.starts_with("Translation:")
            || trimmed.starts_with("- ")
            || trimmed.starts_with("* ")
        {
            continue;
        }

        if trimmed.starts_with("**") && trimmed.ends_with("**") {
            continue;
        }

        if trimmed.len() > 3 {
            return trimmed.trim_matches('"').to_string();
        }
    }

    lines
        .iter()
        .map(|l| l.trim())
        .find(|l| !l.is_empty())
        .unwrap_or_default()
        .to_string()
}

/// Check that Ollama is reachable and the model is pulled.
pub async fn check_ollama_availability(endpoint: &str, model: &str) -> Result<()> {
    let client = Client::new();
    let url = format!("{}/api/show", endpoint.trim_end_matches('/'));

    let response = client
        .post(&url)
        .json(&json!({ "name": model }))
        .send()
        .await
        .map_err(|e| AmareloError::Translation(format!("Failed to connect to Ollama: {}", e)))?;

    if response.status().is_success() {
        info!("Ollama model '{}' is available", model);
        Ok(())
    } else {
        Err(AmareloError::Translation(format!(
            "Ollama model '{}' not found. Please pull the model first: ollama pull {}",
            model, model
        )))
    }
}
