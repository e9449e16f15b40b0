// Machine translation collaborators
//
// - Ollama: local LLM served over the Ollama HTTP API

pub mod ollama;

use async_trait::async_trait;
use std::sync::Arc;

pub use ollama::{OllamaTranslator, check_ollama_availability};

use crate::config::TranslateConfig;
use crate::error::Result;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate one subtitle text from `source` to `target` language codes
    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String>;

    /// Best-effort language identification; `None` when unknown
    async fn detect_language(&self, _text: &str) -> Result<Option<String>> {
        Ok(None)
    }
}

/// Primary subtag of a language code, lowercased (`pt-BR` -> `pt`).
pub fn primary_subtag(code: &str) -> String {
    code.trim()
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase()
}

/// Whether two language codes name the same language for translation purposes.
pub fn same_language(a: &str, b: &str) -> bool {
    let a = primary_subtag(a);
    !a.is_empty() && a == primary_subtag(b)
}

/// Factory for creating translator instances
pub struct TranslatorFactory;

impl TranslatorFactory {
    pub fn create_translator(config: TranslateConfig) -> Result<Arc<dyn Translator>> {
        Ok(Arc::new(OllamaTranslator::new(config)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_subtag() {
        assert_eq!(primary_subtag("pt-BR"), "pt");
        assert_eq!(primary_subtag("PT_br"), "pt");
        assert_eq!(primary_subtag("en"), "en");
        assert_eq!(primary_subtag(""), "");
    }

    #[test]
    fn test_same_language() {
        assert!(same_language("pt", "PT-br"));
        assert!(!same_language("en", "pt"));
        assert!(!same_language("", ""));
    }

    #[tokio::test]
    async fn test_default_detect_language_is_unknown() {
        struct Echo;

        #[async_trait]
        impl Translator for Echo {
            async fn translate(&self, text: &str, _source: &str, _target: &str) -> Result<String> {
                Ok(text.to_string())
            }
        }

        assert_eq!(Echo.detect_language("hello").await.unwrap(), None);
    }
}
