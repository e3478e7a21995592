use async_trait::async_trait;
use serde::Deserialize;

use claims::{CollaboratorError, CollaboratorResult, LanguageNormalizer, NormalizedText};
use extract::{OllamaClient, collaborator_error};

use crate::prompt::{build_detection_prompt, build_translation_prompt};

/// Pass-through normalizer for deployments that only accept English.
#[derive(Default)]
pub struct EnglishOnly;

#[async_trait]
impl LanguageNormalizer for EnglishOnly {
    async fn normalize(&self, raw_text: &str) -> CollaboratorResult<NormalizedText> {
        Ok(NormalizedText::unchanged(raw_text))
    }

    async fn localize(&self, text: &str, _language: &str) -> CollaboratorResult<String> {
        Ok(text.to_string())
    }
}

/// Detects the query language and translates through the local model.
pub struct LlmLanguageNormalizer {
    llm: OllamaClient,
}

#[derive(Deserialize)]
struct Detection {
    #[serde(default)]
    language: String,
    #[serde(default)]
    english: String,
}

impl LlmLanguageNormalizer {
    pub fn new(llm: OllamaClient) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl LanguageNormalizer for LlmLanguageNormalizer {
    async fn normalize(&self, raw_text: &str) -> CollaboratorResult<NormalizedText> {
        if raw_text.trim().is_empty() {
            return Ok(NormalizedText::unchanged(raw_text));
        }

        let reply = self
            .llm
            .generate_json_with_retry(&build_detection_prompt(raw_text), 1)
            .await
            .map_err(collaborator_error)?;

        parse_detection(&reply, raw_text)
    }

    async fn localize(&self, text: &str, language: &str) -> CollaboratorResult<String> {
        if is_default(language) || text.trim().is_empty() {
            return Ok(text.to_string());
        }

        let translated = self
            .llm
            .generate(&build_translation_prompt(text, language))
            .await
            .map_err(|e| CollaboratorError::Unavailable(format!("{:#}", e)))?;

        let translated = translated.trim();
        if translated.is_empty() {
            return Err(CollaboratorError::Malformed("empty translation".to_string()));
        }
        Ok(translated.to_string())
    }
}

fn is_default(language: &str) -> bool {
    let language = language.trim().to_lowercase();
    language.is_empty() || language == NormalizedText::DEFAULT_LANGUAGE || language == "english" || language == "unknown"
}

pub(crate) fn parse_detection(reply: &str, raw_text: &str) -> CollaboratorResult<NormalizedText> {
    let detection: Detection = serde_json::from_str(reply)
        .map_err(|e| CollaboratorError::Malformed(format!("language detection is not JSON: {}", e)))?;

    if is_default(&detection.language) {
        return Ok(NormalizedText::unchanged(raw_text));
    }

    let english = detection.english.trim();
    if english.is_empty() {
        return Err(CollaboratorError::Malformed("translation missing".to_string()));
    }

    Ok(NormalizedText {
        text: english.to_string(),
        language: detection.language.trim().to_lowercase(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_english_keeps_original_text() {
        let normalized = parse_detection(r#"{"language": "en", "english": "rewritten"}"#, "46M, knee surgery").unwrap();
        assert_eq!(normalized.text, "46M, knee surgery");
        assert!(normalized.is_default_language());
    }

    #[test]
    fn test_foreign_text_is_translated() {
        let normalized = parse_detection(
            r#"{"language": "HI", "english": "46 year old male, knee surgery in Pune"}"#,
            "46 वर्षीय पुरुष, पुणे में घुटने की सर्जरी",
        )
        .unwrap();

        assert_eq!(normalized.language, "hi");
        assert_eq!(normalized.text, "46 year old male, knee surgery in Pune");
    }

    #[test]
    fn test_missing_translation_is_malformed() {
        let result = parse_detection(r#"{"language": "mr"}"#, "text");
        assert!(matches!(result, Err(CollaboratorError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_english_only_passes_through() {
        let normalizer = EnglishOnly;
        let normalized = normalizer.normalize("hello").await.unwrap();
        assert_eq!(normalized, NormalizedText::unchanged("hello"));
        assert_eq!(normalizer.localize("hello", "hi").await.unwrap(), "hello");
    }
}
