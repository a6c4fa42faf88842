//! Translation backends.

use crate::error::AdvisorError;
use agrivoice_types::Language;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_TRANSLATE_ENDPOINT: &str = "https://translate.googleapis.com";

/// Longest text the web endpoint accepts in one request.
pub const MAX_TRANSLATE_CHARS: usize = 5000;

/// Translates text between registry languages.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(
        &self,
        text: &str,
        source: Language,
        target: Language,
    ) -> Result<String, AdvisorError>;
}

/// Google Translate through its public web endpoint.
#[derive(Debug, Clone)]
pub struct GoogleTranslator {
    client: Client,
    endpoint: String,
}

impl GoogleTranslator {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, AdvisorError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl Translator for GoogleTranslator {
    async fn translate(
        &self,
        text: &str,
        source: Language,
        target: Language,
    ) -> Result<String, AdvisorError> {
        if source == target || text.trim().is_empty() {
            return Ok(text.to_string());
        }
        let chars = text.chars().count();
        if chars > MAX_TRANSLATE_CHARS {
            return Err(AdvisorError::Translation(format!(
                "text too long: {} characters (limit: {})",
                chars, MAX_TRANSLATE_CHARS
            )));
        }

        let url = format!(
            "{}/translate_a/single",
            self.endpoint.trim_end_matches('/')
        );
        let response = self
            .client
            .get(url)
            .query(&[
                ("client", "gtx"),
                ("sl", source.code()),
                ("tl", target.code()),
                ("dt", "t"),
                ("q", text),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AdvisorError::Api(format!("HTTP {}", status)));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| AdvisorError::InvalidResponse(e.to_string()))?;

        parse_translation(&body)
    }
}

/// Joins the translated sentences of a `translate_a/single` response.
///
/// The response is a nested array whose first element lists
/// `[translated, original, ...]` tuples, one per sentence.
fn parse_translation(body: &Value) -> Result<String, AdvisorError> {
    let sentences = body
        .get(0)
        .and_then(Value::as_array)
        .ok_or_else(|| AdvisorError::InvalidResponse("missing sentence list".to_string()))?;

    let translated: String = sentences
        .iter()
        .filter_map(|sentence| sentence.get(0).and_then(Value::as_str))
        .collect();

    if translated.trim().is_empty() {
        return Err(AdvisorError::Translation(
            "translation came back empty".to_string(),
        ));
    }
    Ok(translated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn joins_sentence_translations() {
        let body = json!([
            [
                ["पत्तियों को हटा दें। ", "Remove the leaves. ", null, null, 10],
                ["नीम का तेल छिड़कें।", "Spray neem oil.", null, null, 10]
            ],
            null,
            "en"
        ]);
        assert_eq!(
            parse_translation(&body).unwrap(),
            "पत्तियों को हटा दें। नीम का तेल छिड़कें।"
        );
    }

    #[test]
    fn unexpected_shape_is_invalid() {
        assert!(matches!(
            parse_translation(&json!({"error": "quota"})),
            Err(AdvisorError::InvalidResponse(_))
        ));
    }

    #[test]
    fn empty_translation_is_an_error() {
        assert!(matches!(
            parse_translation(&json!([[]])),
            Err(AdvisorError::Translation(_))
        ));
    }

    #[tokio::test]
    async fn same_language_is_passed_through() {
        let translator =
            GoogleTranslator::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
        let text = translator
            .translate("Water weekly.", Language::English, Language::English)
            .await
            .unwrap();
        assert_eq!(text, "Water weekly.");
    }

    #[tokio::test]
    async fn oversized_text_is_rejected_before_any_request() {
        let translator =
            GoogleTranslator::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
        let text = "a".repeat(MAX_TRANSLATE_CHARS + 1);
        assert!(matches!(
            translator
                .translate(&text, Language::English, Language::Hindi)
                .await,
            Err(AdvisorError::Translation(_))
        ));
    }
}
