//! Shared types for the AgriVoice workspace.
//!
//! This crate holds the language registry, the results produced by each
//! pipeline stage, and the metadata the orchestrator hands back to the API
//! layer. Every other crate in the workspace depends on it; it depends on
//! nothing but `serde`.

pub mod language;
pub mod outcome;

pub use language::{tts_code_for, Language, DEFAULT_TTS_CODE};
pub use outcome::Outcome;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Confidence reported when the recognizer gives none.
pub const DEFAULT_CONFIDENCE: f32 = 0.8;

/// Minimum trimmed length of a transcription worth answering.
pub const MIN_QUESTION_CHARS: usize = 3;

/// Text recognized from one audio recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptionResult {
    /// The recognized text.
    pub text: String,
    /// Language code reported by the recognizer. Not necessarily a
    /// registry member.
    pub detected_language: String,
    /// Recognizer confidence in `[0, 1]`.
    pub confidence: f32,
}

impl TranscriptionResult {
    /// Creates a result, clamping `confidence` into `[0, 1]`.
    ///
    /// A NaN confidence is replaced by [`DEFAULT_CONFIDENCE`].
    pub fn new(text: impl Into<String>, detected_language: impl Into<String>, confidence: f32) -> Self {
        let confidence = if confidence.is_nan() {
            DEFAULT_CONFIDENCE
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Self {
            text: text.into(),
            detected_language: detected_language.into(),
            confidence,
        }
    }

    /// The detected language, if the registry knows it.
    pub fn detected(&self) -> Option<Language> {
        Language::from_code(&self.detected_language)
    }

    /// Whether the text is long enough to be treated as a question.
    pub fn is_understandable(&self) -> bool {
        self.text.trim().chars().count() >= MIN_QUESTION_CHARS
    }
}

/// Advice text produced by the language model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdviceResult {
    pub text: String,
}

/// Everything learned while answering one audio question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryMetadata {
    pub transcribed_text: String,
    pub detected_language: String,
    /// Language of `translated_response`, which is also the language the
    /// answer was spoken in.
    pub target_language: Language,
    /// Advice in English.
    pub ai_response: String,
    pub translated_response: String,
    pub confidence: f32,
    /// Path of the synthesized answer.
    pub audio_file: PathBuf,
    /// The advice is the canned apology rather than model output.
    pub advice_degraded: bool,
    /// Translation failed and the answer fell back to English.
    pub translation_degraded: bool,
}

/// Answer to a typed question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextAnswer {
    pub original_text: String,
    pub ai_response: String,
    pub translated_response: String,
    pub language: Language,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_is_clamped() {
        assert_eq!(TranscriptionResult::new("x", "en", 1.7).confidence, 1.0);
        assert_eq!(TranscriptionResult::new("x", "en", -0.2).confidence, 0.0);
        assert_eq!(
            TranscriptionResult::new("x", "en", f32::NAN).confidence,
            DEFAULT_CONFIDENCE
        );
    }

    #[test]
    fn short_text_is_not_understandable() {
        assert!(!TranscriptionResult::new("  ok ", "en", 0.9).is_understandable());
        assert!(!TranscriptionResult::new("", "en", 0.9).is_understandable());
        assert!(TranscriptionResult::new("why", "en", 0.9).is_understandable());
    }

    #[test]
    fn detected_language_outside_registry_is_none() {
        let result = TranscriptionResult::new("hello", "sw", 0.5);
        assert_eq!(result.detected(), None);
        let result = TranscriptionResult::new("hello", "ta", 0.5);
        assert_eq!(result.detected(), Some(Language::Tamil));
    }

    #[test]
    fn metadata_serializes_target_as_code() {
        let metadata = QueryMetadata {
            transcribed_text: "How to water wheat?".into(),
            detected_language: "en".into(),
            target_language: Language::Hindi,
            ai_response: "Water weekly.".into(),
            translated_response: "साप्ताहिक पानी दें।".into(),
            confidence: 0.8,
            audio_file: PathBuf::from("responses/response.mp3"),
            advice_degraded: false,
            translation_degraded: false,
        };
        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(json["target_language"], "hi");
        assert_eq!(json["audio_file"], "responses/response.mp3");
    }
}
