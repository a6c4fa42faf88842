//! The language registry.
//!
//! Every language code that flows past request validation is a [`Language`].
//! The registry also carries the code the speech synthesizer expects for each
//! language, which is not always the two-letter code itself.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A language supported end to end by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Language {
    #[default]
    #[serde(rename = "en")]
    English,
    #[serde(rename = "hi")]
    Hindi,
    #[serde(rename = "mr")]
    Marathi,
    #[serde(rename = "pa")]
    Punjabi,
    #[serde(rename = "es")]
    Spanish,
    #[serde(rename = "fr")]
    French,
    #[serde(rename = "de")]
    German,
    #[serde(rename = "it")]
    Italian,
    #[serde(rename = "pt")]
    Portuguese,
    #[serde(rename = "ru")]
    Russian,
    #[serde(rename = "ja")]
    Japanese,
    #[serde(rename = "ko")]
    Korean,
    #[serde(rename = "ar")]
    Arabic,
    #[serde(rename = "zh")]
    Chinese,
    #[serde(rename = "bn")]
    Bengali,
    #[serde(rename = "ta")]
    Tamil,
    #[serde(rename = "te")]
    Telugu,
    #[serde(rename = "gu")]
    Gujarati,
    #[serde(rename = "kn")]
    Kannada,
    #[serde(rename = "ml")]
    Malayalam,
}

/// Code used when an unsupported language reaches the speech synthesizer.
pub const DEFAULT_TTS_CODE: &str = "en";

impl Language {
    /// All registry members, in display order.
    pub const ALL: [Language; 20] = [
        Self::English,
        Self::Hindi,
        Self::Marathi,
        Self::Punjabi,
        Self::Spanish,
        Self::French,
        Self::German,
        Self::Italian,
        Self::Portuguese,
        Self::Russian,
        Self::Japanese,
        Self::Korean,
        Self::Arabic,
        Self::Chinese,
        Self::Bengali,
        Self::Tamil,
        Self::Telugu,
        Self::Gujarati,
        Self::Kannada,
        Self::Malayalam,
    ];

    /// Returns the ISO 639-1 code for this language.
    pub fn code(self) -> &'static str {
        match self {
            Self::English => "en",
            Self::Hindi => "hi",
            Self::Marathi => "mr",
            Self::Punjabi => "pa",
            Self::Spanish => "es",
            Self::French => "fr",
            Self::German => "de",
            Self::Italian => "it",
            Self::Portuguese => "pt",
            Self::Russian => "ru",
            Self::Japanese => "ja",
            Self::Korean => "ko",
            Self::Arabic => "ar",
            Self::Chinese => "zh",
            Self::Bengali => "bn",
            Self::Tamil => "ta",
            Self::Telugu => "te",
            Self::Gujarati => "gu",
            Self::Kannada => "kn",
            Self::Malayalam => "ml",
        }
    }

    /// Returns the English display name.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::English => "English",
            Self::Hindi => "Hindi",
            Self::Marathi => "Marathi",
            Self::Punjabi => "Punjabi",
            Self::Spanish => "Spanish",
            Self::French => "French",
            Self::German => "German",
            Self::Italian => "Italian",
            Self::Portuguese => "Portuguese",
            Self::Russian => "Russian",
            Self::Japanese => "Japanese",
            Self::Korean => "Korean",
            Self::Arabic => "Arabic",
            Self::Chinese => "Chinese",
            Self::Bengali => "Bengali",
            Self::Tamil => "Tamil",
            Self::Telugu => "Telugu",
            Self::Gujarati => "Gujarati",
            Self::Kannada => "Kannada",
            Self::Malayalam => "Malayalam",
        }
    }

    /// Returns the code the speech synthesizer expects for this language.
    pub fn tts_code(self) -> &'static str {
        match self {
            Self::Chinese => "zh-CN",
            other => other.code(),
        }
    }

    /// Looks up a registry member by code.
    ///
    /// Matching ignores surrounding whitespace and ASCII case. Returns `None`
    /// for codes outside the registry.
    pub fn from_code(code: &str) -> Option<Self> {
        let code = code.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|lang| lang.code().eq_ignore_ascii_case(code))
    }

    /// Looks up a registry member, substituting the default for unknown codes.
    pub fn resolve(code: &str) -> Self {
        Self::from_code(code).unwrap_or_default()
    }

    /// Returns whether `code` is a registry member.
    pub fn is_supported(code: &str) -> bool {
        Self::from_code(code).is_some()
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Maps an arbitrary code through the speech-capable table.
///
/// Codes without a synthesizer voice fall back to [`DEFAULT_TTS_CODE`].
pub fn tts_code_for(code: &str) -> &'static str {
    Language::from_code(code)
        .map(Language::tts_code)
        .unwrap_or(DEFAULT_TTS_CODE)
}
