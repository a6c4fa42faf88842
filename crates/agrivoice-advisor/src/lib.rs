//! Text services for AgriVoice: agricultural advice generation and
//! translation.
//!
//! [`AdviceGenerator`] wraps a [`LanguageModel`] (Gemini in production) and
//! never fails; model errors turn into a canned apology marked as degraded.
//! [`Translator`] implementations report failures to the caller, which owns
//! the fallback policy.

pub mod advice;
pub mod error;
pub mod gemini;
pub mod translate;

pub use advice::{AdviceGenerator, LanguageModel, FALLBACK_ADVICE};
pub use error::AdvisorError;
pub use gemini::{GeminiClient, GeminiConfig};
pub use translate::{GoogleTranslator, Translator, MAX_TRANSLATE_CHARS};
