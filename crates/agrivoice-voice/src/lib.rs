//! Speech engines for AgriVoice.
//!
//! Speech-to-text runs through a whisper.cpp command-line binary and
//! text-to-speech through `gtts-cli`. Both sit behind async traits
//! ([`Transcriber`], [`SpeechEngine`]) so the orchestrator holds injected
//! handles and tests can substitute doubles.

pub mod error;
pub mod stt;
pub mod tts;

pub use error::VoiceError;
pub use stt::{Transcriber, WhisperCli};
pub use tts::{GttsCli, Speaker, SpeechEngine};
