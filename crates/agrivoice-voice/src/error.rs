use thiserror::Error;

/// Failures of the speech engines.
#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("TTS error: {0}")]
    Tts(String),

    #[error("STT error: {0}")]
    Stt(String),
}
