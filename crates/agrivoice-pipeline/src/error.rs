use agrivoice_voice::VoiceError;
use thiserror::Error;

/// Terminal failures of a pipeline run.
///
/// Advice and translation failures never show up here; they degrade instead.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("failed to store audio: {0}")]
    Storage(#[from] std::io::Error),

    #[error("transcription failed: {0}")]
    Transcription(#[source] VoiceError),

    #[error("Could not understand the audio. Please speak clearly and try again.")]
    NotUnderstood,

    #[error("Could not generate audio response: {0}")]
    Synthesis(#[source] VoiceError),
}
