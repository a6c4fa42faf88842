//! Construction of the production engines from configuration.

use crate::config::Config;
use crate::ServerError;
use agrivoice_advisor::{AdviceGenerator, GeminiClient, GeminiConfig, GoogleTranslator};
use agrivoice_pipeline::{ArtifactStore, Pipeline};
use agrivoice_voice::{GttsCli, Speaker, WhisperCli};
use std::sync::Arc;
use std::time::Duration;

/// Artifact store rooted at the configured directories.
pub fn artifact_store(config: &Config) -> ArtifactStore {
    ArtifactStore::new(
        config.storage.uploads_dir.clone(),
        config.storage.responses_dir.clone(),
    )
}

/// Builds the pipeline with whisper.cpp, Gemini, Google Translate and gTTS.
///
/// # Errors
///
/// Returns `ServerError::Service` when an engine cannot be configured, e.g.
/// when no Gemini API key is set.
pub fn build_pipeline(config: &Config) -> Result<Pipeline, ServerError> {
    if !config.stt.model_path.exists() {
        tracing::warn!(
            path = %config.stt.model_path.display(),
            "whisper model not found; transcription will fail until it is installed"
        );
    }
    let transcriber = WhisperCli::new(&config.stt.model_path, &config.stt.binary_path)
        .with_timeout(Duration::from_secs(config.stt.timeout_seconds))
        .with_max_input_bytes(config.limits.max_audio_bytes);

    let gemini = GeminiClient::new(
        GeminiConfig::new(config.llm.api_key.clone())
            .with_endpoint(config.llm.endpoint.clone())
            .with_model(config.llm.model.clone())
            .with_timeout(Duration::from_secs(config.llm.timeout_seconds)),
    )
    .map_err(|e| ServerError::Service {
        service: "advice model",
        message: e.to_string(),
    })?;

    let translator = GoogleTranslator::new(
        config.translation.endpoint.clone(),
        Duration::from_secs(config.translation.timeout_seconds),
    )
    .map_err(|e| ServerError::Service {
        service: "translator",
        message: e.to_string(),
    })?;

    let tts = GttsCli::new(&config.tts.binary_path)
        .with_timeout(Duration::from_secs(config.tts.timeout_seconds));

    tracing::info!(
        stt_model = %config.stt.model_path.display(),
        llm_model = %config.llm.model,
        tts_binary = %config.tts.binary_path.display(),
        "speech and advice engines configured"
    );

    Ok(Pipeline::new(
        Arc::new(transcriber),
        AdviceGenerator::new(Arc::new(gemini)),
        Arc::new(translator),
        Speaker::new(Arc::new(tts)),
        artifact_store(config),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_api_key_is_a_startup_error() {
        let config = Config::default();
        match build_pipeline(&config) {
            Err(ServerError::Service { service, .. }) => assert_eq!(service, "advice model"),
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("pipeline built without an API key"),
        }
    }

    #[test]
    fn builds_with_api_key() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.llm.api_key = "key".to_string();
        config.storage.uploads_dir = dir.path().join("uploads");
        config.storage.responses_dir = dir.path().join("responses");

        let pipeline = build_pipeline(&config).unwrap();
        assert_eq!(pipeline.store().uploads_dir(), dir.path().join("uploads"));
    }
}
