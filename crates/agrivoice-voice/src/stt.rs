use crate::error::VoiceError;
use agrivoice_types::{TranscriptionResult, DEFAULT_CONFIDENCE};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Default audio input cap for STT (10 MiB). Prevents OOM from oversized payloads.
const MAX_STT_INPUT_BYTES: u64 = 10 * 1024 * 1024;

/// Timeout for STT process execution.
const STT_TIMEOUT: Duration = Duration::from_secs(120);

/// Language reported when the recognizer output names none.
const FALLBACK_LANGUAGE: &str = "en";

/// Speech-to-text engine.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribes the recording stored at `audio_path`.
    ///
    /// A failure is reported once; callers decide whether to retry.
    async fn transcribe(&self, audio_path: &Path) -> Result<TranscriptionResult, VoiceError>;
}

/// Runs a whisper.cpp binary (`whisper-cli`) with language auto-detection.
#[derive(Debug, Clone)]
pub struct WhisperCli {
    model_path: PathBuf,
    binary_path: PathBuf,
    timeout: Duration,
    max_input_bytes: u64,
}

impl WhisperCli {
    pub fn new(model_path: impl Into<PathBuf>, binary_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
            binary_path: binary_path.into(),
            timeout: STT_TIMEOUT,
            max_input_bytes: MAX_STT_INPUT_BYTES,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Largest recording handed to the binary. Should match the upload cap.
    pub fn with_max_input_bytes(mut self, max_input_bytes: usize) -> Self {
        self.max_input_bytes = max_input_bytes as u64;
        self
    }
}

#[async_trait]
impl Transcriber for WhisperCli {
    async fn transcribe(&self, audio_path: &Path) -> Result<TranscriptionResult, VoiceError> {
        let size = tokio::fs::metadata(audio_path)
            .await
            .map_err(|e| VoiceError::Stt(format!("Cannot read audio file: {}", e)))?
            .len();
        if size > self.max_input_bytes {
            return Err(VoiceError::Stt(format!(
                "audio data exceeds maximum size: {} bytes (limit: {} bytes)",
                size, self.max_input_bytes
            )));
        }

        // whisper.cpp writes its JSON next to the given output prefix; keep it
        // out of the uploads directory.
        let out_dir = tempfile::tempdir()
            .map_err(|e| VoiceError::Stt(format!("Failed to create output dir: {}", e)))?;
        let out_prefix = out_dir.path().join("transcript");

        let mut command = Command::new(&self.binary_path);
        command
            .arg("-m")
            .arg(&self.model_path)
            .arg("-f")
            .arg(audio_path)
            .arg("-l")
            .arg("auto")
            .arg("-ojf")
            .arg("-of")
            .arg(&out_prefix)
            .arg("-np")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = command
            .spawn()
            .map_err(|e| VoiceError::Stt(format!("Failed to spawn STT binary: {}", e)))?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                VoiceError::Stt(format!(
                    "STT process timed out after {} seconds",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| VoiceError::Stt(format!("Failed to wait for STT binary: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VoiceError::Stt(format!("STT binary failed: {}", stderr.trim())));
        }

        let json = tokio::fs::read(out_prefix.with_extension("json"))
            .await
            .map_err(|e| VoiceError::Stt(format!("STT produced no transcript: {}", e)))?;

        let result = parse_whisper_json(&json)?;
        tracing::debug!(
            binary = %self.binary_path.display(),
            language = %result.detected_language,
            chars = result.text.len(),
            "whisper transcription finished"
        );
        Ok(result)
    }
}

#[derive(Debug, Deserialize)]
struct WhisperOutput {
    #[serde(default)]
    result: WhisperResultInfo,
    #[serde(default)]
    transcription: Vec<WhisperSegment>,
}

#[derive(Debug, Default, Deserialize)]
struct WhisperResultInfo {
    #[serde(default)]
    language: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WhisperSegment {
    text: String,
    #[serde(default)]
    tokens: Vec<WhisperToken>,
}

#[derive(Debug, Deserialize)]
struct WhisperToken {
    #[serde(default)]
    text: String,
    p: f32,
}

/// Parses whisper.cpp `-oj`/`-ojf` output.
///
/// Confidence is the mean probability of the non-special tokens when the
/// full output is present, [`DEFAULT_CONFIDENCE`] otherwise.
fn parse_whisper_json(bytes: &[u8]) -> Result<TranscriptionResult, VoiceError> {
    let output: WhisperOutput = serde_json::from_slice(bytes)
        .map_err(|e| VoiceError::Stt(format!("Malformed STT output: {}", e)))?;

    let text = output
        .transcription
        .iter()
        .map(|segment| segment.text.trim())
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    let probabilities: Vec<f32> = output
        .transcription
        .iter()
        .flat_map(|segment| segment.tokens.iter())
        .filter(|token| !token.text.starts_with("[_"))
        .map(|token| token.p)
        .collect();
    let confidence = if probabilities.is_empty() {
        DEFAULT_CONFIDENCE
    } else {
        probabilities.iter().sum::<f32>() / probabilities.len() as f32
    };

    let language = output
        .result
        .language
        .filter(|lang| !lang.trim().is_empty())
        .unwrap_or_else(|| FALLBACK_LANGUAGE.to_string());

    Ok(TranscriptionResult::new(text, language, confidence))
}
