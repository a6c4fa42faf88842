use crate::error::VoiceError;
use agrivoice_types::tts_code_for;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Maximum text input size for TTS (64 KiB). Prevents resource exhaustion from
/// oversized synthesis requests.
const MAX_TTS_INPUT_BYTES: usize = 64 * 1024;

/// Timeout for TTS process execution.
const TTS_TIMEOUT: Duration = Duration::from_secs(60);

/// Text-to-speech engine writing MP3 audio to a file.
#[async_trait]
pub trait SpeechEngine: Send + Sync {
    /// Speaks `text` in the engine-specific language `tts_code` into `output`.
    async fn synthesize(&self, text: &str, tts_code: &str, output: &Path)
        -> Result<(), VoiceError>;
}

/// Maps registry languages onto the engine's voices before synthesizing.
#[derive(Clone)]
pub struct Speaker {
    engine: Arc<dyn SpeechEngine>,
}

impl Speaker {
    pub fn new(engine: Arc<dyn SpeechEngine>) -> Self {
        Self { engine }
    }

    /// Synthesizes `text` spoken in `language` into `output`.
    ///
    /// Languages without a synthesizer voice are spoken with the English
    /// voice.
    pub async fn speak(&self, text: &str, language: &str, output: &Path) -> Result<(), VoiceError> {
        if text.trim().is_empty() {
            return Err(VoiceError::Tts("nothing to synthesize".to_string()));
        }
        let tts_code = tts_code_for(language);
        if tts_code != language {
            tracing::debug!(language, tts_code, "mapped language to synthesizer voice");
        }
        self.engine.synthesize(text, tts_code, output).await
    }
}

/// Runs `gtts-cli`, feeding the text on stdin.
#[derive(Debug, Clone)]
pub struct GttsCli {
    binary_path: PathBuf,
    timeout: Duration,
}

impl GttsCli {
    pub fn new(binary_path: impl Into<PathBuf>) -> Self {
        Self {
            binary_path: binary_path.into(),
            timeout: TTS_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl SpeechEngine for GttsCli {
    async fn synthesize(
        &self,
        text: &str,
        tts_code: &str,
        output: &Path,
    ) -> Result<(), VoiceError> {
        if text.len() > MAX_TTS_INPUT_BYTES {
            return Err(VoiceError::Tts(format!(
                "text exceeds maximum size: {} bytes (limit: {} bytes)",
                text.len(),
                MAX_TTS_INPUT_BYTES
            )));
        }

        let mut command = Command::new(&self.binary_path);
        command
            .arg("--lang")
            .arg(tts_code)
            .arg("--output")
            .arg(output)
            // "-" reads the text from stdin
            .arg("-")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command
            .spawn()
            .map_err(|e| VoiceError::Tts(format!("Failed to spawn gtts-cli: {}", e)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| VoiceError::Tts("Failed to open stdin".to_string()))?;
        let text_owned = text.to_string();

        // Write from a separate task so a full stdout pipe cannot deadlock us.
        let write_task = tokio::spawn(async move {
            stdin.write_all(text_owned.as_bytes()).await?;
            stdin.shutdown().await
        });

        let result = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                VoiceError::Tts(format!(
                    "TTS process timed out after {} seconds",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| VoiceError::Tts(format!("Failed to wait for gtts-cli: {}", e)))?;

        let stdin_result = match write_task.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(format!("Failed to write to gtts-cli stdin: {}", e)),
            Err(e) => Err(format!("Stdin task failed: {}", e)),
        };
        check_exit(&result, stdin_result)?;

        let written = tokio::fs::metadata(output)
            .await
            .map(|meta| meta.len())
            .unwrap_or(0);
        if written == 0 {
            return Err(VoiceError::Tts("gtts-cli produced no audio".to_string()));
        }

        Ok(())
    }
}

/// A process that exits early breaks its stdin pipe, so its own exit status
/// and stderr are reported ahead of the write error.
fn check_exit(output: &Output, stdin_result: Result<(), String>) -> Result<(), VoiceError> {
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(VoiceError::Tts(format!("gtts-cli failed: {}", stderr.trim())));
    }
    stdin_result.map_err(VoiceError::Tts)
}
