#![allow(dead_code)]

use agrivoice_advisor::{AdviceGenerator, AdvisorError, LanguageModel, Translator};
use agrivoice_pipeline::{ArtifactStore, Pipeline};
use agrivoice_server::{app, AppState};
use agrivoice_types::{Language, TranscriptionResult};
use agrivoice_voice::{Speaker, SpeechEngine, Transcriber, VoiceError};
use async_trait::async_trait;
use axum::{body::Body, http::Request, response::Response, Router};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub const ADVICE: &str = "Spray neem oil every seven days and remove infected leaves.";
pub const FAKE_MP3: &[u8] = b"ID3\x03\x00fake-mp3";
pub const MAX_AUDIO_BYTES: usize = 10 * 1024 * 1024;

/// Questions containing this marker make the fake model panic.
pub const PANIC_MARKER: &str = "__panic__";

pub struct FakeTranscriber {
    pub text: String,
    pub language: String,
    /// When set, every call fails with this message.
    pub failure: Option<String>,
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(&self, audio_path: &Path) -> Result<TranscriptionResult, VoiceError> {
        if !audio_path.exists() {
            return Err(VoiceError::Stt("input vanished".to_string()));
        }
        if let Some(message) = &self.failure {
            return Err(VoiceError::Stt(message.clone()));
        }
        Ok(TranscriptionResult::new(
            self.text.clone(),
            self.language.clone(),
            0.92,
        ))
    }
}

pub struct FakeModel;

#[async_trait]
impl LanguageModel for FakeModel {
    async fn generate(&self, prompt: &str) -> Result<String, AdvisorError> {
        if prompt.contains(PANIC_MARKER) {
            panic!("model exploded");
        }
        Ok(ADVICE.to_string())
    }

    fn model_name(&self) -> &str {
        "fake-model"
    }
}

pub struct FakeTranslator;

#[async_trait]
impl Translator for FakeTranslator {
    async fn translate(
        &self,
        text: &str,
        _source: Language,
        target: Language,
    ) -> Result<String, AdvisorError> {
        Ok(format!("[{}] {}", target.code(), text))
    }
}

#[derive(Default)]
pub struct FakeEngine {
    /// When set, a truncated file is written and the call fails with this message.
    pub failure: Option<String>,
}

#[async_trait]
impl SpeechEngine for FakeEngine {
    async fn synthesize(&self, _text: &str, _tts_code: &str, output: &Path) -> Result<(), VoiceError> {
        if let Some(message) = &self.failure {
            tokio::fs::write(output, &FAKE_MP3[..3])
                .await
                .map_err(|e| VoiceError::Tts(e.to_string()))?;
            return Err(VoiceError::Tts(message.clone()));
        }
        tokio::fs::write(output, FAKE_MP3)
            .await
            .map_err(|e| VoiceError::Tts(e.to_string()))
    }
}

pub struct TestServer {
    pub app: Router,
    pub uploads: PathBuf,
    pub responses: PathBuf,
    _root: tempfile::TempDir,
}

impl TestServer {
    pub fn new() -> Self {
        Self::with_transcript("How do I protect my cotton from bollworm?", "en")
    }

    pub fn with_transcript(text: &str, language: &str) -> Self {
        Self::build(
            FakeTranscriber {
                text: text.to_string(),
                language: language.to_string(),
                failure: None,
            },
            FakeEngine::default(),
        )
    }

    /// Server whose speech recognizer always fails with `message`.
    pub fn with_failing_transcriber(message: &str) -> Self {
        Self::build(
            FakeTranscriber {
                text: String::new(),
                language: "en".to_string(),
                failure: Some(message.to_string()),
            },
            FakeEngine::default(),
        )
    }

    /// Server whose speech synthesizer always fails with `message`.
    pub fn with_failing_engine(message: &str) -> Self {
        Self::build(
            FakeTranscriber {
                text: "How do I protect my cotton from bollworm?".to_string(),
                language: "en".to_string(),
                failure: None,
            },
            FakeEngine {
                failure: Some(message.to_string()),
            },
        )
    }

    fn build(transcriber: FakeTranscriber, engine: FakeEngine) -> Self {
        let root = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(root.path().join("uploads"), root.path().join("responses"));
        store.ensure_dirs().unwrap();
        let uploads = store.uploads_dir().to_path_buf();
        let responses = store.responses_dir().to_path_buf();

        let pipeline = Pipeline::new(
            Arc::new(transcriber),
            AdviceGenerator::new(Arc::new(FakeModel)),
            Arc::new(FakeTranslator),
            Speaker::new(Arc::new(engine)),
            store,
        );

        let state = AppState {
            pipeline: Arc::new(pipeline),
            max_audio_bytes: MAX_AUDIO_BYTES,
            retention: Duration::from_secs(3600),
        };

        Self {
            app: app(state),
            uploads,
            responses,
            _root: root,
        }
    }
}

pub fn file_count(dir: &Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

pub async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

pub enum Part<'a> {
    File {
        name: &'a str,
        filename: &'a str,
        data: &'a [u8],
    },
    Text {
        name: &'a str,
        value: &'a str,
    },
}

const BOUNDARY: &str = "agrivoice-test-boundary";

/// Builds a `multipart/form-data` POST to `uri`.
pub fn multipart_request(uri: &str, parts: &[Part<'_>]) -> Request<Body> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::File {
                name,
                filename,
                data,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                         Content-Type: audio/wav\r\n\r\n",
                        name, filename
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
            }
            Part::Text { name, value } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"\r\n\r\n{}",
                        name, value
                    )
                    .as_bytes(),
                );
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

pub fn json_request(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}
