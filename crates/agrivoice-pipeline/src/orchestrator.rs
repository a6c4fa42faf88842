//! Sequencing of the question pipeline.

use crate::artifact::ArtifactStore;
use crate::error::PipelineError;
use agrivoice_advisor::{AdviceGenerator, Translator};
use agrivoice_types::{Language, Outcome, QueryMetadata, TextAnswer};
use agrivoice_voice::{Speaker, Transcriber};
use std::path::PathBuf;
use std::sync::Arc;

/// Number of characters of model output echoed to the log.
const LOG_PREVIEW_CHARS: usize = 100;

/// The spoken answer to an audio question.
#[derive(Debug, Clone)]
pub struct AudioAnswer {
    pub metadata: QueryMetadata,
    /// Persisted MP3 file, now subject to the retention sweep.
    pub audio_path: PathBuf,
}

/// Advice text in the language it ended up in.
#[derive(Debug, Clone, PartialEq)]
struct Rendered {
    text: String,
    language: Language,
}

/// Runs questions through transcription, advice, translation and speech.
///
/// Built once at startup and shared across requests; holds no per-request
/// state.
pub struct Pipeline {
    transcriber: Arc<dyn Transcriber>,
    advisor: AdviceGenerator,
    translator: Arc<dyn Translator>,
    speaker: Speaker,
    store: ArtifactStore,
}

impl Pipeline {
    pub fn new(
        transcriber: Arc<dyn Transcriber>,
        advisor: AdviceGenerator,
        translator: Arc<dyn Translator>,
        speaker: Speaker,
        store: ArtifactStore,
    ) -> Self {
        Self {
            transcriber,
            advisor,
            translator,
            speaker,
            store,
        }
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Answers a spoken question with a spoken answer.
    ///
    /// `requested_target` outside the registry is replaced by the detected
    /// language when the registry knows it, English otherwise.
    pub async fn process_audio_question(
        &self,
        audio: Vec<u8>,
        requested_target: &str,
    ) -> Result<AudioAnswer, PipelineError> {
        let input = self.store.persist_input(audio).await.map_err(|e| {
            tracing::error!(stage = "persist", error = %e, "failed to store uploaded audio");
            PipelineError::Storage(e)
        })?;
        tracing::info!(path = %input.path().display(), "processing audio file");

        let transcription = self.transcriber.transcribe(input.path()).await;
        input.discard();
        let transcription = transcription.map_err(|e| {
            tracing::error!(stage = "transcribe", error = %e, "transcription failed");
            PipelineError::Transcription(e)
        })?;
        tracing::info!(
            text = %transcription.text,
            language = %transcription.detected_language,
            confidence = transcription.confidence,
            "transcribed audio"
        );

        if !transcription.is_understandable() {
            tracing::warn!(
                stage = "validate",
                text = %transcription.text,
                "transcription too short to answer"
            );
            return Err(PipelineError::NotUnderstood);
        }

        let advice = self.advisor.generate(&transcription.text).await;
        tracing::info!(
            degraded = advice.is_degraded(),
            preview = %preview(&advice.value().text),
            "advice generated"
        );

        let target = resolve_target(requested_target, transcription.detected());
        let rendered = self.render(&advice.value().text, target).await;
        let spoken = rendered.value();

        let output = self.store.create_output().map_err(|e| {
            tracing::error!(stage = "synthesize", error = %e, "failed to reserve response file");
            PipelineError::Storage(e)
        })?;
        // On failure `output` drops here and takes the partial file with it.
        self.speaker
            .speak(&spoken.text, spoken.language.code(), output.path())
            .await
            .map_err(|e| {
                tracing::error!(
                    stage = "synthesize",
                    language = %spoken.language,
                    error = %e,
                    "TTS error"
                );
                PipelineError::Synthesis(e)
            })?;
        let audio_path = output.persist()?;
        tracing::info!(path = %audio_path.display(), "audio response saved");

        let metadata = QueryMetadata {
            transcribed_text: transcription.text,
            detected_language: transcription.detected_language,
            target_language: spoken.language,
            ai_response: advice.value().text.clone(),
            translated_response: spoken.text.clone(),
            confidence: transcription.confidence,
            audio_file: audio_path.clone(),
            advice_degraded: advice.is_degraded(),
            translation_degraded: rendered.is_degraded(),
        };

        Ok(AudioAnswer {
            metadata,
            audio_path,
        })
    }

    /// Answers a typed question in `requested_language` (English when the
    /// code is unknown).
    pub async fn answer_text_question(&self, text: &str, requested_language: &str) -> TextAnswer {
        let advice = self.advisor.generate(text).await;
        tracing::info!(
            degraded = advice.is_degraded(),
            preview = %preview(&advice.value().text),
            "advice generated"
        );

        let target = Language::resolve(requested_language);
        let rendered = self.render(&advice.value().text, target).await.into_value();

        TextAnswer {
            original_text: text.to_string(),
            ai_response: advice.into_value().text,
            translated_response: rendered.text,
            language: rendered.language,
        }
    }

    /// Translates English advice into `target`.
    ///
    /// On failure the advice stays in English and the language reported with
    /// it becomes English too, so the label always matches the text.
    async fn render(&self, advice: &str, target: Language) -> Outcome<Rendered> {
        if target == Language::English {
            return Outcome::Complete(Rendered {
                text: advice.to_string(),
                language: Language::English,
            });
        }

        match self
            .translator
            .translate(advice, Language::English, target)
            .await
        {
            Ok(text) => {
                tracing::info!(language = %target, preview = %preview(&text), "translated advice");
                Outcome::Complete(Rendered {
                    text,
                    language: target,
                })
            }
            Err(e) => {
                tracing::error!(
                    stage = "translate",
                    language = %target,
                    error = %e,
                    "translation error, falling back to English"
                );
                Outcome::degraded(
                    Rendered {
                        text: advice.to_string(),
                        language: Language::English,
                    },
                    e.to_string(),
                )
            }
        }
    }
}

/// Picks the answer language for an audio question.
pub fn resolve_target(requested: &str, detected: Option<Language>) -> Language {
    Language::from_code(requested).or(detected).unwrap_or_default()
}

fn preview(text: &str) -> String {
    match text.char_indices().nth(LOG_PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
