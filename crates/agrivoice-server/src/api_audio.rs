//! `POST /ask_audio`: spoken question in, spoken answer out.

use crate::api::ApiError;
use crate::AppState;
use agrivoice_types::Language;
use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Extension, Multipart,
    },
    http::{
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
        StatusCode,
    },
    response::{IntoResponse, Response},
};
use std::sync::Arc;

/// Form field carrying the recording.
const AUDIO_FIELD: &str = "audio";
/// Optional form field carrying the answer language.
const LANG_FIELD: &str = "lang";

/// Fields read from the multipart body.
#[derive(Debug, Default)]
struct AudioUpload {
    audio: Option<Vec<u8>>,
    lang: Option<String>,
}

const MIB: usize = 1024 * 1024;

fn too_large(max_bytes: usize) -> ApiError {
    ApiError::BadRequest(format!(
        "Audio file too large (max {})",
        describe_limit(max_bytes)
    ))
}

/// Whole megabytes, rounded up, or bytes for caps under 1 MiB.
fn describe_limit(max_bytes: usize) -> String {
    if max_bytes < MIB {
        format!("{} bytes", max_bytes)
    } else {
        format!("{}MB", max_bytes.div_ceil(MIB))
    }
}

fn multipart_error(max_bytes: usize) -> impl Fn(MultipartError) -> ApiError {
    move |e| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            too_large(max_bytes)
        } else {
            ApiError::BadRequest(format!("multipart error: {}", e.body_text()))
        }
    }
}

/// Reads the `audio` and `lang` fields, enforcing the size cap chunk by chunk
/// so an oversized recording is refused before it is fully buffered.
async fn read_upload(multipart: &mut Multipart, max_bytes: usize) -> Result<AudioUpload, ApiError> {
    let mut upload = AudioUpload::default();

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(multipart_error(max_bytes))?
    {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some(AUDIO_FIELD) if upload.audio.is_none() => {
                // A part without a filename is a plain form value, not a file.
                let Some(file_name) = field.file_name().map(str::to_owned) else {
                    continue;
                };
                if file_name.is_empty() {
                    return Err(ApiError::BadRequest("No file selected".to_string()));
                }

                let mut data = Vec::new();
                while let Some(chunk) = field.chunk().await.map_err(multipart_error(max_bytes))? {
                    if data.len() + chunk.len() > max_bytes {
                        return Err(too_large(max_bytes));
                    }
                    data.extend_from_slice(&chunk);
                }
                upload.audio = Some(data);
            }
            Some(LANG_FIELD) => {
                let lang = field.text().await.map_err(multipart_error(max_bytes))?;
                upload.lang = Some(lang);
            }
            _ => {}
        }
    }

    Ok(upload)
}

/// Handler for `POST /ask_audio`.
///
/// Responds with the synthesized MP3. An unknown `lang` is answered in
/// English.
pub async fn ask_audio_handler(
    Extension(state): Extension<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let mut multipart = multipart.map_err(|e| {
        tracing::debug!(error = %e, "rejected ask_audio body");
        ApiError::BadRequest("No audio file provided".to_string())
    })?;

    let upload = read_upload(&mut multipart, state.max_audio_bytes).await?;
    let audio = upload
        .audio
        .ok_or_else(|| ApiError::BadRequest("No audio file provided".to_string()))?;
    if audio.is_empty() {
        return Err(ApiError::BadRequest("Empty audio file".to_string()));
    }

    let requested = upload.lang.as_deref().unwrap_or("en");
    let language = Language::resolve(requested);
    if !Language::is_supported(requested) {
        tracing::warn!(requested, "unsupported language requested, answering in English");
    }
    tracing::info!(language = %language, bytes = audio.len(), "processing audio request");

    let answer = state
        .pipeline
        .process_audio_question(audio, language.code())
        .await
        .map_err(ApiError::from)?;

    let body = tokio::fs::read(&answer.audio_path).await.map_err(|e| {
        tracing::error!(path = %answer.audio_path.display(), error = %e, "failed to read synthesized audio");
        ApiError::InternalServerError(format!("Processing failed: {}", e))
    })?;

    let meta = &answer.metadata;
    tracing::info!(
        transcribed = %meta.transcribed_text,
        detected = %meta.detected_language,
        target = %meta.target_language,
        confidence = meta.confidence,
        advice_degraded = meta.advice_degraded,
        translation_degraded = meta.translation_degraded,
        "answered audio question"
    );

    Ok((
        [
            (CONTENT_TYPE, "audio/mpeg"),
            (CONTENT_DISPOSITION, "inline; filename=\"response.mp3\""),
        ],
        body,
    )
        .into_response())
}
