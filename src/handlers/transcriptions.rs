//! `POST /v1/audio/transcriptions`, modeled on the OpenAI audio API.
//!
//! Accepts a multipart form with an audio file and optional decoding
//! options, runs it through the managed model, and renders the transcript
//! in the requested response format.

use crate::backend::InferencePayload;
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use actix_multipart::form::{bytes::Bytes, text::Text, MultipartForm};
use actix_web::{web, HttpResponse};
use serde_json::json;
use tracing::debug;

#[derive(Debug, MultipartForm)]
pub struct TranscriptionForm {
    pub file: Bytes,
    pub model: Option<Text<String>>,
    pub prompt: Option<Text<String>>,
    pub response_format: Option<Text<String>>,
    pub temperature: Option<Text<f64>>,
    pub language: Option<Text<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResponseFormat {
    Json,
    VerboseJson,
    Text,
    Srt,
    Vtt,
}

impl ResponseFormat {
    fn parse(value: &str) -> Option<Self> {
        // "json_object" is accepted as an alias some OpenAI clients send.
        match value.to_ascii_lowercase().as_str() {
            "json" | "json_object" => Some(ResponseFormat::Json),
            "verbose_json" => Some(ResponseFormat::VerboseJson),
            "text" => Some(ResponseFormat::Text),
            "srt" => Some(ResponseFormat::Srt),
            "vtt" => Some(ResponseFormat::Vtt),
            _ => None,
        }
    }
}

pub async fn create_transcription(
    state: web::Data<AppState>,
    MultipartForm(form): MultipartForm<TranscriptionForm>,
) -> AppResult<HttpResponse> {
    let served_model = &state.config.model.name;
    if let Some(requested) = form.model.as_deref() {
        if requested != served_model {
            return Err(AppError::NotFound(format!(
                "Model '{}' not found. This server hosts '{}'.",
                requested, served_model
            )));
        }
    }

    if form.file.data.is_empty() {
        return Err(AppError::BadRequest("uploaded file is empty".to_string()));
    }

    let format = match form.response_format.as_deref() {
        None => ResponseFormat::Json,
        Some(value) => ResponseFormat::parse(value).ok_or_else(|| {
            AppError::BadRequest(format!("unsupported response_format '{}'", value))
        })?,
    };

    if let Some(temperature) = &form.temperature {
        debug!(temperature = temperature.0, "temperature accepted but not used");
    }

    let language = form.language.map(|t| t.0);
    let payload = InferencePayload {
        audio: form.file.data.to_vec(),
        filename: form
            .file
            .file_name
            .clone()
            .unwrap_or_else(|| "upload".to_string()),
        language: language.clone(),
        prompt: form.prompt.map(|t| t.0),
    };

    let text = state.manager.transcribe(payload).await?;
    Ok(render(format, &text, served_model, language.as_deref()))
}

/// Base fields shared by both JSON response shapes.
fn json_payload(text: &str, model: &str, language: Option<&str>) -> serde_json::Value {
    json!({
        "text": text,
        "model": model,
        "language": language,
        "created": chrono::Utc::now().timestamp(),
    })
}

// The decoder produces no word timings, so the verbose shape carries one
// zero-span segment covering the whole transcript, like the srt/vtt cues.
fn verbose_json_payload(text: &str, model: &str, language: Option<&str>) -> serde_json::Value {
    let mut payload = json_payload(text, model, language);
    payload["task"] = json!("transcribe");
    payload["duration"] = json!(0.0);
    payload["segments"] = json!([{
        "id": 0,
        "start": 0.0,
        "end": 0.0,
        "text": text,
    }]);
    payload
}

fn render(
    format: ResponseFormat,
    text: &str,
    model: &str,
    language: Option<&str>,
) -> HttpResponse {
    match format {
        ResponseFormat::Json => HttpResponse::Ok().json(json_payload(text, model, language)),
        ResponseFormat::VerboseJson => {
            HttpResponse::Ok().json(verbose_json_payload(text, model, language))
        }
        ResponseFormat::Text => HttpResponse::Ok()
            .content_type("text/plain; charset=utf-8")
            .body(format!("{}\n", text)),
        ResponseFormat::Srt => HttpResponse::Ok()
            .content_type("application/x-subrip")
            .body(render_srt(text)),
        ResponseFormat::Vtt => HttpResponse::Ok()
            .content_type("text/vtt")
            .body(render_vtt(text)),
    }
}

fn render_srt(text: &str) -> String {
    format!("1\n00:00:00,000 --> 00:00:00,000\n{}\n", text)
}

fn render_vtt(text: &str) -> String {
    format!("WEBVTT\n\n00:00:00.000 --> 00:00:00.000\n{}\n", text)
}
