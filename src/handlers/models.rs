//! Model listing in the OpenAI `/v1/models` shape. The server hosts a
//! single model, so the list always has exactly one entry.

use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct ModelEntry {
    id: String,
    object: &'static str,
    created: i64,
    owned_by: String,
}

#[derive(Debug, Serialize)]
struct ModelList {
    object: &'static str,
    data: Vec<ModelEntry>,
}

pub async fn list_models(state: web::Data<AppState>) -> HttpResponse {
    let status = state.manager.get_status();
    let entry = ModelEntry {
        id: status.model_name.clone(),
        object: "model",
        created: status.last_loaded.map(|t| t.timestamp()).unwrap_or(0),
        owned_by: owner_of(&status.model_name),
    };

    HttpResponse::Ok().json(ModelList {
        object: "list",
        data: vec![entry],
    })
}

/// The organization part of a HuggingFace repo id, e.g. "openai" for
/// "openai/whisper-base".
fn owner_of(model_id: &str) -> String {
    match model_id.split_once('/') {
        Some((org, _)) if !org.is_empty() => org.to_string(),
        _ => "local".to_string(),
    }
}
