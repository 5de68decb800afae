//! Landing page with live model status and a short usage example.

use crate::config::LandingConfig;
use crate::manager::{ManagerState, StatusSnapshot};
use crate::state::AppState;
use actix_web::{web, HttpResponse};

pub async fn index(state: web::Data<AppState>) -> HttpResponse {
    let status = state.manager.get_status();
    let body = render_page(&state.config.landing, &status);

    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(body)
}

fn render_page(landing: &LandingConfig, status: &StatusSnapshot) -> String {
    let (pill_class, pill_text) = match status.state {
        ManagerState::Loaded => ("loaded", "loaded"),
        ManagerState::Loading => ("loading", "loading"),
        ManagerState::Unloaded => ("unloaded", "not loaded"),
    };
    let last_loaded = status
        .last_loaded
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "never".to_string());
    let idle = if status.idle_unload_seconds > 0 {
        format!("unloads after {}s idle", status.idle_unload_seconds)
    } else {
        "idle unload disabled".to_string()
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>{title}</title>
  <style>
    body {{ font-family: system-ui, sans-serif; max-width: 42rem; margin: 3rem auto; padding: 0 1rem; color: #1a1a2e; }}
    code, pre {{ background: #f4f4f8; border-radius: 4px; }}
    pre {{ padding: 1rem; overflow-x: auto; }}
    code {{ padding: 0.1rem 0.3rem; }}
    .pill {{ display: inline-block; padding: 0.15rem 0.6rem; border-radius: 999px; font-size: 0.85rem; color: #fff; }}
    .pill.loaded {{ background: #2e7d32; }}
    .pill.loading {{ background: #ef6c00; }}
    .pill.unloaded {{ background: #757575; }}
  </style>
</head>
<body>
  <h1>{title}</h1>
  <p>{tagline}</p>
  <p>Serving <code>{model}</code>
  <span class="pill {pill_class}">{pill_text}</span></p>
  <p>Last loaded: {last_loaded} &middot; {idle}. The model loads on first
  request and is evicted again after a period of inactivity.</p>
  <h2>Usage</h2>
  <pre>curl -s http://localhost:8000/v1/audio/transcriptions \
  -F file=@speech.wav \
  -F model={model}</pre>
  <p>See <a href="/healthz">/healthz</a> for server and model status and
  <a href="/v1/models">/v1/models</a> for the model listing.</p>
</body>
</html>
"#,
        title = landing.title,
        tagline = landing.tagline,
        model = status.model_name,
        pill_class = pill_class,
        pill_text = pill_text,
        last_loaded = last_loaded,
        idle = idle,
    )
}
