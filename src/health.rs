//! `GET /healthz`. Reports liveness plus a snapshot of the managed
//! model, without touching the model itself: probing health must never
//! trigger a load or reset the idle timer.

use crate::manager::StatusSnapshot;
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: String,
    uptime_seconds: u64,
    model: StatusSnapshot,
}

pub async fn healthz(state: web::Data<AppState>) -> HttpResponse {
    let response = HealthResponse {
        status: "ok",
        service: state.config.landing.title.clone(),
        uptime_seconds: state.uptime_seconds(),
        model: state.manager.get_status(),
    };
    HttpResponse::Ok().json(response)
}
