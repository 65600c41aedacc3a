//! The HTTP surface this process actually owns: health, the attendance
//! enable/disable toggle, and the voice-event long-poll. MJPEG/HLS/WebRTC
//! streaming and the enrollment session routes are external-collaborator
//! surfaces (`SPEC_FULL.md` §1/§6) and are not implemented here.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use attendance_types::stream::StreamType;
use attendance_types::CameraId;

use crate::container::ServiceContainer;

#[derive(Clone)]
pub struct AppState {
    pub container: Arc<ServiceContainer>,
}

pub fn router(container: Arc<ServiceContainer>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/attendance/enable", post(attendance_enable))
        .route("/attendance/disable", post(attendance_disable))
        .route("/attendance/enabled", get(attendance_enabled))
        .route("/attendance/voice-events", get(voice_events))
        .with_state(AppState { container })
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let cameras = state.container.camera_ids();
    Json(serde_json::json!({ "status": "ok", "cameras": cameras.len() }))
}

#[derive(Deserialize)]
struct CameraQuery {
    camera_id: String,
    #[serde(default)]
    stream_type: Option<String>,
}

fn parse_stream_type(value: Option<&str>) -> StreamType {
    match value {
        Some("headcount") => StreamType::Headcount,
        Some("ot") => StreamType::Ot,
        _ => StreamType::Attendance,
    }
}

async fn attendance_enable(
    State(state): State<AppState>,
    Query(q): Query<CameraQuery>,
) -> impl IntoResponse {
    let camera_id = CameraId::new(q.camera_id);
    let stream_type = parse_stream_type(q.stream_type.as_deref());
    state
        .container
        .services()
        .viewers
        .add_viewer(&camera_id, stream_type);
    StatusCode::NO_CONTENT
}

async fn attendance_disable(
    State(state): State<AppState>,
    Query(q): Query<CameraQuery>,
) -> impl IntoResponse {
    let camera_id = CameraId::new(q.camera_id);
    let stream_type = parse_stream_type(q.stream_type.as_deref());
    state
        .container
        .services()
        .viewers
        .remove_viewer(&camera_id, stream_type);
    StatusCode::NO_CONTENT
}

#[derive(Deserialize)]
struct CameraIdQuery {
    camera_id: String,
}

async fn attendance_enabled(
    State(state): State<AppState>,
    Query(q): Query<CameraIdQuery>,
) -> impl IntoResponse {
    let camera_id = CameraId::new(q.camera_id);
    let enabled = state
        .container
        .services()
        .viewers
        .is_attendance_enabled(&camera_id);
    Json(serde_json::json!({ "enabled": enabled }))
}

#[derive(Deserialize)]
struct VoiceEventsQuery {
    #[serde(default)]
    company_id: Option<String>,
    #[serde(default)]
    after_seq: u64,
    #[serde(default = "default_limit")]
    limit: usize,
    #[serde(default = "default_wait_ms")]
    wait_ms: u64,
}

fn default_limit() -> usize {
    20
}

fn default_wait_ms() -> u64 {
    20_000
}

async fn voice_events(
    State(state): State<AppState>,
    Query(q): Query<VoiceEventsQuery>,
) -> impl IntoResponse {
    let voice_log = state.container.services().voice_log.clone();
    let company_id = q.company_id.map(attendance_types::CompanyId::new);
    let (latest_seq, events) = tokio::task::spawn_blocking(move || {
        voice_log.get_voice_events(
            company_id.as_ref(),
            q.after_seq,
            q.limit,
            Duration::from_millis(q.wait_ms),
        )
    })
    .await
    .expect("voice event poll task panicked");

    Json(serde_json::json!({ "latest_seq": latest_seq, "events": events }))
}
