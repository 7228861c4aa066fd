use crate::error::ApiError;
use crate::state::{AppState, DisplaySettings};
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};
use situ_client::types::{CaptionRequest, ChatRequest, Prediction};
use situ_core::log::{csv_filename, to_csv};
use situ_core::prompts::HAND_QUESTION;
use situ_core::{LogEntry, VideoSource};
use std::time::Duration;
use tower_http::trace::TraceLayer;

/// Frames arrive as data URLs, so bodies can be large.
pub const BODY_LIMIT: usize = 50 * 1024 * 1024;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(chat))
        .route("/imageCaption", post(image_caption))
        .route("/signals/visual", post(update_visual))
        .route("/signals/audio", post(update_audio))
        .route("/signals/video", post(update_video))
        .route("/signals/frame", post(caption_frame))
        .route("/assessment/latest", get(latest_assessment))
        .route("/logs", get(list_logs).delete(clear_logs))
        .route("/logs.csv", get(export_csv))
        .route("/control", get(control))
        .route("/control/interval", put(set_interval))
        .route("/control/display", put(set_display))
        .route("/status", get(status))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<Value>, ApiError> {
    if request.messages.is_empty() {
        return Err(ApiError::BadRequest("messages must not be empty".to_string()));
    }
    Ok(Json(state.chat.forward(&request).await?))
}

async fn image_caption(
    State(state): State<AppState>,
    Json(request): Json<CaptionRequest>,
) -> Result<Json<Prediction>, ApiError> {
    let client = state.caption.as_ref().ok_or(ApiError::CaptionUnavailable)?;
    if request.image.is_empty() {
        return Err(ApiError::BadRequest("image must not be empty".to_string()));
    }
    Ok(Json(client.caption(&request).await?))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct VisualUpdate {
    objects: Option<Vec<String>>,
    holding: Option<String>,
    caption: Option<String>,
    hand_caption: Option<String>,
    /// A hand is in frame right now.
    hand_seen: bool,
}

async fn update_visual(
    State(state): State<AppState>,
    Json(update): Json<VisualUpdate>,
) -> StatusCode {
    let now = Utc::now();
    state.signals.update_visual(|v| {
        if let Some(objects) = update.objects {
            v.objects = objects;
        }
        if let Some(holding) = update.holding {
            v.holding = holding;
        }
        if let Some(caption) = update.caption {
            v.caption = caption;
        }
        if let Some(hand_caption) = update.hand_caption {
            v.hand_caption = hand_caption;
        }
        if update.hand_seen {
            v.last_hand_seen = Some(now);
        }
    });
    StatusCode::NO_CONTENT
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AudioUpdate {
    /// Precomputed volume, used as-is.
    volume: Option<f64>,
    /// Raw microphone buffer, fed to the volume meter.
    samples: Option<Vec<f32>>,
    /// Normalized level in `0..=1`, fed to the volume meter.
    level: Option<f64>,
    classifications: Option<Vec<String>>,
}

async fn update_audio(
    State(state): State<AppState>,
    Json(update): Json<AudioUpdate>,
) -> Result<Json<Value>, ApiError> {
    if update.volume.is_some_and(|v| !v.is_finite()) {
        return Err(ApiError::BadRequest("volume must be a finite number".to_string()));
    }

    let measured = match (&update.samples, update.level) {
        (Some(samples), _) => Some(state.with_volume_meter(|m| m.push_samples(samples))),
        (None, Some(level)) => Some(state.with_volume_meter(|m| m.push_level(level))),
        (None, None) => None,
    };
    let volume = measured.or(update.volume);

    let mut reported = 0.0;
    state.signals.update_audio(|a| {
        if let Some(volume) = volume {
            a.volume = volume;
        }
        if let Some(classifications) = update.classifications {
            a.classifications = classifications;
        }
        reported = a.volume;
    });
    Ok(Json(json!({ "volume": reported })))
}

async fn update_video(State(state): State<AppState>, Json(video): Json<VideoSource>) -> StatusCode {
    tracing::debug!("video source set to {:?}", video);
    state.signals.set_video(video);
    StatusCode::NO_CONTENT
}

#[derive(Debug, Deserialize)]
struct Frame {
    image: String,
}

/// Captions one frame twice (scene and hands) and stores both results.
async fn caption_frame(
    State(state): State<AppState>,
    Json(frame): Json<Frame>,
) -> Result<Json<Value>, ApiError> {
    let client = state.caption.as_ref().ok_or(ApiError::CaptionUnavailable)?;
    if frame.image.is_empty() {
        return Err(ApiError::BadRequest("image must not be empty".to_string()));
    }

    let scene_request = CaptionRequest::scene(&frame.image);
    let hands_request = CaptionRequest::question(&frame.image, HAND_QUESTION);
    let (scene, hands) = tokio::try_join!(
        client.caption(&scene_request),
        client.caption(&hands_request)
    )?;

    let caption = scene.output_text();
    let hand_caption = hands.output_text();
    state.signals.update_visual(|v| {
        if let Some(caption) = &caption {
            v.caption = caption.clone();
        }
        if let Some(hand_caption) = &hand_caption {
            v.hand_caption = hand_caption.clone();
        }
    });

    Ok(Json(json!({ "caption": caption, "hand_caption": hand_caption })))
}

async fn latest_assessment(State(state): State<AppState>) -> Response {
    match state.log.latest() {
        Some(entry) => Json(entry).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

async fn list_logs(State(state): State<AppState>) -> Json<Vec<LogEntry>> {
    Json(state.log.entries())
}

async fn export_csv(State(state): State<AppState>) -> impl IntoResponse {
    let entries = state.log.entries();
    let filename = csv_filename(&entries);
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{filename}\""))
        .unwrap_or_else(|e| {
            tracing::warn!("unusable export file name {:?}: {}", filename, e);
            HeaderValue::from_static("attachment; filename=\"session.csv\"")
        });
    (
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/csv; charset=utf-8"),
            ),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        to_csv(&entries),
    )
}

async fn clear_logs(State(state): State<AppState>) -> StatusCode {
    let dropped = state.log.len();
    state.log.clear();
    tracing::info!("session log cleared ({} entries)", dropped);
    StatusCode::NO_CONTENT
}

async fn control(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "interval_seconds": state.period.current().as_secs_f64(),
        "display": state.display(),
    }))
}

#[derive(Debug, Deserialize)]
struct IntervalUpdate {
    seconds: f64,
}

async fn set_interval(
    State(state): State<AppState>,
    Json(update): Json<IntervalUpdate>,
) -> Result<Json<Value>, ApiError> {
    if !update.seconds.is_finite() || update.seconds <= 0.0 {
        return Err(ApiError::BadRequest(
            "interval must be a positive number of seconds".to_string(),
        ));
    }
    let period = Duration::try_from_secs_f64(update.seconds)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let applied = state.period.set(period);
    tracing::info!("orchestration interval set to {:?}", applied);
    Ok(Json(json!({ "interval_seconds": applied.as_secs_f64() })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DisplayUpdate {
    black_overlay: Option<bool>,
    detection_overlay: Option<bool>,
}

async fn set_display(
    State(state): State<AppState>,
    Json(update): Json<DisplayUpdate>,
) -> Json<DisplaySettings> {
    Json(state.update_display(|d| {
        if let Some(black) = update.black_overlay {
            d.black_overlay = black;
        }
        if let Some(detection) = update.detection_overlay {
            d.detection_overlay = detection;
        }
    }))
}

async fn status(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "busy": state.gate.is_busy(),
        "interval_seconds": state.period.current().as_secs_f64(),
        "entries": state.log.len(),
        "caption_enabled": state.caption.is_some(),
        "usage": state.chat.stats(),
    }))
}
