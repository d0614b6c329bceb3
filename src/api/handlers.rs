//! HTTP request handlers

use super::sse::sse_stream;
use super::types::{
    AssessmentListResponse, AssessmentResponse, ErrorResponse, InputRequest, QueuedResponse,
    SessionResponse, SuccessResponse,
};
use super::AppState;
use crate::runtime::SessionHandle;
use crate::state_machine::Event;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Session lifecycle
        .route("/api/sessions/new", post(create_session))
        .route("/api/sessions/:id", get(get_session))
        // SSE streaming
        .route("/api/sessions/:id/stream", get(stream_session))
        // User actions
        .route("/api/sessions/:id/input", post(submit_input))
        .route("/api/sessions/:id/quick-reply", post(select_quick_reply))
        .route("/api/sessions/:id/reset", post(reset_session))
        // Assessment history
        .route("/api/assessments", get(list_assessments))
        .route("/api/assessments/:id", get(get_assessment))
        .route("/api/assessments/:id/delete", post(delete_assessment))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Sessions
// ============================================================

async fn create_session(State(state): State<AppState>) -> Json<SessionResponse> {
    let handle = state.sessions.create_session().await;
    let session = handle.snapshot();
    tracing::info!(session_id = %session.session_id, "Created session");
    Json(SessionResponse { session })
}

async fn find_session(state: &AppState, id: &str) -> Result<SessionHandle, AppError> {
    state
        .sessions
        .get(id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Session not found: {id}")))
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, AppError> {
    let handle = find_session(&state, &id).await?;
    Ok(Json(SessionResponse {
        session: handle.snapshot(),
    }))
}

async fn stream_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let handle = find_session(&state, &id).await?;

    let (snapshot, broadcast_rx) = handle.subscribe();
    Ok(sse_stream(snapshot, broadcast_rx))
}

async fn submit_input(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<InputRequest>, JsonRejection>,
) -> Result<Json<QueuedResponse>, AppError> {
    let Json(req) = body?;
    queue_input(&state, &id, Event::user_input(req.text)).await
}

async fn select_quick_reply(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<InputRequest>, JsonRejection>,
) -> Result<Json<QueuedResponse>, AppError> {
    let Json(req) = body?;
    queue_input(&state, &id, Event::quick_reply(req.text)).await
}

/// Queue user text unless earlier input is still being answered
async fn queue_input(
    state: &AppState,
    id: &str,
    event: Event,
) -> Result<Json<QueuedResponse>, AppError> {
    let handle = find_session(state, id).await?;

    if !handle.try_claim_input() {
        return Err(AppError::Conflict(
            "Please wait for the current reply to finish".to_string(),
        ));
    }

    if let Err(e) = handle.event_tx.send(event).await {
        handle.release_input();
        return Err(AppError::Internal(format!("Failed to send event: {e}")));
    }

    Ok(Json(QueuedResponse { queued: true }))
}

async fn reset_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<QueuedResponse>, AppError> {
    find_session(&state, &id).await?;

    state
        .sessions
        .send_event(&id, Event::Reset)
        .await
        .map_err(AppError::Internal)?;

    Ok(Json(QueuedResponse { queued: true }))
}

// ============================================================
// Assessment History
// ============================================================

async fn list_assessments(
    State(state): State<AppState>,
) -> Result<Json<AssessmentListResponse>, AppError> {
    let assessments = state
        .sessions
        .store()
        .list()
        .await
        .map_err(AppError::Internal)?;

    Ok(Json(AssessmentListResponse { assessments }))
}

async fn get_assessment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<AssessmentResponse>, AppError> {
    let assessment = state
        .sessions
        .store()
        .get(&id)
        .await
        .map_err(AppError::Internal)?
        .ok_or_else(|| AppError::NotFound(format!("Assessment not found: {id}")))?;

    Ok(Json(AssessmentResponse { assessment }))
}

async fn delete_assessment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    let deleted = state
        .sessions
        .store()
        .delete(&id)
        .await
        .map_err(AppError::Internal)?;

    if !deleted {
        return Err(AppError::NotFound(format!("Assessment not found: {id}")));
    }

    tracing::info!(assessment_id = %id, "Deleted assessment");
    Ok(Json(SuccessResponse { success: true }))
}

async fn get_version() -> &'static str {
    concat!("healthcheck-ai ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
