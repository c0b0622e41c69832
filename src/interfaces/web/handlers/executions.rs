use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;

use super::super::AppState;
use crate::core::executor::CompletionCallback;
use crate::core::notify::execution_report;

#[derive(serde::Deserialize)]
pub struct RunCommandRequest {
    command: String,
}

/// Fire-and-forget trigger. The 202 acknowledges the hand-off only; the
/// outcome lands in the execution record and the notification channel.
pub async fn run_project_command(
    Path(project_id): Path<i64>,
    State(state): State<AppState>,
    Json(payload): Json<RunCommandRequest>,
) -> impl IntoResponse {
    if payload.command.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "command is required" })),
        );
    }

    let storage = state.storage.clone();
    let notifier = state.notifier.clone();
    let callback: CompletionCallback = Box::new(move |execution| {
        Box::pin(async move {
            if let Ok(Some(project)) = storage.project(execution.project_id).await {
                notifier
                    .notify(&execution_report(&project.name, &execution))
                    .await;
            }
        })
    });
    state
        .executor
        .execute(project_id, payload.command, Some(callback));

    (
        StatusCode::ACCEPTED,
        Json(json!({ "message": "Command execution started" })),
    )
}

pub async fn get_execution(
    Path(execution_id): Path<i64>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    match state.storage.execution(execution_id).await {
        Ok(Some(execution)) => (StatusCode::OK, Json(json!(execution))),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Execution not found" })),
        ),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Failed to fetch execution" })),
        ),
    }
}
