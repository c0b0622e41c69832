use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde_json::json;

use super::super::AppState;

#[derive(serde::Deserialize)]
pub struct CreateScheduleRequest {
    command: String,
    scheduled_time: DateTime<Utc>,
}

pub async fn create_schedule(
    Path(project_id): Path<i64>,
    State(state): State<AppState>,
    Json(payload): Json<CreateScheduleRequest>,
) -> impl IntoResponse {
    if payload.scheduled_time <= Utc::now() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Scheduled time must be in the future" })),
        );
    }

    // One pending schedule per project at a time.
    match state.storage.has_pending_schedule(project_id).await {
        Ok(true) => {
            return (
                StatusCode::CONFLICT,
                Json(json!({ "error": "Project already has a pending schedule" })),
            );
        }
        Ok(false) => {}
        Err(_) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to create schedule" })),
            );
        }
    }

    match state
        .storage
        .insert_schedule(project_id, &payload.command, payload.scheduled_time)
        .await
    {
        Ok(schedule) => {
            state.scheduler.schedule_job(schedule.clone()).await;
            (StatusCode::CREATED, Json(json!(schedule)))
        }
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Failed to create schedule" })),
        ),
    }
}

pub async fn get_schedules(
    Path(project_id): Path<i64>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    match state.storage.schedules_for_project(project_id).await {
        Ok(schedules) => (StatusCode::OK, Json(json!(schedules))),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Failed to fetch schedules" })),
        ),
    }
}

/// Every Pending schedule across all projects, soonest first, annotated with
/// the owning project's name.
pub async fn get_all_schedules(State(state): State<AppState>) -> impl IntoResponse {
    match state.storage.pending_schedules_with_project().await {
        Ok(rows) => {
            let schedules: Vec<serde_json::Value> = rows
                .into_iter()
                .map(|(schedule, project_name)| {
                    let mut value = json!(schedule);
                    value["project_name"] = json!(project_name);
                    value
                })
                .collect();
            (StatusCode::OK, Json(json!(schedules)))
        }
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Failed to fetch schedules" })),
        ),
    }
}
