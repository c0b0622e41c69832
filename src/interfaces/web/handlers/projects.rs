use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use regex::Regex;
use serde_json::json;
use std::sync::OnceLock;

use super::super::AppState;

/// Project names are used in shell-adjacent contexts (Telegram commands,
/// prompts), so keep them to a conservative charset.
fn valid_project_name(name: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new("^[a-zA-Z0-9_]+$").expect("valid name pattern"))
        .is_match(name)
}

/// Resolve a workspace path to its absolute form, requiring it to exist and
/// be a directory.
async fn validate_directory(path: &str) -> Result<String, &'static str> {
    let canonical = tokio::fs::canonicalize(path)
        .await
        .map_err(|_| "Directory does not exist")?;
    let metadata = tokio::fs::metadata(&canonical)
        .await
        .map_err(|_| "Directory does not exist")?;
    if !metadata.is_dir() {
        return Err("Path is not a directory");
    }
    Ok(canonical.to_string_lossy().into_owned())
}

#[derive(serde::Deserialize)]
pub struct CreateProjectRequest {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    ai_cli_command: String,
    directory_path: String,
}

pub async fn create_project(
    State(state): State<AppState>,
    Json(payload): Json<CreateProjectRequest>,
) -> impl IntoResponse {
    if !valid_project_name(&payload.name) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "Invalid project name. Only alphanumeric characters and underscores are allowed."
            })),
        );
    }
    let directory = match validate_directory(&payload.directory_path).await {
        Ok(directory) => directory,
        Err(e) => return (StatusCode::BAD_REQUEST, Json(json!({ "error": e }))),
    };

    match state
        .storage
        .insert_project(
            &payload.name,
            &payload.description,
            &payload.ai_cli_command,
            &directory,
        )
        .await
    {
        Ok(project) => (StatusCode::CREATED, Json(json!(project))),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Failed to create project" })),
        ),
    }
}

pub async fn get_projects(State(state): State<AppState>) -> impl IntoResponse {
    match state.storage.projects().await {
        Ok(projects) => (StatusCode::OK, Json(json!(projects))),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Failed to fetch projects" })),
        ),
    }
}

pub async fn get_project(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    match state.storage.project(id).await {
        Ok(Some(project)) => (StatusCode::OK, Json(json!(project))),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Project not found" })),
        ),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Failed to fetch project" })),
        ),
    }
}

#[derive(serde::Deserialize, Default)]
pub struct UpdateProjectRequest {
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    ai_cli_command: String,
    #[serde(default)]
    directory_path: String,
}

/// Partial update: empty fields leave the stored value untouched.
pub async fn update_project(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    Json(payload): Json<UpdateProjectRequest>,
) -> impl IntoResponse {
    let mut project = match state.storage.project(id).await {
        Ok(Some(project)) => project,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "Project not found" })),
            );
        }
        Err(_) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to fetch project" })),
            );
        }
    };

    if !payload.name.is_empty() {
        if !valid_project_name(&payload.name) {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "error": "Invalid project name. Only alphanumeric characters and underscores are allowed."
                })),
            );
        }
        project.name = payload.name;
    }
    if !payload.directory_path.is_empty() {
        match validate_directory(&payload.directory_path).await {
            Ok(directory) => project.directory_path = directory,
            Err(e) => return (StatusCode::BAD_REQUEST, Json(json!({ "error": e }))),
        }
    }
    if !payload.description.is_empty() {
        project.description = payload.description;
    }
    if !payload.ai_cli_command.is_empty() {
        project.ai_cli_command = payload.ai_cli_command;
    }

    match state.storage.update_project(&project).await {
        Ok(()) => (StatusCode::OK, Json(json!(project))),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Failed to update project" })),
        ),
    }
}

pub async fn delete_project(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    match state.storage.delete_project(id).await {
        Ok(_) => (StatusCode::OK, Json(json!({ "message": "Project deleted" }))),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Failed to delete project" })),
        ),
    }
}

pub async fn get_project_executions(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    match state.storage.executions_for_project(id).await {
        Ok(executions) => (StatusCode::OK, Json(json!(executions))),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Failed to fetch executions" })),
        ),
    }
}
