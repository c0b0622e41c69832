use axum::{
    Json, Router,
    http::Method,
    routing::{get, post, put},
};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};

use super::AppState;
use super::handlers::{executions, projects, schedules, settings, stream};

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
}

pub fn build_api_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/projects",
            post(projects::create_project).get(projects::get_projects),
        )
        .route(
            "/api/projects/{id}",
            get(projects::get_project)
                .put(projects::update_project)
                .delete(projects::delete_project),
        )
        .route(
            "/api/projects/{id}/run",
            post(executions::run_project_command),
        )
        .route(
            "/api/projects/{id}/executions",
            get(projects::get_project_executions),
        )
        .route(
            "/api/projects/{id}/schedules",
            post(schedules::create_schedule).get(schedules::get_schedules),
        )
        .route(
            "/api/executions/{execution_id}",
            get(executions::get_execution),
        )
        .route(
            "/api/executions/{execution_id}/stream",
            get(stream::stream_execution_logs),
        )
        .route("/api/schedules", get(schedules::get_all_schedules))
        .route("/api/settings", get(settings::get_settings))
        .route("/api/settings/{key}", put(settings::update_setting))
        .route(
            "/ping",
            get(|| async { Json(json!({ "message": "pong" })) }),
        )
        .layer(build_cors())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::core::executor::Executor;
    use crate::core::notify::testing::RecordingNotifier;
    use crate::core::realtime::LogBroker;
    use crate::core::scheduler::Scheduler;
    use crate::core::storage::test_storage;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use std::sync::Arc;
    use tower::util::ServiceExt;

    async fn test_state() -> AppState {
        let storage = Arc::new(test_storage().await);
        let broker = Arc::new(LogBroker::new());
        let executor = Arc::new(Executor::new(storage.clone(), broker.clone()));
        let notifier = Arc::new(RecordingNotifier::new());
        let scheduler = Arc::new(
            Scheduler::new(storage.clone(), executor.clone(), notifier.clone())
                .await
                .unwrap(),
        );
        let config = Arc::new(Config {
            port: 0,
            database_url: String::new(),
            telegram_bot_token: "0123456789abcdef".to_string(),
            telegram_whitelist: "42".to_string(),
            debug: false,
        });

        AppState {
            storage,
            executor,
            broker,
            scheduler,
            notifier,
            config,
        }
    }

    async fn request(
        state: AppState,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let app = build_api_router(state);
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    #[tokio::test]
    async fn ping_pongs() {
        let state = test_state().await;
        let (status, json) = request(state, Method::GET, "/ping", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["message"], "pong");
    }

    #[tokio::test]
    async fn create_project_rejects_invalid_name() {
        let state = test_state().await;
        let (status, json) = request(
            state,
            Method::POST,
            "/api/projects",
            Some(json!({ "name": "bad name!", "directory_path": "/tmp" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("Invalid project name"));
    }

    #[tokio::test]
    async fn create_project_rejects_missing_directory() {
        let state = test_state().await;
        let (status, json) = request(
            state,
            Method::POST,
            "/api/projects",
            Some(json!({ "name": "ok", "directory_path": "/definitely/not/here" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Directory does not exist");
    }

    #[tokio::test]
    async fn project_crud_flow() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state().await;

        let (status, created) = request(
            state.clone(),
            Method::POST,
            "/api/projects",
            Some(json!({
                "name": "crud_flow",
                "description": "round trip",
                "ai_cli_command": "echo",
                "directory_path": dir.path().to_string_lossy()
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = created["id"].as_i64().unwrap();
        assert!(id > 0);

        let (status, listed) = request(state.clone(), Method::GET, "/api/projects", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed.as_array().unwrap().len(), 1);

        let uri = format!("/api/projects/{}", id);
        let (status, fetched) = request(state.clone(), Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["name"], "crud_flow");

        let (status, updated) = request(
            state.clone(),
            Method::PUT,
            &uri,
            Some(json!({ "description": "renovated" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["description"], "renovated");
        assert_eq!(updated["name"], "crud_flow");

        let (status, _) = request(state.clone(), Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = request(state, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn run_command_is_accepted_and_requires_command() {
        let state = test_state().await;
        let (status, json) = request(
            state.clone(),
            Method::POST,
            "/api/projects/1/run",
            Some(json!({ "command": "do it" })),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(json["message"], "Command execution started");

        let (status, _) = request(
            state,
            Method::POST,
            "/api/projects/1/run",
            Some(json!({ "command": "  " })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn schedule_in_the_past_is_rejected() {
        let state = test_state().await;
        let (status, json) = request(
            state,
            Method::POST,
            "/api/projects/1/schedules",
            Some(json!({
                "command": "too late",
                "scheduled_time": "2001-01-01T00:00:00Z"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Scheduled time must be in the future");
    }

    #[tokio::test]
    async fn second_pending_schedule_conflicts() {
        let state = test_state().await;
        let when = (chrono::Utc::now() + chrono::Duration::hours(1)).to_rfc3339();

        let (status, created) = request(
            state.clone(),
            Method::POST,
            "/api/projects/1/schedules",
            Some(json!({ "command": "first", "scheduled_time": when })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["status"], "pending");

        let (status, json) = request(
            state.clone(),
            Method::POST,
            "/api/projects/1/schedules",
            Some(json!({ "command": "second", "scheduled_time": when })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(json["error"].as_str().unwrap().contains("pending schedule"));

        // A different project is unaffected by the conflict rule.
        let (status, _) = request(
            state,
            Method::POST,
            "/api/projects/2/schedules",
            Some(json!({ "command": "other", "scheduled_time": when })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn pending_schedules_list_carries_project_name() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state().await;
        let (_, project) = request(
            state.clone(),
            Method::POST,
            "/api/projects",
            Some(json!({
                "name": "lister",
                "directory_path": dir.path().to_string_lossy()
            })),
        )
        .await;
        let when = (chrono::Utc::now() + chrono::Duration::hours(1)).to_rfc3339();
        let uri = format!("/api/projects/{}/schedules", project["id"].as_i64().unwrap());
        request(
            state.clone(),
            Method::POST,
            &uri,
            Some(json!({ "command": "later", "scheduled_time": when })),
        )
        .await;

        let (status, json) = request(state, Method::GET, "/api/schedules", None).await;
        assert_eq!(status, StatusCode::OK);
        let rows = json.as_array().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["project_name"], "lister");
    }

    #[tokio::test]
    async fn settings_are_read_only_and_masked() {
        let state = test_state().await;
        let (status, json) = request(state.clone(), Method::GET, "/api/settings", None).await;
        assert_eq!(status, StatusCode::OK);
        let rows = json.as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["value"], "0123...cdef");

        let (status, json) = request(
            state,
            Method::PUT,
            "/api/settings/TELEGRAM_BOT_TOKEN",
            Some(json!({ "value": "nope" })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(json["error"].as_str().unwrap().contains("read-only"));
    }

    #[tokio::test]
    async fn unknown_execution_is_not_found() {
        let state = test_state().await;
        let (status, json) = request(state, Method::GET, "/api/executions/9999", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "Execution not found");
    }
}
