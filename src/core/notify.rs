use async_trait::async_trait;

use crate::core::models::{Execution, ExecutionStatus};

/// Outbound notification sink. Fire-and-forget: implementations swallow
/// delivery failures.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &str);
}

/// Human-readable result line for completion notifications.
pub fn execution_report(project_name: &str, execution: &Execution) -> String {
    let mut message = format!(
        "Project: {}\nStatus: {}\nSummary: {}",
        project_name, execution.status, execution.summary
    );
    if execution.status == ExecutionStatus::Failed || execution.status == ExecutionStatus::ParseFailed
    {
        message.push_str(&format!("\nError: {}", execution.error_message));
    }
    message
}

#[cfg(test)]
pub(crate) mod testing {
    use super::Notifier;
    use async_trait::async_trait;
    use tokio::sync::Mutex;

    /// Records every message; lets tests assert on notification traffic.
    pub(crate) struct RecordingNotifier {
        pub messages: Mutex<Vec<String>>,
    }

    impl RecordingNotifier {
        pub fn new() -> Self {
            Self {
                messages: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, message: &str) {
            self.messages.lock().await.push(message.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn execution(status: ExecutionStatus) -> Execution {
        Execution {
            id: 1,
            project_id: 1,
            command: "cmd".to_string(),
            status,
            start_time: Utc::now(),
            end_time: Some(Utc::now()),
            summary: "tidy summary".to_string(),
            details: String::new(),
            modified_files: Vec::new(),
            created_files: Vec::new(),
            deleted_files: Vec::new(),
            error_message: "it broke".to_string(),
        }
    }

    #[test]
    fn report_includes_error_only_on_failures() {
        let ok = execution_report("demo", &execution(ExecutionStatus::Completed));
        assert!(ok.contains("Status: completed"));
        assert!(ok.contains("tidy summary"));
        assert!(!ok.contains("Error:"));

        let failed = execution_report("demo", &execution(ExecutionStatus::Failed));
        assert!(failed.contains("Error: it broke"));

        let parse_failed = execution_report("demo", &execution(ExecutionStatus::ParseFailed));
        assert!(parse_failed.contains("Error: it broke"));
    }
}
