use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Terminal and in-flight states of an execution. Serialized in snake_case;
/// the string forms are the storage and API contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Running,
    Completed,
    Failed,
    ParseFailed,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Running => "running",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Failed => "failed",
            ExecutionStatus::ParseFailed => "parse_failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "running" => Some(ExecutionStatus::Running),
            "completed" => Some(ExecutionStatus::Completed),
            "failed" => Some(ExecutionStatus::Failed),
            "parse_failed" => Some(ExecutionStatus::ParseFailed),
            _ => None,
        }
    }

    /// A status from which no further transition occurs.
    pub fn is_terminal(&self) -> bool {
        *self != ExecutionStatus::Running
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// States of a deferred job. `Completed` means "triggered", independent of how
/// the triggered execution itself ends. `Failed` exists in the wire contract
/// but no code path currently sets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    Pending,
    Completed,
    Failed,
}

impl ScheduleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleStatus::Pending => "pending",
            ScheduleStatus::Completed => "completed",
            ScheduleStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(ScheduleStatus::Pending),
            "completed" => Some(ScheduleStatus::Completed),
            "failed" => Some(ScheduleStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A managed workspace an AI CLI runs against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub description: String,
    /// Whitespace-tokenized command template; the first token is the
    /// executable, the rest leading arguments. The built prompt is appended
    /// as the final argument.
    pub ai_cli_command: String,
    /// Absolute path used as the working directory of spawned processes.
    pub directory_path: String,
}

/// One recorded attempt to run a command against a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub id: i64,
    pub project_id: i64,
    pub command: String,
    pub status: ExecutionStatus,
    pub start_time: DateTime<Utc>,
    /// Unset while the execution is still running.
    pub end_time: Option<DateTime<Utc>>,
    pub summary: String,
    /// Full captured process output.
    pub details: String,
    pub modified_files: Vec<String>,
    pub created_files: Vec<String>,
    pub deleted_files: Vec<String>,
    pub error_message: String,
}

/// A durable request to trigger an execution at a future instant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub id: i64,
    pub project_id: i64,
    pub command: String,
    pub scheduled_time: DateTime<Utc>,
    pub status: ScheduleStatus,
}
