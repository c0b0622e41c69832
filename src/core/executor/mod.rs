//! Execution orchestration: serializes runs per project, spawns the AI CLI,
//! streams its output, and records exactly one terminal result per run.

mod output;
mod prompt;

pub use output::{ParsedOutput, parse_output};
pub use prompt::build_prompt;

use chrono::Utc;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::core::models::{Execution, ExecutionStatus};
use crate::core::realtime::LogBroker;
use crate::core::storage::Storage;

/// Hard wall-clock bound on a spawned process.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// How many prior Completed executions are fed back into the prompt.
const HISTORY_LIMIT: i64 = 5;

/// Invoked exactly once per recorded execution, after its terminal state has
/// been persisted.
pub type CompletionCallback =
    Box<dyn FnOnce(Execution) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send>;

pub struct Executor {
    storage: Arc<Storage>,
    broker: Arc<LogBroker>,
    /// Per-project execution locks, created lazily and never evicted. Bounded
    /// by the number of distinct projects ever executed.
    locks: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
    timeout: Duration,
}

impl Executor {
    pub fn new(storage: Arc<Storage>, broker: Arc<LogBroker>) -> Self {
        Self::with_timeout(storage, broker, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(storage: Arc<Storage>, broker: Arc<LogBroker>, timeout: Duration) -> Self {
        Self {
            storage,
            broker,
            locks: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    /// Trigger an execution. Returns immediately; the run proceeds in a
    /// spawned task and `on_complete` fires after the terminal record is
    /// written. A project that is already running a command yields an
    /// immediate synthetic Failed execution instead of queueing.
    pub fn execute(
        self: &Arc<Self>,
        project_id: i64,
        user_command: String,
        on_complete: Option<CompletionCallback>,
    ) {
        let executor = self.clone();
        tokio::spawn(async move {
            executor.run(project_id, user_command, on_complete).await;
        });
    }

    async fn project_lock(&self, project_id: i64) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(project_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn run(
        &self,
        project_id: i64,
        user_command: String,
        on_complete: Option<CompletionCallback>,
    ) {
        // Non-blocking gate: losers fail fast, callers resubmit if they want
        // serialization.
        let lock = self.project_lock(project_id).await;
        let _guard = match lock.try_lock_owned() {
            Ok(guard) => guard,
            Err(_) => {
                warn!("Project {} is busy, rejecting execution", project_id);
                let now = Utc::now();
                let mut execution = Execution {
                    id: 0,
                    project_id,
                    command: user_command,
                    status: ExecutionStatus::Failed,
                    start_time: now,
                    end_time: Some(now),
                    summary: String::new(),
                    details: String::new(),
                    modified_files: Vec::new(),
                    created_files: Vec::new(),
                    deleted_files: Vec::new(),
                    error_message: "Project is busy (concurrency limit)".to_string(),
                };
                match self.storage.insert_execution(&execution).await {
                    Ok(id) => execution.id = id,
                    Err(e) => error!("Failed to record busy execution: {}", e),
                }
                if let Some(callback) = on_complete {
                    callback(execution).await;
                }
                return;
            }
        };

        let project = match self.storage.project(project_id).await {
            Ok(Some(project)) => project,
            Ok(None) => {
                error!("Project not found: {}", project_id);
                return;
            }
            Err(e) => {
                error!("Failed to load project {}: {}", project_id, e);
                return;
            }
        };

        let mut execution = Execution {
            id: 0,
            project_id,
            command: user_command.clone(),
            status: ExecutionStatus::Running,
            start_time: Utc::now(),
            end_time: None,
            summary: String::new(),
            details: String::new(),
            modified_files: Vec::new(),
            created_files: Vec::new(),
            deleted_files: Vec::new(),
            error_message: String::new(),
        };
        execution.id = match self.storage.insert_execution(&execution).await {
            Ok(id) => id,
            Err(e) => {
                error!("Failed to create execution record: {}", e);
                return;
            }
        };

        let history = self
            .storage
            .recent_completed_executions(project_id, execution.id, HISTORY_LIMIT)
            .await
            .unwrap_or_else(|e| {
                warn!("Failed to load execution history: {}", e);
                Vec::new()
            });

        let prompt = build_prompt(&user_command, &history, &project);

        let mut template = project.ai_cli_command.split_whitespace();
        let Some(exe) = template.next() else {
            execution.status = ExecutionStatus::Failed;
            execution.error_message = "Empty AI CLI command configuration".to_string();
            execution.end_time = Some(Utc::now());
            self.persist_and_complete(execution, on_complete).await;
            return;
        };
        let leading_args: Vec<&str> = template.collect();

        let mut command = Command::new(exe);
        command
            .args(&leading_args)
            .arg(&prompt)
            .current_dir(&project.directory_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        info!(
            "Starting execution {} for project {} ({})",
            execution.id, project_id, exe
        );
        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                self.fail_execution(
                    execution,
                    format!("Failed to start command: {}", e),
                    String::new(),
                    on_complete,
                )
                .await;
                return;
            }
        };

        // Two independent line readers share one accumulator; both must drain
        // before the result is classified.
        let output_buffer = Arc::new(Mutex::new(String::new()));
        let mut readers = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            readers.push(tokio::spawn(read_and_broadcast(
                stdout,
                execution.id,
                self.broker.clone(),
                output_buffer.clone(),
            )));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(tokio::spawn(read_and_broadcast(
                stderr,
                execution.id,
                self.broker.clone(),
                output_buffer.clone(),
            )));
        }

        let wait_outcome = tokio::time::timeout(self.timeout, child.wait()).await;
        if wait_outcome.is_err() {
            // Deadline hit: kill the process so the readers see EOF.
            if let Err(e) = child.kill().await {
                warn!("Failed to kill timed-out process: {}", e);
            }
        }
        for reader in readers {
            let _ = reader.await;
        }
        self.broker.close_execution(execution.id).await;

        let full_output = output_buffer.lock().await.clone();
        execution.details = full_output.clone();

        let exit_status = match wait_outcome {
            Err(_) => {
                self.fail_execution(
                    execution,
                    "Execution timed out".to_string(),
                    full_output,
                    on_complete,
                )
                .await;
                return;
            }
            Ok(Err(e)) => {
                self.fail_execution(
                    execution,
                    format!("Failed to run command: {}", e),
                    full_output,
                    on_complete,
                )
                .await;
                return;
            }
            Ok(Ok(exit_status)) => exit_status,
        };
        if !exit_status.success() {
            self.fail_execution(
                execution,
                format!("Command exited with {}", exit_status),
                full_output,
                on_complete,
            )
            .await;
            return;
        }

        debug!(
            "Execution {} produced {} bytes of output",
            execution.id,
            execution.details.len()
        );
        match parse_output(&execution.details) {
            Ok(parsed) => {
                execution.status = ExecutionStatus::Completed;
                execution.summary = parsed.summary;
                execution.modified_files = parsed.modified_files;
                execution.created_files = parsed.created_files;
                execution.deleted_files = parsed.deleted_files;
            }
            Err(e) => {
                // The process itself succeeded; only interpretation failed.
                execution.status = ExecutionStatus::ParseFailed;
                execution.error_message = format!("Output parsing failed: {}", e);
            }
        }
        execution.end_time = Some(Utc::now());
        self.persist_and_complete(execution, on_complete).await;
    }

    /// Terminal write for failure paths that reach the broker: records the
    /// failure, tells any live subscribers, and closes their streams.
    async fn fail_execution(
        &self,
        mut execution: Execution,
        error_message: String,
        details: String,
        on_complete: Option<CompletionCallback>,
    ) {
        execution.status = ExecutionStatus::Failed;
        execution.error_message = error_message;
        if !details.is_empty() {
            execution.details = details;
        }
        execution.end_time = Some(Utc::now());

        if let Err(e) = self.storage.update_execution(&execution).await {
            error!("Failed to persist execution {}: {}", execution.id, e);
        }
        error!(
            "Execution {} failed: {}",
            execution.id, execution.error_message
        );

        self.broker
            .publish(execution.id, &format!("Error: {}", execution.error_message))
            .await;
        self.broker.close_execution(execution.id).await;

        if let Some(callback) = on_complete {
            callback(execution).await;
        }
    }

    async fn persist_and_complete(
        &self,
        execution: Execution,
        on_complete: Option<CompletionCallback>,
    ) {
        if let Err(e) = self.storage.update_execution(&execution).await {
            error!("Failed to persist execution {}: {}", execution.id, e);
        }
        info!(
            "Execution {} finished with status {}",
            execution.id, execution.status
        );
        if let Some(callback) = on_complete {
            callback(execution).await;
        }
    }
}

async fn read_and_broadcast<R>(
    reader: R,
    execution_id: i64,
    broker: Arc<LogBroker>,
    buffer: Arc<Mutex<String>>,
) where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                broker.publish(execution_id, &line).await;
                let mut buffer = buffer.lock().await;
                buffer.push_str(&line);
                buffer.push('\n');
            }
            Ok(None) => break,
            Err(e) => {
                debug!("Output stream for execution {} ended: {}", execution_id, e);
                break;
            }
        }
    }
}
