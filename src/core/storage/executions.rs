use anyhow::Result;
use rusqlite::{Row, params};

use super::{Storage, file_list_from_sql, invalid_status, timestamp_from_sql};
use crate::core::models::{Execution, ExecutionStatus};

const EXECUTION_COLUMNS: &str = "id, project_id, command, status, start_time, end_time, \
     summary, details, modified_files, created_files, deleted_files, error_message";

fn row_to_execution(row: &Row<'_>) -> rusqlite::Result<Execution> {
    let status: String = row.get(3)?;
    let status = ExecutionStatus::parse(&status).ok_or_else(|| invalid_status(3, status))?;
    let end_time = row
        .get::<_, Option<String>>(5)?
        .map(|t| timestamp_from_sql(5, t))
        .transpose()?;
    Ok(Execution {
        id: row.get(0)?,
        project_id: row.get(1)?,
        command: row.get(2)?,
        status,
        start_time: timestamp_from_sql(4, row.get(4)?)?,
        end_time,
        summary: row.get(6)?,
        details: row.get(7)?,
        modified_files: file_list_from_sql(8, row.get(8)?)?,
        created_files: file_list_from_sql(9, row.get(9)?)?,
        deleted_files: file_list_from_sql(10, row.get(10)?)?,
        error_message: row.get(11)?,
    })
}

impl Storage {
    /// Insert a new execution row and return its assigned id.
    pub async fn insert_execution(&self, execution: &Execution) -> Result<i64> {
        let db = self.lock().await;
        db.execute(
            "INSERT INTO executions (project_id, command, status, start_time, end_time,
             summary, details, modified_files, created_files, deleted_files, error_message)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                execution.project_id,
                execution.command,
                execution.status.as_str(),
                execution.start_time.to_rfc3339(),
                execution.end_time.map(|t| t.to_rfc3339()),
                execution.summary,
                execution.details,
                serde_json::to_string(&execution.modified_files)?,
                serde_json::to_string(&execution.created_files)?,
                serde_json::to_string(&execution.deleted_files)?,
                execution.error_message,
            ],
        )?;
        Ok(db.last_insert_rowid())
    }

    /// Overwrite an execution row in place. The orchestrator calls this exactly
    /// once per execution, for the terminal write.
    pub async fn update_execution(&self, execution: &Execution) -> Result<()> {
        let db = self.lock().await;
        db.execute(
            "UPDATE executions SET status = ?1, end_time = ?2, summary = ?3, details = ?4,
             modified_files = ?5, created_files = ?6, deleted_files = ?7, error_message = ?8
             WHERE id = ?9",
            params![
                execution.status.as_str(),
                execution.end_time.map(|t| t.to_rfc3339()),
                execution.summary,
                execution.details,
                serde_json::to_string(&execution.modified_files)?,
                serde_json::to_string(&execution.created_files)?,
                serde_json::to_string(&execution.deleted_files)?,
                execution.error_message,
                execution.id,
            ],
        )?;
        Ok(())
    }

    pub async fn execution(&self, id: i64) -> Result<Option<Execution>> {
        let db = self.lock().await;
        let mut stmt = db.prepare(&format!(
            "SELECT {EXECUTION_COLUMNS} FROM executions WHERE id = ?1"
        ))?;
        let mut rows = stmt.query_map(params![id], row_to_execution)?;
        rows.next().transpose().map_err(Into::into)
    }

    /// All executions for a project, most recent start first.
    pub async fn executions_for_project(&self, project_id: i64) -> Result<Vec<Execution>> {
        let db = self.lock().await;
        let mut stmt = db.prepare(&format!(
            "SELECT {EXECUTION_COLUMNS} FROM executions
             WHERE project_id = ?1 ORDER BY start_time DESC"
        ))?;
        let rows = stmt.query_map(params![project_id], row_to_execution)?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    /// Up to `limit` most recent Completed executions for a project, excluding
    /// the given execution id. Most recent first; used as prompt context.
    pub async fn recent_completed_executions(
        &self,
        project_id: i64,
        exclude_id: i64,
        limit: i64,
    ) -> Result<Vec<Execution>> {
        let db = self.lock().await;
        let mut stmt = db.prepare(&format!(
            "SELECT {EXECUTION_COLUMNS} FROM executions
             WHERE project_id = ?1 AND id != ?2 AND status = ?3
             ORDER BY id DESC LIMIT ?4"
        ))?;
        let rows = stmt.query_map(
            params![
                project_id,
                exclude_id,
                ExecutionStatus::Completed.as_str(),
                limit
            ],
            row_to_execution,
        )?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    /// Latest execution for a project regardless of status (Telegram /status).
    pub async fn last_execution(&self, project_id: i64) -> Result<Option<Execution>> {
        let db = self.lock().await;
        let mut stmt = db.prepare(&format!(
            "SELECT {EXECUTION_COLUMNS} FROM executions
             WHERE project_id = ?1 ORDER BY id DESC LIMIT 1"
        ))?;
        let mut rows = stmt.query_map(params![project_id], row_to_execution)?;
        rows.next().transpose().map_err(Into::into)
    }
}
