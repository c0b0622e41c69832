use anyhow::Result;
use rusqlite::{Row, params};

use super::Storage;
use crate::core::models::Project;

fn row_to_project(row: &Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        ai_cli_command: row.get(3)?,
        directory_path: row.get(4)?,
    })
}

const PROJECT_COLUMNS: &str = "id, name, description, ai_cli_command, directory_path";

impl Storage {
    pub async fn insert_project(
        &self,
        name: &str,
        description: &str,
        ai_cli_command: &str,
        directory_path: &str,
    ) -> Result<Project> {
        let db = self.lock().await;
        db.execute(
            "INSERT INTO projects (name, description, ai_cli_command, directory_path)
             VALUES (?1, ?2, ?3, ?4)",
            params![name, description, ai_cli_command, directory_path],
        )?;
        Ok(Project {
            id: db.last_insert_rowid(),
            name: name.to_string(),
            description: description.to_string(),
            ai_cli_command: ai_cli_command.to_string(),
            directory_path: directory_path.to_string(),
        })
    }

    /// All projects, most recently created first.
    pub async fn projects(&self) -> Result<Vec<Project>> {
        let db = self.lock().await;
        let mut stmt = db.prepare(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects ORDER BY id DESC"
        ))?;
        let rows = stmt.query_map([], row_to_project)?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    /// One page of projects plus the total count (Telegram listing).
    pub async fn projects_page(&self, offset: i64, limit: i64) -> Result<(Vec<Project>, i64)> {
        let db = self.lock().await;
        let total: i64 = db.query_row("SELECT COUNT(*) FROM projects", [], |row| row.get(0))?;
        let mut stmt = db.prepare(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects ORDER BY id DESC LIMIT ?1 OFFSET ?2"
        ))?;
        let rows = stmt.query_map(params![limit, offset], row_to_project)?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok((results, total))
    }

    pub async fn project(&self, id: i64) -> Result<Option<Project>> {
        let db = self.lock().await;
        let mut stmt = db.prepare(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE id = ?1"
        ))?;
        let mut rows = stmt.query_map(params![id], row_to_project)?;
        rows.next().transpose().map_err(Into::into)
    }

    pub async fn project_by_name(&self, name: &str) -> Result<Option<Project>> {
        let db = self.lock().await;
        let mut stmt = db.prepare(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE name = ?1"
        ))?;
        let mut rows = stmt.query_map(params![name], row_to_project)?;
        rows.next().transpose().map_err(Into::into)
    }

    pub async fn update_project(&self, project: &Project) -> Result<()> {
        let db = self.lock().await;
        db.execute(
            "UPDATE projects SET name = ?1, description = ?2, ai_cli_command = ?3,
             directory_path = ?4 WHERE id = ?5",
            params![
                project.name,
                project.description,
                project.ai_cli_command,
                project.directory_path,
                project.id
            ],
        )?;
        Ok(())
    }

    pub async fn delete_project(&self, id: i64) -> Result<bool> {
        let db = self.lock().await;
        let rows_deleted = db.execute("DELETE FROM projects WHERE id = ?1", params![id])?;
        Ok(rows_deleted > 0)
    }
}
