use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Row, params};

use super::{Storage, invalid_status, timestamp_from_sql};
use crate::core::models::{Schedule, ScheduleStatus};

const SCHEDULE_COLUMNS: &str = "id, project_id, command, scheduled_time, status";

fn row_to_schedule(row: &Row<'_>) -> rusqlite::Result<Schedule> {
    let status: String = row.get(4)?;
    let status = ScheduleStatus::parse(&status).ok_or_else(|| invalid_status(4, status))?;
    Ok(Schedule {
        id: row.get(0)?,
        project_id: row.get(1)?,
        command: row.get(2)?,
        scheduled_time: timestamp_from_sql(3, row.get(3)?)?,
        status,
    })
}

impl Storage {
    pub async fn insert_schedule(
        &self,
        project_id: i64,
        command: &str,
        scheduled_time: DateTime<Utc>,
    ) -> Result<Schedule> {
        let db = self.lock().await;
        db.execute(
            "INSERT INTO schedules (project_id, command, scheduled_time, status)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                project_id,
                command,
                scheduled_time.to_rfc3339(),
                ScheduleStatus::Pending.as_str()
            ],
        )?;
        Ok(Schedule {
            id: db.last_insert_rowid(),
            project_id,
            command: command.to_string(),
            scheduled_time,
            status: ScheduleStatus::Pending,
        })
    }

    pub async fn schedule(&self, id: i64) -> Result<Option<Schedule>> {
        let db = self.lock().await;
        let mut stmt = db.prepare(&format!(
            "SELECT {SCHEDULE_COLUMNS} FROM schedules WHERE id = ?1"
        ))?;
        let mut rows = stmt.query_map(params![id], row_to_schedule)?;
        rows.next().transpose().map_err(Into::into)
    }

    /// Schedules for one project, latest scheduled time first.
    pub async fn schedules_for_project(&self, project_id: i64) -> Result<Vec<Schedule>> {
        let db = self.lock().await;
        let mut stmt = db.prepare(&format!(
            "SELECT {SCHEDULE_COLUMNS} FROM schedules
             WHERE project_id = ?1 ORDER BY scheduled_time DESC"
        ))?;
        let rows = stmt.query_map(params![project_id], row_to_schedule)?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    /// Every Pending schedule, soonest first. This is the startup recovery set.
    pub async fn pending_schedules(&self) -> Result<Vec<Schedule>> {
        let db = self.lock().await;
        let mut stmt = db.prepare(&format!(
            "SELECT {SCHEDULE_COLUMNS} FROM schedules
             WHERE status = ?1 ORDER BY scheduled_time ASC"
        ))?;
        let rows = stmt.query_map(params![ScheduleStatus::Pending.as_str()], row_to_schedule)?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    /// Pending schedules joined with their owning project's name, soonest first.
    pub async fn pending_schedules_with_project(&self) -> Result<Vec<(Schedule, String)>> {
        let db = self.lock().await;
        let mut stmt = db.prepare(
            "SELECT s.id, s.project_id, s.command, s.scheduled_time, s.status, p.name
             FROM schedules s JOIN projects p ON p.id = s.project_id
             WHERE s.status = ?1 ORDER BY s.scheduled_time ASC",
        )?;
        let rows = stmt.query_map(params![ScheduleStatus::Pending.as_str()], |row| {
            Ok((row_to_schedule(row)?, row.get::<_, String>(5)?))
        })?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    pub async fn has_pending_schedule(&self, project_id: i64) -> Result<bool> {
        let db = self.lock().await;
        let count: i64 = db.query_row(
            "SELECT COUNT(*) FROM schedules WHERE project_id = ?1 AND status = ?2",
            params![project_id, ScheduleStatus::Pending.as_str()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub async fn update_schedule_status(&self, id: i64, status: ScheduleStatus) -> Result<()> {
        let db = self.lock().await;
        db.execute(
            "UPDATE schedules SET status = ?1 WHERE id = ?2",
            params![status.as_str(), id],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_storage;
    use crate::core::models::ScheduleStatus;
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn schedule_insert_starts_pending() {
        let storage = test_storage().await;
        let when = Utc::now() + Duration::minutes(5);
        let schedule = storage.insert_schedule(1, "nightly sweep", when).await.unwrap();
        assert_eq!(schedule.status, ScheduleStatus::Pending);

        let fetched = storage.schedule(schedule.id).await.unwrap().unwrap();
        assert_eq!(fetched.command, "nightly sweep");
        assert_eq!(fetched.scheduled_time.timestamp(), when.timestamp());
    }

    #[tokio::test]
    async fn pending_schedules_filters_and_orders() {
        let storage = test_storage().await;
        let now = Utc::now();
        let later = storage
            .insert_schedule(1, "later", now + Duration::hours(2))
            .await
            .unwrap();
        let sooner = storage
            .insert_schedule(2, "sooner", now + Duration::hours(1))
            .await
            .unwrap();
        let fired = storage
            .insert_schedule(1, "fired", now + Duration::hours(3))
            .await
            .unwrap();
        storage
            .update_schedule_status(fired.id, ScheduleStatus::Completed)
            .await
            .unwrap();

        let pending = storage.pending_schedules().await.unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].id, sooner.id);
        assert_eq!(pending[1].id, later.id);
    }

    #[tokio::test]
    async fn has_pending_schedule_tracks_status() {
        let storage = test_storage().await;
        let when = Utc::now() + Duration::minutes(1);
        assert!(!storage.has_pending_schedule(4).await.unwrap());

        let schedule = storage.insert_schedule(4, "job", when).await.unwrap();
        assert!(storage.has_pending_schedule(4).await.unwrap());

        storage
            .update_schedule_status(schedule.id, ScheduleStatus::Completed)
            .await
            .unwrap();
        assert!(!storage.has_pending_schedule(4).await.unwrap());
    }

    #[tokio::test]
    async fn pending_with_project_joins_name() {
        let storage = test_storage().await;
        let project = storage
            .insert_project("joined", "", "echo", "/tmp")
            .await
            .unwrap();
        storage
            .insert_schedule(project.id, "job", Utc::now() + Duration::minutes(1))
            .await
            .unwrap();

        let rows = storage.pending_schedules_with_project().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].1, "joined");
    }
}
