//! Durable one-shot job scheduling. Timers live in memory only; every Pending
//! schedule is re-armed from storage once at startup.

use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};

use crate::core::executor::{CompletionCallback, Executor};
use crate::core::models::{Schedule, ScheduleStatus};
use crate::core::notify::{Notifier, execution_report};
use crate::core::storage::Storage;

pub struct Scheduler {
    storage: Arc<Storage>,
    executor: Arc<Executor>,
    notifier: Arc<dyn Notifier>,
    runtime: Mutex<JobScheduler>,
}

impl Scheduler {
    pub async fn new(
        storage: Arc<Storage>,
        executor: Arc<Executor>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        let runtime = JobScheduler::new().await?;
        Ok(Self {
            storage,
            executor,
            notifier,
            runtime: Mutex::new(runtime),
        })
    }

    /// Start the timer runtime and re-arm every Pending schedule. This is the
    /// sole recovery mechanism after a restart.
    pub async fn init(&self) -> Result<()> {
        self.runtime.lock().await.start().await?;

        let pending = self.storage.pending_schedules().await?;
        info!("Recovering {} pending schedule(s)", pending.len());
        for schedule in pending {
            self.schedule_job(schedule).await;
        }
        Ok(())
    }

    /// Arm a single schedule: fire immediately when its time has passed,
    /// otherwise register a one-shot timer for the remaining duration.
    pub async fn schedule_job(&self, schedule: Schedule) {
        let now = Utc::now();
        let delay = match (schedule.scheduled_time - now).to_std() {
            Ok(delay) if schedule.scheduled_time > now => delay,
            _ => {
                info!("Schedule {} is in the past, running immediately", schedule.id);
                run_job(
                    self.storage.clone(),
                    self.executor.clone(),
                    self.notifier.clone(),
                    schedule.id,
                )
                .await;
                return;
            }
        };

        let storage = self.storage.clone();
        let executor = self.executor.clone();
        let notifier = self.notifier.clone();
        let schedule_id = schedule.id;
        let job = Job::new_one_shot_async(delay, move |_uuid, mut _l| {
            let storage = storage.clone();
            let executor = executor.clone();
            let notifier = notifier.clone();
            Box::pin(async move {
                run_job(storage, executor, notifier, schedule_id).await;
            })
        });

        match job {
            Ok(job) => match self.runtime.lock().await.add(job).await {
                Ok(_) => info!(
                    "Scheduled job {} for {}",
                    schedule.id, schedule.scheduled_time
                ),
                Err(e) => error!("Failed to register schedule {}: {}", schedule.id, e),
            },
            Err(e) => error!("Failed to create timer for schedule {}: {}", schedule.id, e),
        }
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.runtime.lock().await.shutdown().await?;
        Ok(())
    }
}

/// Firing path. Re-fetches the schedule so a deleted or already-triggered job
/// is a no-op, marks it Completed before handing off to the executor (closing
/// the double-fire window), then triggers the execution with a notification
/// callback.
async fn run_job(
    storage: Arc<Storage>,
    executor: Arc<Executor>,
    notifier: Arc<dyn Notifier>,
    schedule_id: i64,
) {
    let schedule = match storage.schedule(schedule_id).await {
        Ok(Some(schedule)) => schedule,
        Ok(None) => {
            warn!("Schedule {} not found at fire time", schedule_id);
            return;
        }
        Err(e) => {
            error!("Failed to load schedule {}: {}", schedule_id, e);
            return;
        }
    };
    if schedule.status != ScheduleStatus::Pending {
        return;
    }

    // Completed means "triggered", independent of how the execution ends.
    if let Err(e) = storage
        .update_schedule_status(schedule.id, ScheduleStatus::Completed)
        .await
    {
        error!("Failed to mark schedule {} completed: {}", schedule.id, e);
        return;
    }

    let project = match storage.project(schedule.project_id).await {
        Ok(Some(project)) => project,
        Ok(None) => {
            warn!(
                "Project {} not found for schedule {}",
                schedule.project_id, schedule.id
            );
            return;
        }
        Err(e) => {
            error!(
                "Failed to load project for schedule {}: {}",
                schedule.id, e
            );
            return;
        }
    };

    info!("Executing scheduled job {}: {}", schedule.id, schedule.command);

    let project_name = project.name.clone();
    let callback: CompletionCallback = Box::new(move |execution| {
        Box::pin(async move {
            let message = format!(
                "Scheduled Task Executed\n{}",
                execution_report(&project_name, &execution)
            );
            notifier.notify(&message).await;
        })
    });
    executor.execute(schedule.project_id, schedule.command.clone(), Some(callback));
}
