mod config;
mod core;
mod interfaces;
mod logging;

use anyhow::Result;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use crate::config::Config;
use crate::core::executor::Executor;
use crate::core::lifecycle::{LifecycleComponent, LifecycleManager};
use crate::core::notify::Notifier;
use crate::core::realtime::LogBroker;
use crate::core::scheduler::Scheduler;
use crate::core::storage::Storage;
use crate::interfaces::telegram::{TelegramInterface, TelegramNotifier};
use crate::interfaces::web::ApiServer;

/// Bridges the scheduler into the lifecycle: pending-schedule recovery on
/// start, timer runtime teardown on exit.
struct SchedulerService {
    inner: Arc<Scheduler>,
}

#[async_trait::async_trait]
impl LifecycleComponent for SchedulerService {
    async fn on_start(&mut self) -> Result<()> {
        self.inner.init().await
    }

    async fn on_shutdown(&mut self) -> Result<()> {
        self.inner.shutdown().await
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("taskdock failed: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let config = Arc::new(Config::load());
    logging::init(config.debug);

    let storage = Arc::new(Storage::new(&config.database_url).await?);
    let broker = Arc::new(LogBroker::new());
    let executor = Arc::new(Executor::new(storage.clone(), broker.clone()));
    let notifier: Arc<dyn Notifier> = Arc::new(TelegramNotifier::new(
        &config.telegram_bot_token,
        config.whitelist_ids(),
    ));
    let scheduler = Arc::new(
        Scheduler::new(storage.clone(), executor.clone(), notifier.clone()).await?,
    );

    let mut lifecycle = LifecycleManager::new();
    lifecycle.attach(Arc::new(Mutex::new(ApiServer::new(
        storage.clone(),
        executor.clone(),
        broker.clone(),
        scheduler.clone(),
        notifier.clone(),
        config.clone(),
    ))));
    lifecycle.attach(Arc::new(Mutex::new(TelegramInterface::new(
        config.telegram_bot_token.clone(),
        config.whitelist_ids(),
        storage.clone(),
        executor.clone(),
        notifier.clone(),
    ))));
    lifecycle.attach(Arc::new(Mutex::new(SchedulerService {
        inner: scheduler.clone(),
    })));

    lifecycle.start().await?;
    notifier.notify("🚀 taskdock server started").await;

    tokio::signal::ctrl_c().await?;
    info!("Shutting down server...");
    notifier.notify("🛑 taskdock server stopped").await;
    lifecycle.shutdown().await?;
    info!("Server exiting");
    Ok(())
}
