mod handlers;
mod router;

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::core::executor::Executor;
use crate::core::lifecycle::LifecycleComponent;
use crate::core::notify::Notifier;
use crate::core::realtime::LogBroker;
use crate::core::scheduler::Scheduler;
use crate::core::storage::Storage;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) storage: Arc<Storage>,
    pub(crate) executor: Arc<Executor>,
    pub(crate) broker: Arc<LogBroker>,
    pub(crate) scheduler: Arc<Scheduler>,
    pub(crate) notifier: Arc<dyn Notifier>,
    pub(crate) config: Arc<Config>,
}

/// HTTP API interface. Serving starts on `on_start` and runs in a background
/// task for the process lifetime.
pub struct ApiServer {
    state: AppState,
}

impl ApiServer {
    pub fn new(
        storage: Arc<Storage>,
        executor: Arc<Executor>,
        broker: Arc<LogBroker>,
        scheduler: Arc<Scheduler>,
        notifier: Arc<dyn Notifier>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            state: AppState {
                storage,
                executor,
                broker,
                scheduler,
                notifier,
                config,
            },
        }
    }
}

#[async_trait]
impl LifecycleComponent for ApiServer {
    async fn on_init(&mut self) -> Result<()> {
        info!("API Server initializing...");
        Ok(())
    }

    async fn on_start(&mut self) -> Result<()> {
        let state = self.state.clone();
        let addr = format!("0.0.0.0:{}", state.config.port);

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        tokio::spawn(async move {
            let app = router::build_api_router(state);
            info!("API Server running at http://{addr}");
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("API Server crashed: {}", e);
            }
        });
        Ok(())
    }

    async fn on_shutdown(&mut self) -> Result<()> {
        info!("API Server shutting down...");
        Ok(())
    }
}
