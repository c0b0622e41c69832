use anyhow::Result;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Hooks a long-lived interface or service participates in. All have default
/// no-op implementations; components override what they need.
#[async_trait::async_trait]
pub trait LifecycleComponent {
    async fn on_init(&mut self) -> Result<()> {
        Ok(())
    }
    async fn on_start(&mut self) -> Result<()> {
        Ok(())
    }
    async fn on_shutdown(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Drives attached components through init, start and shutdown in attach
/// order. Startup errors abort the boot; shutdown errors are logged and
/// swallowed so every component gets its chance to clean up.
pub struct LifecycleManager {
    components: Vec<Arc<Mutex<dyn LifecycleComponent + Send + Sync>>>,
}

impl LifecycleManager {
    pub fn new() -> Self {
        Self {
            components: Vec::new(),
        }
    }

    pub fn attach(&mut self, component: Arc<Mutex<dyn LifecycleComponent + Send + Sync>>) {
        self.components.push(component);
    }

    pub async fn start(&mut self) -> Result<()> {
        info!("Lifecycle Phase: Init");
        for component in &self.components {
            component.lock().await.on_init().await?;
        }

        info!("Lifecycle Phase: Start");
        for component in &self.components {
            component.lock().await.on_start().await?;
        }

        info!("Lifecycle Phase: Ready");
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        info!("Lifecycle Phase: Shutdown");
        for component in &self.components {
            if let Err(e) = component.lock().await.on_shutdown().await {
                warn!("Component shutdown error: {}", e);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Recorder {
        events: Arc<Mutex<Vec<&'static str>>>,
        fail_start: bool,
    }

    #[async_trait::async_trait]
    impl LifecycleComponent for Recorder {
        async fn on_init(&mut self) -> Result<()> {
            self.events.lock().await.push("init");
            Ok(())
        }
        async fn on_start(&mut self) -> Result<()> {
            if self.fail_start {
                anyhow::bail!("boom");
            }
            self.events.lock().await.push("start");
            Ok(())
        }
        async fn on_shutdown(&mut self) -> Result<()> {
            self.events.lock().await.push("shutdown");
            Ok(())
        }
    }

    #[tokio::test]
    async fn components_run_through_all_phases() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let mut manager = LifecycleManager::new();
        manager.attach(Arc::new(Mutex::new(Recorder {
            events: events.clone(),
            fail_start: false,
        })));

        manager.start().await.unwrap();
        manager.shutdown().await.unwrap();
        assert_eq!(*events.lock().await, vec!["init", "start", "shutdown"]);
    }

    #[tokio::test]
    async fn start_failure_aborts_boot() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let mut manager = LifecycleManager::new();
        manager.attach(Arc::new(Mutex::new(Recorder {
            events: events.clone(),
            fail_start: true,
        })));

        assert!(manager.start().await.is_err());
        assert_eq!(*events.lock().await, vec!["init"]);
    }
}
