//! Starts and stops discovery in response to host signals.

use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::mpsc;
use tracing::debug;

use super::scheduler::DiscoveryScheduler;

/// Where the host's currently active product/machine profile is read from.
pub trait ProfileSource: Send + Sync {
    fn active_product_name(&self) -> Option<String>;
}

/// A profile name set directly by the host.
#[derive(Debug, Default)]
pub struct StaticProfile {
    name: RwLock<Option<String>>,
}

impl StaticProfile {
    pub fn new(name: Option<String>) -> Self {
        Self {
            name: RwLock::new(name),
        }
    }

    pub fn set(&self, name: Option<String>) {
        *self.name.write().unwrap_or_else(PoisonError::into_inner) = name;
    }
}

impl ProfileSource for StaticProfile {
    fn active_product_name(&self) -> Option<String> {
        self.name
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Host signals the controller reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The active profile changed; re-read it
    ProfileChanged,
    /// The process is exiting
    ShuttingDown,
}

/// Keeps the scheduler running exactly while the active profile is the
/// configured product.
pub struct LifecycleController {
    scheduler: Arc<DiscoveryScheduler>,
    profile: Arc<dyn ProfileSource>,
}

impl LifecycleController {
    pub fn new(scheduler: Arc<DiscoveryScheduler>, profile: Arc<dyn ProfileSource>) -> Self {
        Self { scheduler, profile }
    }

    pub fn scheduler(&self) -> &Arc<DiscoveryScheduler> {
        &self.scheduler
    }

    /// Start or stop discovery to match the active profile. Returns whether
    /// discovery is now running.
    pub async fn on_profile_changed(&self) -> bool {
        let active = self.profile.active_product_name();
        let wanted = &self.scheduler.config().product_identity;

        if active.as_deref() == Some(wanted.as_str()) {
            self.scheduler.start().await;
            true
        } else {
            debug!("Active profile {:?} is not {}", active, wanted);
            self.scheduler.stop().await;
            false
        }
    }

    pub async fn on_shutdown(&self) {
        self.scheduler.stop().await;
    }

    /// Dispatch events until shutdown. A closed event channel counts as shutdown.
    pub async fn run(&self, mut events: mpsc::Receiver<LifecycleEvent>) {
        while let Some(event) = events.recv().await {
            match event {
                LifecycleEvent::ProfileChanged => {
                    self.on_profile_changed().await;
                }
                LifecycleEvent::ShuttingDown => break,
            }
        }
        self.on_shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BindMode, DiscoveryConfig};
    use crate::net::StaticInterfaces;
    use crate::registry::InMemoryRegistry;
    use std::time::Duration;

    fn controller(profile: Arc<StaticProfile>) -> LifecycleController {
        let config = DiscoveryConfig {
            bind_mode: BindMode::Ephemeral,
            ..Default::default()
        };
        let scheduler = DiscoveryScheduler::new(
            config,
            Arc::new(StaticInterfaces::default()),
            Arc::new(InMemoryRegistry::new()),
        );
        LifecycleController::new(scheduler, profile)
    }

    #[tokio::test]
    async fn test_profile_change_starts_and_stops() {
        let profile = Arc::new(StaticProfile::new(Some("J1".to_string())));
        let controller = controller(profile.clone());

        assert!(controller.on_profile_changed().await);
        assert!(controller.scheduler().is_active().await);

        profile.set(Some("A350".to_string()));
        assert!(!controller.on_profile_changed().await);
        assert!(!controller.scheduler().is_active().await);

        profile.set(None);
        assert!(!controller.on_profile_changed().await);
    }

    #[tokio::test]
    async fn test_profile_match_is_exact() {
        let profile = Arc::new(StaticProfile::new(Some("j1".to_string())));
        let controller = controller(profile);

        assert!(!controller.on_profile_changed().await);
    }

    #[tokio::test]
    async fn test_shutdown_stops_unconditionally() {
        let profile = Arc::new(StaticProfile::new(Some("J1".to_string())));
        let controller = controller(profile);

        controller.on_profile_changed().await;
        controller.on_shutdown().await;
        controller.on_shutdown().await;

        assert!(!controller.scheduler().is_active().await);
    }

    #[tokio::test]
    async fn test_run_dispatches_until_shutdown() {
        let profile = Arc::new(StaticProfile::new(Some("J1".to_string())));
        let controller = Arc::new(controller(profile));
        let (tx, rx) = mpsc::channel(4);

        let task = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.run(rx).await })
        };

        tx.send(LifecycleEvent::ProfileChanged).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(controller.scheduler().is_active().await);

        tx.send(LifecycleEvent::ShuttingDown).await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
        assert!(!controller.scheduler().is_active().await);
    }

    #[tokio::test]
    async fn test_run_stops_when_sender_dropped() {
        let profile = Arc::new(StaticProfile::new(Some("J1".to_string())));
        let controller = controller(profile);
        let (tx, rx) = mpsc::channel(4);

        tx.send(LifecycleEvent::ProfileChanged).await.unwrap();
        drop(tx);

        controller.run(rx).await;
        assert!(!controller.scheduler().is_active().await);
    }
}
