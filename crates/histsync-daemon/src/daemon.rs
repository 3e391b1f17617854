//! The daemon: shared state, the event bus and the components listening on it.

use std::sync::Arc;

use async_trait::async_trait;
use eyre::{Context, Result};
use histsync_client::{settings::Settings, sync::SyncEngine};
use tokio::sync::{RwLock, RwLockReadGuard, broadcast};

use crate::{components::status::SyncReport, events::DaemonEvent};

const EVENT_BUS_CAPACITY: usize = 64;

struct DaemonState {
    event_tx: broadcast::Sender<DaemonEvent>,
    settings: RwLock<Settings>,
    engine: SyncEngine,
    last_sync: RwLock<Option<SyncReport>>,
}

/// Cloneable access to the running daemon, shared by components, HTTP
/// handlers and the signal listener.
#[derive(Clone)]
pub struct DaemonHandle {
    state: Arc<DaemonState>,
}

impl DaemonHandle {
    /// Broadcast an event. Nobody listening is not an error.
    pub fn emit(&self, event: DaemonEvent) {
        if let Err(e) = self.state.event_tx.send(event) {
            tracing::debug!("event dropped, no receivers: {e}");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DaemonEvent> {
        self.state.event_tx.subscribe()
    }

    pub fn shutdown(&self) {
        self.emit(DaemonEvent::ShutdownRequested);
    }

    /// Don't hold the guard across a sync.
    pub async fn settings(&self) -> RwLockReadGuard<'_, Settings> {
        self.state.settings.read().await
    }

    /// Swap in new settings and tell components about it.
    ///
    /// Only the scheduler reacts; paths and the listen address are fixed for
    /// the life of the process.
    pub async fn replace_settings(&self, settings: Settings) {
        *self.state.settings.write().await = settings;
        tracing::info!("settings reloaded");
        self.emit(DaemonEvent::SettingsReloaded);
    }

    /// Re-read the config file and environment.
    pub async fn reload_settings(&self) -> Result<()> {
        let settings = Settings::new().wrap_err("could not reload settings")?;
        self.replace_settings(settings).await;
        Ok(())
    }

    pub fn engine(&self) -> &SyncEngine {
        &self.state.engine
    }

    pub async fn last_sync(&self) -> Option<SyncReport> {
        self.state.last_sync.read().await.clone()
    }

    pub(crate) async fn record_sync(&self, report: SyncReport) {
        *self.state.last_sync.write().await = Some(report);
    }
}

impl std::fmt::Debug for DaemonHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DaemonHandle").finish_non_exhaustive()
    }
}

/// A piece of the daemon that reacts to bus events.
///
/// `start` runs once before the event loop, `handle_event` for every event
/// other than `ShutdownRequested`, and `stop` once the loop has ended.
#[async_trait]
pub trait Component: Send + Sync {
    fn name(&self) -> &'static str;

    async fn start(&mut self, handle: DaemonHandle) -> Result<()>;

    async fn handle_event(&mut self, event: &DaemonEvent) -> Result<()>;

    async fn stop(&mut self) -> Result<()>;
}

pub struct Daemon {
    components: Vec<Box<dyn Component>>,
    handle: DaemonHandle,

    /// Subscribed when the daemon is built, so events emitted before the
    /// loop starts are still delivered.
    event_rx: broadcast::Receiver<DaemonEvent>,
}

impl Daemon {
    pub fn builder(settings: Settings) -> DaemonBuilder {
        DaemonBuilder::new(settings)
    }

    pub fn handle(&self) -> DaemonHandle {
        self.handle.clone()
    }

    pub async fn start_components(&mut self) -> Result<()> {
        for component in &mut self.components {
            tracing::info!(component = component.name(), "starting component");
            component
                .start(self.handle.clone())
                .await
                .with_context(|| format!("failed to start component: {}", component.name()))?;
        }
        Ok(())
    }

    /// Dispatch events to every component, in registration order, until
    /// shutdown is requested.
    pub async fn run_event_loop(&mut self) -> Result<()> {
        loop {
            match self.event_rx.recv().await {
                Ok(DaemonEvent::ShutdownRequested) => {
                    tracing::info!("shutdown requested, stopping daemon");
                    break;
                }
                Ok(event) => {
                    tracing::debug!(?event, "processing event");
                    self.dispatch_event(&event).await;
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "event loop lagged, events were dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        Ok(())
    }

    pub async fn stop_components(&mut self) {
        for component in &mut self.components {
            tracing::info!(component = component.name(), "stopping component");
            if let Err(e) = component.stop().await {
                tracing::error!(component = component.name(), error = ?e, "error stopping component");
            }
        }
    }

    pub async fn run(mut self) -> Result<()> {
        self.start_components().await?;
        self.run_event_loop().await?;
        self.stop_components().await;
        tracing::info!("daemon stopped");
        Ok(())
    }

    async fn dispatch_event(&mut self, event: &DaemonEvent) {
        for component in &mut self.components {
            if let Err(e) = component.handle_event(event).await {
                tracing::error!(component = component.name(), error = ?e, "error handling event");
            }
        }
    }
}

pub struct DaemonBuilder {
    settings: Settings,
    engine: Option<SyncEngine>,
    components: Vec<Box<dyn Component>>,
}

impl DaemonBuilder {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            engine: None,
            components: Vec::new(),
        }
    }

    pub fn engine(mut self, engine: SyncEngine) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Components start and stop in registration order.
    pub fn component(mut self, component: impl Component + 'static) -> Self {
        self.components.push(Box::new(component));
        self
    }

    pub fn build(self) -> Result<Daemon> {
        let engine = self.engine.ok_or_else(|| eyre::eyre!("engine is required"))?;
        let (event_tx, event_rx) = broadcast::channel(EVENT_BUS_CAPACITY);

        let state = Arc::new(DaemonState {
            event_tx,
            settings: RwLock::new(self.settings),
            engine,
            last_sync: RwLock::new(None),
        });

        Ok(Daemon {
            components: self.components,
            handle: DaemonHandle { state },
            event_rx,
        })
    }
}
