//! Scheduler component.
//!
//! Periodically imports the shell history file into the store.

use async_trait::async_trait;
use eyre::Result;
use histsync_client::Error as SyncError;
use tokio::sync::mpsc;
use tokio::time::{self, Duration, MissedTickBehavior};

use crate::{
    daemon::{Component, DaemonHandle},
    events::DaemonEvent,
};

/// Commands that can be sent to the scheduler task.
#[derive(Debug)]
enum SchedulerCommand {
    /// Import immediately.
    ForceImport,
    /// Pick up a new sync frequency.
    Reschedule,
    /// Stop the scheduler loop.
    Stop,
}

/// Imports the history file every `daemon.sync_frequency` seconds, and on
/// `ForceImport`. A tick that finds another sync running is skipped.
pub struct SchedulerComponent {
    task_handle: Option<tokio::task::JoinHandle<()>>,
    command_tx: Option<mpsc::Sender<SchedulerCommand>>,
}

impl SchedulerComponent {
    /// Create a new scheduler component.
    pub fn new() -> Self {
        Self {
            task_handle: None,
            command_tx: None,
        }
    }

    async fn send(&self, cmd: SchedulerCommand) {
        if let Some(tx) = &self.command_tx
            && let Err(e) = tx.send(cmd).await
        {
            tracing::warn!("scheduler loop is gone, dropping command: {e}");
        }
    }
}

impl Default for SchedulerComponent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Component for SchedulerComponent {
    fn name(&self) -> &'static str {
        "scheduler"
    }

    async fn start(&mut self, handle: DaemonHandle) -> Result<()> {
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        self.command_tx = Some(cmd_tx);

        self.task_handle = Some(tokio::spawn(scheduler_loop(handle, cmd_rx)));

        tracing::info!("scheduler component started");
        Ok(())
    }

    async fn handle_event(&mut self, event: &DaemonEvent) -> Result<()> {
        match event {
            DaemonEvent::ForceImport => {
                tracing::info!("force import requested");
                self.send(SchedulerCommand::ForceImport).await;
            }
            DaemonEvent::SettingsReloaded => {
                self.send(SchedulerCommand::Reschedule).await;
            }
            _ => {}
        }
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        self.send(SchedulerCommand::Stop).await;
        if let Some(handle) = self.task_handle.take() {
            // Give the task a moment to finish an in-flight import
            let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
        }
        tracing::info!("scheduler component stopped");
        Ok(())
    }
}

fn new_ticker(frequency: u64) -> time::Interval {
    let mut ticker = time::interval(Duration::from_secs(frequency.max(1)));

    // Without this a slow import would be followed by a burst of catch-up
    // ticks.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

/// The main scheduler loop.
async fn scheduler_loop(handle: DaemonHandle, mut cmd_rx: mpsc::Receiver<SchedulerCommand>) {
    let (mut enabled, frequency) = {
        let settings = handle.settings().await;
        (settings.daemon.sync_enabled, settings.daemon.sync_frequency)
    };

    tracing::info!(enabled, frequency, "scheduler loop starting");

    let mut ticker = new_ticker(frequency);

    loop {
        tokio::select! {
            _ = ticker.tick(), if enabled => {
                tracing::debug!("scheduler tick");
                do_import(&handle).await;
            }
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(SchedulerCommand::ForceImport) => {
                        tracing::info!("executing forced import");
                        do_import(&handle).await;
                    }
                    Some(SchedulerCommand::Reschedule) => {
                        let settings = handle.settings().await;
                        enabled = settings.daemon.sync_enabled;
                        ticker = new_ticker(settings.daemon.sync_frequency);
                        // don't import right away, the first tick of a fresh interval is immediate
                        ticker.reset();
                        tracing::info!(
                            enabled,
                            frequency = settings.daemon.sync_frequency,
                            "scheduler rescheduled"
                        );
                    }
                    Some(SchedulerCommand::Stop) | None => {
                        tracing::info!("scheduler loop stopping");
                        break;
                    }
                }
            }
        }
    }
}

/// Run one import and report the outcome on the event bus.
async fn do_import(handle: &DaemonHandle) {
    match handle.engine().import_from_file().await {
        Ok(imported) => {
            handle.emit(DaemonEvent::ImportCompleted { imported });
        }
        Err(SyncError::SyncInProgress) => {
            tracing::warn!("a sync is already running, skipping this tick");
        }
        Err(e) => {
            tracing::error!("scheduled import failed: {e}");
            handle.emit(DaemonEvent::SyncFailed {
                error: e.to_string(),
            });
        }
    }
}
