use eyre::{Result, WrapErr};
use histsync_client::{
    database::Database, history_file::HistoryFile, settings::Settings, sync::SyncEngine,
};

pub mod components;
pub mod daemon;
pub mod events;
pub mod server;

pub use daemon::{Component, Daemon, DaemonBuilder, DaemonHandle};
pub use events::DaemonEvent;

pub use components::{SchedulerComponent, StatusComponent};

/// Open the store, start the scheduler and the HTTP API, and run until a
/// shutdown signal arrives.
pub async fn boot(settings: Settings) -> Result<()> {
    let db = Database::new(settings.db_path(), settings.db_timeout)
        .await
        .wrap_err_with(|| format!("could not open database at {}", settings.db_path))?;
    let history_file = HistoryFile::new(settings.history_path());
    let engine = SyncEngine::new(history_file, db);

    let listener = server::bind(&settings.bind_address()).await?;

    let mut daemon = Daemon::builder(settings)
        .engine(engine)
        .component(StatusComponent::new())
        .component(SchedulerComponent::new())
        .build()?;

    let handle = daemon.handle();

    daemon.start_components().await?;

    tokio::spawn(listen_for_signals(handle.clone()));

    let (_, server) = server::run_http_server(listener, handle.clone())?;

    daemon.run_event_loop().await?;

    // let in-flight requests finish before the pool goes away
    if let Err(e) = server.await {
        tracing::error!("http server task failed: {e}");
    }

    daemon.stop_components().await;
    handle.engine().db().close().await;

    tracing::info!("daemon shut down complete");
    Ok(())
}

/// Turn process signals into bus events: SIGINT/SIGTERM shut down, SIGHUP
/// reloads settings, SIGUSR1 forces an import.
#[cfg(unix)]
async fn listen_for_signals(handle: DaemonHandle) {
    use tokio::signal::unix::{Signal, SignalKind, signal};

    fn install(kind: SignalKind, name: &str) -> Option<Signal> {
        match signal(kind) {
            Ok(sig) => Some(sig),
            Err(e) => {
                tracing::warn!("failed to install {name} handler: {e}");
                None
            }
        }
    }

    async fn recv(sig: &mut Option<Signal>) {
        match sig {
            Some(sig) => {
                sig.recv().await;
            }
            None => std::future::pending::<()>().await,
        }
    }

    let mut terminate = install(SignalKind::terminate(), "SIGTERM");
    let mut hangup = install(SignalKind::hangup(), "SIGHUP");
    let mut user1 = install(SignalKind::user_defined1(), "SIGUSR1");

    let mut watch_ctrl_c = true;

    loop {
        tokio::select! {
            res = tokio::signal::ctrl_c(), if watch_ctrl_c => match res {
                Ok(()) => break,
                Err(e) => {
                    tracing::warn!("failed to listen for ctrl_c: {e}");
                    watch_ctrl_c = false;
                }
            },
            () = recv(&mut terminate) => break,
            () = recv(&mut hangup) => {
                tracing::info!("received SIGHUP, reloading settings");
                if let Err(e) = handle.reload_settings().await {
                    tracing::error!("keeping previous settings: {e:#}");
                }
            }
            () = recv(&mut user1) => {
                tracing::info!("received SIGUSR1");
                handle.emit(DaemonEvent::ForceImport);
            }
        }
    }

    tracing::info!("received shutdown signal");
    handle.shutdown();
}

#[cfg(not(unix))]
async fn listen_for_signals(handle: DaemonHandle) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to listen for ctrl_c: {e}");
        std::future::pending::<()>().await;
    }

    tracing::info!("received shutdown signal");
    handle.shutdown();
}
