use eyre::Result;
use histsync_client::settings::Settings;

pub async fn run(settings: Settings) -> Result<()> {
    tracing::info!(
        history = %settings.history_path,
        db = %settings.db_path,
        "starting histsync daemon"
    );

    histsync_daemon::boot(settings).await
}
