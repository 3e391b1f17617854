use axum::{
    Json,
    extract::{Query, State},
};
use histsync_client::{record::CommandRecord, sync::ExportOutcome};
use serde::{Deserialize, Serialize};
use tracing::{Level, instrument};

use super::{ApiError, Envelope};
use crate::{components::status::SyncReport, daemon::DaemonHandle, events::DaemonEvent};

pub const IMPORTED_MESSAGE: &str = "History imported into the database.";
pub const EXPORTED_MESSAGE: &str = "Completed writing commands to history file";

type ApiResult<T> = Result<Json<Envelope<T>>, ApiError>;

#[derive(Debug, Serialize)]
pub struct Health {
    status: &'static str,
    version: &'static str,
    syncing: bool,
    last_sync: Option<SyncReport>,
}

pub async fn health(State(handle): State<DaemonHandle>) -> Json<Envelope<Health>> {
    Json(Envelope::data(Health {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        syncing: handle.engine().is_running(),
        last_sync: handle.last_sync().await,
    }))
}

#[instrument(skip_all, level = Level::INFO)]
pub async fn all_commands(State(handle): State<DaemonHandle>) -> ApiResult<Vec<CommandRecord>> {
    let records = handle.engine().db().list_all().await?;

    Ok(Json(Envelope::data(records)))
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    /// Missing is the same as empty: every command matches.
    #[serde(default)]
    keyword: String,
}

#[instrument(skip_all, level = Level::INFO)]
pub async fn commands(
    State(handle): State<DaemonHandle>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Vec<CommandRecord>> {
    tracing::debug!(keyword = %params.keyword, "filtering commands");

    let records = handle
        .engine()
        .db()
        .filter_by_prefix(&params.keyword)
        .await?;

    Ok(Json(Envelope::data(records)))
}

#[instrument(skip_all, level = Level::INFO)]
pub async fn save_all_history(State(handle): State<DaemonHandle>) -> ApiResult<()> {
    match handle.engine().import_from_file().await {
        Ok(imported) => {
            handle.emit(DaemonEvent::ImportCompleted { imported });
            Ok(Json(Envelope::message(IMPORTED_MESSAGE)))
        }
        Err(e) => {
            report_failure(&handle, &e);
            Err(e.into())
        }
    }
}

#[instrument(skip_all, level = Level::INFO)]
pub async fn write_all_commands_to_history(State(handle): State<DaemonHandle>) -> ApiResult<()> {
    match handle.engine().export_to_file().await {
        Ok(outcome) => {
            let written = match outcome {
                ExportOutcome::Skipped => 0,
                ExportOutcome::Written(n) => n,
            };
            handle.emit(DaemonEvent::ExportCompleted { written });
            Ok(Json(Envelope::message(EXPORTED_MESSAGE)))
        }
        Err(e) => {
            report_failure(&handle, &e);
            Err(e.into())
        }
    }
}

fn report_failure(handle: &DaemonHandle, err: &histsync_client::Error) {
    // a rejected overlapping request is not a failed sync
    if !matches!(err, histsync_client::Error::SyncInProgress) {
        handle.emit(DaemonEvent::SyncFailed {
            error: err.to_string(),
        });
    }
}
