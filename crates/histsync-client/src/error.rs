use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failures surfaced by the history file, the store and the sync engine.
///
/// A missing history file is never an error: reads treat it as empty and
/// deletes treat it as already done.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to access history file {}: {source}", path.display())]
    FileIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to open history database: {0}")]
    StoreOpen(#[source] sqlx::Error),

    #[error("history query failed: {0}")]
    StoreQuery(#[source] sqlx::Error),

    #[error("history transaction failed: {0}")]
    StoreTransaction(#[source] sqlx::Error),

    #[error("failed to migrate history database: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("a sync is already in progress")]
    SyncInProgress,
}

impl Error {
    pub(crate) fn file_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileIo {
            path: path.into(),
            source,
        }
    }
}
