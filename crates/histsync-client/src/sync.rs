//! Full-overwrite synchronization between the history file and the store.
//!
//! Neither direction merges: an import replaces the whole table with the
//! file's contents, an export replaces the whole file with the table's.

use std::sync::atomic::{AtomicBool, Ordering};

use time::OffsetDateTime;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{info, instrument, warn};

use crate::{Error, Result, database::Database, history_file::HistoryFile};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportOutcome {
    /// The store was empty; the file was left alone.
    Skipped,
    /// The file now holds this many commands.
    Written(usize),
}

/// Proof that the caller owns the sync slot. Dropping it lets the next
/// import or export in.
pub struct SyncGuard<'a> {
    _lock: MutexGuard<'a, ()>,
    busy: &'a AtomicBool,
}

impl Drop for SyncGuard<'_> {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

pub struct SyncEngine {
    history_file: HistoryFile,
    db: Database,

    /// Held for the duration of an import or export. Only one runs at a time.
    running: Mutex<()>,

    /// Mirrors `running` for status reads, which must never contend for the
    /// lock itself.
    busy: AtomicBool,
}

impl SyncEngine {
    pub fn new(history_file: HistoryFile, db: Database) -> Self {
        Self {
            history_file,
            db,
            running: Mutex::new(()),
            busy: AtomicBool::new(false),
        }
    }

    pub fn history_file(&self) -> &HistoryFile {
        &self.history_file
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn is_running(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Claim the sync slot without running anything, or fail with
    /// `SyncInProgress` if an import or export already holds it.
    pub fn begin_sync(&self) -> Result<SyncGuard<'_>> {
        let lock = self.running.try_lock().map_err(|_| {
            warn!("sync requested while another is running");
            Error::SyncInProgress
        })?;
        self.busy.store(true, Ordering::Release);

        Ok(SyncGuard {
            _lock: lock,
            busy: &self.busy,
        })
    }

    /// Replace the stored history with the contents of the history file.
    ///
    /// Returns the number of commands now stored.
    #[instrument(skip_all)]
    pub async fn import_from_file(&self) -> Result<usize> {
        let _running = self.begin_sync()?;

        let commands = self.history_file.read_all().await?;
        let imported = self.db.replace_all(&commands).await?;

        info!(imported, "imported history file");

        Ok(imported)
    }

    /// Replace the history file with the stored commands.
    ///
    /// Every line gets the same timestamp, taken once at the start of the
    /// export. An empty store leaves the file untouched.
    #[instrument(skip_all)]
    pub async fn export_to_file(&self) -> Result<ExportOutcome> {
        let _running = self.begin_sync()?;

        let records = self.db.list_all().await?;

        if records.is_empty() {
            info!("no commands to write");
            return Ok(ExportOutcome::Skipped);
        }

        let timestamp = OffsetDateTime::now_utc().unix_timestamp();
        let commands: Vec<&str> = records.iter().map(|r| r.command.as_str()).collect();

        self.history_file.write_all(&commands, timestamp).await?;

        info!(written = commands.len(), "exported history file");

        Ok(ExportOutcome::Written(commands.len()))
    }
}
