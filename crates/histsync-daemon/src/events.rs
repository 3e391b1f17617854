//! Events broadcast on the daemon bus.
//!
//! Sync outcomes come from the scheduler and the HTTP handlers and end up in
//! the status component. Signals turn into `ForceImport`, `SettingsReloaded`
//! and `ShutdownRequested`.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DaemonEvent {
    /// The history file was imported into the store.
    ImportCompleted {
        /// Number of commands now stored.
        imported: usize,
    },

    /// The store was exported to the history file.
    ExportCompleted {
        /// Zero when the store was empty and the file was left alone.
        written: usize,
    },

    /// An import or export failed. Rejected overlapping syncs don't count.
    SyncFailed { error: String },

    /// Import now, even with the periodic import disabled (SIGUSR1).
    ForceImport,

    /// Settings were replaced (SIGHUP).
    SettingsReloaded,

    ShutdownRequested,
}
