//! Tracks the outcome of the most recent import or export, whoever ran it.

use async_trait::async_trait;
use eyre::Result;
use serde::Serialize;
use time::OffsetDateTime;

use crate::{
    daemon::{Component, DaemonHandle},
    events::DaemonEvent,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SyncReport {
    Import { count: usize, at: i64 },
    Export { count: usize, at: i64 },
    Failed { error: String, at: i64 },
}

impl SyncReport {
    fn from_event(event: &DaemonEvent, at: i64) -> Option<Self> {
        match event {
            DaemonEvent::ImportCompleted { imported } => Some(Self::Import {
                count: *imported,
                at,
            }),
            DaemonEvent::ExportCompleted { written } => Some(Self::Export {
                count: *written,
                at,
            }),
            DaemonEvent::SyncFailed { error } => Some(Self::Failed {
                error: error.clone(),
                at,
            }),
            _ => None,
        }
    }
}

#[derive(Default)]
pub struct StatusComponent {
    handle: Option<DaemonHandle>,
}

impl StatusComponent {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Component for StatusComponent {
    fn name(&self) -> &'static str {
        "status"
    }

    async fn start(&mut self, handle: DaemonHandle) -> Result<()> {
        self.handle = Some(handle);
        Ok(())
    }

    async fn handle_event(&mut self, event: &DaemonEvent) -> Result<()> {
        let Some(handle) = &self.handle else {
            return Ok(());
        };

        let at = OffsetDateTime::now_utc().unix_timestamp();
        if let Some(report) = SyncReport::from_event(event, at) {
            if let SyncReport::Failed { error, .. } = &report {
                tracing::warn!(%error, "last sync failed");
            }
            handle.record_sync(report).await;
        }

        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        self.handle = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn reports_only_sync_outcomes() {
        assert_eq!(
            SyncReport::from_event(&DaemonEvent::ImportCompleted { imported: 3 }, 10),
            Some(SyncReport::Import { count: 3, at: 10 })
        );
        assert_eq!(
            SyncReport::from_event(&DaemonEvent::ExportCompleted { written: 0 }, 10),
            Some(SyncReport::Export { count: 0, at: 10 })
        );
        assert_eq!(
            SyncReport::from_event(
                &DaemonEvent::SyncFailed {
                    error: "disk full".to_string()
                },
                10
            ),
            Some(SyncReport::Failed {
                error: "disk full".to_string(),
                at: 10
            })
        );
        assert_eq!(SyncReport::from_event(&DaemonEvent::ForceImport, 10), None);
        assert_eq!(
            SyncReport::from_event(&DaemonEvent::SettingsReloaded, 10),
            None
        );
    }

    #[test]
    fn serializes_with_a_kind_tag() {
        let json = serde_json::to_value(SyncReport::Import { count: 2, at: 5 }).unwrap();

        assert_eq!(
            json,
            serde_json::json!({"kind": "import", "count": 2, "at": 5})
        );
    }
}
