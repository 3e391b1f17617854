use serde::{Deserialize, Serialize};

/// A single command stored in the history table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CommandRecord {
    /// Auto-assigned by the store. Stable for the lifetime of the record.
    pub id: i64,

    /// The literal shell command, never empty after trimming.
    pub command: String,
}
