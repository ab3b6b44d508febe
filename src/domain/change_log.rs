//! Change-log records: field-level before/after snapshots of entity writes.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::entity::{Entity, FieldMap};

/// Name of the change-log table. Rows of this table are never audited.
pub const CHANGE_LOG_TABLE: &str = "change_logs";

/// Kind of state transition a change-log record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum ChangeKind {
    /// Entity was inserted.
    Added,
    /// Entity was updated.
    Modified,
    /// Entity was deleted.
    Deleted,
}

impl ChangeKind {
    /// Returns the kind as stored in `change_logs.change_kind`.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Added => "Added",
            Self::Modified => "Modified",
            Self::Deleted => "Deleted",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "added" => Ok(Self::Added),
            "modified" => Ok(Self::Modified),
            "deleted" => Ok(Self::Deleted),
            other => Err(format!("unknown change kind: {other}")),
        }
    }
}

/// A change-log row not yet written.
///
/// Produced by [`crate::persistence::UnitOfWork`] while diffing tracked
/// entities; `record_id` is filled in once the primary save has assigned
/// keys to added entities.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewChangeLog {
    /// Acting user, when known.
    pub user_id: Option<String>,
    /// Entity type name (e.g. `"Appointment"`).
    pub entity_type_name: String,
    /// Table the entity is stored in.
    pub table_name: String,
    /// Primary key of the affected row.
    pub record_id: i64,
    /// Kind of transition.
    pub change_kind: ChangeKind,
    /// Names of the fields that changed (Modified only).
    pub changed_field_names: Vec<String>,
    /// Values before the change (Modified, Deleted).
    pub old_values: FieldMap,
    /// Values after the change (Added, Modified).
    pub new_values: FieldMap,
    /// Time of the save call.
    pub timestamp: DateTime<Utc>,
    /// Client IP address, when known.
    pub client_address: Option<String>,
}

/// A persisted, append-only change-log row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ChangeLogRecord {
    /// Auto-increment row ID.
    pub id: i64,
    /// Acting user, when known.
    pub user_id: Option<String>,
    /// Entity type name.
    pub entity_type_name: String,
    /// Table the entity is stored in.
    pub table_name: String,
    /// Primary key of the affected row.
    pub record_id: i64,
    /// Kind of transition.
    pub change_kind: ChangeKind,
    /// Names of the fields that changed.
    pub changed_field_names: Vec<String>,
    /// Values before the change.
    #[schema(value_type = Object)]
    pub old_values: FieldMap,
    /// Values after the change.
    #[schema(value_type = Object)]
    pub new_values: FieldMap,
    /// Time of the save call.
    pub timestamp: DateTime<Utc>,
    /// Client IP address, when known.
    pub client_address: Option<String>,
}

impl ChangeLogRecord {
    /// Materializes a pending record under the given row id.
    #[must_use]
    pub fn from_new(id: i64, new: NewChangeLog) -> Self {
        Self {
            id,
            user_id: new.user_id,
            entity_type_name: new.entity_type_name,
            table_name: new.table_name,
            record_id: new.record_id,
            change_kind: new.change_kind,
            changed_field_names: new.changed_field_names,
            old_values: new.old_values,
            new_values: new.new_values,
            timestamp: new.timestamp,
            client_address: new.client_address,
        }
    }
}

impl Entity for ChangeLogRecord {
    const TYPE_NAME: &'static str = "ChangeLogRecord";
    const TABLE: &'static str = CHANGE_LOG_TABLE;

    fn key(&self) -> Option<i64> {
        Some(self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn change_kind_parses_case_insensitively() {
        assert_eq!("added".parse::<ChangeKind>(), Ok(ChangeKind::Added));
        assert_eq!("MODIFIED".parse::<ChangeKind>(), Ok(ChangeKind::Modified));
        assert_eq!("Deleted".parse::<ChangeKind>(), Ok(ChangeKind::Deleted));
        assert!("upserted".parse::<ChangeKind>().is_err());
    }

    #[test]
    fn change_kind_round_trips_through_column_text() {
        for kind in [ChangeKind::Added, ChangeKind::Modified, ChangeKind::Deleted] {
            assert_eq!(kind.as_str().parse::<ChangeKind>(), Ok(kind));
        }
    }
}
