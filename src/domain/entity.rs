//! Business entities as seen by the audit layer.
//!
//! The audit layer never inspects entity types directly. Each tracked entity
//! is serialized into a [`FieldMap`] (column name → JSON value) and all
//! diffing happens on those maps.

use serde::Serialize;

use super::change_log::CHANGE_LOG_TABLE;
use super::query_log::QUERY_LOG_TABLE;
use crate::error::AuditError;

/// Column name → value snapshot of one entity.
pub type FieldMap = serde_json::Map<String, serde_json::Value>;

/// Primary key column. Generated by the database on insert.
pub const ID_FIELD: &str = "id";

/// Creation timestamp column. Stamped on insert.
pub const CREATED_AT_FIELD: &str = "created_at";

/// Modification timestamp column. Stamped on update, never diffed.
pub const UPDATED_AT_FIELD: &str = "updated_at";

/// A persistable business entity.
///
/// Serialized field names must match the table's column names.
pub trait Entity: Serialize {
    /// Type name recorded in `change_logs.entity_type_name`.
    const TYPE_NAME: &'static str;

    /// Backing table.
    const TABLE: &'static str;

    /// Primary key, or `None` for an entity not yet inserted.
    fn key(&self) -> Option<i64>;
}

/// Serializes `entity` into a field map.
///
/// # Errors
///
/// Returns [`AuditError::InvalidEntity`] if the entity does not serialize to
/// a JSON object.
pub fn snapshot<E: Entity>(entity: &E) -> Result<FieldMap, AuditError> {
    match serde_json::to_value(entity) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(other) => Err(AuditError::InvalidEntity(format!(
            "{} serialized to {other}, expected an object",
            E::TYPE_NAME
        ))),
        Err(e) => Err(AuditError::InvalidEntity(format!(
            "{} failed to serialize: {e}",
            E::TYPE_NAME
        ))),
    }
}

/// Returns `true` for the audit layer's own tables.
#[must_use]
pub fn is_log_table(table: &str) -> bool {
    table.eq_ignore_ascii_case(CHANGE_LOG_TABLE) || table.eq_ignore_ascii_case(QUERY_LOG_TABLE)
}

/// Returns `true` for values the modified-entity diff compares.
///
/// Nested objects and arrays are navigation data, not columns.
#[must_use]
pub const fn is_scalar(value: &serde_json::Value) -> bool {
    !matches!(
        value,
        serde_json::Value::Object(_) | serde_json::Value::Array(_)
    )
}
