//! Query-log records: captured executions of database commands.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::command::CommandKind;
use super::entity::Entity;
use super::request_context::RequestContext;

/// Name of the query-log table. Commands touching it are never logged.
pub const QUERY_LOG_TABLE: &str = "query_logs";

/// Maximum stored length of `command_text`, in characters.
pub const MAX_COMMAND_TEXT_CHARS: usize = 10_000;

/// A completed command the interceptor decided to persist.
///
/// Handed to the [`crate::instrumentation::BackgroundLogWriter`], which turns
/// it into a [`NewQueryLog`] off the request path.
#[derive(Debug, Clone)]
pub struct QueryLogCandidate {
    /// Full command text (not yet truncated).
    pub command_text: String,
    /// Bound parameters, if any.
    pub parameters: Option<serde_json::Value>,
    /// Elapsed execution time in milliseconds.
    pub duration_ms: u64,
    /// Wall-clock time the command started.
    pub issued_at: DateTime<Utc>,
    /// Statement kind.
    pub command_kind: CommandKind,
    /// Whether the elapsed time met the heavy threshold.
    pub is_heavy: bool,
    /// Execution error, if the command failed.
    pub error_message: Option<String>,
    /// Caller context captured at completion.
    pub context: RequestContext,
}

/// A query-log row ready to be inserted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewQueryLog {
    /// Acting user, when known.
    pub user_id: Option<String>,
    /// Command text, at most [`MAX_COMMAND_TEXT_CHARS`] characters.
    pub command_text: String,
    /// Bound parameters as JSON.
    pub parameters: Option<serde_json::Value>,
    /// Elapsed execution time in milliseconds.
    pub duration_ms: i64,
    /// Wall-clock time the command started.
    pub issued_at: DateTime<Utc>,
    /// Statement kind.
    pub command_kind: CommandKind,
    /// Tables found by the `FROM`/`JOIN` heuristic.
    pub tables_referenced: Option<Vec<String>>,
    /// Client IP address, when known.
    pub client_address: Option<String>,
    /// Request route, when known.
    pub endpoint: Option<String>,
    /// Whether the elapsed time met the heavy threshold.
    pub is_heavy: bool,
    /// Execution error, if the command failed.
    pub error_message: Option<String>,
}

/// A persisted, append-only query-log row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct QueryLogRecord {
    /// Auto-increment row ID.
    pub id: i64,
    /// Acting user, when known.
    pub user_id: Option<String>,
    /// Command text, at most 10 000 characters.
    pub command_text: String,
    /// Bound parameters as JSON.
    #[schema(value_type = Option<Object>)]
    pub parameters: Option<serde_json::Value>,
    /// Elapsed execution time in milliseconds.
    pub duration_ms: i64,
    /// Wall-clock time the command started.
    pub issued_at: DateTime<Utc>,
    /// Statement kind.
    #[schema(value_type = String)]
    pub command_kind: CommandKind,
    /// Tables found by the `FROM`/`JOIN` heuristic.
    pub tables_referenced: Option<Vec<String>>,
    /// Client IP address, when known.
    pub client_address: Option<String>,
    /// Request route, when known.
    pub endpoint: Option<String>,
    /// Whether the elapsed time met the heavy threshold.
    pub is_heavy: bool,
    /// Execution error, if the command failed.
    pub error_message: Option<String>,
}

impl QueryLogRecord {
    /// Materializes a pending row under the given row id.
    #[must_use]
    pub fn from_new(id: i64, new: NewQueryLog) -> Self {
        Self {
            id,
            user_id: new.user_id,
            command_text: new.command_text,
            parameters: new.parameters,
            duration_ms: new.duration_ms,
            issued_at: new.issued_at,
            command_kind: new.command_kind,
            tables_referenced: new.tables_referenced,
            client_address: new.client_address,
            endpoint: new.endpoint,
            is_heavy: new.is_heavy,
            error_message: new.error_message,
        }
    }
}

impl Entity for QueryLogRecord {
    const TYPE_NAME: &'static str = "QueryLogRecord";
    const TABLE: &'static str = QUERY_LOG_TABLE;

    fn key(&self) -> Option<i64> {
        Some(self.id)
    }
}

/// Aggregate statistics over the query-log table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct QueryLogStats {
    /// Number of logged queries.
    pub total_queries: i64,
    /// Number of logged heavy queries.
    pub heavy_queries: i64,
    /// Number of logged failed queries.
    pub failed_queries: i64,
    /// Mean duration in milliseconds (0 when empty).
    pub avg_duration_ms: f64,
    /// Longest duration in milliseconds (0 when empty).
    pub max_duration_ms: i64,
}
