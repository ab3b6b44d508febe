//! Database command identity and metadata.
//!
//! [`DbCommand`] is the unit the [`crate::instrumentation::CommandInterceptor`]
//! observes. A command object may be reused for several executions (and its
//! text may be swapped between them), so its [`CommandId`] alone does not
//! identify one execution; see [`super::correlation::CorrelationKey`].

use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique identity of a command object.
///
/// Wraps a UUID v4 generated when the command object is created. Stays the
/// same when the command is re-executed or its text is replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandId(uuid::Uuid);

impl CommandId {
    /// Creates a new random `CommandId` (UUID v4).
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Creates a `CommandId` from an existing [`uuid::Uuid`].
    #[must_use]
    pub const fn from_uuid(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner [`uuid::Uuid`].
    #[must_use]
    pub const fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for CommandId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Statement category, inferred from the leading SQL keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    /// `SELECT`.
    Select,
    /// `INSERT`.
    Insert,
    /// `UPDATE`.
    Update,
    /// `DELETE`.
    Delete,
    /// Anything else: DDL, `WITH`, procedure calls, transaction control.
    Other,
}

impl CommandKind {
    /// Infers the kind from the first keyword of `sql`.
    #[must_use]
    pub fn infer(sql: &str) -> Self {
        let keyword = sql
            .trim_start_matches(|c: char| c.is_whitespace() || c == '(')
            .split(|c: char| !c.is_ascii_alphabetic())
            .next()
            .unwrap_or_default();
        match keyword.to_ascii_uppercase().as_str() {
            "SELECT" => Self::Select,
            "INSERT" => Self::Insert,
            "UPDATE" => Self::Update,
            "DELETE" => Self::Delete,
            _ => Self::Other,
        }
    }

    /// Returns the kind as stored in the `query_logs.command_kind` column.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Select => "select",
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A database command: text plus bound parameters.
#[derive(Debug, Clone)]
pub struct DbCommand {
    id: CommandId,
    text: String,
    parameters: Vec<(String, serde_json::Value)>,
}

impl DbCommand {
    /// Creates a new command object with a fresh identity.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: CommandId::new(),
            text: text.into(),
            parameters: Vec::new(),
        }
    }

    /// Appends a named parameter.
    #[must_use]
    pub fn bind(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.parameters.push((name.into(), value.into()));
        self
    }

    /// Replaces the command text, keeping the identity (pooled-command reuse).
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    /// Returns the command object's identity.
    #[must_use]
    pub const fn id(&self) -> CommandId {
        self.id
    }

    /// Returns the SQL text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Returns the statement kind inferred from the text.
    #[must_use]
    pub fn kind(&self) -> CommandKind {
        CommandKind::infer(&self.text)
    }

    /// Returns the parameters as a JSON object, or `None` when there are none.
    #[must_use]
    pub fn parameters_json(&self) -> Option<serde_json::Value> {
        if self.parameters.is_empty() {
            return None;
        }
        let map: serde_json::Map<String, serde_json::Value> =
            self.parameters.iter().cloned().collect();
        Some(serde_json::Value::Object(map))
    }
}
