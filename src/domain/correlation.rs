//! In-flight command bookkeeping.
//!
//! [`CorrelationStore`] links a command's start event to its completion
//! event. It is a sharded concurrent map (`DashMap`), so inserts and removals
//! from different request tasks only contend when they land on the same
//! shard. One store is owned by each interceptor instance.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::time::Instant;

use super::command::{CommandId, CommandKind, DbCommand};

/// Key of one in-flight execution: command identity plus a hash of its text.
///
/// A pooled command object that is re-issued with different text gets a
/// different key, so the two executions never share timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CorrelationKey {
    command_id: CommandId,
    text_hash: u64,
}

impl CorrelationKey {
    /// Builds the key for the current text of `command`.
    #[must_use]
    pub fn for_command(command: &DbCommand) -> Self {
        Self::new(command.id(), command.text())
    }

    /// Builds a key from an identity and a command text.
    #[must_use]
    pub fn new(command_id: CommandId, text: &str) -> Self {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        Self {
            command_id,
            text_hash: hasher.finish(),
        }
    }

    /// Returns the command identity half of the key.
    #[must_use]
    pub const fn command_id(&self) -> CommandId {
        self.command_id
    }
}

/// Metadata captured when a command starts. Never persisted.
#[derive(Debug, Clone)]
pub struct CorrelationEntry {
    /// Monotonic start instant used to compute elapsed time.
    pub started: Instant,
    /// Wall-clock start time, recorded as `issued_at`.
    pub issued_at: DateTime<Utc>,
    /// Command text at start time.
    pub command_text: String,
    /// Bound parameters, if any.
    pub parameters: Option<serde_json::Value>,
    /// Statement kind.
    pub command_kind: CommandKind,
}

impl CorrelationEntry {
    /// Captures the start state of `command` now.
    #[must_use]
    pub fn start(command: &DbCommand) -> Self {
        Self {
            started: Instant::now(),
            issued_at: Utc::now(),
            command_text: command.text().to_string(),
            parameters: command.parameters_json(),
            command_kind: command.kind(),
        }
    }
}

/// Concurrent map from [`CorrelationKey`] to [`CorrelationEntry`].
///
/// # Concurrency
///
/// - `register` and `take` are safe from any thread.
/// - `take` is atomic: of two racing completions for the same key, exactly
///   one receives the entry.
#[derive(Debug, Default)]
pub struct CorrelationStore {
    entries: DashMap<CorrelationKey, CorrelationEntry>,
}

impl CorrelationStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Registers a started command. A previous entry under the same key is
    /// replaced and returned (last start wins).
    pub fn register(&self, key: CorrelationKey, entry: CorrelationEntry) -> Option<CorrelationEntry> {
        self.entries.insert(key, entry)
    }

    /// Removes and returns the entry for `key`, if one is pending.
    pub fn take(&self, key: &CorrelationKey) -> Option<CorrelationEntry> {
        self.entries.remove(key).map(|(_, entry)| entry)
    }

    /// Returns `true` if an entry is pending for `key`.
    #[must_use]
    pub fn contains(&self, key: &CorrelationKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Returns the number of in-flight commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no command is in flight.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn register_and_take() {
        let store = CorrelationStore::new();
        let cmd = DbCommand::new("SELECT 1");
        let key = CorrelationKey::for_command(&cmd);

        assert!(store.register(key, CorrelationEntry::start(&cmd)).is_none());
        assert!(store.contains(&key));

        let Some(entry) = store.take(&key) else {
            panic!("entry should be pending");
        };
        assert_eq!(entry.command_text, "SELECT 1");
        assert!(store.is_empty());
    }

    #[test]
    fn second_take_returns_none() {
        let store = CorrelationStore::new();
        let cmd = DbCommand::new("SELECT 1");
        let key = CorrelationKey::for_command(&cmd);
        let _ = store.register(key, CorrelationEntry::start(&cmd));

        assert!(store.take(&key).is_some());
        assert!(store.take(&key).is_none());
    }

    #[test]
    fn last_start_wins() {
        let store = CorrelationStore::new();
        let cmd = DbCommand::new("SELECT 1").bind("p", 1);
        let key = CorrelationKey::for_command(&cmd);

        let _ = store.register(key, CorrelationEntry::start(&cmd));
        let replacement = CorrelationEntry::start(&cmd.clone().bind("p", 2));
        let previous = store.register(key, replacement);

        assert!(previous.is_some());
        assert_eq!(store.len(), 1);
        let Some(entry) = store.take(&key) else {
            panic!("entry should be pending");
        };
        let Some(params) = entry.parameters else {
            panic!("parameters expected");
        };
        assert_eq!(params.get("p"), Some(&serde_json::json!(2)));
    }

    #[test]
    fn same_object_different_text_gets_distinct_keys() {
        let mut cmd = DbCommand::new("SELECT * FROM appointments");
        let first = CorrelationKey::for_command(&cmd);
        cmd.set_text("SELECT * FROM doctors");
        let second = CorrelationKey::for_command(&cmd);

        assert_ne!(first, second);
        assert_eq!(first.command_id(), second.command_id());
    }

    #[test]
    fn distinct_objects_same_text_get_distinct_keys() {
        let a = DbCommand::new("SELECT 1");
        let b = DbCommand::new("SELECT 1");
        assert_ne!(CorrelationKey::for_command(&a), CorrelationKey::for_command(&b));
    }

    #[tokio::test]
    async fn concurrent_take_yields_entry_once() {
        let store = Arc::new(CorrelationStore::new());
        let cmd = DbCommand::new("SELECT 1");
        let key = CorrelationKey::for_command(&cmd);
        let _ = store.register(key, CorrelationEntry::start(&cmd));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move { store.take(&key).is_some() }));
        }

        let mut winners = 0;
        for handle in handles {
            let Ok(won) = handle.await else {
                panic!("task panicked");
            };
            if won {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
