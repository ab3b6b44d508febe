//! Command interception: timing, correlation, and the persist decision.

use std::fmt::Display;
use std::future::Future;

use crate::config::QueryLogSettings;
use crate::domain::{
    CommandKind, CorrelationEntry, CorrelationKey, CorrelationStore, DbCommand, QueryLogCandidate,
    RequestContext,
};

use super::writer::BackgroundLogWriter;

/// Pure persist decision for a completed command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryPolicy {
    heavy_query_threshold_ms: u64,
    log_all_queries: bool,
}

impl QueryPolicy {
    /// Builds the policy from interceptor settings.
    #[must_use]
    pub const fn from_settings(settings: &QueryLogSettings) -> Self {
        Self {
            heavy_query_threshold_ms: settings.heavy_query_threshold_ms,
            log_all_queries: settings.log_all_queries,
        }
    }

    /// Returns `true` if `elapsed_ms` meets the (inclusive) heavy threshold.
    #[must_use]
    pub const fn is_heavy(&self, elapsed_ms: u64) -> bool {
        elapsed_ms >= self.heavy_query_threshold_ms
    }

    /// Decides whether to persist a completed command.
    ///
    /// Returns `Some(is_heavy)` when the command should be logged, `None`
    /// when it should be discarded.
    #[must_use]
    pub const fn evaluate(&self, elapsed_ms: u64, errored: bool) -> Option<bool> {
        let heavy = self.is_heavy(elapsed_ms);
        if heavy || errored || self.log_all_queries {
            Some(heavy)
        } else {
            None
        }
    }
}

/// Outcome of a matched completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletedCommand {
    /// Elapsed time between start and completion, in milliseconds.
    pub elapsed_ms: u64,
    /// Statement kind.
    pub command_kind: CommandKind,
    /// Whether the elapsed time met the heavy threshold.
    pub is_heavy: bool,
    /// Whether the command failed.
    pub errored: bool,
    /// Whether a query-log candidate was accepted by the writer.
    pub dispatched: bool,
}

/// Observes database commands and hands slow or failing ones to the
/// [`BackgroundLogWriter`].
///
/// Settings are fixed at construction. With `enabled = false` every
/// callback is a no-op.
#[derive(Debug)]
pub struct CommandInterceptor {
    enabled: bool,
    policy: QueryPolicy,
    correlations: CorrelationStore,
    writer: BackgroundLogWriter,
}

impl CommandInterceptor {
    /// Creates an interceptor feeding `writer`.
    #[must_use]
    pub fn new(settings: QueryLogSettings, writer: BackgroundLogWriter) -> Self {
        Self {
            enabled: settings.enabled,
            policy: QueryPolicy::from_settings(&settings),
            correlations: CorrelationStore::new(),
            writer,
        }
    }

    /// Returns the persist policy in effect.
    #[must_use]
    pub const fn policy(&self) -> QueryPolicy {
        self.policy
    }

    /// Number of commands started but not yet completed.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.correlations.len()
    }

    /// Records the start of `command`.
    ///
    /// A second start for the same command and text before completion
    /// replaces the first.
    pub fn on_start(&self, command: &DbCommand) {
        if !self.enabled {
            return;
        }
        let key = CorrelationKey::for_command(command);
        if self
            .correlations
            .register(key, CorrelationEntry::start(command))
            .is_some()
        {
            tracing::debug!(
                command_id = %key.command_id(),
                "command restarted before completion, keeping latest start"
            );
        }
    }

    /// Records the completion of `command`, dispatching a query-log
    /// candidate when the policy says so.
    ///
    /// Returns `None` if the interceptor is disabled or no start is pending
    /// for this command (including a repeated completion).
    pub fn on_complete(
        &self,
        command: &DbCommand,
        error: Option<&str>,
        ctx: &RequestContext,
    ) -> Option<CompletedCommand> {
        if !self.enabled {
            return None;
        }
        let key = CorrelationKey::for_command(command);
        let Some(entry) = self.correlations.take(&key) else {
            tracing::debug!(command_id = %key.command_id(), "completion without matching start");
            return None;
        };

        let elapsed_ms = u64::try_from(entry.started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let errored = error.is_some();
        let decision = self.policy.evaluate(elapsed_ms, errored);
        let is_heavy = decision.unwrap_or(false);

        if is_heavy {
            tracing::warn!(
                elapsed_ms,
                threshold_ms = self.policy.heavy_query_threshold_ms,
                kind = %entry.command_kind,
                endpoint = ctx.endpoint.as_deref().unwrap_or("-"),
                "heavy query"
            );
        }

        let command_kind = entry.command_kind;
        let dispatched = decision.is_some_and(|is_heavy| {
            self.writer.enqueue(QueryLogCandidate {
                command_text: entry.command_text,
                parameters: entry.parameters,
                duration_ms: elapsed_ms,
                issued_at: entry.issued_at,
                command_kind,
                is_heavy,
                error_message: error.map(ToString::to_string),
                context: ctx.clone(),
            })
        });

        Some(CompletedCommand {
            elapsed_ms,
            command_kind,
            is_heavy,
            errored,
            dispatched,
        })
    }

    /// Runs `fut` as the execution of `command`, returning its output
    /// unchanged.
    ///
    /// If `fut` is dropped before completing, the command is completed as
    /// failed with [`CANCELLED`], so a slow statement whose caller went away
    /// still leaves a record.
    pub async fn instrument<T, E, F>(
        &self,
        command: &DbCommand,
        ctx: &RequestContext,
        fut: F,
    ) -> Result<T, E>
    where
        E: Display,
        F: Future<Output = Result<T, E>>,
    {
        self.on_start(command);
        let mut guard = PendingGuard {
            interceptor: self,
            command,
            ctx,
            armed: self.enabled,
        };

        let result = fut.await;
        guard.armed = false;

        let error = result.as_ref().err().map(ToString::to_string);
        let _ = self.on_complete(command, error.as_deref(), ctx);
        result
    }
}

/// Error text recorded for a command whose future was dropped mid-flight.
pub const CANCELLED: &str = "cancelled";

/// Completes a pending start as failed if the instrumented future is dropped.
struct PendingGuard<'a> {
    interceptor: &'a CommandInterceptor,
    command: &'a DbCommand,
    ctx: &'a RequestContext,
    armed: bool,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            // enqueue never blocks, so completing here is safe inside drop
            let _ = self
                .interceptor
                .on_complete(self.command, Some(CANCELLED), self.ctx);
        }
    }
}
