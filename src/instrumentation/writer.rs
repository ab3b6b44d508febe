//! Bounded background writer for query-log records.
//!
//! Candidates from the interceptor are pushed onto a bounded in-memory queue
//! and persisted by a small pool of tokio worker tasks that own their own
//! store handle. The request path only ever takes a short mutex to push.
//!
//! ```text
//! CommandInterceptor ──enqueue──► VecDeque (capacity N) ──► worker 0..W ──► QueryLogStore
//!                                    │ full
//!                                    └─► OverflowPolicy: drop oldest | drop newest
//! ```
//!
//! Failures never leave the worker: store errors and panics are caught per
//! record, counted, and logged at `error`.

use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::FutureExt;
use serde::Serialize;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use utoipa::ToSchema;

use crate::config::{OverflowPolicy, WriterSettings};
use crate::domain::query_log::{MAX_COMMAND_TEXT_CHARS, QUERY_LOG_TABLE};
use crate::domain::sql_text::{extract_tables, references_table, truncate_chars};
use crate::domain::{NewQueryLog, QueryLogCandidate};
use crate::error::AuditError;
use crate::persistence::QueryLogStore;

/// Snapshot of the writer's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct WriterStats {
    /// Candidates accepted onto the queue.
    pub enqueued: u64,
    /// Records persisted.
    pub written: u64,
    /// Candidates discarded by the overflow policy or after shutdown.
    pub dropped: u64,
    /// Candidates discarded because they target the query-log table.
    pub skipped: u64,
    /// Records whose write returned an error or panicked.
    pub failed: u64,
    /// Candidates currently waiting in the queue.
    pub queued: u64,
}

#[derive(Debug, Default)]
struct Counters {
    enqueued: AtomicU64,
    written: AtomicU64,
    dropped: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

#[derive(Debug, Default)]
struct Queue {
    items: VecDeque<QueryLogCandidate>,
    closed: bool,
}

#[derive(Debug)]
struct Shared {
    queue: Mutex<Queue>,
    notify: Notify,
    capacity: usize,
    overflow: OverflowPolicy,
    counters: Counters,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Queue> {
        // Critical sections never panic, so a poisoned queue is still consistent.
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

enum Next {
    Item(QueryLogCandidate),
    Wait,
    Stop,
}

/// Handle to the background query-log writer.
///
/// Cloning the handle is cheap; all clones feed the same queue and workers.
#[derive(Debug, Clone)]
pub struct BackgroundLogWriter {
    shared: Arc<Shared>,
    workers: Arc<tokio::sync::Mutex<Vec<JoinHandle<()>>>>,
}

impl BackgroundLogWriter {
    /// Starts `settings.workers` worker tasks (at least one) persisting
    /// through `store`.
    ///
    /// `store` should be an instance without an interceptor attached, so the
    /// writer's own inserts are never re-observed. Must be called from within
    /// a tokio runtime.
    #[must_use]
    pub fn spawn(store: Arc<dyn QueryLogStore>, settings: WriterSettings) -> Self {
        let shared = Arc::new(Shared {
            queue: Mutex::new(Queue::default()),
            notify: Notify::new(),
            capacity: settings.queue_capacity.max(1),
            overflow: settings.overflow,
            counters: Counters::default(),
        });

        let workers = (0..settings.workers.max(1))
            .map(|worker| {
                let shared = Arc::clone(&shared);
                let store = Arc::clone(&store);
                tokio::spawn(run_worker(worker, shared, store))
            })
            .collect();

        tracing::debug!(
            workers = settings.workers.max(1),
            capacity = shared.capacity,
            overflow = ?shared.overflow,
            "query log writer started"
        );

        Self {
            shared,
            workers: Arc::new(tokio::sync::Mutex::new(workers)),
        }
    }

    /// Queues `candidate` for persistence without waiting.
    ///
    /// Returns `false` if the candidate itself was discarded: the queue is
    /// full under [`OverflowPolicy::DropNewest`], or the writer is shut down.
    /// Under [`OverflowPolicy::DropOldest`] the oldest queued candidate is
    /// evicted instead and this returns `true`.
    pub fn enqueue(&self, candidate: QueryLogCandidate) -> bool {
        let counters = &self.shared.counters;
        {
            let mut queue = self.shared.lock();
            if queue.closed {
                Counters::bump(&counters.dropped);
                tracing::warn!("query log writer is shut down, dropping record");
                return false;
            }
            if queue.items.len() >= self.shared.capacity {
                Counters::bump(&counters.dropped);
                match self.shared.overflow {
                    OverflowPolicy::DropOldest => {
                        queue.items.pop_front();
                        tracing::warn!(
                            capacity = self.shared.capacity,
                            "query log queue full, dropped oldest record"
                        );
                    }
                    OverflowPolicy::DropNewest => {
                        tracing::warn!(
                            capacity = self.shared.capacity,
                            "query log queue full, dropped newest record"
                        );
                        return false;
                    }
                }
            }
            queue.items.push_back(candidate);
        }
        Counters::bump(&counters.enqueued);
        self.shared.notify.notify_one();
        true
    }

    /// Returns the current counters.
    #[must_use]
    pub fn stats(&self) -> WriterStats {
        let c = &self.shared.counters;
        let queued = self.shared.lock().items.len() as u64;
        WriterStats {
            enqueued: c.enqueued.load(Ordering::Relaxed),
            written: c.written.load(Ordering::Relaxed),
            dropped: c.dropped.load(Ordering::Relaxed),
            skipped: c.skipped.load(Ordering::Relaxed),
            failed: c.failed.load(Ordering::Relaxed),
            queued,
        }
    }

    /// Closes the queue, waits for workers to drain it, and joins them.
    ///
    /// Later calls return immediately. Candidates enqueued after shutdown
    /// are dropped.
    pub async fn shutdown(&self) {
        self.shared.lock().closed = true;
        self.shared.notify.notify_waiters();

        let handles = std::mem::take(&mut *self.workers.lock().await);
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "query log worker terminated abnormally");
            }
        }
        let stats = self.stats();
        tracing::info!(
            written = stats.written,
            dropped = stats.dropped,
            failed = stats.failed,
            "query log writer stopped"
        );
    }
}

async fn run_worker(worker: usize, shared: Arc<Shared>, store: Arc<dyn QueryLogStore>) {
    loop {
        let notified = shared.notify.notified();
        tokio::pin!(notified);
        // Register interest before inspecting the queue so a close or push
        // between the check and the await is not missed.
        notified.as_mut().enable();

        let next = {
            let mut queue = shared.lock();
            match queue.items.pop_front() {
                Some(candidate) => Next::Item(candidate),
                None if queue.closed => Next::Stop,
                None => Next::Wait,
            }
        };

        match next {
            Next::Item(candidate) => persist(worker, &shared, store.as_ref(), candidate).await,
            Next::Wait => notified.await,
            Next::Stop => break,
        }
    }
    tracing::debug!(worker, "query log worker exiting");
}

async fn persist(
    worker: usize,
    shared: &Shared,
    store: &dyn QueryLogStore,
    candidate: QueryLogCandidate,
) {
    let counters = &shared.counters;
    let Some(record) = prepare(candidate) else {
        Counters::bump(&counters.skipped);
        return;
    };

    match AssertUnwindSafe(store.insert_query_log(&record))
        .catch_unwind()
        .await
    {
        Ok(Ok(id)) => {
            Counters::bump(&counters.written);
            tracing::debug!(worker, id, duration_ms = record.duration_ms, "query log written");
        }
        Ok(Err(e)) => {
            Counters::bump(&counters.failed);
            let e = AuditError::QueryLogWrite(e.to_string());
            tracing::error!(worker, error = %e, "failed to persist query log");
        }
        Err(_) => {
            Counters::bump(&counters.failed);
            tracing::error!(worker, "query log write panicked");
        }
    }
}

/// Turns a candidate into an insertable row.
///
/// Returns `None` for commands that reference the query-log table, so the
/// writer's own inserts (and reads of the log) are never logged.
#[must_use]
pub fn prepare(candidate: QueryLogCandidate) -> Option<NewQueryLog> {
    let tables = extract_tables(&candidate.command_text);
    if references_table(&tables, QUERY_LOG_TABLE) {
        return None;
    }

    Some(NewQueryLog {
        user_id: candidate.context.user_id,
        command_text: truncate_chars(&candidate.command_text, MAX_COMMAND_TEXT_CHARS),
        parameters: candidate.parameters,
        duration_ms: i64::try_from(candidate.duration_ms).unwrap_or(i64::MAX),
        issued_at: candidate.issued_at,
        command_kind: candidate.command_kind,
        tables_referenced: (!tables.is_empty()).then_some(tables),
        client_address: candidate.context.client_address,
        endpoint: candidate.context.endpoint,
        is_heavy: candidate.is_heavy,
        error_message: candidate.error_message,
    })
}
