//! # appointment-audit
//!
//! Audit trail and query instrumentation for the appointment-scheduling
//! persistence layer.
//!
//! Two independent mechanisms share one crate:
//!
//! - **Change logs.** [`persistence::UnitOfWork`] diffs tracked entities on
//!   save and writes one before/after record per mutated row, as a second
//!   write after the business commit.
//! - **Query logs.** [`instrumentation::CommandInterceptor`] times every
//!   database command, and slow, failing, or (optionally) all commands are
//!   persisted off the request path by the
//!   [`instrumentation::BackgroundLogWriter`].
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP)
//!     │
//!     ├── REST Handlers (api/)  ── RequestContext extractor
//!     │
//!     ├── AppointmentService, LogService (service/)
//!     │
//!     ├── UnitOfWork (persistence/) ──► change_logs
//!     │
//!     ├── PostgresStore ── CommandInterceptor (instrumentation/)
//!     │                         │
//!     │                         └── BackgroundLogWriter ──► query_logs
//!     │
//!     └── PostgreSQL (or MemoryStore)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod instrumentation;
pub mod persistence;
pub mod service;
