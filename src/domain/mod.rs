//! Domain layer: log record types, command identity, and correlation.
//!
//! This module contains the audit layer's data model: change-log and
//! query-log records, the command identity used to correlate start and
//! completion events, the entity abstraction the unit of work diffs, and
//! the explicit request context that replaces ambient caller lookup.

pub mod appointment;
pub mod change_log;
pub mod command;
pub mod correlation;
pub mod entity;
pub mod query_log;
pub mod request_context;
pub mod sql_text;

pub use appointment::{Appointment, AppointmentStatus};
pub use change_log::{ChangeKind, ChangeLogRecord, NewChangeLog};
pub use command::{CommandId, CommandKind, DbCommand};
pub use correlation::{CorrelationEntry, CorrelationKey, CorrelationStore};
pub use entity::{Entity, FieldMap};
pub use query_log::{NewQueryLog, QueryLogCandidate, QueryLogRecord, QueryLogStats};
pub use request_context::RequestContext;
