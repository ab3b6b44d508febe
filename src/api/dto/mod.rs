//! Data Transfer Objects for REST request/response serialization.
//!
//! Log records are served as their domain types; only list envelopes and
//! query parameters get dedicated DTOs.

pub mod appointment_dto;
pub mod change_log_dto;
pub mod common_dto;
pub mod query_log_dto;

pub use appointment_dto::*;
pub use change_log_dto::*;
pub use common_dto::*;
pub use query_log_dto::*;
