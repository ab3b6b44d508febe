//! Caller identity for log records.

use serde::{Deserialize, Serialize};

/// Who issued a database operation, and from where.
///
/// Built once per HTTP request (see [`crate::api::extract`]) and passed
/// explicitly to [`crate::persistence::UnitOfWork::save`] and the command
/// interceptor. Every field is optional: background jobs carry none of them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    /// Authenticated user id.
    pub user_id: Option<String>,
    /// Client IP address.
    pub client_address: Option<String>,
    /// Matched route (e.g. `"/api/v1/appointments/{id}"`).
    pub endpoint: Option<String>,
}

impl RequestContext {
    /// Context with no caller information, for background work.
    #[must_use]
    pub fn background() -> Self {
        Self::default()
    }

    /// Sets the user id.
    #[must_use]
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Sets the client address.
    #[must_use]
    pub fn with_client_address(mut self, address: impl Into<String>) -> Self {
        self.client_address = Some(address.into());
        self
    }

    /// Sets the endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }
}
