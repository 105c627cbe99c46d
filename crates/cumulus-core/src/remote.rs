//! Remote client abstraction
//!
//! The reconciler talks to the vendor API only through [`RemoteClient`].
//! Implementations are stateless transports: every call is an independent
//! HTTP request whose status code carries the semantics (not-found,
//! conflict, rate-limited) and whose body is passed through untouched.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub const STATUS_UNAUTHORIZED: u16 = 401;
pub const STATUS_FORBIDDEN: u16 = 403;
pub const STATUS_NOT_FOUND: u16 = 404;
pub const STATUS_CONFLICT: u16 = 409;
pub const STATUS_TOO_MANY_REQUESTS: u16 = 429;

/// Status code and JSON body of one remote call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteResponse {
    pub status: u16,
    pub body: serde_json::Value,
}

impl RemoteResponse {
    pub fn new(status: u16, body: serde_json::Value) -> Self {
        Self { status, body }
    }

    /// A body-less response
    pub fn empty(status: u16) -> Self {
        Self::new(status, serde_json::Value::Null)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_not_found(&self) -> bool {
        self.status == STATUS_NOT_FOUND
    }

    pub fn is_conflict(&self) -> bool {
        self.status == STATUS_CONFLICT
    }

    /// Authentication or authorization failures never fix themselves
    pub fn is_auth_failure(&self) -> bool {
        matches!(self.status, STATUS_UNAUTHORIZED | STATUS_FORBIDDEN)
    }

    /// Body rendered for error messages
    pub fn body_text(&self) -> String {
        match &self.body {
            serde_json::Value::Null => String::new(),
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Transport for one resource collection of the vendor API
///
/// Errors are reserved for transport failures (connection, TLS, malformed
/// body); every HTTP answer, including 4xx/5xx, comes back as a
/// [`RemoteResponse`].
#[async_trait]
pub trait RemoteClient: Send + Sync {
    async fn create(&self, payload: &serde_json::Value) -> Result<RemoteResponse>;

    async fn get(&self, id: &str) -> Result<RemoteResponse>;

    async fn update(&self, id: &str, payload: &serde_json::Value) -> Result<RemoteResponse>;

    async fn delete(&self, id: &str) -> Result<RemoteResponse>;
}

#[async_trait]
impl<T: RemoteClient + ?Sized> RemoteClient for std::sync::Arc<T> {
    async fn create(&self, payload: &serde_json::Value) -> Result<RemoteResponse> {
        (**self).create(payload).await
    }

    async fn get(&self, id: &str) -> Result<RemoteResponse> {
        (**self).get(id).await
    }

    async fn update(&self, id: &str, payload: &serde_json::Value) -> Result<RemoteResponse> {
        (**self).update(id, payload).await
    }

    async fn delete(&self, id: &str) -> Result<RemoteResponse> {
        (**self).delete(id).await
    }
}
