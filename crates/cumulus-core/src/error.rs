//! Reconciliation error types

use crate::poller::PollError;
use std::time::Duration;
use thiserror::Error;

/// A spec rejected before any request was sent
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{field}: {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }

    /// Two fields that must not be set together
    pub fn conflict(field: &'static str, other: &'static str) -> Self {
        Self::new(field, format!("conflicts with `{}`", other))
    }
}

/// Reconciler errors
#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("Invalid {kind} spec: {source}")]
    Validation {
        kind: &'static str,
        #[source]
        source: ValidationError,
    },

    #[error("Changing {fields:?} on {kind} {id} requires replacement")]
    RequiresReplacement {
        kind: &'static str,
        id: String,
        fields: Vec<&'static str>,
    },

    #[error("Remote API error ({status}): {body}")]
    Remote { status: u16, body: String },

    #[error("Error creating {kind}: remote returned {status}: {body}")]
    RemoteCreate {
        kind: &'static str,
        status: u16,
        body: String,
    },

    #[error("Error updating {kind} {id}: remote returned {status}: {body}")]
    RemoteUpdate {
        kind: &'static str,
        id: String,
        status: u16,
        body: String,
    },

    #[error("Error deleting {kind} {id}: remote returned {status}: {body}")]
    RemoteDelete {
        kind: &'static str,
        id: String,
        status: u16,
        body: String,
    },

    #[error("{kind} {id} no longer exists")]
    ResourceGone { kind: &'static str, id: String },

    #[error(
        "Timed out after {elapsed:?} waiting for {kind} {id} to become ready (last status: {})",
        last_status.as_deref().unwrap_or("none")
    )]
    ProvisioningTimeout {
        kind: &'static str,
        id: String,
        last_status: Option<String>,
        elapsed: Duration,
    },

    #[error("Timed out after {elapsed:?} waiting for {kind} {id} to be deleted")]
    DeletionTimeout {
        kind: &'static str,
        id: String,
        elapsed: Duration,
    },

    #[error("Operation on {kind} {id} was cancelled")]
    Cancelled { kind: &'static str, id: String },

    #[error("Waiting on {kind} {id} failed: {source}")]
    Poll {
        kind: &'static str,
        id: String,
        #[source]
        source: PollError,
    },

    #[error("Unexpected response body: {0}")]
    Decode(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("No reconciler registered for kind `{0}`")]
    UnknownKind(String),

    #[error("State file error: {0}")]
    State(String),

    #[error("Lock acquisition failed: {0}")]
    Lock(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ReconcileError {
    /// HTTP status carried by remote rejections
    pub fn status(&self) -> Option<u16> {
        match self {
            ReconcileError::Remote { status, .. }
            | ReconcileError::RemoteCreate { status, .. }
            | ReconcileError::RemoteUpdate { status, .. }
            | ReconcileError::RemoteDelete { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ReconcileError::Validation { .. } | ReconcileError::RequiresReplacement { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ReconcileError>;
