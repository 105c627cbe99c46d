//! Typed resource definitions
//!
//! A [`Resource`] ties one kind of remote object to its desired spec, its
//! observed state, and the request bodies the vendor API expects. The
//! reconciler is generic over it, so a resource type only has to describe
//! the mapping; the lifecycle and polling live in one place.

use crate::error::{Result, ValidationError};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt::Debug;

/// Observed state keyed by the remote-assigned ID
pub trait Identified {
    fn id(&self) -> &str;
}

/// Statuses to wait for after an asynchronous create
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Provisioning {
    pub targets: &'static [&'static str],
    /// In-progress allow-list; `None` keeps waiting on any other status
    pub pending: Option<&'static [&'static str]>,
}

impl Provisioning {
    pub const fn new(targets: &'static [&'static str]) -> Self {
        Self {
            targets,
            pending: None,
        }
    }

    pub const fn with_pending(mut self, pending: &'static [&'static str]) -> Self {
        self.pending = Some(pending);
        self
    }
}

/// Field-level difference between a spec and the observed state
#[derive(Debug, Clone, PartialEq)]
pub enum Changes<U> {
    Unchanged,
    /// Partial request carrying only the changed fields
    Update(U),
    /// Immutable fields changed; the resource must be recreated
    Replace(Vec<&'static str>),
}

impl<U: Default + PartialEq> Changes<U> {
    /// `Unchanged` when no field of the request is set
    pub fn from_update(update: U) -> Self {
        if update == U::default() {
            Changes::Unchanged
        } else {
            Changes::Update(update)
        }
    }
}

impl<U> Changes<U> {
    pub fn is_unchanged(&self) -> bool {
        matches!(self, Changes::Unchanged)
    }
}

/// `Some(desired)` when it differs from `current`
pub fn diff_field<T: PartialEq + Clone>(desired: &T, current: &T) -> Option<T> {
    (desired != current).then(|| desired.clone())
}

/// Optional desired field: unset means "leave as is"
pub fn diff_optional<T: PartialEq + Clone>(desired: &Option<T>, current: &T) -> Option<T> {
    desired.as_ref().and_then(|d| diff_field(d, current))
}

/// Collects immutable fields whose desired value differs
#[derive(Debug, Default)]
pub struct ImmutableFields(Vec<&'static str>);

impl ImmutableFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check<T: PartialEq>(mut self, field: &'static str, desired: &T, current: &T) -> Self {
        if desired != current {
            self.0.push(field);
        }
        self
    }

    /// Returns the changed fields, or `None` when all match
    pub fn changed(self) -> Option<Vec<&'static str>> {
        (!self.0.is_empty()).then_some(self.0)
    }
}

/// Mapping between one remote object kind and its typed records
pub trait Resource: Send + Sync {
    type Spec: Clone + Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync;
    type Observed: Identified + Clone + Debug + Serialize + DeserializeOwned + Send + Sync;
    type CreateRequest: Serialize + Send + Sync;
    type UpdateRequest: Serialize + Send + Sync;

    /// Kind name used in state keys and messages (e.g. "backup_policy")
    fn kind(&self) -> &'static str;

    /// Pre-flight checks; a failure means no request is sent
    fn validate(&self, spec: &Self::Spec) -> std::result::Result<(), ValidationError>;

    fn create_request(&self, spec: &Self::Spec) -> Self::CreateRequest;

    /// Remote ID from a successful create response
    fn created_id(&self, body: &serde_json::Value) -> Result<String>;

    fn changes(&self, spec: &Self::Spec, previous: &Self::Observed) -> Changes<Self::UpdateRequest>;

    /// Map a get response body into observed state
    fn observe(&self, id: &str, body: &serde_json::Value) -> Result<Self::Observed>;

    /// Status field of a get response body, if the kind has one
    fn status(&self, _body: &serde_json::Value) -> Option<String> {
        None
    }

    /// `Some` when creation completes asynchronously
    fn provisioning(&self) -> Option<Provisioning> {
        None
    }

    /// `Some` when an update completes asynchronously
    fn updating(&self) -> Option<Provisioning> {
        None
    }

    /// Statuses that mean the object is broken (stop waiting on delete)
    fn failed_statuses(&self) -> &'static [&'static str] {
        &[]
    }
}
