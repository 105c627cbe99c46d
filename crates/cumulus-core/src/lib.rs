//! Cumulus Core
//!
//! Generic lifecycle reconciliation for remote cloud resources: create,
//! read, update and delete against an HTTP-style API, with waits for
//! asynchronous operations handled by a single operation poller.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                  Cumulus CLI                     │
//! │            (plan / apply / destroy)              │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                 cumulus-core                     │
//! │  ┌──────────────┐  ┌──────────────────────────┐ │
//! │  │    Engine    │──│  StateStore (.cumulus/)  │ │
//! │  └──────┬───────┘  └──────────────────────────┘ │
//! │  ┌──────▼───────────────────────────────────┐   │
//! │  │  Reconciler<R: Resource, C: RemoteClient> │   │
//! │  └──────┬───────────────────────────────────┘   │
//! │  ┌──────▼───────┐                               │
//! │  │    Poller    │  wait_for_state(policy, ...)  │
//! │  └──────────────┘                               │
//! └───────┬─────────────────────────────────────────┘
//!         │
//! ┌───────▼───────────┐
//! │ cumulus-opencloud │  (backup policy, network, subnet, ELB, ...)
//! └───────────────────┘
//! ```

pub mod action;
pub mod engine;
pub mod error;
pub mod poller;
pub mod reconciler;
pub mod remote;
pub mod resource;
pub mod state;
pub mod validate;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-exports
pub use action::{Action, ActionResult, ActionType, ApplyResult, Plan, PlanSummary, resource_key};
pub use engine::{Assessment, DesiredResource, Engine, Reconcile, RefreshSummary};
pub use error::{ReconcileError, Result, ValidationError};
pub use poller::{
    PollError, PollOutcome, PollPolicy, PollStatus, Refresh, RefreshError, StatusSource,
    wait_for_state,
};
pub use reconciler::Reconciler;
pub use remote::{RemoteClient, RemoteResponse};
pub use resource::{Changes, Identified, ImmutableFields, Provisioning, Resource};
pub use state::{FileStateStore, ResourceRecord, StateLock, StateStore};
