//! Lifecycle reconciler
//!
//! Drives create/read/update/delete for one resource instance. Each call is
//! one sequential chain (request, optional wait, read-back); the caller must
//! not run two operations on the same ID concurrently. Rejected requests are
//! never retried here; only the polling of an accepted operation is.

use crate::error::{ReconcileError, Result};
use crate::poller::{
    PollError, PollPolicy, Refresh, RefreshError, StatusSource, wait_for_state,
};
use crate::remote::{RemoteClient, RemoteResponse};
use crate::resource::{Changes, Provisioning, Resource};
use async_trait::async_trait;
use cumulus_config::{ProviderConfig, Timeouts};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Pseudo-status of an object that still exists while we wait for it to go
const AVAILABLE: &str = "available";

#[derive(Debug, Clone, Copy)]
enum Phase {
    Create,
    Update,
    Delete,
}

/// Reconciler for one resource kind against one remote collection
pub struct Reconciler<'a, R, C> {
    resource: R,
    client: C,
    config: &'a ProviderConfig,
    timeouts: Timeouts,
    cancel: CancellationToken,
}

impl<'a, R, C> Reconciler<'a, R, C>
where
    R: Resource,
    C: RemoteClient,
{
    pub fn new(resource: R, client: C, config: &'a ProviderConfig) -> Self {
        Self {
            resource,
            client,
            config,
            timeouts: config.timeouts,
            cancel: CancellationToken::new(),
        }
    }

    /// Per-resource timeouts overriding the provider defaults
    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Token observed by every wait in addition to its deadline
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn resource(&self) -> &R {
        &self.resource
    }

    pub fn kind(&self) -> &'static str {
        self.resource.kind()
    }

    pub fn validate(&self, spec: &R::Spec) -> Result<()> {
        self.resource
            .validate(spec)
            .map_err(|source| ReconcileError::Validation {
                kind: self.kind(),
                source,
            })
    }

    /// Create the resource and return its read-back state
    pub async fn create(&self, spec: &R::Spec) -> Result<R::Observed> {
        self.validate(spec)?;
        let kind = self.kind();

        let payload = serde_json::to_value(self.resource.create_request(spec))?;
        tracing::info!("Creating {}", kind);
        let response = self.client.create(&payload).await?;
        if !response.is_success() {
            return Err(ReconcileError::RemoteCreate {
                kind,
                status: response.status,
                body: response.body_text(),
            });
        }

        let id = self.resource.created_id(&response.body)?;
        tracing::info!("Created {} {}", kind, id);

        if let Some(provisioning) = self.resource.provisioning() {
            tracing::debug!("Waiting for {} ({}) to become available", kind, id);
            self.wait_ready(&id, provisioning, self.timeouts.create(), Phase::Create)
                .await?;
        }

        self.read(&id)
            .await?
            .ok_or_else(|| ReconcileError::ResourceGone { kind, id })
    }

    /// Fetch the remote representation; `None` means the resource is gone
    pub async fn read(&self, id: &str) -> Result<Option<R::Observed>> {
        if id.is_empty() {
            return Ok(None);
        }

        let response = self.client.get(id).await?;
        if response.is_not_found() {
            tracing::info!("{} {} no longer exists", self.kind(), id);
            return Ok(None);
        }
        if !response.is_success() {
            return Err(remote_error(&response));
        }

        let observed = self.resource.observe(id, &response.body)?;
        tracing::debug!("Read {} {}: {:?}", self.kind(), id, observed);
        Ok(Some(observed))
    }

    /// Send only the fields that differ from `previous`, then re-read
    ///
    /// An unchanged spec returns `previous` without any remote call.
    pub async fn update(
        &self,
        id: &str,
        spec: &R::Spec,
        previous: &R::Observed,
    ) -> Result<Option<R::Observed>> {
        if id.is_empty() {
            return Ok(None);
        }
        self.validate(spec)?;
        let kind = self.kind();

        let request = match self.resource.changes(spec, previous) {
            Changes::Unchanged => {
                tracing::debug!("{} {} is up to date", kind, id);
                return Ok(Some(previous.clone()));
            }
            Changes::Replace(fields) => {
                return Err(ReconcileError::RequiresReplacement {
                    kind,
                    id: id.to_string(),
                    fields,
                });
            }
            Changes::Update(request) => request,
        };

        let payload = serde_json::to_value(&request)?;
        tracing::info!("Updating {} {}", kind, id);
        let response = self.client.update(id, &payload).await?;
        if response.is_not_found() {
            tracing::info!("{} {} disappeared before it could be updated", kind, id);
            return Ok(None);
        }
        if !response.is_success() {
            return Err(ReconcileError::RemoteUpdate {
                kind,
                id: id.to_string(),
                status: response.status,
                body: response.body_text(),
            });
        }

        if let Some(provisioning) = self.resource.updating() {
            self.wait_ready(id, provisioning, self.timeouts.update(), Phase::Update)
                .await?;
        }

        self.read(id).await
    }

    /// Delete the resource and wait until the remote reports it gone
    ///
    /// Deleting an absent resource succeeds without issuing a delete.
    pub async fn delete(&self, id: &str) -> Result<()> {
        if id.is_empty() {
            return Ok(());
        }
        let kind = self.kind();

        let current = self.client.get(id).await?;
        if current.is_not_found() {
            tracing::info!("{} {} is already deleted", kind, id);
            return Ok(());
        }
        if !current.is_success() && !current.is_conflict() {
            return Err(remote_error(&current));
        }

        let mut watch = DeletionWatch {
            resource: &self.resource,
            client: &self.client,
            id,
            delete_pending: true,
            rejected: None,
        };
        match watch.issue_delete().await? {
            DeleteAttempt::Gone => {
                tracing::info!("Successfully deleted {} {}", kind, id);
                return Ok(());
            }
            DeleteAttempt::Accepted | DeleteAttempt::Busy => {}
            DeleteAttempt::Rejected(response) => return Err(self.delete_error(id, &response)),
        }

        let policy = PollPolicy::until_gone()
            .with_pending([AVAILABLE])
            .with_timeout(self.timeouts.delete())
            .with_polling(&self.config.polling);
        let waited = wait_for_state(&policy, &mut watch, &self.cancel).await;
        if let Some(response) = watch.rejected.take() {
            return Err(self.delete_error(id, &response));
        }
        waited.map_err(|e| self.poll_error(id, e, Phase::Delete))?;

        tracing::info!("Successfully deleted {} {}", kind, id);
        Ok(())
    }

    /// Adopt an existing remote object by ID
    pub async fn import(&self, id: &str) -> Result<R::Observed> {
        self.read(id)
            .await?
            .ok_or_else(|| ReconcileError::ResourceGone {
                kind: self.kind(),
                id: id.to_string(),
            })
    }

    async fn wait_ready(
        &self,
        id: &str,
        provisioning: Provisioning,
        timeout: Duration,
        phase: Phase,
    ) -> Result<()> {
        let mut policy = PollPolicy::new(provisioning.targets.iter().copied())
            .with_timeout(timeout)
            .with_polling(&self.config.polling);
        if let Some(pending) = provisioning.pending {
            policy = policy.with_pending(pending.iter().copied());
        }

        let mut lookup = StatusLookup {
            resource: &self.resource,
            client: &self.client,
            id,
        };
        let outcome = wait_for_state(&policy, &mut lookup, &self.cancel)
            .await
            .map_err(|e| self.poll_error(id, e, phase))?;
        tracing::debug!(
            "{} {} reached {} after {} polls",
            self.kind(),
            id,
            outcome.status,
            outcome.polls
        );
        Ok(())
    }

    fn delete_error(&self, id: &str, response: &RemoteResponse) -> ReconcileError {
        ReconcileError::RemoteDelete {
            kind: self.kind(),
            id: id.to_string(),
            status: response.status,
            body: response.body_text(),
        }
    }

    fn poll_error(&self, id: &str, err: PollError, phase: Phase) -> ReconcileError {
        let kind = self.kind();
        let id = id.to_string();
        match (err, phase) {
            (PollError::TimedOut { elapsed, .. }, Phase::Delete) => {
                ReconcileError::DeletionTimeout { kind, id, elapsed }
            }
            (
                PollError::TimedOut {
                    last_status,
                    elapsed,
                    ..
                },
                Phase::Create | Phase::Update,
            ) => ReconcileError::ProvisioningTimeout {
                kind,
                id,
                last_status,
                elapsed,
            },
            (PollError::Cancelled { .. }, _) => ReconcileError::Cancelled { kind, id },
            (source, _) => ReconcileError::Poll { kind, id, source },
        }
    }
}

fn remote_error(response: &RemoteResponse) -> ReconcileError {
    ReconcileError::Remote {
        status: response.status,
        body: response.body_text(),
    }
}

/// Classify a failed lookup for the poller
fn refresh_error(response: &RemoteResponse) -> RefreshError {
    let message = format!("{}: {}", response.status, response.body_text());
    if response.is_auth_failure() {
        RefreshError::Hard(message)
    } else {
        RefreshError::Transient(message)
    }
}

/// Status lookups while waiting for a create or update to settle
struct StatusLookup<'r, R, C> {
    resource: &'r R,
    client: &'r C,
    id: &'r str,
}

#[async_trait]
impl<'r, R: Resource, C: RemoteClient> StatusSource for StatusLookup<'r, R, C> {
    async fn refresh(&mut self) -> std::result::Result<Refresh, RefreshError> {
        let response = self
            .client
            .get(self.id)
            .await
            .map_err(|e| RefreshError::Transient(e.to_string()))?;
        if response.is_not_found() {
            return Ok(Refresh::NotFound);
        }
        if !response.is_success() {
            return Err(refresh_error(&response));
        }
        self.resource
            .status(&response.body)
            .map(Refresh::Status)
            .ok_or_else(|| RefreshError::Transient("response carries no status".to_string()))
    }
}

/// Status lookups while waiting for a delete
///
/// A delete rejected with a conflict (resource busy) is re-issued on the
/// next iteration; a conflict on lookup counts as still pending. Any other
/// rejection of a re-issued delete ends the wait and is kept in `rejected`.
struct DeletionWatch<'r, R, C> {
    resource: &'r R,
    client: &'r C,
    id: &'r str,
    delete_pending: bool,
    rejected: Option<RemoteResponse>,
}

enum DeleteAttempt {
    Gone,
    Accepted,
    /// Conflict: the object is still in use
    Busy,
    Rejected(RemoteResponse),
}

impl<R: Resource, C: RemoteClient> DeletionWatch<'_, R, C> {
    async fn issue_delete(&mut self) -> Result<DeleteAttempt> {
        let response = self.client.delete(self.id).await?;
        if response.is_not_found() {
            return Ok(DeleteAttempt::Gone);
        }
        if response.is_conflict() {
            tracing::debug!("{} {} is busy, deferring delete", self.resource.kind(), self.id);
            return Ok(DeleteAttempt::Busy);
        }
        if response.is_success() {
            self.delete_pending = false;
            return Ok(DeleteAttempt::Accepted);
        }
        Ok(DeleteAttempt::Rejected(response))
    }
}

#[async_trait]
impl<'r, R: Resource, C: RemoteClient> StatusSource for DeletionWatch<'r, R, C> {
    async fn refresh(&mut self) -> std::result::Result<Refresh, RefreshError> {
        let response = self
            .client
            .get(self.id)
            .await
            .map_err(|e| RefreshError::Transient(e.to_string()))?;
        if response.is_not_found() {
            return Ok(Refresh::NotFound);
        }
        if response.is_conflict() {
            return Ok(Refresh::Status(AVAILABLE.to_string()));
        }
        if !response.is_success() {
            return Err(refresh_error(&response));
        }

        if let Some(status) = self.resource.status(&response.body) {
            if self.resource.failed_statuses().contains(&status.as_str()) {
                return Ok(Refresh::Status(status));
            }
        }

        if self.delete_pending {
            match self.issue_delete().await {
                Ok(DeleteAttempt::Gone) => return Ok(Refresh::NotFound),
                Ok(DeleteAttempt::Accepted | DeleteAttempt::Busy) => {}
                Ok(DeleteAttempt::Rejected(response)) => {
                    let message = format!("delete rejected with {}", response.status);
                    self.rejected = Some(response);
                    return Err(RefreshError::Hard(message));
                }
                Err(e) => return Err(RefreshError::Transient(e.to_string())),
            }
        }
        Ok(Refresh::Status(AVAILABLE.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Call, FakeResource, FakeSpec, MockRemote, fake_body};
    use serde_json::json;
    use std::sync::Arc;
    use tokio::time::Instant;

    fn config() -> ProviderConfig {
        let mut config = ProviderConfig::default();
        config.polling.delay_ms = 5_000;
        config.polling.min_interval_ms = 3_000;
        config.timeouts.create_secs = 60;
        config.timeouts.delete_secs = 60;
        config
    }

    fn spec() -> FakeSpec {
        FakeSpec {
            name: "p1".to_string(),
            size: 7,
            zone: "zone-a".to_string(),
            enabled: None,
            disabled: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_polls_until_ready_then_reads_back() {
        let remote = Arc::new(
            MockRemote::new()
                .on_create(RemoteResponse::new(201, json!({"id": "abc123"})))
                .on_get(RemoteResponse::new(200, fake_body("abc123", &spec(), "CREATING")))
                .on_get(RemoteResponse::new(200, fake_body("abc123", &spec(), "ON"))),
        );
        let config = config();
        let reconciler = Reconciler::new(FakeResource::asynchronous(), remote.clone(), &config);
        let started = Instant::now();

        let observed = reconciler.create(&spec()).await.unwrap();

        assert_eq!(observed.id, "abc123");
        assert_eq!(observed.status, "ON");
        // two polls plus the read-back
        assert_eq!(remote.get_calls(), 3);
        assert_eq!(started.elapsed(), Duration::from_secs(5 + 3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_without_provisioning_skips_poll() {
        let remote = Arc::new(
            MockRemote::new()
                .on_create(RemoteResponse::new(201, json!({"id": "k1"})))
                .on_get(RemoteResponse::new(200, fake_body("k1", &spec(), "ACTIVE"))),
        );
        let config = config();
        let reconciler = Reconciler::new(FakeResource::synchronous(), remote.clone(), &config);
        let started = Instant::now();

        reconciler.create(&spec()).await.unwrap();

        assert_eq!(remote.get_calls(), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_create_rejects_exclusive_fields_before_sending() {
        let remote = Arc::new(MockRemote::new());
        let config = config();
        let reconciler = Reconciler::new(FakeResource::asynchronous(), remote.clone(), &config);
        let spec = FakeSpec {
            enabled: Some(true),
            disabled: Some(true),
            ..spec()
        };

        let err = reconciler.create(&spec).await.unwrap_err();

        assert!(err.is_validation(), "{:?}", err);
        assert!(remote.calls().is_empty());
    }

    #[tokio::test]
    async fn test_create_rejection_is_surfaced_verbatim() {
        let remote = Arc::new(
            MockRemote::new().on_create(RemoteResponse::new(400, json!({"error": "bad name"}))),
        );
        let config = config();
        let reconciler = Reconciler::new(FakeResource::asynchronous(), remote.clone(), &config);

        let err = reconciler.create(&spec()).await.unwrap_err();

        match err {
            ReconcileError::RemoteCreate { status, body, .. } => {
                assert_eq!(status, 400);
                assert!(body.contains("bad name"));
            }
            other => panic!("expected RemoteCreate, got {:?}", other),
        }
        assert_eq!(remote.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_times_out_and_leaves_resource() {
        let remote = Arc::new(
            MockRemote::new()
                .on_create(RemoteResponse::new(201, json!({"id": "slow"})))
                .on_get(RemoteResponse::new(200, fake_body("slow", &spec(), "CREATING"))),
        );
        let config = config();
        let reconciler = Reconciler::new(FakeResource::asynchronous(), remote.clone(), &config);

        let err = reconciler.create(&spec()).await.unwrap_err();

        match err {
            ReconcileError::ProvisioningTimeout {
                id, last_status, ..
            } => {
                assert_eq!(id, "slow");
                assert_eq!(last_status.as_deref(), Some("CREATING"));
            }
            other => panic!("expected ProvisioningTimeout, got {:?}", other),
        }
        assert_eq!(remote.delete_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_cancelled() {
        let remote = Arc::new(
            MockRemote::new()
                .on_create(RemoteResponse::new(201, json!({"id": "c1"})))
                .on_get(RemoteResponse::new(200, fake_body("c1", &spec(), "CREATING"))),
        );
        let config = config();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let reconciler = Reconciler::new(FakeResource::asynchronous(), remote, &config)
            .with_cancellation(cancel);

        let err = reconciler.create(&spec()).await.unwrap_err();
        assert!(matches!(err, ReconcileError::Cancelled { .. }), "{:?}", err);
    }

    #[tokio::test]
    async fn test_read_not_found_is_gone() {
        let remote = Arc::new(MockRemote::new().on_get(RemoteResponse::empty(404)));
        let config = config();
        let reconciler = Reconciler::new(FakeResource::asynchronous(), remote, &config);

        assert!(reconciler.read("abc123").await.unwrap().is_none());
        assert!(reconciler.read("").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_read_other_error_carries_status() {
        let remote = Arc::new(MockRemote::new().on_get(RemoteResponse::new(500, json!("oops"))));
        let config = config();
        let reconciler = Reconciler::new(FakeResource::asynchronous(), remote, &config);

        let err = reconciler.read("abc123").await.unwrap_err();
        assert_eq!(err.status(), Some(500));
    }

    #[tokio::test]
    async fn test_update_unchanged_makes_no_calls() {
        let remote = Arc::new(MockRemote::new());
        let config = config();
        let reconciler = Reconciler::new(FakeResource::asynchronous(), remote.clone(), &config);
        let previous = FakeResource::observed("abc123", &spec(), "ON");

        let result = reconciler
            .update("abc123", &spec(), &previous)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(result, previous);
        assert!(remote.calls().is_empty());
    }

    #[tokio::test]
    async fn test_update_sends_only_changed_fields() {
        let changed = FakeSpec {
            size: 9,
            ..spec()
        };
        let remote = Arc::new(
            MockRemote::new()
                .on_update(RemoteResponse::new(200, json!({})))
                .on_get(RemoteResponse::new(200, fake_body("abc123", &changed, "ON"))),
        );
        let config = config();
        let reconciler = Reconciler::new(FakeResource::asynchronous(), remote.clone(), &config);
        let previous = FakeResource::observed("abc123", &spec(), "ON");

        let result = reconciler
            .update("abc123", &changed, &previous)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(result.size, 9);
        assert_eq!(
            remote.calls()[0],
            Call::Update("abc123".to_string(), json!({"size": 9}))
        );
    }

    #[tokio::test]
    async fn test_update_immutable_field_requires_replacement() {
        let remote = Arc::new(MockRemote::new());
        let config = config();
        let reconciler = Reconciler::new(FakeResource::asynchronous(), remote.clone(), &config);
        let previous = FakeResource::observed("abc123", &spec(), "ON");
        let moved = FakeSpec {
            zone: "zone-b".to_string(),
            ..spec()
        };

        let err = reconciler.update("abc123", &moved, &previous).await.unwrap_err();

        assert!(matches!(
            err,
            ReconcileError::RequiresReplacement { ref fields, .. } if fields == &vec!["zone"]
        ));
        assert!(remote.calls().is_empty());
    }

    #[tokio::test]
    async fn test_update_rejected() {
        let remote = Arc::new(MockRemote::new().on_update(RemoteResponse::new(409, json!("busy"))));
        let config = config();
        let reconciler = Reconciler::new(FakeResource::asynchronous(), remote, &config);
        let previous = FakeResource::observed("abc123", &spec(), "ON");
        let changed = FakeSpec {
            name: "p2".to_string(),
            ..spec()
        };

        let err = reconciler.update("abc123", &changed, &previous).await.unwrap_err();
        assert!(matches!(err, ReconcileError::RemoteUpdate { status: 409, .. }));
    }

    #[tokio::test]
    async fn test_delete_absent_is_success() {
        let remote = Arc::new(MockRemote::new().on_get(RemoteResponse::empty(404)));
        let config = config();
        let reconciler = Reconciler::new(FakeResource::asynchronous(), remote.clone(), &config);

        reconciler.delete("abc123").await.unwrap();
        reconciler.delete("").await.unwrap();

        assert_eq!(remote.get_calls(), 1);
        assert_eq!(remote.delete_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_conflict_then_gone() {
        let remote = Arc::new(
            MockRemote::new()
                .on_get(RemoteResponse::new(200, fake_body("abc123", &spec(), "ON")))
                .on_get(RemoteResponse::new(409, json!("in use")))
                .on_get(RemoteResponse::empty(404))
                .on_delete(RemoteResponse::empty(204)),
        );
        let config = config();
        let reconciler = Reconciler::new(FakeResource::asynchronous(), remote.clone(), &config);
        let started = Instant::now();

        reconciler.delete("abc123").await.unwrap();

        // pre-check plus two poll iterations
        assert_eq!(remote.get_calls(), 3);
        assert_eq!(remote.delete_calls(), 1);
        assert_eq!(started.elapsed(), Duration::from_secs(5 + 3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_busy_is_reissued_while_polling() {
        let remote = Arc::new(
            MockRemote::new()
                .on_get(RemoteResponse::new(200, fake_body("abc123", &spec(), "ON")))
                .on_get(RemoteResponse::new(200, fake_body("abc123", &spec(), "ON")))
                .on_get(RemoteResponse::empty(404))
                .on_delete(RemoteResponse::new(409, json!("in use")))
                .on_delete(RemoteResponse::empty(204)),
        );
        let config = config();
        let reconciler = Reconciler::new(FakeResource::asynchronous(), remote.clone(), &config);

        reconciler.delete("abc123").await.unwrap();

        assert_eq!(remote.delete_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_reissued_and_rejected_is_not_retried() {
        let remote = Arc::new(
            MockRemote::new()
                .on_get(RemoteResponse::new(200, fake_body("abc123", &spec(), "ON")))
                .on_delete(RemoteResponse::new(409, json!("in use")))
                .on_delete(RemoteResponse::new(400, json!("protected"))),
        );
        let config = config();
        let reconciler = Reconciler::new(FakeResource::asynchronous(), remote.clone(), &config);

        let err = reconciler.delete("abc123").await.unwrap_err();
        assert!(
            matches!(err, ReconcileError::RemoteDelete { status: 400, .. }),
            "{:?}",
            err
        );
        assert_eq!(remote.delete_calls(), 2);
    }

    #[tokio::test]
    async fn test_delete_not_found_race_is_success() {
        let remote = Arc::new(
            MockRemote::new()
                .on_get(RemoteResponse::new(200, fake_body("abc123", &spec(), "ON")))
                .on_delete(RemoteResponse::empty(404)),
        );
        let config = config();
        let reconciler = Reconciler::new(FakeResource::asynchronous(), remote.clone(), &config);

        reconciler.delete("abc123").await.unwrap();
        assert_eq!(remote.get_calls(), 1);
    }

    #[tokio::test]
    async fn test_delete_rejected() {
        let remote = Arc::new(
            MockRemote::new()
                .on_get(RemoteResponse::new(200, fake_body("abc123", &spec(), "ON")))
                .on_delete(RemoteResponse::new(400, json!("protected"))),
        );
        let config = config();
        let reconciler = Reconciler::new(FakeResource::asynchronous(), remote, &config);

        let err = reconciler.delete("abc123").await.unwrap_err();
        assert!(matches!(err, ReconcileError::RemoteDelete { status: 400, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_timeout() {
        let remote = Arc::new(
            MockRemote::new()
                .on_get(RemoteResponse::new(200, fake_body("abc123", &spec(), "ON")))
                .on_delete(RemoteResponse::empty(202)),
        );
        let config = config();
        let reconciler = Reconciler::new(FakeResource::asynchronous(), remote, &config);

        let err = reconciler.delete("abc123").await.unwrap_err();
        assert!(matches!(err, ReconcileError::DeletionTimeout { .. }), "{:?}", err);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_stops_on_failed_status() {
        let remote = Arc::new(
            MockRemote::new()
                .on_get(RemoteResponse::new(200, fake_body("abc123", &spec(), "ON")))
                .on_get(RemoteResponse::new(200, fake_body("abc123", &spec(), "ERROR")))
                .on_delete(RemoteResponse::empty(204)),
        );
        let config = config();
        let reconciler = Reconciler::new(FakeResource::asynchronous(), remote, &config);

        let err = reconciler.delete("abc123").await.unwrap_err();
        assert!(matches!(
            err,
            ReconcileError::Poll {
                source: PollError::TerminalFailure { .. },
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_import_missing_is_error() {
        let remote = Arc::new(MockRemote::new().on_get(RemoteResponse::empty(404)));
        let config = config();
        let reconciler = Reconciler::new(FakeResource::asynchronous(), remote, &config);

        let err = reconciler.import("nope").await.unwrap_err();
        assert!(matches!(err, ReconcileError::ResourceGone { .. }));
    }
}
