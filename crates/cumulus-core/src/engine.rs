//! Plan and apply across resource kinds
//!
//! The [`Engine`] compares declared resources with the [`StateStore`] and
//! drives each one through the reconciler registered for its kind. Actions
//! run one after another; a failed action is recorded in the
//! [`ApplyResult`] and does not stop the others.

use crate::action::{Action, ActionType, ApplyResult, Plan, resource_key};
use crate::error::{ReconcileError, Result};
use crate::reconciler::Reconciler;
use crate::remote::RemoteClient;
use crate::resource::{Changes, Identified, Resource};
use crate::state::{ResourceRecord, StateStore};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::time::Instant;

/// A resource as declared in a manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesiredResource {
    pub kind: String,
    pub name: String,
    pub spec: Value,
}

impl DesiredResource {
    pub fn key(&self) -> String {
        resource_key(&self.kind, &self.name)
    }
}

/// Outcome of comparing a spec with the recorded state
#[derive(Debug, Clone, PartialEq)]
pub enum Assessment {
    NoOp,
    Update,
    Replace(Vec<&'static str>),
}

/// Kind-erased reconciler working on JSON documents
#[async_trait]
pub trait Reconcile: Send + Sync {
    fn kind(&self) -> &'static str;

    fn validate(&self, spec: &Value) -> Result<()>;

    fn assess(&self, spec: &Value, observed: &Value) -> Result<Assessment>;

    /// Returns the remote ID and the observed state
    async fn create(&self, spec: &Value) -> Result<(String, Value)>;

    async fn read(&self, id: &str) -> Result<Option<Value>>;

    async fn update(&self, id: &str, spec: &Value, observed: &Value) -> Result<Option<Value>>;

    async fn delete(&self, id: &str) -> Result<()>;

    async fn import(&self, id: &str) -> Result<Value>;
}

fn decode<T: serde::de::DeserializeOwned>(kind: &str, what: &str, value: &Value) -> Result<T> {
    serde_json::from_value(value.clone())
        .map_err(|e| ReconcileError::Decode(format!("invalid {} {}: {}", kind, what, e)))
}

impl<R, C> Reconciler<'_, R, C>
where
    R: Resource,
    C: RemoteClient,
{
    fn spec_of(&self, spec: &Value) -> Result<R::Spec> {
        decode(self.kind(), "spec", spec)
    }

    fn observed_of(&self, observed: &Value) -> Result<R::Observed> {
        decode(self.kind(), "recorded state", observed)
    }
}

#[async_trait]
impl<'a, R, C> Reconcile for Reconciler<'a, R, C>
where
    R: Resource + 'a,
    C: RemoteClient + 'a,
{
    fn kind(&self) -> &'static str {
        Reconciler::kind(self)
    }

    fn validate(&self, spec: &Value) -> Result<()> {
        Reconciler::validate(self, &self.spec_of(spec)?)
    }

    fn assess(&self, spec: &Value, observed: &Value) -> Result<Assessment> {
        let spec = self.spec_of(spec)?;
        Reconciler::validate(self, &spec)?;
        let previous = self.observed_of(observed)?;
        Ok(match self.resource().changes(&spec, &previous) {
            Changes::Unchanged => Assessment::NoOp,
            Changes::Update(_) => Assessment::Update,
            Changes::Replace(fields) => Assessment::Replace(fields),
        })
    }

    async fn create(&self, spec: &Value) -> Result<(String, Value)> {
        let observed = Reconciler::create(self, &self.spec_of(spec)?).await?;
        Ok((observed.id().to_string(), serde_json::to_value(&observed)?))
    }

    async fn read(&self, id: &str) -> Result<Option<Value>> {
        match Reconciler::read(self, id).await? {
            Some(observed) => Ok(Some(serde_json::to_value(&observed)?)),
            None => Ok(None),
        }
    }

    async fn update(&self, id: &str, spec: &Value, observed: &Value) -> Result<Option<Value>> {
        let spec = self.spec_of(spec)?;
        let previous = self.observed_of(observed)?;
        match Reconciler::update(self, id, &spec, &previous).await? {
            Some(observed) => Ok(Some(serde_json::to_value(&observed)?)),
            None => Ok(None),
        }
    }

    async fn delete(&self, id: &str) -> Result<()> {
        Reconciler::delete(self, id).await
    }

    async fn import(&self, id: &str) -> Result<Value> {
        Ok(serde_json::to_value(Reconciler::import(self, id).await?)?)
    }
}

/// What a refresh changed in the state
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RefreshSummary {
    pub refreshed: Vec<String>,
    /// Records cleared because the remote object is gone
    pub removed: Vec<String>,
    /// Records left untouched because the read failed, with the error
    pub failed: Vec<(String, String)>,
}

impl RefreshSummary {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Registry of reconcilers plus the state they reconcile into
pub struct Engine<'a> {
    store: &'a dyn StateStore,
    reconcilers: BTreeMap<&'static str, Box<dyn Reconcile + 'a>>,
}

impl<'a> Engine<'a> {
    pub fn new(store: &'a dyn StateStore) -> Self {
        Self {
            store,
            reconcilers: BTreeMap::new(),
        }
    }

    /// Register the reconciler for its kind, replacing any previous one
    pub fn register(&mut self, reconciler: impl Reconcile + 'a) {
        self.reconcilers.insert(reconciler.kind(), Box::new(reconciler));
    }

    pub fn with(mut self, reconciler: impl Reconcile + 'a) -> Self {
        self.register(reconciler);
        self
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.reconcilers.keys().copied().collect()
    }

    fn reconciler(&self, kind: &str) -> Result<&dyn Reconcile> {
        self.reconcilers
            .get(kind)
            .map(|r| r.as_ref())
            .ok_or_else(|| ReconcileError::UnknownKind(kind.to_string()))
    }

    /// Compare declared resources with the recorded state
    ///
    /// Every declared spec is validated; an invalid one fails the whole plan.
    /// Recorded keys that are no longer declared are planned for deletion.
    pub async fn plan(&self, desired: &[DesiredResource]) -> Result<Plan> {
        let mut actions = Vec::new();
        let mut declared = HashSet::new();

        for resource in desired {
            let key = resource.key();
            if !declared.insert(key.clone()) {
                return Err(ReconcileError::State(format!(
                    "resource {} is declared more than once",
                    key
                )));
            }

            let reconciler = self.reconciler(&resource.kind)?;
            reconciler.validate(&resource.spec)?;

            let action_type = match self.store.load(&key).await? {
                None => ActionType::Create,
                Some(record) => match reconciler.assess(&resource.spec, &record.observed)? {
                    Assessment::NoOp => ActionType::NoOp,
                    Assessment::Update => ActionType::Update,
                    Assessment::Replace(fields) => {
                        actions.push(
                            Action::new(&resource.kind, &resource.name, ActionType::Replace)
                                .with_spec(resource.spec.clone())
                                .with_replaced_fields(
                                    fields.into_iter().map(str::to_string).collect(),
                                ),
                        );
                        continue;
                    }
                },
            };
            actions.push(
                Action::new(&resource.kind, &resource.name, action_type)
                    .with_spec(resource.spec.clone()),
            );
        }

        for (key, record) in self.store.list().await? {
            if declared.contains(&key) {
                continue;
            }
            let name = key
                .strip_prefix(&format!("{}.", record.kind))
                .unwrap_or(&key)
                .to_string();
            actions.push(Action::new(&record.kind, name, ActionType::Delete));
        }

        let plan = Plan::new(actions);
        tracing::debug!("Plan: {}", plan.summary());
        Ok(plan)
    }

    /// Apply a plan, recording each success in the state store
    pub async fn apply(&self, plan: &Plan) -> ApplyResult {
        let started = Instant::now();
        let mut result = ApplyResult::new();

        for action in &plan.actions {
            if action.action_type == ActionType::NoOp {
                continue;
            }
            tracing::info!("Applying: {}", action.description);
            match self.apply_action(action).await {
                Ok(message) => {
                    tracing::info!("{}", message);
                    result.add_success(action.key.clone(), message);
                }
                Err(e) => {
                    tracing::error!("{} failed: {}", action.key, e);
                    result.add_failure(action.key.clone(), e.to_string());
                }
            }
        }

        result.duration_ms = started.elapsed().as_millis() as u64;
        result
    }

    async fn apply_action(&self, action: &Action) -> Result<String> {
        let reconciler = self.reconciler(&action.kind)?;
        let key = &action.key;
        let spec = || {
            action
                .spec
                .as_ref()
                .ok_or_else(|| ReconcileError::State(format!("action {} has no spec", key)))
        };

        match action.action_type {
            ActionType::NoOp => Ok(format!("{} unchanged", key)),
            ActionType::Create => {
                let spec = spec()?;
                let (id, observed) = reconciler.create(spec).await?;
                let record =
                    ResourceRecord::new(&action.kind, &id, observed).with_spec(spec.clone());
                self.store.save(key, record).await?;
                Ok(format!("Created {} ({})", key, id))
            }
            ActionType::Update => {
                let spec = spec()?;
                let mut record = self.recorded(key).await?;
                match reconciler.update(&record.id, spec, &record.observed).await? {
                    Some(observed) => {
                        record.observe(observed);
                        record.spec = Some(spec.clone());
                        self.store.save(key, record).await?;
                        Ok(format!("Updated {}", key))
                    }
                    None => {
                        self.store.clear(key).await?;
                        Err(ReconcileError::ResourceGone {
                            kind: reconciler.kind(),
                            id: record.id,
                        })
                    }
                }
            }
            ActionType::Replace => {
                let spec = spec()?;
                let old = self.recorded(key).await?;
                reconciler.delete(&old.id).await?;
                self.store.clear(key).await?;
                let (id, observed) = reconciler.create(spec).await?;
                let record =
                    ResourceRecord::new(&action.kind, &id, observed).with_spec(spec.clone());
                self.store.save(key, record).await?;
                Ok(format!("Replaced {} ({} -> {})", key, old.id, id))
            }
            ActionType::Delete => {
                let record = self.recorded(key).await?;
                reconciler.delete(&record.id).await?;
                self.store.clear(key).await?;
                Ok(format!("Deleted {} ({})", key, record.id))
            }
        }
    }

    async fn recorded(&self, key: &str) -> Result<ResourceRecord> {
        self.store
            .load(key)
            .await?
            .ok_or_else(|| ReconcileError::State(format!("no record for {}", key)))
    }

    /// Re-read every record, clearing those whose remote object is gone
    ///
    /// A failed read keeps the record as it was and is reported in
    /// [`RefreshSummary::failed`]; the remaining records are still read.
    pub async fn refresh(&self) -> Result<RefreshSummary> {
        let mut summary = RefreshSummary::default();
        for (key, mut record) in self.store.list().await? {
            let reconciler = self.reconciler(&record.kind)?;
            let read = match reconciler.read(&record.id).await {
                Ok(read) => read,
                Err(e) => {
                    tracing::error!("Refreshing {} ({}) failed: {}", key, record.id, e);
                    summary.failed.push((key, e.to_string()));
                    continue;
                }
            };
            match read {
                Some(observed) => {
                    record.observe(observed);
                    self.store.save(&key, record).await?;
                    summary.refreshed.push(key);
                }
                None => {
                    tracing::warn!("{} ({}) is gone, removing from state", key, record.id);
                    self.store.clear(&key).await?;
                    summary.removed.push(key);
                }
            }
        }
        Ok(summary)
    }

    /// Delete every recorded resource
    pub async fn destroy(&self) -> Result<ApplyResult> {
        let actions = self
            .store
            .list()
            .await?
            .into_iter()
            .rev()
            .map(|(key, record)| {
                let name = key
                    .strip_prefix(&format!("{}.", record.kind))
                    .unwrap_or(&key)
                    .to_string();
                Action::new(&record.kind, name, ActionType::Delete)
            })
            .collect();
        Ok(self.apply(&Plan::new(actions)).await)
    }

    /// Adopt an existing remote object under `kind.name`
    pub async fn import(&self, kind: &str, name: &str, id: &str) -> Result<ResourceRecord> {
        let key = resource_key(kind, name);
        if let Some(existing) = self.store.load(&key).await? {
            return Err(ReconcileError::State(format!(
                "{} is already managed as {}",
                key, existing.id
            )));
        }
        let reconciler = self.reconciler(kind)?;
        let observed = reconciler.import(id).await?;
        let record = ResourceRecord::new(kind, id, observed);
        self.store.save(&key, record.clone()).await?;
        tracing::info!("Imported {} ({})", key, id);
        Ok(record)
    }
}
