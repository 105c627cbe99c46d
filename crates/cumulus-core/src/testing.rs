//! Test doubles: a scripted remote client and a minimal resource kind
//!
//! Enabled for this crate's tests and, through the `testing` feature, for
//! the tests of crates that implement resources.

use crate::error::{ReconcileError, Result, ValidationError};
use crate::remote::{RemoteClient, RemoteResponse};
use crate::resource::{
    Changes, Identified, ImmutableFields, Provisioning, Resource, diff_field, diff_optional,
};
use crate::validate;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::Mutex;

/// A call received by [`MockRemote`]
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Create(Value),
    Get(String),
    Update(String, Value),
    Delete(String),
}

#[derive(Default)]
struct Script {
    create: VecDeque<RemoteResponse>,
    get: VecDeque<RemoteResponse>,
    update: VecDeque<RemoteResponse>,
    delete: VecDeque<RemoteResponse>,
    calls: Vec<Call>,
}

/// Remote client replaying scripted responses per operation
///
/// Each queue pops in order and repeats its last response once only one is
/// left. An operation with nothing scripted answers 500.
#[derive(Default)]
pub struct MockRemote {
    script: Mutex<Script>,
}

fn next(queue: &mut VecDeque<RemoteResponse>) -> RemoteResponse {
    if queue.len() > 1 {
        queue.pop_front().unwrap_or_else(unscripted)
    } else {
        queue.front().cloned().unwrap_or_else(unscripted)
    }
}

fn unscripted() -> RemoteResponse {
    RemoteResponse::new(500, json!("no scripted response"))
}

impl MockRemote {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(
        self,
        pick: impl FnOnce(&mut Script) -> &mut VecDeque<RemoteResponse>,
        response: RemoteResponse,
    ) -> Self {
        if let Ok(mut script) = self.script.lock() {
            pick(&mut script).push_back(response);
        }
        self
    }

    pub fn on_create(self, response: RemoteResponse) -> Self {
        self.push(|s| &mut s.create, response)
    }

    pub fn on_get(self, response: RemoteResponse) -> Self {
        self.push(|s| &mut s.get, response)
    }

    pub fn on_update(self, response: RemoteResponse) -> Self {
        self.push(|s| &mut s.update, response)
    }

    pub fn on_delete(self, response: RemoteResponse) -> Self {
        self.push(|s| &mut s.delete, response)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.script
            .lock()
            .map(|s| s.calls.clone())
            .unwrap_or_default()
    }

    pub fn get_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Get(_)))
            .count()
    }

    pub fn delete_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Delete(_)))
            .count()
    }

    fn record(
        &self,
        call: Call,
        pick: impl FnOnce(&mut Script) -> &mut VecDeque<RemoteResponse>,
    ) -> Result<RemoteResponse> {
        let mut script = self
            .script
            .lock()
            .map_err(|e| ReconcileError::Transport(e.to_string()))?;
        script.calls.push(call);
        Ok(next(pick(&mut script)))
    }
}

#[async_trait]
impl RemoteClient for MockRemote {
    async fn create(&self, payload: &Value) -> Result<RemoteResponse> {
        self.record(Call::Create(payload.clone()), |s| &mut s.create)
    }

    async fn get(&self, id: &str) -> Result<RemoteResponse> {
        self.record(Call::Get(id.to_string()), |s| &mut s.get)
    }

    async fn update(&self, id: &str, payload: &Value) -> Result<RemoteResponse> {
        self.record(Call::Update(id.to_string(), payload.clone()), |s| {
            &mut s.update
        })
    }

    async fn delete(&self, id: &str) -> Result<RemoteResponse> {
        self.record(Call::Delete(id.to_string()), |s| &mut s.delete)
    }
}

/// Desired state of the fake kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FakeSpec {
    pub name: String,
    pub size: i64,
    /// Immutable
    pub zone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FakeObserved {
    pub id: String,
    pub name: String,
    pub size: i64,
    pub zone: String,
    pub enabled: bool,
    pub status: String,
}

impl Identified for FakeObserved {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Serialize)]
pub struct FakeCreate {
    name: String,
    size: i64,
    zone: String,
    enabled: bool,
}

#[derive(Debug, Default, PartialEq, Serialize)]
pub struct FakeUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    size: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    enabled: Option<bool>,
}

/// Minimal resource kind; asynchronous ones wait for `ON`/`OFF`
pub struct FakeResource {
    asynchronous: bool,
}

impl FakeResource {
    pub fn asynchronous() -> Self {
        Self { asynchronous: true }
    }

    pub fn synchronous() -> Self {
        Self {
            asynchronous: false,
        }
    }

    pub fn observed(id: &str, spec: &FakeSpec, status: &str) -> FakeObserved {
        FakeObserved {
            id: id.to_string(),
            name: spec.name.clone(),
            size: spec.size,
            zone: spec.zone.clone(),
            enabled: desired_enabled(spec).unwrap_or(true),
            status: status.to_string(),
        }
    }
}

fn desired_enabled(spec: &FakeSpec) -> Option<bool> {
    spec.enabled.or(spec.disabled.map(|d| !d))
}

/// Get-response body for the fake kind
pub fn fake_body(id: &str, spec: &FakeSpec, status: &str) -> Value {
    serde_json::to_value(FakeResource::observed(id, spec, status)).unwrap_or(Value::Null)
}

impl Resource for FakeResource {
    type Spec = FakeSpec;
    type Observed = FakeObserved;
    type CreateRequest = FakeCreate;
    type UpdateRequest = FakeUpdate;

    fn kind(&self) -> &'static str {
        "fake"
    }

    fn validate(&self, spec: &FakeSpec) -> std::result::Result<(), ValidationError> {
        validate::not_empty("name", &spec.name)?;
        validate::in_range("size", spec.size, 1..=14)?;
        validate::exclusive(
            "enabled",
            spec.enabled.is_some(),
            "disabled",
            spec.disabled.is_some(),
        )
    }

    fn create_request(&self, spec: &FakeSpec) -> FakeCreate {
        FakeCreate {
            name: spec.name.clone(),
            size: spec.size,
            zone: spec.zone.clone(),
            enabled: desired_enabled(spec).unwrap_or(true),
        }
    }

    fn created_id(&self, body: &Value) -> Result<String> {
        body.get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ReconcileError::Decode("create response has no id".to_string()))
    }

    fn changes(&self, spec: &FakeSpec, previous: &FakeObserved) -> Changes<FakeUpdate> {
        if let Some(fields) = ImmutableFields::new()
            .check("zone", &spec.zone, &previous.zone)
            .changed()
        {
            return Changes::Replace(fields);
        }
        Changes::from_update(FakeUpdate {
            name: diff_field(&spec.name, &previous.name),
            size: diff_field(&spec.size, &previous.size),
            enabled: diff_optional(&desired_enabled(spec), &previous.enabled),
        })
    }

    fn observe(&self, _id: &str, body: &Value) -> Result<FakeObserved> {
        Ok(serde_json::from_value(body.clone())?)
    }

    fn status(&self, body: &Value) -> Option<String> {
        body.get("status").and_then(Value::as_str).map(str::to_string)
    }

    fn provisioning(&self) -> Option<Provisioning> {
        self.asynchronous.then_some(Provisioning::new(&["ON", "OFF"]))
    }

    fn failed_statuses(&self) -> &'static [&'static str] {
        &["ERROR"]
    }
}
