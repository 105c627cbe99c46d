//! VBS v2 backup policies
//!
//! Policies are created asynchronously: the API answers with an ID and the
//! policy shows up in the list a moment later with status `ON` or `OFF`.
//! There is no single-object GET, so lookups filter the list by ID.

use crate::client::{Collection, Lookup, ServiceClient};
use cumulus_core::error::{ReconcileError, Result, ValidationError};
use cumulus_core::resource::{Changes, Identified, Provisioning, Resource, diff_field};
use cumulus_core::validate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const KIND: &str = "backup_policy";

pub fn collection(client: ServiceClient) -> Collection {
    let project = client.project_id().to_string();
    Collection::new(client, &["v2", project.as_str(), "backuppolicy"]).with_lookup(Lookup::List {
        list_key: "backup_policies",
        id_field: "backup_policy_id",
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupPolicySpec {
    pub name: String,
    /// Daily start time, `HH:MM` UTC
    pub start_time: String,
    /// Interval between backups in days
    pub frequency: i64,
    /// Number of backups kept
    pub retention: i64,
    /// `Y` keeps the first backup of the month
    pub retain_first: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupPolicy {
    pub id: String,
    pub name: String,
    pub start_time: String,
    pub frequency: i64,
    pub retention: i64,
    pub retain_first: String,
    pub status: String,
    /// Volumes bound to the policy
    #[serde(default)]
    pub resource_count: i64,
}

impl Identified for BackupPolicy {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Serialize)]
pub struct CreatePolicy {
    backup_policy_name: String,
    scheduled_policy: ScheduledPolicy,
}

#[derive(Debug, Serialize, Deserialize)]
struct ScheduledPolicy {
    start_time: String,
    frequency: i64,
    // sic: the API spells it this way
    rentention_num: i64,
    remain_first_backup: String,
    status: String,
}

#[derive(Debug, Default, PartialEq, Serialize)]
pub struct UpdatePolicy {
    #[serde(skip_serializing_if = "Option::is_none")]
    backup_policy_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    scheduled_policy: Option<ScheduledUpdate>,
}

#[derive(Debug, Default, PartialEq, Serialize)]
struct ScheduledUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    start_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frequency: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rentention_num: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    remain_first_backup: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<String>,
}

/// List element as returned by the API
#[derive(Debug, Deserialize)]
struct ApiPolicy {
    backup_policy_id: String,
    backup_policy_name: String,
    scheduled_policy: ScheduledPolicy,
    #[serde(default)]
    policy_resource_count: i64,
}

pub struct BackupPolicyResource;

impl Resource for BackupPolicyResource {
    type Spec = BackupPolicySpec;
    type Observed = BackupPolicy;
    type CreateRequest = CreatePolicy;
    type UpdateRequest = UpdatePolicy;

    fn kind(&self) -> &'static str {
        KIND
    }

    fn validate(&self, spec: &BackupPolicySpec) -> std::result::Result<(), ValidationError> {
        validate::not_empty("name", &spec.name)?;
        validate::max_len("name", &spec.name, 64)?;
        if spec.name.starts_with("default") {
            return Err(ValidationError::new("name", "must not start with `default`"));
        }
        validate::not_empty("start_time", &spec.start_time)?;
        validate::in_range("frequency", spec.frequency, 1..=14)?;
        if spec.retention < 2 {
            return Err(ValidationError::new(
                "retention",
                format!("must be at least 2, got {}", spec.retention),
            ));
        }
        validate::one_of("retain_first", &spec.retain_first, &["Y", "N"])?;
        validate::one_of("status", &spec.status, &["ON", "OFF"])
    }

    fn create_request(&self, spec: &BackupPolicySpec) -> CreatePolicy {
        CreatePolicy {
            backup_policy_name: spec.name.clone(),
            scheduled_policy: ScheduledPolicy {
                start_time: spec.start_time.clone(),
                frequency: spec.frequency,
                rentention_num: spec.retention,
                remain_first_backup: spec.retain_first.clone(),
                status: spec.status.clone(),
            },
        }
    }

    fn created_id(&self, body: &Value) -> Result<String> {
        body.get("backup_policy_id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                ReconcileError::Decode("create response has no backup_policy_id".to_string())
            })
    }

    fn changes(&self, spec: &BackupPolicySpec, previous: &BackupPolicy) -> Changes<UpdatePolicy> {
        let scheduled = ScheduledUpdate {
            start_time: diff_field(&spec.start_time, &previous.start_time),
            frequency: diff_field(&spec.frequency, &previous.frequency),
            rentention_num: diff_field(&spec.retention, &previous.retention),
            remain_first_backup: diff_field(&spec.retain_first, &previous.retain_first),
            status: diff_field(&spec.status, &previous.status),
        };
        Changes::from_update(UpdatePolicy {
            backup_policy_name: diff_field(&spec.name, &previous.name),
            scheduled_policy: (scheduled != ScheduledUpdate::default()).then_some(scheduled),
        })
    }

    fn observe(&self, _id: &str, body: &Value) -> Result<BackupPolicy> {
        let api: ApiPolicy = serde_json::from_value(body.clone())?;
        Ok(BackupPolicy {
            id: api.backup_policy_id,
            name: api.backup_policy_name,
            start_time: api.scheduled_policy.start_time,
            frequency: api.scheduled_policy.frequency,
            retention: api.scheduled_policy.rentention_num,
            retain_first: api.scheduled_policy.remain_first_backup,
            status: api.scheduled_policy.status,
            resource_count: api.policy_resource_count,
        })
    }

    fn status(&self, body: &Value) -> Option<String> {
        body.pointer("/scheduled_policy/status")
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    fn provisioning(&self) -> Option<Provisioning> {
        Some(Provisioning::new(&["ON", "OFF"]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cumulus_config::ProviderConfig;
    use cumulus_core::testing::{Call, MockRemote};
    use cumulus_core::{Reconciler, RemoteResponse};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::Instant;

    fn spec() -> BackupPolicySpec {
        BackupPolicySpec {
            name: "p1".to_string(),
            start_time: "12:00".to_string(),
            frequency: 7,
            retention: 30,
            retain_first: "Y".to_string(),
            status: "ON".to_string(),
        }
    }

    fn listed(id: &str, status: &str) -> Value {
        json!({
            "backup_policy_id": id,
            "backup_policy_name": "p1",
            "scheduled_policy": {
                "start_time": "12:00",
                "frequency": 7,
                "rentention_num": 30,
                "remain_first_backup": "Y",
                "status": status
            },
            "policy_resource_count": 0
        })
    }

    #[test]
    fn test_validation() {
        let r = BackupPolicyResource;
        assert!(r.validate(&spec()).is_ok());

        let cases = [
            (BackupPolicySpec { name: "default-x".into(), ..spec() }, "name"),
            (BackupPolicySpec { name: "a".repeat(65), ..spec() }, "name"),
            (BackupPolicySpec { start_time: String::new(), ..spec() }, "start_time"),
            (BackupPolicySpec { frequency: 15, ..spec() }, "frequency"),
            (BackupPolicySpec { frequency: 0, ..spec() }, "frequency"),
            (BackupPolicySpec { retention: 1, ..spec() }, "retention"),
            (BackupPolicySpec { retain_first: "yes".into(), ..spec() }, "retain_first"),
            (BackupPolicySpec { status: "PAUSED".into(), ..spec() }, "status"),
        ];
        for (spec, field) in cases {
            assert_eq!(r.validate(&spec).unwrap_err().field, field, "{:?}", spec);
        }
    }

    #[test]
    fn test_start_time_is_required() {
        let missing = json!({
            "name": "p1",
            "frequency": 7,
            "retention": 30,
            "retain_first": "Y",
            "status": "ON"
        });
        let err = serde_json::from_value::<BackupPolicySpec>(missing).unwrap_err();
        assert!(err.to_string().contains("start_time"), "{}", err);
    }

    #[test]
    fn test_create_request_shape() {
        let body = serde_json::to_value(BackupPolicyResource.create_request(&spec())).unwrap();
        assert_eq!(body["backup_policy_name"], "p1");
        assert_eq!(body["scheduled_policy"]["rentention_num"], 30);
        assert_eq!(body["scheduled_policy"]["remain_first_backup"], "Y");
    }

    #[test]
    fn test_changes_only_carry_changed_fields() {
        let r = BackupPolicyResource;
        let previous = r.observe("abc123", &listed("abc123", "ON")).unwrap();
        assert!(r.changes(&spec(), &previous).is_unchanged());

        let paused = BackupPolicySpec {
            status: "OFF".to_string(),
            ..spec()
        };
        match r.changes(&paused, &previous) {
            Changes::Update(update) => assert_eq!(
                serde_json::to_value(update).unwrap(),
                json!({"scheduled_policy": {"status": "OFF"}})
            ),
            other => panic!("expected update, got {:?}", other),
        }

        let renamed = BackupPolicySpec {
            name: "p2".to_string(),
            ..spec()
        };
        match r.changes(&renamed, &previous) {
            Changes::Update(update) => assert_eq!(
                serde_json::to_value(update).unwrap(),
                json!({"backup_policy_name": "p2"})
            ),
            other => panic!("expected update, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_waits_for_first_status() {
        let remote = Arc::new(
            MockRemote::new()
                .on_create(RemoteResponse::new(200, json!({"backup_policy_id": "abc123"})))
                .on_get(RemoteResponse::new(200, listed("abc123", "ON"))),
        );
        let config = ProviderConfig::default();
        let reconciler = Reconciler::new(BackupPolicyResource, remote.clone(), &config);
        let started = Instant::now();

        let policy = reconciler.create(&spec()).await.unwrap();

        assert_eq!(policy.id, "abc123");
        assert_eq!(policy.status, "ON");
        // one poll after the initial delay, then the read-back
        assert_eq!(remote.get_calls(), 2);
        assert_eq!(started.elapsed(), Duration::from_secs(5));
        assert!(matches!(remote.calls()[0], Call::Create(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_conflict_then_gone() {
        let remote = Arc::new(
            MockRemote::new()
                .on_get(RemoteResponse::new(200, listed("abc123", "ON")))
                .on_get(RemoteResponse::new(409, json!("policy in use")))
                .on_get(RemoteResponse::empty(404))
                .on_delete(RemoteResponse::empty(200)),
        );
        let config = ProviderConfig::default();
        let reconciler = Reconciler::new(BackupPolicyResource, remote.clone(), &config);

        reconciler.delete("abc123").await.unwrap();

        // pre-check plus exactly two poll iterations
        assert_eq!(remote.get_calls(), 3);
        assert_eq!(remote.delete_calls(), 1);
    }
}
