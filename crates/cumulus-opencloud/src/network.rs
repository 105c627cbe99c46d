//! Networking v2 networks

use crate::client::{Collection, ServiceClient};
use cumulus_core::error::{ReconcileError, Result, ValidationError};
use cumulus_core::resource::{
    Changes, Identified, ImmutableFields, Provisioning, Resource, diff_field, diff_optional,
};
use cumulus_core::validate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const KIND: &str = "network";

pub fn collection(client: ServiceClient) -> Collection {
    Collection::new(client, &["v2.0", "networks"]).with_envelope("network")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_state_up: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared: Option<bool>,
    /// Owner project; only admins may set another one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Network {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default = "up")]
    pub admin_state_up: bool,
    #[serde(default)]
    pub shared: bool,
    #[serde(default)]
    pub tenant_id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub subnets: Vec<String>,
}

fn up() -> bool {
    true
}

impl Identified for Network {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Serialize)]
pub struct CreateNetwork {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    admin_state_up: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    shared: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tenant_id: Option<String>,
}

#[derive(Debug, Default, PartialEq, Serialize)]
pub struct UpdateNetwork {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    admin_state_up: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    shared: Option<bool>,
}

pub struct NetworkResource;

impl Resource for NetworkResource {
    type Spec = NetworkSpec;
    type Observed = Network;
    type CreateRequest = CreateNetwork;
    type UpdateRequest = UpdateNetwork;

    fn kind(&self) -> &'static str {
        KIND
    }

    fn validate(&self, spec: &NetworkSpec) -> std::result::Result<(), ValidationError> {
        validate::max_len("name", &spec.name, 255)
    }

    fn create_request(&self, spec: &NetworkSpec) -> CreateNetwork {
        CreateNetwork {
            name: spec.name.clone(),
            admin_state_up: spec.admin_state_up,
            shared: spec.shared,
            tenant_id: spec.tenant_id.clone(),
        }
    }

    fn created_id(&self, body: &Value) -> Result<String> {
        body.get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ReconcileError::Decode("create response has no network id".to_string()))
    }

    fn changes(&self, spec: &NetworkSpec, previous: &Network) -> Changes<UpdateNetwork> {
        if let Some(tenant) = &spec.tenant_id {
            if let Some(fields) = ImmutableFields::new()
                .check("tenant_id", tenant, &previous.tenant_id)
                .changed()
            {
                return Changes::Replace(fields);
            }
        }
        Changes::from_update(UpdateNetwork {
            name: diff_field(&spec.name, &previous.name),
            admin_state_up: diff_optional(&spec.admin_state_up, &previous.admin_state_up),
            shared: diff_optional(&spec.shared, &previous.shared),
        })
    }

    fn observe(&self, _id: &str, body: &Value) -> Result<Network> {
        Ok(serde_json::from_value(body.clone())?)
    }

    fn status(&self, body: &Value) -> Option<String> {
        body.get("status").and_then(Value::as_str).map(str::to_string)
    }

    fn provisioning(&self) -> Option<Provisioning> {
        Some(Provisioning::new(&["ACTIVE", "DOWN"]).with_pending(&["BUILD"]))
    }

    fn failed_statuses(&self) -> &'static [&'static str] {
        &["ERROR"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cumulus_config::ProviderConfig;
    use cumulus_core::testing::MockRemote;
    use cumulus_core::{PollError, Reconciler, RemoteResponse};
    use serde_json::json;
    use std::sync::Arc;

    fn spec() -> NetworkSpec {
        NetworkSpec {
            name: "net-1".to_string(),
            admin_state_up: Some(true),
            shared: None,
            tenant_id: None,
        }
    }

    fn body(status: &str) -> Value {
        json!({
            "id": "n-1",
            "name": "net-1",
            "admin_state_up": true,
            "shared": false,
            "tenant_id": "proj1",
            "status": status,
            "subnets": []
        })
    }

    #[test]
    fn test_changes() {
        let r = NetworkResource;
        let previous = r.observe("n-1", &body("ACTIVE")).unwrap();
        assert!(r.changes(&spec(), &previous).is_unchanged());

        let down = NetworkSpec {
            admin_state_up: Some(false),
            ..spec()
        };
        assert_eq!(
            r.changes(&down, &previous),
            Changes::Update(UpdateNetwork {
                admin_state_up: Some(false),
                ..Default::default()
            })
        );

        let moved = NetworkSpec {
            tenant_id: Some("other".to_string()),
            ..spec()
        };
        assert_eq!(r.changes(&moved, &previous), Changes::Replace(vec!["tenant_id"]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_stops_on_error_status() {
        let remote = Arc::new(
            MockRemote::new()
                .on_create(RemoteResponse::new(201, body("BUILD")))
                .on_get(RemoteResponse::new(200, body("BUILD")))
                .on_get(RemoteResponse::new(200, body("ERROR"))),
        );
        let config = ProviderConfig::default();
        let reconciler = Reconciler::new(NetworkResource, remote, &config);

        let err = reconciler.create(&spec()).await.unwrap_err();
        assert!(matches!(
            err,
            ReconcileError::Poll {
                source: PollError::TerminalFailure { ref status, .. },
                ..
            } if status == "ERROR"
        ));
    }
}
