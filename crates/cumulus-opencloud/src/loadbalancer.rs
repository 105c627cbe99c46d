//! Classic ELB v1.0 load balancers

use crate::client::{Collection, ServiceClient};
use cumulus_core::error::{ReconcileError, Result, ValidationError};
use cumulus_core::resource::{
    Changes, Identified, ImmutableFields, Provisioning, Resource, diff_field, diff_optional,
};
use cumulus_core::validate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const KIND: &str = "loadbalancer";

pub const INTERNAL: &str = "Internal";
pub const EXTERNAL: &str = "External";

pub fn collection(client: ServiceClient) -> Collection {
    let project = client.project_id().to_string();
    Collection::new(client, &["v1.0", project.as_str(), "elbaas", "loadbalancers"])
}

fn default_admin_state() -> i64 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadBalancerSpec {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub vpc_id: String,
    /// `Internal` or `External`
    #[serde(rename = "type")]
    pub lb_type: String,
    /// Mbit/s, External only
    #[serde(default)]
    pub bandwidth: Option<i64>,
    /// `1` up, `0` down
    #[serde(default = "default_admin_state")]
    pub admin_state_up: i64,
    #[serde(default)]
    pub vip_subnet_id: Option<String>,
    #[serde(default)]
    pub az: Option<String>,
    #[serde(default)]
    pub charge_mode: Option<String>,
    #[serde(default)]
    pub eip_type: Option<String>,
    #[serde(default)]
    pub security_group_id: Option<String>,
    #[serde(default)]
    pub vip_address: Option<String>,
    #[serde(default)]
    pub tenant_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadBalancer {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub vpc_id: String,
    #[serde(rename = "type")]
    pub lb_type: String,
    #[serde(default)]
    pub bandwidth: Option<i64>,
    #[serde(default = "default_admin_state")]
    pub admin_state_up: i64,
    #[serde(default)]
    pub vip_subnet_id: Option<String>,
    #[serde(default)]
    pub vip_address: Option<String>,
    #[serde(default)]
    pub az: Option<String>,
    #[serde(default)]
    pub security_group_id: Option<String>,
    #[serde(default)]
    pub status: String,
}

impl Identified for LoadBalancer {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Serialize)]
pub struct CreateLoadBalancer {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    vpc_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    bandwidth: Option<i64>,
    #[serde(rename = "type")]
    lb_type: String,
    admin_state_up: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    vip_subnet_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    az: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    charge_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    eip_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    security_group_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    vip_address: Option<String>,
    #[serde(rename = "tenantId", skip_serializing_if = "Option::is_none")]
    tenant_id: Option<String>,
}

/// Only these fields can change in place
#[derive(Debug, Default, PartialEq, Serialize)]
pub struct UpdateLoadBalancer {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bandwidth: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    admin_state_up: Option<i64>,
}

pub struct LoadBalancerResource;

impl Resource for LoadBalancerResource {
    type Spec = LoadBalancerSpec;
    type Observed = LoadBalancer;
    type CreateRequest = CreateLoadBalancer;
    type UpdateRequest = UpdateLoadBalancer;

    fn kind(&self) -> &'static str {
        KIND
    }

    fn validate(&self, spec: &LoadBalancerSpec) -> std::result::Result<(), ValidationError> {
        validate::not_empty("name", &spec.name)?;
        validate::not_empty("vpc_id", &spec.vpc_id)?;
        validate::one_of("type", &spec.lb_type, &[INTERNAL, EXTERNAL])?;
        validate::in_range("admin_state_up", spec.admin_state_up, 0..=1)?;
        match (spec.lb_type.as_str(), spec.bandwidth) {
            (EXTERNAL, None) => Err(ValidationError::new(
                "bandwidth",
                "is required for External load balancers",
            )),
            (EXTERNAL, Some(bandwidth)) => validate::in_range("bandwidth", bandwidth, 1..=300),
            (_, Some(_)) => Err(ValidationError::new(
                "bandwidth",
                "only applies to External load balancers",
            )),
            _ => Ok(()),
        }
    }

    fn create_request(&self, spec: &LoadBalancerSpec) -> CreateLoadBalancer {
        CreateLoadBalancer {
            name: spec.name.clone(),
            description: spec.description.clone(),
            vpc_id: spec.vpc_id.clone(),
            bandwidth: spec.bandwidth,
            lb_type: spec.lb_type.clone(),
            admin_state_up: spec.admin_state_up,
            vip_subnet_id: spec.vip_subnet_id.clone(),
            az: spec.az.clone(),
            charge_mode: spec.charge_mode.clone(),
            eip_type: spec.eip_type.clone(),
            security_group_id: spec.security_group_id.clone(),
            vip_address: spec.vip_address.clone(),
            tenant_id: spec.tenant_id.clone(),
        }
    }

    fn created_id(&self, body: &Value) -> Result<String> {
        body.get("id")
            .or_else(|| body.pointer("/loadbalancer/id"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                ReconcileError::Decode("create response has no load balancer id".to_string())
            })
    }

    fn changes(
        &self,
        spec: &LoadBalancerSpec,
        previous: &LoadBalancer,
    ) -> Changes<UpdateLoadBalancer> {
        let mut immutable = ImmutableFields::new()
            .check("vpc_id", &spec.vpc_id, &previous.vpc_id)
            .check("type", &spec.lb_type, &previous.lb_type);
        if spec.vip_subnet_id.is_some() {
            immutable = immutable.check(
                "vip_subnet_id",
                &spec.vip_subnet_id,
                &previous.vip_subnet_id,
            );
        }
        if spec.vip_address.is_some() {
            immutable = immutable.check("vip_address", &spec.vip_address, &previous.vip_address);
        }
        if spec.az.is_some() {
            immutable = immutable.check("az", &spec.az, &previous.az);
        }
        if let Some(fields) = immutable.changed() {
            return Changes::Replace(fields);
        }

        Changes::from_update(UpdateLoadBalancer {
            name: diff_field(&spec.name, &previous.name),
            description: diff_optional(&spec.description.clone().map(Some), &previous.description)
                .flatten(),
            bandwidth: diff_optional(&spec.bandwidth.map(Some), &previous.bandwidth).flatten(),
            admin_state_up: diff_field(&spec.admin_state_up, &previous.admin_state_up),
        })
    }

    fn observe(&self, _id: &str, body: &Value) -> Result<LoadBalancer> {
        Ok(serde_json::from_value(body.clone())?)
    }

    fn status(&self, body: &Value) -> Option<String> {
        body.get("status").and_then(Value::as_str).map(str::to_string)
    }

    fn provisioning(&self) -> Option<Provisioning> {
        Some(Provisioning::new(&["ACTIVE"]).with_pending(&["PENDING_CREATE"]))
    }

    fn updating(&self) -> Option<Provisioning> {
        Some(Provisioning::new(&["ACTIVE"]).with_pending(&["PENDING_UPDATE"]))
    }

    fn failed_statuses(&self) -> &'static [&'static str] {
        &["ERROR"]
    }
}
