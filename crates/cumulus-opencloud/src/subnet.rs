//! Networking v2 subnets, and the single-subnet lookup

use crate::client::{Collection, ServiceClient};
use crate::error::{OpenCloudError, Result as LookupResult};
use cumulus_config::ProviderConfig;
use cumulus_core::error::{ReconcileError, Result, ValidationError};
use cumulus_core::resource::{
    Changes, Identified, ImmutableFields, Resource, diff_field, diff_optional,
};
use cumulus_core::validate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const KIND: &str = "subnet";

pub fn collection(client: ServiceClient) -> Collection {
    Collection::new(client, &["v2.0", "subnets"]).with_envelope("subnet")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationPool {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostRoute {
    #[serde(rename = "destination")]
    pub destination_cidr: String,
    #[serde(rename = "nexthop")]
    pub next_hop: String,
}

fn ip_version(field: &'static str, version: i64) -> std::result::Result<(), ValidationError> {
    if version == 4 || version == 6 {
        Ok(())
    } else {
        Err(ValidationError::new(
            field,
            "Only 4 and 6 are supported values for 'ip_version'",
        ))
    }
}

fn default_ip_version() -> i64 {
    4
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubnetSpec {
    pub network_id: String,
    pub cidr: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_ip_version")]
    pub ip_version: i64,
    #[serde(default)]
    pub gateway_ip: Option<String>,
    /// Create the subnet without a gateway
    #[serde(default)]
    pub no_gateway: bool,
    #[serde(default)]
    pub enable_dhcp: Option<bool>,
    /// Server-assigned when empty
    #[serde(default)]
    pub allocation_pools: Vec<AllocationPool>,
    #[serde(default)]
    pub dns_nameservers: Vec<String>,
    #[serde(default)]
    pub host_routes: Vec<HostRoute>,
    #[serde(default)]
    pub tenant_id: Option<String>,
}

impl SubnetSpec {
    /// Desired gateway: `Some(None)` removes it
    fn gateway(&self) -> Option<Option<String>> {
        if self.no_gateway {
            Some(None)
        } else {
            self.gateway_ip.clone().map(Some)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subnet {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub network_id: String,
    pub cidr: String,
    pub ip_version: i64,
    #[serde(default)]
    pub gateway_ip: Option<String>,
    #[serde(default)]
    pub enable_dhcp: bool,
    #[serde(default)]
    pub allocation_pools: Vec<AllocationPool>,
    #[serde(default)]
    pub dns_nameservers: Vec<String>,
    #[serde(default)]
    pub host_routes: Vec<HostRoute>,
    #[serde(default)]
    pub tenant_id: String,
}

impl Identified for Subnet {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Serialize)]
pub struct CreateSubnet {
    network_id: String,
    cidr: String,
    ip_version: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    /// Explicit `null` disables the gateway
    #[serde(skip_serializing_if = "Option::is_none")]
    gateway_ip: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    enable_dhcp: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    allocation_pools: Vec<AllocationPool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    dns_nameservers: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    host_routes: Vec<HostRoute>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tenant_id: Option<String>,
}

#[derive(Debug, Default, PartialEq, Serialize)]
pub struct UpdateSubnet {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    gateway_ip: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    enable_dhcp: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    allocation_pools: Option<Vec<AllocationPool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dns_nameservers: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    host_routes: Option<Vec<HostRoute>>,
}

pub struct SubnetResource;

impl Resource for SubnetResource {
    type Spec = SubnetSpec;
    type Observed = Subnet;
    type CreateRequest = CreateSubnet;
    type UpdateRequest = UpdateSubnet;

    fn kind(&self) -> &'static str {
        KIND
    }

    fn validate(&self, spec: &SubnetSpec) -> std::result::Result<(), ValidationError> {
        validate::not_empty("network_id", &spec.network_id)?;
        validate::not_empty("cidr", &spec.cidr)?;
        ip_version("ip_version", spec.ip_version)?;
        validate::exclusive(
            "gateway_ip",
            spec.gateway_ip.is_some(),
            "no_gateway",
            spec.no_gateway,
        )
    }

    fn create_request(&self, spec: &SubnetSpec) -> CreateSubnet {
        CreateSubnet {
            network_id: spec.network_id.clone(),
            cidr: spec.cidr.clone(),
            ip_version: spec.ip_version,
            name: spec.name.clone(),
            gateway_ip: spec.gateway(),
            enable_dhcp: spec.enable_dhcp,
            allocation_pools: spec.allocation_pools.clone(),
            dns_nameservers: spec.dns_nameservers.clone(),
            host_routes: spec.host_routes.clone(),
            tenant_id: spec.tenant_id.clone(),
        }
    }

    fn created_id(&self, body: &Value) -> Result<String> {
        body.get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ReconcileError::Decode("create response has no subnet id".to_string()))
    }

    fn changes(&self, spec: &SubnetSpec, previous: &Subnet) -> Changes<UpdateSubnet> {
        if let Some(fields) = ImmutableFields::new()
            .check("network_id", &spec.network_id, &previous.network_id)
            .check("cidr", &spec.cidr, &previous.cidr)
            .check("ip_version", &spec.ip_version, &previous.ip_version)
            .changed()
        {
            return Changes::Replace(fields);
        }

        let allocation_pools = if spec.allocation_pools.is_empty() {
            None
        } else {
            diff_field(&spec.allocation_pools, &previous.allocation_pools)
        };
        Changes::from_update(UpdateSubnet {
            name: diff_optional(&spec.name, &previous.name),
            gateway_ip: diff_optional(&spec.gateway(), &previous.gateway_ip),
            enable_dhcp: diff_optional(&spec.enable_dhcp, &previous.enable_dhcp),
            allocation_pools,
            dns_nameservers: diff_field(&spec.dns_nameservers, &previous.dns_nameservers),
            host_routes: diff_field(&spec.host_routes, &previous.host_routes),
        })
    }

    fn observe(&self, _id: &str, body: &Value) -> Result<Subnet> {
        Ok(serde_json::from_value(body.clone())?)
    }
}

/// Filters selecting exactly one existing subnet
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubnetFilter {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub dhcp_enabled: bool,
    #[serde(default)]
    pub dhcp_disabled: bool,
    #[serde(default)]
    pub network_id: Option<String>,
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub ip_version: Option<i64>,
    #[serde(default)]
    pub gateway_ip: Option<String>,
    #[serde(default)]
    pub cidr: Option<String>,
    #[serde(default)]
    pub subnet_id: Option<String>,
}

impl SubnetFilter {
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        validate::exclusive(
            "dhcp_enabled",
            self.dhcp_enabled,
            "dhcp_disabled",
            self.dhcp_disabled,
        )?;
        if let Some(version) = self.ip_version {
            ip_version("ip_version", version)?;
        }
        Ok(())
    }

    /// Scope to the configured project unless a tenant was given
    pub fn with_default_tenant(mut self, config: &ProviderConfig) -> Self {
        if self.tenant_id.is_none() {
            self.tenant_id = config.project_id.clone();
        }
        self
    }

    /// Query parameters for the list call
    pub fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if let Some(name) = &self.name {
            query.push(("name", name.clone()));
        }
        if self.dhcp_enabled {
            query.push(("enable_dhcp", "true".to_string()));
        }
        if self.dhcp_disabled {
            query.push(("enable_dhcp", "false".to_string()));
        }
        if let Some(network_id) = &self.network_id {
            query.push(("network_id", network_id.clone()));
        }
        if let Some(tenant_id) = &self.tenant_id {
            query.push(("tenant_id", tenant_id.clone()));
        }
        if let Some(version) = self.ip_version {
            query.push(("ip_version", version.to_string()));
        }
        if let Some(gateway_ip) = &self.gateway_ip {
            query.push(("gateway_ip", gateway_ip.clone()));
        }
        if let Some(cidr) = &self.cidr {
            query.push(("cidr", cidr.clone()));
        }
        if let Some(id) = &self.subnet_id {
            query.push(("id", id.clone()));
        }
        query
    }
}

/// The one subnet of a list response
pub fn select_one(body: &Value) -> LookupResult<Subnet> {
    let subnets = body
        .get("subnets")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            OpenCloudError::InvalidLookup("response has no `subnets` list".to_string())
        })?;
    match subnets.as_slice() {
        [] => Err(OpenCloudError::NoMatch),
        [subnet] => Ok(serde_json::from_value(subnet.clone())?),
        many => Err(OpenCloudError::AmbiguousMatch(many.len())),
    }
}

/// Find exactly one subnet matching `filter`
pub async fn lookup(subnets: &Collection, filter: &SubnetFilter) -> LookupResult<Subnet> {
    filter
        .validate()
        .map_err(|e| OpenCloudError::InvalidLookup(e.to_string()))?;

    let response = subnets.list(&filter.query()).await?;
    if !response.is_success() {
        return Err(OpenCloudError::Api {
            status: response.status,
            body: response.body_text(),
        });
    }

    let subnet = select_one(&response.body)?;
    tracing::debug!("Retrieved subnet {}: {:?}", subnet.id, subnet);
    Ok(subnet)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec() -> SubnetSpec {
        SubnetSpec {
            network_id: "n-1".to_string(),
            cidr: "10.0.0.0/24".to_string(),
            name: Some("sub-1".to_string()),
            ip_version: 4,
            gateway_ip: None,
            no_gateway: false,
            enable_dhcp: None,
            allocation_pools: Vec::new(),
            dns_nameservers: vec!["8.8.8.8".to_string()],
            host_routes: Vec::new(),
            tenant_id: None,
        }
    }

    fn body() -> Value {
        json!({
            "id": "s-1",
            "name": "sub-1",
            "network_id": "n-1",
            "cidr": "10.0.0.0/24",
            "ip_version": 4,
            "gateway_ip": "10.0.0.1",
            "enable_dhcp": true,
            "allocation_pools": [{"start": "10.0.0.2", "end": "10.0.0.254"}],
            "dns_nameservers": ["8.8.8.8"],
            "host_routes": [],
            "tenant_id": "proj1"
        })
    }

    #[test]
    fn test_validation() {
        let r = SubnetResource;
        assert!(r.validate(&spec()).is_ok());

        let v5 = SubnetSpec {
            ip_version: 5,
            ..spec()
        };
        assert_eq!(r.validate(&v5).unwrap_err().field, "ip_version");

        let both = SubnetSpec {
            gateway_ip: Some("10.0.0.1".to_string()),
            no_gateway: true,
            ..spec()
        };
        assert_eq!(
            r.validate(&both).unwrap_err().to_string(),
            "gateway_ip: conflicts with `no_gateway`"
        );
    }

    #[test]
    fn test_no_gateway_sends_null() {
        let r = SubnetResource;
        let spec = SubnetSpec {
            no_gateway: true,
            ..spec()
        };
        let request = serde_json::to_value(r.create_request(&spec)).unwrap();
        assert_eq!(request["gateway_ip"], Value::Null);
        assert!(request.as_object().unwrap().contains_key("gateway_ip"));

        let request = serde_json::to_value(r.create_request(&self::spec())).unwrap();
        assert!(!request.as_object().unwrap().contains_key("gateway_ip"));
        assert!(!request.as_object().unwrap().contains_key("allocation_pools"));
    }

    #[test]
    fn test_changes() {
        let r = SubnetResource;
        let previous = r.observe("s-1", &body()).unwrap();

        // server-assigned pools and gateway are left alone
        assert!(r.changes(&spec(), &previous).is_unchanged());

        let bigger = SubnetSpec {
            cidr: "10.0.0.0/16".to_string(),
            ip_version: 6,
            ..spec()
        };
        assert_eq!(
            r.changes(&bigger, &previous),
            Changes::Replace(vec!["cidr", "ip_version"])
        );

        let no_dns = SubnetSpec {
            dns_nameservers: Vec::new(),
            no_gateway: true,
            ..spec()
        };
        match r.changes(&no_dns, &previous) {
            Changes::Update(update) => assert_eq!(
                serde_json::to_value(update).unwrap(),
                json!({"gateway_ip": null, "dns_nameservers": []})
            ),
            other => panic!("expected update, got {:?}", other),
        }
    }

    #[test]
    fn test_filter_query() {
        let filter = SubnetFilter {
            name: Some("sub-1".to_string()),
            dhcp_disabled: true,
            ip_version: Some(4),
            ..Default::default()
        };
        assert_eq!(
            filter.query(),
            vec![
                ("name", "sub-1".to_string()),
                ("enable_dhcp", "false".to_string()),
                ("ip_version", "4".to_string()),
            ]
        );

        let conflicting = SubnetFilter {
            dhcp_enabled: true,
            dhcp_disabled: true,
            ..Default::default()
        };
        assert!(conflicting.validate().is_err());
    }

    #[test]
    fn test_default_tenant() {
        let config = ProviderConfig {
            project_id: Some("proj1".to_string()),
            ..Default::default()
        };
        let filter = SubnetFilter::default().with_default_tenant(&config);
        assert_eq!(filter.tenant_id.as_deref(), Some("proj1"));

        let explicit = SubnetFilter {
            tenant_id: Some("other".to_string()),
            ..Default::default()
        }
        .with_default_tenant(&config);
        assert_eq!(explicit.tenant_id.as_deref(), Some("other"));
    }

    #[test]
    fn test_select_one() {
        assert!(matches!(
            select_one(&json!({"subnets": []})),
            Err(OpenCloudError::NoMatch)
        ));
        assert!(matches!(
            select_one(&json!({"subnets": [body(), body()]})),
            Err(OpenCloudError::AmbiguousMatch(2))
        ));
        let subnet = select_one(&json!({"subnets": [body()]})).unwrap();
        assert_eq!(subnet.id, "s-1");
        assert_eq!(subnet.allocation_pools[0].end, "10.0.0.254");
    }
}
