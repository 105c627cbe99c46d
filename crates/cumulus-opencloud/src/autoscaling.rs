//! Auto Scaling v1 group instances
//!
//! Instances belong to a scaling group and are not reconciled on their own;
//! this module exposes the list, remove and batch operations of the API.

use crate::client::ServiceClient;
use crate::error::{OpenCloudError, Result};
use cumulus_core::RemoteResponse;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const RESOURCE_PATH: &str = "scaling_group_instance";
const API_VERSION: &str = "v1";
const API_PREFIX: &str = "autoscaling-api";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalingInstance {
    pub instance_id: String,
    #[serde(default)]
    pub instance_name: String,
    #[serde(default)]
    pub scaling_group_id: String,
    #[serde(default)]
    pub scaling_configuration_id: String,
    /// e.g. `INSERVICE`, `PENDING`, `REMOVING`
    #[serde(default)]
    pub life_cycle_state: String,
    #[serde(default)]
    pub health_status: String,
    #[serde(default)]
    pub create_time: String,
}

#[derive(Debug, Deserialize)]
struct InstanceList {
    #[serde(default)]
    scaling_group_instances: Vec<ScalingInstance>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BatchAction {
    Add,
    Remove,
}

#[derive(Debug, Serialize)]
struct BatchRequest<'a> {
    instances_id: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    instance_delete: Option<&'static str>,
    action: BatchAction,
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}

/// Instance operations of one project's Auto Scaling service
pub struct ScalingInstances {
    client: ServiceClient,
}

impl ScalingInstances {
    pub fn new(client: ServiceClient) -> Self {
        Self { client }
    }

    fn url(&self, tail: &[&str]) -> String {
        let mut segments = vec![
            API_PREFIX,
            API_VERSION,
            self.client.project_id(),
            RESOURCE_PATH,
        ];
        segments.extend_from_slice(tail);
        self.client.service_url(&segments)
    }

    pub fn list_url(&self, group_id: &str) -> String {
        self.url(&[group_id, "list"])
    }

    pub fn delete_url(&self, instance_id: &str) -> String {
        self.url(&[instance_id])
    }

    pub fn batch_url(&self, group_id: &str) -> String {
        self.url(&[group_id, "action"])
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<RemoteResponse> {
        let response = self.client.send(method, url, query, body).await?;
        if !response.is_success() {
            return Err(OpenCloudError::Api {
                status: response.status,
                body: response.body_text(),
            });
        }
        Ok(response)
    }

    /// All instances of a scaling group
    pub async fn list(&self, group_id: &str) -> Result<Vec<ScalingInstance>> {
        let response = self
            .send(Method::GET, &self.list_url(group_id), &[], None)
            .await?;
        let list: InstanceList = serde_json::from_value(response.body)?;
        tracing::debug!(
            "Scaling group {} has {} instances",
            group_id,
            list.scaling_group_instances.len()
        );
        Ok(list.scaling_group_instances)
    }

    /// Remove one instance from its group, optionally deleting the server
    pub async fn remove(&self, instance_id: &str, delete_instance: bool) -> Result<()> {
        let query = [("instance_delete", yes_no(delete_instance).to_string())];
        self.send(Method::DELETE, &self.delete_url(instance_id), &query, None)
            .await?;
        tracing::info!("Removed instance {} from its scaling group", instance_id);
        Ok(())
    }

    /// Add or remove several instances at once
    pub async fn batch(
        &self,
        group_id: &str,
        action: BatchAction,
        instance_ids: &[String],
        delete_instance: bool,
    ) -> Result<()> {
        let body = serde_json::to_value(batch_request(action, instance_ids, delete_instance))?;
        self.send(Method::POST, &self.batch_url(group_id), &[], Some(&body))
            .await?;
        tracing::info!(
            "Batch {:?} of {} instances on scaling group {}",
            action,
            instance_ids.len(),
            group_id
        );
        Ok(())
    }
}

fn batch_request(action: BatchAction, ids: &[String], delete_instance: bool) -> BatchRequest<'_> {
    BatchRequest {
        instances_id: ids,
        // only meaningful when removing
        instance_delete: (action == BatchAction::Remove).then(|| yes_no(delete_instance)),
        action,
    }
}
