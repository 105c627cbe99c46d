//! Wiring of resource kinds to configured service endpoints

use crate::autoscaling::ScalingInstances;
use crate::backup_policy::{self, BackupPolicyResource};
use crate::client::{Collection, ServiceClient};
use crate::error::{OpenCloudError, Result};
use crate::keypair::{self, KeypairResource};
use crate::loadbalancer::{self, LoadBalancerResource};
use crate::network::{self, NetworkResource};
use crate::subnet::{self, Subnet, SubnetFilter, SubnetResource};
use cumulus_config::{ConfigError, ProviderConfig, Service};
use cumulus_core::{Engine, Reconciler};
use tokio_util::sync::CancellationToken;

/// Every reconciled kind with the service it lives on
pub const KINDS: [(&str, Service); 5] = [
    (backup_policy::KIND, Service::Vbs),
    (network::KIND, Service::Networking),
    (subnet::KIND, Service::Networking),
    (loadbalancer::KIND, Service::Elb),
    (keypair::KIND, Service::Compute),
];

/// Open Cloud provider bound to one configuration
pub struct OpenCloudProvider<'a> {
    config: &'a ProviderConfig,
    cancel: CancellationToken,
}

impl<'a> OpenCloudProvider<'a> {
    pub fn new(config: &'a ProviderConfig) -> Self {
        Self {
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Token shared by every reconciler this provider registers
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &'a ProviderConfig {
        self.config
    }

    pub fn client(&self, service: Service) -> Result<ServiceClient> {
        ServiceClient::new(self.config, service)
    }

    /// `None` when the service has no endpoint configured
    fn optional_client(&self, service: Service) -> Result<Option<ServiceClient>> {
        match self.client(service) {
            Ok(client) => Ok(Some(client)),
            Err(OpenCloudError::Config(ConfigError::MissingEndpoint(..))) => {
                tracing::debug!("No {} endpoint configured, skipping its kinds", service);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Register a reconciler for every kind whose endpoint is configured
    ///
    /// Returns the registered kinds.
    pub fn register(&self, engine: &mut Engine<'a>) -> Result<Vec<&'static str>> {
        self.config.validate()?;
        let config = self.config;
        let mut kinds = Vec::new();

        if let Some(client) = self.optional_client(Service::Vbs)? {
            engine.register(
                Reconciler::new(BackupPolicyResource, backup_policy::collection(client), config)
                    .with_cancellation(self.cancel.clone()),
            );
            kinds.push(backup_policy::KIND);
        }
        if let Some(client) = self.optional_client(Service::Networking)? {
            engine.register(
                Reconciler::new(NetworkResource, network::collection(client.clone()), config)
                    .with_cancellation(self.cancel.clone()),
            );
            engine.register(
                Reconciler::new(SubnetResource, subnet::collection(client), config)
                    .with_cancellation(self.cancel.clone()),
            );
            kinds.extend([network::KIND, subnet::KIND]);
        }
        if let Some(client) = self.optional_client(Service::Elb)? {
            engine.register(
                Reconciler::new(LoadBalancerResource, loadbalancer::collection(client), config)
                    .with_cancellation(self.cancel.clone()),
            );
            kinds.push(loadbalancer::KIND);
        }
        if let Some(client) = self.optional_client(Service::Compute)? {
            engine.register(
                Reconciler::new(KeypairResource, keypair::collection(client), config)
                    .with_cancellation(self.cancel.clone()),
            );
            kinds.push(keypair::KIND);
        }

        tracing::debug!("Registered kinds: {:?}", kinds);
        Ok(kinds)
    }

    pub fn subnets(&self) -> Result<Collection> {
        Ok(subnet::collection(self.client(Service::Networking)?))
    }

    /// Find exactly one subnet, scoped to the configured project by default
    pub async fn lookup_subnet(&self, filter: SubnetFilter) -> Result<Subnet> {
        let filter = filter.with_default_tenant(self.config);
        subnet::lookup(&self.subnets()?, &filter).await
    }

    pub fn scaling_instances(&self) -> Result<ScalingInstances> {
        Ok(ScalingInstances::new(self.client(Service::Autoscaling)?))
    }
}

/// Service a kind is served by
pub fn service_for(kind: &str) -> Option<Service> {
    KINDS
        .iter()
        .find(|(k, _)| *k == kind)
        .map(|(_, service)| *service)
}
