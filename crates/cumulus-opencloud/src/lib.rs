//! Open Cloud provider for Cumulus
//!
//! Resource kinds for the OpenStack-based Open Telekom / Telefonica Open
//! Cloud APIs, each described as a [`cumulus_core::Resource`] and driven
//! by the generic reconciler.
//!
//! # Kinds
//!
//! - `backup_policy`: VBS v2 backup policies (asynchronous, `ON`/`OFF`)
//! - `network`, `subnet`: Networking v2
//! - `loadbalancer`: classic ELB v1.0
//! - `keypair`: Compute keypairs
//!
//! Scaling group instances and the single-subnet lookup are exposed as
//! plain API helpers.
//!
//! # Example
//!
//! ```ignore
//! use cumulus_core::{Engine, FileStateStore};
//! use cumulus_opencloud::OpenCloudProvider;
//!
//! let config = cumulus_config::ProviderConfig::load()?;
//! let store = FileStateStore::new(".");
//! let mut engine = Engine::new(&store);
//! OpenCloudProvider::new(&config).register(&mut engine)?;
//!
//! let plan = engine.plan(&desired).await?;
//! let result = engine.apply(&plan).await;
//! ```

pub mod autoscaling;
pub mod backup_policy;
pub mod client;
pub mod error;
pub mod keypair;
pub mod loadbalancer;
pub mod network;
pub mod provider;
pub mod subnet;

pub use autoscaling::{BatchAction, ScalingInstance, ScalingInstances};
pub use client::{Collection, Lookup, ServiceClient};
pub use error::{OpenCloudError, Result};
pub use provider::{KINDS, OpenCloudProvider, service_for};
pub use subnet::{Subnet, SubnetFilter};
