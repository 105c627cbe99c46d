//! Compute v2 keypairs
//!
//! A keypair is addressed by its name and cannot be changed after creation.

use crate::client::{Collection, ServiceClient};
use cumulus_core::error::{ReconcileError, Result, ValidationError};
use cumulus_core::resource::{Changes, Identified, ImmutableFields, Resource};
use cumulus_core::validate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const KIND: &str = "keypair";

pub fn collection(client: ServiceClient) -> Collection {
    Collection::new(client, &["v2", "os-keypairs"]).with_envelope("keypair")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeypairSpec {
    pub name: String,
    /// OpenSSH public key; the API generates a pair when absent
    #[serde(default)]
    pub public_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keypair {
    /// Same as the name
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub public_key: String,
    #[serde(default)]
    pub fingerprint: String,
}

impl Identified for Keypair {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Serialize)]
pub struct CreateKeypair {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    public_key: Option<String>,
}

/// Keypairs have no updatable fields
#[derive(Debug, Default, PartialEq, Serialize)]
pub struct NoUpdate {}

pub struct KeypairResource;

impl Resource for KeypairResource {
    type Spec = KeypairSpec;
    type Observed = Keypair;
    type CreateRequest = CreateKeypair;
    type UpdateRequest = NoUpdate;

    fn kind(&self) -> &'static str {
        KIND
    }

    fn validate(&self, spec: &KeypairSpec) -> std::result::Result<(), ValidationError> {
        validate::not_empty("name", &spec.name)?;
        validate::max_len("name", &spec.name, 255)
    }

    fn create_request(&self, spec: &KeypairSpec) -> CreateKeypair {
        CreateKeypair {
            name: spec.name.clone(),
            public_key: spec.public_key.clone(),
        }
    }

    fn created_id(&self, body: &Value) -> Result<String> {
        body.get("name")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                ReconcileError::Decode("create response has no keypair name".to_string())
            })
    }

    fn changes(&self, spec: &KeypairSpec, previous: &Keypair) -> Changes<NoUpdate> {
        let mut immutable = ImmutableFields::new().check("name", &spec.name, &previous.name);
        if let Some(public_key) = &spec.public_key {
            immutable = immutable.check(
                "public_key",
                &public_key.trim(),
                &previous.public_key.trim(),
            );
        }
        match immutable.changed() {
            Some(fields) => Changes::Replace(fields),
            None => Changes::Unchanged,
        }
    }

    fn observe(&self, id: &str, body: &Value) -> Result<Keypair> {
        let mut keypair: Keypair = serde_json::from_value(body.clone())?;
        keypair.id = id.to_string();
        Ok(keypair)
    }
}
