//! YAML resource manifest
//!
//! ```yaml
//! resources:
//!   - kind: backup_policy
//!     name: nightly
//!     spec:
//!       name: nightly
//!       start_time: "02:00"
//!       frequency: 1
//!       retention: 7
//!       retain_first: "N"
//!       status: "ON"
//! ```

use anyhow::Context;
use cumulus_core::DesiredResource;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Default, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub resources: Vec<DesiredResource>,
}

impl Manifest {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid manifest {}", path.display()))
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        // An empty document is an empty manifest
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }
}
