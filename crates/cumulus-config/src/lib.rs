//! Provider configuration for Cumulus
//!
//! A [`ProviderConfig`] is loaded once (config file, then environment
//! overrides) and handed by reference to every reconciler.

pub mod error;

pub use error::*;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_ENV: &str = "CUMULUS_CONFIG";
const LOCAL_CONFIG_FILE: &str = "cumulus.yaml";
const GLOBAL_CONFIG_FILE: &str = "config.yaml";

/// Services of the vendor API that Cumulus talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    Networking,
    Vbs,
    Elb,
    Compute,
    Autoscaling,
}

impl Service {
    pub const ALL: [Service; 5] = [
        Service::Networking,
        Service::Vbs,
        Service::Elb,
        Service::Compute,
        Service::Autoscaling,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Service::Networking => "networking",
            Service::Vbs => "vbs",
            Service::Elb => "elb",
            Service::Compute => "compute",
            Service::Autoscaling => "autoscaling",
        }
    }

    /// Environment variable overriding this service's endpoint
    pub fn endpoint_env(&self) -> String {
        format!("OS_ENDPOINT_{}", self.as_str().to_uppercase())
    }
}

impl std::fmt::Display for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-service base URLs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub networking: Option<String>,
    pub vbs: Option<String>,
    pub elb: Option<String>,
    pub compute: Option<String>,
    pub autoscaling: Option<String>,
}

impl Endpoints {
    pub fn get(&self, service: Service) -> Option<&str> {
        match service {
            Service::Networking => self.networking.as_deref(),
            Service::Vbs => self.vbs.as_deref(),
            Service::Elb => self.elb.as_deref(),
            Service::Compute => self.compute.as_deref(),
            Service::Autoscaling => self.autoscaling.as_deref(),
        }
    }

    pub fn set(&mut self, service: Service, url: String) {
        let slot = match service {
            Service::Networking => &mut self.networking,
            Service::Vbs => &mut self.vbs,
            Service::Elb => &mut self.elb,
            Service::Compute => &mut self.compute,
            Service::Autoscaling => &mut self.autoscaling,
        };
        *slot = Some(url);
    }
}

/// Overall deadlines for asynchronous operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    pub create_secs: u64,
    pub update_secs: u64,
    pub delete_secs: u64,
}

fn default_timeout_secs() -> u64 {
    300 // 5 minutes
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            create_secs: default_timeout_secs(),
            update_secs: default_timeout_secs(),
            delete_secs: default_timeout_secs(),
        }
    }
}

impl Timeouts {
    pub fn create(&self) -> Duration {
        Duration::from_secs(self.create_secs)
    }

    pub fn update(&self) -> Duration {
        Duration::from_secs(self.update_secs)
    }

    pub fn delete(&self) -> Duration {
        Duration::from_secs(self.delete_secs)
    }
}

/// Poll cadence used while waiting on the remote API
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Polling {
    /// Wait before the first status check (milliseconds)
    pub delay_ms: u64,
    /// Floor between two status checks (milliseconds)
    pub min_interval_ms: u64,
    /// Ceiling for the interval when backing off (milliseconds)
    pub max_interval_ms: u64,
    /// Interval multiplier; 1.0 keeps a fixed interval
    pub backoff_multiplier: f64,
}

impl Default for Polling {
    fn default() -> Self {
        Self {
            delay_ms: 5_000,
            min_interval_ms: 3_000,
            max_interval_ms: 10_000,
            backoff_multiplier: 1.0,
        }
    }
}

impl Polling {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    pub fn max_interval(&self) -> Duration {
        Duration::from_millis(self.max_interval_ms.max(self.min_interval_ms))
    }
}

/// Provider configuration, constructed once per process
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub region: Option<String>,
    /// Project (tenant) the API paths are scoped to
    pub project_id: Option<String>,
    /// Pre-issued auth token, sent as `X-Auth-Token`
    pub token: Option<String>,
    pub endpoints: Endpoints,
    /// Skip TLS certificate verification
    pub insecure: bool,
    pub timeouts: Timeouts,
    pub polling: Polling,
}

impl ProviderConfig {
    /// Load the config file (if any) and apply environment overrides
    pub fn load() -> Result<Self> {
        let mut config = match find_config_file()? {
            Some(path) => Self::from_file(&path)?,
            None => {
                tracing::debug!("No config file found, using defaults");
                Self::default()
            }
        };
        config.apply_env();
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ProviderConfig = serde_yaml::from_str(&content)?;
        tracing::debug!("Loaded provider config from {}", path.display());
        Ok(config)
    }

    /// Override fields from `OS_*` environment variables
    pub fn apply_env(&mut self) {
        if let Some(token) = non_empty_env("OS_AUTH_TOKEN") {
            self.token = Some(token);
        }
        if let Some(region) = non_empty_env("OS_REGION_NAME") {
            self.region = Some(region);
        }
        // first one set wins
        if let Some(project) = ["OS_TENANT_ID", "OS_PROJECT_ID"]
            .iter()
            .find_map(|key| non_empty_env(key))
        {
            self.project_id = Some(project);
        }
        for service in Service::ALL {
            if let Some(url) = non_empty_env(&service.endpoint_env()) {
                self.endpoints.set(service, url);
            }
        }
    }

    /// Check that the settings every API call needs are present
    pub fn validate(&self) -> Result<()> {
        if self.token.as_deref().is_none_or(str::is_empty) {
            return Err(ConfigError::MissingToken);
        }
        if self.project_id.as_deref().is_none_or(str::is_empty) {
            return Err(ConfigError::MissingProject);
        }
        if self.polling.min_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "polling.min_interval_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.polling.backoff_multiplier < 1.0 {
            return Err(ConfigError::InvalidValue {
                field: "polling.backoff_multiplier",
                reason: "must be at least 1.0".to_string(),
            });
        }
        Ok(())
    }

    pub fn endpoint(&self, service: Service) -> Result<&str> {
        self.endpoints
            .get(service)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| ConfigError::MissingEndpoint(service.as_str(), service.endpoint_env()))
    }

    pub fn project(&self) -> Result<&str> {
        self.project_id
            .as_deref()
            .filter(|p| !p.is_empty())
            .ok_or(ConfigError::MissingProject)
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Cumulus's global config directory (`~/.config/cumulus`)
pub fn get_config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join("cumulus"))
        .ok_or(ConfigError::ConfigDirNotFound)
}

/// Find the provider config file
///
/// Search order:
/// 1. `CUMULUS_CONFIG` environment variable (must point at an existing file)
/// 2. `./cumulus.yaml`
/// 3. `~/.config/cumulus/config.yaml`
pub fn find_config_file() -> Result<Option<PathBuf>> {
    if let Some(config_path) = non_empty_env(CONFIG_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(Some(path));
        }
        return Err(ConfigError::ConfigFileNotFound(path.display().to_string()));
    }

    let local = std::env::current_dir()?.join(LOCAL_CONFIG_FILE);
    if local.exists() {
        return Ok(Some(local));
    }

    if let Ok(config_dir) = get_config_dir() {
        let global = config_dir.join(GLOBAL_CONFIG_FILE);
        if global.exists() {
            return Ok(Some(global));
        }
    }

    Ok(None)
}
