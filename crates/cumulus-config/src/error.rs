use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config directory not found")]
    ConfigDirNotFound,

    #[error(
        "config file not found: {0}\n\
        Cumulus looks for the file named by CUMULUS_CONFIG, then ./cumulus.yaml,\n\
        then ~/.config/cumulus/config.yaml"
    )]
    ConfigFileNotFound(String),

    #[error("no auth token configured (set `token` in the config file or OS_AUTH_TOKEN)")]
    MissingToken,

    #[error("no project configured (set `project_id`, OS_TENANT_ID or OS_PROJECT_ID)")]
    MissingProject,

    #[error("no endpoint configured for service `{0}` (set endpoints.{0} or {1})")]
    MissingEndpoint(&'static str, String),

    #[error("invalid config value for `{field}`: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
