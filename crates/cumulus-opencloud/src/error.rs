//! Open Cloud provider error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OpenCloudError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] cumulus_config::ConfigError),

    #[error(transparent)]
    Reconcile(#[from] cumulus_core::ReconcileError),

    #[error("Invalid lookup: {0}")]
    InvalidLookup(String),

    #[error("Your query returned no results. Please change your search criteria and try again.")]
    NoMatch,

    #[error(
        "Your query returned more than one result ({0}). Please try a more specific search criteria."
    )]
    AmbiguousMatch(usize),

    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, OpenCloudError>;
