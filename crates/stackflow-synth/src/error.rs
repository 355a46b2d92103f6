//! Synthesis error types

use std::path::PathBuf;
use thiserror::Error;

/// Synthesis and cloud assembly errors
#[derive(Error, Debug)]
pub enum SynthError {
    #[error("Stack '{stack}' cannot be synthesized in state '{state}'")]
    InvalidState { stack: String, state: String },

    #[error("Asset '{asset}' is referenced by {logical_id} but not registered")]
    UnknownAsset { asset: String, logical_id: String },

    #[error("Asset path not found: {}", .0.display())]
    AssetNotFound(PathBuf),

    #[error("Invalid template: {0}")]
    InvalidTemplate(String),

    #[error("Lock acquisition failed: {0}")]
    LockError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, SynthError>;
