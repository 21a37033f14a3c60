//! Typed errors for composition and synthesis.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing {kind} asset: {}", path.display())]
    MissingAsset { kind: &'static str, path: PathBuf },
    #[error("asset '{id}' changed after staging: {path}")]
    AssetChanged { id: String, path: String },
    #[error("missing reference: {kind} id '{id}'")]
    MissingReference { kind: &'static str, id: String },
    #[error("resource '{resource}' registered before its dependency '{missing}'")]
    DependencyOrder { resource: String, missing: String },
    #[error("duplicate logical id: {0}")]
    DuplicateId(String),
    #[error("access grant from '{grantee}' to '{target}' declared more than once")]
    DuplicateGrant { grantee: String, target: String },
    #[error("duplicate resolver: {type_name}.{field_name}")]
    DuplicateResolver { type_name: String, field_name: String },
    #[error("invalid {kind} name: '{name}'")]
    InvalidName { kind: &'static str, name: String },
    #[error("config load: {0}")]
    Load(String),
    #[error("validation: {0}")]
    Validation(String),
}

#[derive(Error, Debug)]
pub enum DeployError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("asset packaging: {0}")]
    Zip(#[from] zip::result::ZipError),
}
