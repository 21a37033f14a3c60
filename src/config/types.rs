//! Stack configuration. Every field is defaulted so an empty document yields the Polygone deployment.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatabaseEngine {
    #[serde(rename = "aurora-postgresql")]
    AuroraPostgresql,
}

impl DatabaseEngine {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatabaseEngine::AuroraPostgresql => "aurora-postgresql",
        }
    }
}

/// How callers of the GraphQL endpoint are authorized.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthorizationMode {
    /// Static API key; the key is published as a stack output.
    #[serde(rename = "API_KEY")]
    ApiKey,
    /// Signed IAM requests; no key exists, so the key output is empty.
    #[serde(rename = "AWS_IAM")]
    Iam,
}

impl AuthorizationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthorizationMode::ApiKey => "API_KEY",
            AuthorizationMode::Iam => "AWS_IAM",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OperationType {
    Query,
    Mutation,
}

impl OperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Query => "Query",
            OperationType::Mutation => "Mutation",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverConfig {
    pub type_name: OperationType,
    pub field_name: String,
}

impl ResolverConfig {
    pub fn new(type_name: OperationType, field_name: impl Into<String>) -> Self {
        Self {
            type_name,
            field_name: field_name.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub id: String,
    pub cidr: String,
    /// One isolated subnet per entry, each in its own availability zone.
    pub subnet_cidrs: Vec<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            id: "PolygoneVPC".into(),
            cidr: "10.0.0.0/16".into(),
            subnet_cidrs: vec!["10.0.0.0/18".into(), "10.0.64.0/18".into()],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub id: String,
    pub engine: DatabaseEngine,
    pub parameter_group: String,
    pub database_name: String,
    /// When false the cluster exposes no credential and `SECRET_ARN` is passed through empty.
    pub generate_secret: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            id: "AuroraPolygoneCluster".into(),
            engine: DatabaseEngine::AuroraPostgresql,
            parameter_group: "default.aurora-postgresql10".into(),
            database_name: "PolygoneDB".into(),
            generate_secret: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FunctionConfig {
    pub id: String,
    /// Directory bundled as the function code, relative to the asset root.
    pub code_path: PathBuf,
    pub handler: String,
    pub runtime: String,
    pub memory_size: u32,
}

impl Default for FunctionConfig {
    fn default() -> Self {
        Self {
            id: "polygone-function".into(),
            code_path: PathBuf::from("lambda-fns"),
            handler: "index.handler".into(),
            runtime: "nodejs10.x".into(),
            memory_size: 1024,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub id: String,
    pub name: String,
    /// GraphQL SDL file, relative to the asset root.
    pub schema_path: PathBuf,
    pub authorization: AuthorizationMode,
    pub data_source_name: String,
    pub resolvers: Vec<ResolverConfig>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            id: "Api".into(),
            name: "polygone-api".into(),
            schema_path: PathBuf::from("graphql/schema.graphql"),
            authorization: AuthorizationMode::ApiKey,
            data_source_name: "lambdaDatasource".into(),
            resolvers: default_resolvers(),
        }
    }
}

/// The five post operations served by the Lambda data source.
pub fn default_resolvers() -> Vec<ResolverConfig> {
    vec![
        ResolverConfig::new(OperationType::Query, "listPosts"),
        ResolverConfig::new(OperationType::Query, "getPostById"),
        ResolverConfig::new(OperationType::Mutation, "createPost"),
        ResolverConfig::new(OperationType::Mutation, "updatePost"),
        ResolverConfig::new(OperationType::Mutation, "deletePost"),
    ]
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StackConfig {
    pub stack_name: String,
    /// Directory that schema and code paths are resolved against.
    pub asset_root: PathBuf,
    pub network: NetworkConfig,
    pub database: DatabaseConfig,
    pub function: FunctionConfig,
    pub api: ApiConfig,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            stack_name: "PolygoneAppStack".into(),
            asset_root: PathBuf::from("."),
            network: NetworkConfig::default(),
            database: DatabaseConfig::default(),
            function: FunctionConfig::default(),
            api: ApiConfig::default(),
        }
    }
}

impl StackConfig {
    pub fn schema_file(&self) -> PathBuf {
        self.asset_root.join(&self.api.schema_path)
    }

    pub fn code_dir(&self) -> PathBuf {
        self.asset_root.join(&self.function.code_path)
    }
}

/// Target account and region. `None` keeps the plan environment-agnostic (pseudo parameters).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployEnv {
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
}

impl DeployEnv {
    pub fn new(account: Option<String>, region: Option<String>) -> Self {
        Self { account, region }
    }

    /// Reads `CDK_DEFAULT_ACCOUNT` / `CDK_DEFAULT_REGION` from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            account: non_empty("CDK_DEFAULT_ACCOUNT"),
            region: non_empty("CDK_DEFAULT_REGION"),
        }
    }

    /// `aws://<account>/<region>` with `unknown-*` placeholders for agnostic stacks.
    pub fn uri(&self) -> String {
        format!(
            "aws://{}/{}",
            self.account.as_deref().unwrap_or("unknown-account"),
            self.region.as_deref().unwrap_or("unknown-region")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config: StackConfig = serde_json::from_str("{}").expect("parse");
        assert_eq!(config, StackConfig::default());
        assert_eq!(config.api.resolvers.len(), 5);
        assert_eq!(config.database.database_name, "PolygoneDB");
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config: StackConfig = serde_json::from_str(
            r#"{ "api": { "authorization": "AWS_IAM" }, "function": { "memory_size": 512 } }"#,
        )
        .expect("parse");
        assert_eq!(config.api.authorization, AuthorizationMode::Iam);
        assert_eq!(config.api.name, "polygone-api");
        assert_eq!(config.function.memory_size, 512);
        assert_eq!(config.function.handler, "index.handler");
    }

    #[test]
    fn env_uri_uses_placeholders() {
        assert_eq!(DeployEnv::default().uri(), "aws://unknown-account/unknown-region");
        let env = DeployEnv::new(Some("123456789012".into()), Some("eu-west-1".into()));
        assert_eq!(env.uri(), "aws://123456789012/eu-west-1");
    }

    #[test]
    fn env_lookup_ignores_blank_values() {
        let env = DeployEnv::from_lookup(|key| match key {
            "CDK_DEFAULT_REGION" => Some("us-east-2".into()),
            "CDK_DEFAULT_ACCOUNT" => Some("  ".into()),
            _ => None,
        });
        assert_eq!(env.region.as_deref(), Some("us-east-2"));
        assert_eq!(env.account, None);
    }
}
