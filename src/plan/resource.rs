//! Deployment-time resource records. Each record names the ids it provides (its own plus
//! any child resources it expands to) and the ids it depends on.

use crate::asset::Asset;
use crate::config::{AuthorizationMode, DatabaseEngine, OperationType};
use crate::plan::value::{ResourceId, Value};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    NetworkBoundary,
    RelationalStore,
    ComputeBinding,
    AccessGrant,
    ApiGateway,
    DataSource,
    ResolverBinding,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::NetworkBoundary => "network_boundary",
            ResourceKind::RelationalStore => "relational_store",
            ResourceKind::ComputeBinding => "compute_binding",
            ResourceKind::AccessGrant => "access_grant",
            ResourceKind::ApiGateway => "api_gateway",
            ResourceKind::DataSource => "data_source",
            ResourceKind::ResolverBinding => "resolver_binding",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Subnet {
    pub id: ResourceId,
    pub cidr: String,
    /// Index into the region's availability zones.
    pub zone_index: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NetworkBoundary {
    pub id: ResourceId,
    pub path: String,
    pub cidr: String,
    pub subnets: Vec<Subnet>,
}

/// Credential generated alongside the cluster.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GeneratedSecret {
    pub id: ResourceId,
    /// Binds the secret to the cluster; its ref is the secret ARN consumers use.
    pub attachment: ResourceId,
    pub username: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RelationalStore {
    pub id: ResourceId,
    pub path: String,
    pub engine: DatabaseEngine,
    pub parameter_group: String,
    pub database_name: String,
    pub network: ResourceId,
    pub subnet_group: ResourceId,
    pub subnets: Vec<ResourceId>,
    pub secret: Option<GeneratedSecret>,
    /// Data-access entry point.
    pub cluster_arn: Value,
}

impl RelationalStore {
    pub fn secret_arn(&self) -> Option<Value> {
        self.secret.as_ref().map(|s| Value::reference(&s.attachment))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ComputeBinding {
    pub id: ResourceId,
    pub path: String,
    /// Execution role the function runs as; grants attach to it.
    pub role: ResourceId,
    pub code: Asset,
    pub code_bucket: Value,
    pub handler: String,
    pub runtime: String,
    pub memory_size: u32,
    pub environment: BTreeMap<String, Value>,
}

impl ComputeBinding {
    pub fn arn(&self) -> Value {
        Value::attribute(&self.id, "Arn")
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PolicyStatement {
    pub actions: Vec<String>,
    pub resources: Vec<Value>,
}

impl PolicyStatement {
    pub fn allow(actions: &[&str], resources: Vec<Value>) -> Self {
        Self {
            actions: actions.iter().map(|a| a.to_string()).collect(),
            resources,
        }
    }
}

/// One-directional permission: `grantee` may call `target`'s managed entry point.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AccessGrant {
    pub id: ResourceId,
    pub path: String,
    pub grantee: ResourceId,
    pub grantee_role: ResourceId,
    pub target: ResourceId,
    pub statements: Vec<PolicyStatement>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ApiGateway {
    pub id: ResourceId,
    pub path: String,
    pub name: String,
    pub authorization: AuthorizationMode,
    pub schema: ResourceId,
    pub schema_asset: Asset,
    /// Schema SDL, inlined into the plan.
    pub definition: String,
    /// Present only for `API_KEY` authorization.
    pub api_key: Option<ResourceId>,
}

impl ApiGateway {
    pub fn api_id(&self) -> Value {
        Value::attribute(&self.id, "ApiId")
    }

    pub fn graphql_url(&self) -> Value {
        Value::attribute(&self.id, "GraphQLUrl")
    }

    pub fn api_key_value(&self) -> Option<Value> {
        self.api_key.as_ref().map(|k| Value::attribute(k, "ApiKey"))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DataSource {
    pub id: ResourceId,
    pub path: String,
    pub name: String,
    pub api: ResourceId,
    pub api_id: Value,
    /// Service role the API assumes to invoke the function.
    pub role: ResourceId,
    pub function: ResourceId,
    pub function_arn: Value,
}

impl DataSource {
    pub fn name_value(&self) -> Value {
        Value::attribute(&self.id, "Name")
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ResolverBinding {
    pub id: ResourceId,
    pub path: String,
    pub type_name: OperationType,
    pub field_name: String,
    pub api: ResourceId,
    pub api_id: Value,
    /// Resolvers can only attach once the schema defining their field exists.
    pub schema: ResourceId,
    pub data_source: ResourceId,
    pub data_source_name: Value,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Resource {
    Network(NetworkBoundary),
    Store(RelationalStore),
    Function(ComputeBinding),
    Grant(AccessGrant),
    Api(ApiGateway),
    DataSource(DataSource),
    Resolver(ResolverBinding),
}

impl Resource {
    pub fn id(&self) -> &ResourceId {
        match self {
            Resource::Network(r) => &r.id,
            Resource::Store(r) => &r.id,
            Resource::Function(r) => &r.id,
            Resource::Grant(r) => &r.id,
            Resource::Api(r) => &r.id,
            Resource::DataSource(r) => &r.id,
            Resource::Resolver(r) => &r.id,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Resource::Network(r) => &r.path,
            Resource::Store(r) => &r.path,
            Resource::Function(r) => &r.path,
            Resource::Grant(r) => &r.path,
            Resource::Api(r) => &r.path,
            Resource::DataSource(r) => &r.path,
            Resource::Resolver(r) => &r.path,
        }
    }

    pub fn kind(&self) -> ResourceKind {
        match self {
            Resource::Network(_) => ResourceKind::NetworkBoundary,
            Resource::Store(_) => ResourceKind::RelationalStore,
            Resource::Function(_) => ResourceKind::ComputeBinding,
            Resource::Grant(_) => ResourceKind::AccessGrant,
            Resource::Api(_) => ResourceKind::ApiGateway,
            Resource::DataSource(_) => ResourceKind::DataSource,
            Resource::Resolver(_) => ResourceKind::ResolverBinding,
        }
    }

    /// The resource's own id followed by the ids of the child resources it expands to.
    pub fn provides(&self) -> Vec<&ResourceId> {
        let mut ids = vec![self.id()];
        match self {
            Resource::Network(r) => ids.extend(r.subnets.iter().map(|s| &s.id)),
            Resource::Store(r) => {
                ids.push(&r.subnet_group);
                if let Some(secret) = &r.secret {
                    ids.push(&secret.id);
                    ids.push(&secret.attachment);
                }
            }
            Resource::Function(r) => ids.push(&r.role),
            Resource::Api(r) => {
                ids.push(&r.schema);
                ids.extend(r.api_key.iter());
            }
            Resource::DataSource(r) => ids.push(&r.role),
            Resource::Grant(_) | Resource::Resolver(_) => {}
        }
        ids
    }

    /// Ids provided by other resources that must be registered first.
    pub fn dependencies(&self) -> BTreeSet<&ResourceId> {
        let mut deps: BTreeSet<&ResourceId> = BTreeSet::new();
        match self {
            Resource::Network(_) => {}
            Resource::Store(r) => {
                deps.insert(&r.network);
                deps.extend(r.subnets.iter());
                deps.extend(r.cluster_arn.references());
            }
            Resource::Function(r) => {
                deps.extend(r.code_bucket.references());
                for value in r.environment.values() {
                    deps.extend(value.references());
                }
            }
            Resource::Grant(r) => {
                deps.insert(&r.grantee);
                deps.insert(&r.grantee_role);
                deps.insert(&r.target);
                for statement in &r.statements {
                    for value in &statement.resources {
                        deps.extend(value.references());
                    }
                }
            }
            Resource::Api(_) => {}
            Resource::DataSource(r) => {
                deps.insert(&r.api);
                deps.insert(&r.function);
                deps.extend(r.api_id.references());
                deps.extend(r.function_arn.references());
            }
            Resource::Resolver(r) => {
                deps.insert(&r.api);
                deps.insert(&r.schema);
                deps.insert(&r.data_source);
                deps.extend(r.api_id.references());
                deps.extend(r.data_source_name.references());
            }
        }
        for own in self.provides() {
            deps.remove(own);
        }
        deps
    }
}
