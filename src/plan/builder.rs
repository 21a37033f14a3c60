//! In-memory plan registry. Every registration is checked against what is already
//! registered, so the resulting plan is topologically ordered by construction.

use crate::asset::Asset;
use crate::config::DeployEnv;
use crate::error::ConfigError;
use crate::plan::resource::Resource;
use crate::plan::value::{ResourceId, Value};
use crate::plan::{DeploymentPlan, Output};
use std::collections::{HashMap, HashSet};

#[derive(Debug)]
pub struct PlanBuilder {
    stack_name: String,
    env: DeployEnv,
    resources: Vec<Resource>,
    /// Provided id -> construction index of the owning resource.
    owners: HashMap<ResourceId, usize>,
    grants: HashSet<(ResourceId, ResourceId)>,
    outputs: Vec<Output>,
    assets: Vec<Asset>,
}

impl PlanBuilder {
    pub fn new(stack_name: impl Into<String>, env: DeployEnv) -> Self {
        Self {
            stack_name: stack_name.into(),
            env,
            resources: Vec::new(),
            owners: HashMap::new(),
            grants: HashSet::new(),
            outputs: Vec::new(),
            assets: Vec::new(),
        }
    }

    pub fn add_asset(&mut self, asset: Asset) {
        self.assets.push(asset);
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Register a resource and return its construction index.
    pub fn register(&mut self, resource: Resource) -> Result<usize, ConfigError> {
        let provided = resource.provides();
        let mut seen = HashSet::new();
        for id in &provided {
            if self.owners.contains_key(*id) || !seen.insert(*id) {
                return Err(ConfigError::DuplicateId(id.to_string()));
            }
        }
        if let Some(missing) = resource
            .dependencies()
            .into_iter()
            .find(|dep| !self.owners.contains_key(*dep))
        {
            return Err(ConfigError::DependencyOrder {
                resource: resource.id().to_string(),
                missing: missing.to_string(),
            });
        }
        if let Resource::Grant(grant) = &resource {
            let pair = (grant.grantee.clone(), grant.target.clone());
            if self.grants.contains(&pair) {
                return Err(ConfigError::DuplicateGrant {
                    grantee: grant.grantee.to_string(),
                    target: grant.target.to_string(),
                });
            }
            self.grants.insert(pair);
        }

        let index = self.resources.len();
        for id in provided {
            self.owners.insert(id.clone(), index);
        }
        tracing::debug!(
            index,
            id = %resource.id(),
            kind = %resource.kind(),
            path = resource.path(),
            "registered resource"
        );
        self.resources.push(resource);
        Ok(index)
    }

    /// Publish a named output. Outputs may only read registered resources.
    pub fn output(&mut self, name: &str, value: Value) -> Result<(), ConfigError> {
        if self.outputs.iter().any(|o| o.name == name) {
            return Err(ConfigError::DuplicateId(name.to_string()));
        }
        if let Some(missing) = value
            .references()
            .into_iter()
            .find(|r| !self.owners.contains_key(*r))
        {
            return Err(ConfigError::DependencyOrder {
                resource: name.to_string(),
                missing: missing.to_string(),
            });
        }
        tracing::debug!(name, "published output");
        self.outputs.push(Output {
            name: name.to_string(),
            value,
        });
        Ok(())
    }

    pub fn finish(self) -> DeploymentPlan {
        tracing::info!(
            stack = %self.stack_name,
            resources = self.resources.len(),
            outputs = self.outputs.len(),
            "deployment plan composed"
        );
        DeploymentPlan {
            stack_name: self.stack_name,
            env: self.env,
            resources: self.resources,
            outputs: self.outputs,
            assets: self.assets,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::resource::{AccessGrant, NetworkBoundary, PolicyStatement, RelationalStore, Subnet};
    use crate::config::DatabaseEngine;

    fn network() -> Resource {
        Resource::Network(NetworkBoundary {
            id: ResourceId::new("Vpc"),
            path: "Stack/Vpc".into(),
            cidr: "10.0.0.0/16".into(),
            subnets: vec![Subnet {
                id: ResourceId::new("VpcSubnet1"),
                cidr: "10.0.0.0/18".into(),
                zone_index: 0,
            }],
        })
    }

    fn store() -> Resource {
        Resource::Store(RelationalStore {
            id: ResourceId::new("Cluster"),
            path: "Stack/Cluster".into(),
            engine: DatabaseEngine::AuroraPostgresql,
            parameter_group: "default.aurora-postgresql10".into(),
            database_name: "PolygoneDB".into(),
            network: ResourceId::new("Vpc"),
            subnet_group: ResourceId::new("ClusterSubnets"),
            subnets: vec![ResourceId::new("VpcSubnet1")],
            secret: None,
            cluster_arn: Value::reference(&ResourceId::new("Cluster")),
        })
    }

    fn grant(id: &str) -> Resource {
        Resource::Grant(AccessGrant {
            id: ResourceId::new(id),
            path: format!("Stack/{}", id),
            grantee: ResourceId::new("Vpc"),
            grantee_role: ResourceId::new("VpcSubnet1"),
            target: ResourceId::new("Cluster"),
            statements: vec![PolicyStatement::allow(
                &["rds-data:ExecuteStatement"],
                vec![Value::reference(&ResourceId::new("Cluster"))],
            )],
        })
    }

    #[test]
    fn registers_in_dependency_order() {
        let mut b = PlanBuilder::new("Stack", DeployEnv::default());
        assert_eq!(b.register(network()).unwrap(), 0);
        assert_eq!(b.register(store()).unwrap(), 1);
        let plan = b.finish();
        assert_eq!(plan.index_of(&ResourceId::new("VpcSubnet1")), Some(0));
        assert_eq!(plan.index_of(&ResourceId::new("ClusterSubnets")), Some(1));
    }

    #[test]
    fn rejects_resource_before_dependency() {
        let mut b = PlanBuilder::new("Stack", DeployEnv::default());
        let err = b.register(store()).unwrap_err();
        assert_eq!(
            err,
            ConfigError::DependencyOrder {
                resource: "Cluster".into(),
                missing: "Vpc".into()
            }
        );
        assert!(b.is_empty());
    }

    #[test]
    fn rejects_duplicate_ids() {
        let mut b = PlanBuilder::new("Stack", DeployEnv::default());
        b.register(network()).unwrap();
        assert_eq!(
            b.register(network()),
            Err(ConfigError::DuplicateId("Vpc".into()))
        );
        assert_eq!(b.len(), 1);
    }

    #[test]
    fn grant_declared_once_per_pair() {
        let mut b = PlanBuilder::new("Stack", DeployEnv::default());
        b.register(network()).unwrap();
        b.register(store()).unwrap();
        b.register(grant("GrantA")).unwrap();
        assert!(matches!(
            b.register(grant("GrantB")),
            Err(ConfigError::DuplicateGrant { .. })
        ));
    }

    #[test]
    fn outputs_must_reference_registered_resources() {
        let mut b = PlanBuilder::new("Stack", DeployEnv::default());
        assert!(matches!(
            b.output("Url", Value::attribute(&ResourceId::new("Api"), "GraphQLUrl")),
            Err(ConfigError::DependencyOrder { .. })
        ));
        b.output("Region", Value::literal("eu-west-1")).unwrap();
        assert_eq!(
            b.output("Region", Value::literal("eu-west-1")),
            Err(ConfigError::DuplicateId("Region".into()))
        );
    }
}
