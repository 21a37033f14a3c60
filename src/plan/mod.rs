//! Deployment plan: the immutable result of a composition pass.

pub mod builder;
pub mod resource;
pub mod value;

pub use builder::PlanBuilder;
pub use resource::*;
pub use value::*;

use crate::asset::Asset;
use crate::config::DeployEnv;
use crate::error::ConfigError;
use serde::Serialize;
use std::collections::HashSet;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Output {
    pub name: String,
    pub value: Value,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DeploymentPlan {
    pub stack_name: String,
    pub env: DeployEnv,
    /// In construction order.
    pub resources: Vec<Resource>,
    pub outputs: Vec<Output>,
    pub assets: Vec<Asset>,
}

impl DeploymentPlan {
    /// Construction index of the resource that provides `id`.
    pub fn index_of(&self, id: &ResourceId) -> Option<usize> {
        self.resources
            .iter()
            .position(|r| r.provides().into_iter().any(|p| p == id))
    }

    pub fn resource(&self, id: &ResourceId) -> Option<&Resource> {
        self.index_of(id).map(|i| &self.resources[i])
    }

    pub fn output(&self, name: &str) -> Option<&Output> {
        self.outputs.iter().find(|o| o.name == name)
    }

    pub fn of_kind(&self, kind: ResourceKind) -> impl Iterator<Item = &Resource> {
        self.resources.iter().filter(move |r| r.kind() == kind)
    }

    pub fn resolvers(&self) -> impl Iterator<Item = &ResolverBinding> {
        self.resources.iter().filter_map(|r| match r {
            Resource::Resolver(b) => Some(b),
            _ => None,
        })
    }

    pub fn grants(&self) -> impl Iterator<Item = &AccessGrant> {
        self.resources.iter().filter_map(|r| match r {
            Resource::Grant(g) => Some(g),
            _ => None,
        })
    }

    /// (dependent index, dependency index) for every dependency edge in the plan.
    pub fn dependency_edges(&self) -> Vec<(usize, usize)> {
        let mut edges = Vec::new();
        for (i, resource) in self.resources.iter().enumerate() {
            for dep in resource.dependencies() {
                if let Some(j) = self.index_of(dep) {
                    edges.push((i, j));
                }
            }
        }
        edges
    }

    /// Schema-level checks the platform performs before applying a plan: every resolver
    /// targets a data source registered on its own API, and (type, field) pairs are unique per API.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut pairs = HashSet::new();
        for binding in self.resolvers() {
            match self.resource(&binding.data_source) {
                Some(Resource::DataSource(ds)) if ds.api == binding.api => {}
                _ => {
                    return Err(ConfigError::MissingReference {
                        kind: "data source",
                        id: binding.data_source.to_string(),
                    })
                }
            }
            let key = (binding.api.clone(), binding.type_name, binding.field_name.clone());
            if !pairs.insert(key) {
                return Err(ConfigError::DuplicateResolver {
                    type_name: binding.type_name.to_string(),
                    field_name: binding.field_name.clone(),
                });
            }
        }
        Ok(())
    }
}
