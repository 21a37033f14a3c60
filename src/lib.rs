//! Polygone deployment: composes the GraphQL API, Aurora Serverless cluster and Lambda bridge
//! into an immutable deployment plan, and synthesizes it into a cloud assembly.

pub mod asset;
pub mod config;
pub mod error;
pub mod naming;
pub mod plan;
pub mod stack;
pub mod synth;
pub mod template;

pub use config::{apply_env_overrides, load_from_path, DeployEnv, StackConfig};
pub use error::{ConfigError, DeployError};
pub use plan::{DeploymentPlan, PlanBuilder, Resource, ResourceId, ResourceKind, Value};
pub use stack::{compose, OUTPUT_API_KEY, OUTPUT_API_URL, OUTPUT_REGION};
pub use synth::{synthesize, CloudAssembly};
pub use template::render;
