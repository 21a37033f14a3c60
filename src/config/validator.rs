//! Config validation: names the platform would reject and out-of-range sizes.

use crate::config::StackConfig;
use crate::error::ConfigError;
use regex::Regex;
use std::sync::LazyLock;

static GRAPHQL_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[_A-Za-z][_0-9A-Za-z]*$").expect("valid regex"));
static CONSTRUCT_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]*$").expect("valid regex"));
static STACK_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9-]{0,127}$").expect("valid regex"));
static DATABASE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]{0,62}$").expect("valid regex"));

pub const MIN_FUNCTION_MEMORY: u32 = 128;
pub const MAX_FUNCTION_MEMORY: u32 = 10_240;

fn check(re: &Regex, kind: &'static str, name: &str) -> Result<(), ConfigError> {
    if re.is_match(name) {
        Ok(())
    } else {
        Err(ConfigError::InvalidName {
            kind,
            name: name.to_string(),
        })
    }
}

/// Validate a stack config before composition. Duplicate resolver pairs are left to
/// `DeploymentPlan::validate`, which stands in for the platform's schema validator.
pub fn validate(config: &StackConfig) -> Result<(), ConfigError> {
    check(&STACK_NAME, "stack", &config.stack_name)?;
    check(&CONSTRUCT_ID, "construct", &config.network.id)?;
    check(&CONSTRUCT_ID, "construct", &config.database.id)?;
    check(&CONSTRUCT_ID, "construct", &config.function.id)?;
    check(&CONSTRUCT_ID, "construct", &config.api.id)?;
    check(&DATABASE_NAME, "database", &config.database.database_name)?;
    check(&GRAPHQL_NAME, "data source", &config.api.data_source_name)?;

    if config.api.name.trim().is_empty() {
        return Err(ConfigError::InvalidName {
            kind: "api",
            name: config.api.name.clone(),
        });
    }
    if config.function.handler.trim().is_empty() {
        return Err(ConfigError::Validation("function handler must not be empty".into()));
    }
    if !(MIN_FUNCTION_MEMORY..=MAX_FUNCTION_MEMORY).contains(&config.function.memory_size) {
        return Err(ConfigError::Validation(format!(
            "function memory {} MB outside {}..={} MB",
            config.function.memory_size, MIN_FUNCTION_MEMORY, MAX_FUNCTION_MEMORY
        )));
    }
    // Aurora subnet groups must span at least two availability zones.
    if config.network.subnet_cidrs.len() < 2 {
        return Err(ConfigError::Validation(format!(
            "network '{}' needs at least two subnets, got {}",
            config.network.id,
            config.network.subnet_cidrs.len()
        )));
    }

    for r in &config.api.resolvers {
        check(&GRAPHQL_NAME, "field", &r.field_name)?;
    }

    Ok(())
}
