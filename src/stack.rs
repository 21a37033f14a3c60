//! Composition root: builds every resource of the Polygone stack in dependency order and
//! publishes the endpoint URL, API key and region.

use crate::asset::{self, Asset};
use crate::config::{validate, AuthorizationMode, DeployEnv, OperationType, ResolverConfig, StackConfig};
use crate::error::ConfigError;
use crate::naming::{construct_path, logical_id};
use crate::plan::*;
use std::collections::{BTreeMap, HashMap};

pub const OUTPUT_API_URL: &str = "AppSyncAPIURL";
pub const OUTPUT_API_KEY: &str = "AppSyncAPIKey";
pub const OUTPUT_REGION: &str = "ProjectRegion";

pub const ENV_CLUSTER_ARN: &str = "CLUSTER_ARN";
pub const ENV_SECRET_ARN: &str = "SECRET_ARN";
pub const ENV_DB_NAME: &str = "DB_NAME";
pub const ENV_CONNECTION_REUSE: &str = "AWS_NODEJS_CONNECTION_REUSE_ENABLED";

const DATA_API_ACTIONS: &[&str] = &[
    "rds-data:BatchExecuteStatement",
    "rds-data:BeginTransaction",
    "rds-data:CommitTransaction",
    "rds-data:ExecuteStatement",
    "rds-data:RollbackTransaction",
];
const SECRET_READ_ACTIONS: &[&str] = &[
    "secretsmanager:GetSecretValue",
    "secretsmanager:DescribeSecret",
];

/// Construct ids and display paths are derived from the stack name.
struct Names<'a> {
    stack: &'a str,
}

impl Names<'_> {
    fn id(&self, path: &[&str]) -> ResourceId {
        ResourceId::new(logical_id(path))
    }

    fn path(&self, path: &[&str]) -> String {
        construct_path(self.stack, path)
    }
}

/// Compose the deployment plan. Assets are staged first, so a missing schema or code
/// bundle fails before anything is registered; any error discards the partial plan.
pub fn compose(config: &StackConfig, env: &DeployEnv) -> Result<DeploymentPlan, ConfigError> {
    validate(config)?;
    let schema = asset::stage_file("Schema", "schema", &config.schema_file())?;
    let code = asset::stage_directory("Code", "code", &config.code_dir())?;

    let names = Names {
        stack: &config.stack_name,
    };
    let scope = Scope::new(env.account.as_deref(), env.region.as_deref());
    let mut plan = PlanBuilder::new(&config.stack_name, env.clone());
    plan.add_asset(schema.asset.clone());
    plan.add_asset(code.clone());

    let network = network_boundary(&names, config);
    plan.register(Resource::Network(network.clone()))?;

    let store = relational_store(&names, config, &network, &scope);
    plan.register(Resource::Store(store.clone()))?;

    let function = compute_binding(&names, config, &store, code, &scope);
    plan.register(Resource::Function(function.clone()))?;

    plan.register(Resource::Grant(data_api_grant(&names, config, &function, &store)))?;

    let api = api_gateway(&names, config, schema);
    plan.register(Resource::Api(api.clone()))?;

    let data_source = lambda_data_source(&names, config, &api, &function);
    plan.register(Resource::DataSource(data_source.clone()))?;

    // Repeated (type, field) pairs are not rejected here; they get distinct construct ids and
    // are reported by `DeploymentPlan::validate`.
    let mut occurrences: HashMap<(OperationType, &str), usize> = HashMap::new();
    for r in &config.api.resolvers {
        let n = occurrences
            .entry((r.type_name, r.field_name.as_str()))
            .or_insert(0);
        *n += 1;
        let binding = resolver(&names, config, r, *n, &api, &data_source);
        plan.register(Resource::Resolver(binding))?;
    }

    plan.output(OUTPUT_API_URL, api.graphql_url())?;
    plan.output(
        OUTPUT_API_KEY,
        api.api_key_value().unwrap_or_else(|| Value::literal("")),
    )?;
    plan.output(OUTPUT_REGION, scope.region.clone())?;

    Ok(plan.finish())
}

fn network_boundary(names: &Names<'_>, config: &StackConfig) -> NetworkBoundary {
    let vpc = config.network.id.as_str();
    let subnets = config
        .network
        .subnet_cidrs
        .iter()
        .enumerate()
        .map(|(i, cidr)| {
            let subnet = format!("IsolatedSubnet{}", i + 1);
            Subnet {
                id: names.id(&[vpc, subnet.as_str(), "Subnet"]),
                cidr: cidr.clone(),
                zone_index: i,
            }
        })
        .collect();
    NetworkBoundary {
        id: names.id(&[vpc]),
        path: names.path(&[vpc]),
        cidr: config.network.cidr.clone(),
        subnets,
    }
}

fn relational_store(
    names: &Names<'_>,
    config: &StackConfig,
    network: &NetworkBoundary,
    scope: &Scope,
) -> RelationalStore {
    let db = config.database.id.as_str();
    let id = names.id(&[db]);
    let secret = config.database.generate_secret.then(|| GeneratedSecret {
        id: names.id(&[db, "Secret"]),
        attachment: names.id(&[db, "Secret", "Attachment"]),
        username: "postgres".into(),
    });
    let cluster_arn = scope.arn(
        "rds",
        Value::join(vec![Value::literal("cluster:"), Value::reference(&id)]),
    );
    RelationalStore {
        path: names.path(&[db]),
        engine: config.database.engine,
        parameter_group: config.database.parameter_group.clone(),
        database_name: config.database.database_name.clone(),
        network: network.id.clone(),
        subnet_group: names.id(&[db, "Subnets"]),
        subnets: network.subnets.iter().map(|s| s.id.clone()).collect(),
        secret,
        cluster_arn,
        id,
    }
}

fn compute_binding(
    names: &Names<'_>,
    config: &StackConfig,
    store: &RelationalStore,
    code: Asset,
    scope: &Scope,
) -> ComputeBinding {
    let func = config.function.id.as_str();
    // Reproduced as-is: a cluster without a generated credential hands the function an empty SECRET_ARN.
    let secret_arn = store.secret_arn().unwrap_or_else(|| {
        tracing::warn!(cluster = %store.id, "cluster has no generated secret; SECRET_ARN will be empty");
        Value::literal("")
    });
    let environment = BTreeMap::from([
        (ENV_CLUSTER_ARN.to_string(), store.cluster_arn.clone()),
        (ENV_SECRET_ARN.to_string(), secret_arn),
        (ENV_DB_NAME.to_string(), Value::literal(&store.database_name)),
        (ENV_CONNECTION_REUSE.to_string(), Value::literal("1")),
    ]);
    let code_bucket = Value::join(vec![
        Value::literal("cdk-assets-"),
        scope.account.clone(),
        Value::literal("-"),
        scope.region.clone(),
    ]);
    ComputeBinding {
        id: names.id(&[func]),
        path: names.path(&[func]),
        role: names.id(&[func, "ServiceRole"]),
        code,
        code_bucket,
        handler: config.function.handler.clone(),
        runtime: config.function.runtime.clone(),
        memory_size: config.function.memory_size,
        environment,
    }
}

/// Data API access for the function: statement execution on the cluster, plus read access
/// to the cluster's credential when one exists.
fn data_api_grant(
    names: &Names<'_>,
    config: &StackConfig,
    function: &ComputeBinding,
    store: &RelationalStore,
) -> AccessGrant {
    let func = config.function.id.as_str();
    let mut statements = vec![PolicyStatement::allow(
        DATA_API_ACTIONS,
        vec![store.cluster_arn.clone()],
    )];
    if let Some(secret_arn) = store.secret_arn() {
        statements.push(PolicyStatement::allow(SECRET_READ_ACTIONS, vec![secret_arn]));
    }
    AccessGrant {
        id: names.id(&[func, "ServiceRole", "DefaultPolicy"]),
        path: names.path(&[func, "ServiceRole", "DefaultPolicy"]),
        grantee: function.id.clone(),
        grantee_role: function.role.clone(),
        target: store.id.clone(),
        statements,
    }
}

fn api_gateway(names: &Names<'_>, config: &StackConfig, schema: asset::StagedFile) -> ApiGateway {
    let api = config.api.id.as_str();
    let api_key = match config.api.authorization {
        AuthorizationMode::ApiKey => Some(names.id(&[api, "DefaultApiKey"])),
        AuthorizationMode::Iam => None,
    };
    ApiGateway {
        id: names.id(&[api]),
        path: names.path(&[api]),
        name: config.api.name.clone(),
        authorization: config.api.authorization,
        schema: names.id(&[api, "Schema"]),
        schema_asset: schema.asset,
        definition: schema.contents,
        api_key,
    }
}

fn lambda_data_source(
    names: &Names<'_>,
    config: &StackConfig,
    api: &ApiGateway,
    function: &ComputeBinding,
) -> DataSource {
    let api_path = config.api.id.as_str();
    let ds = config.api.data_source_name.as_str();
    DataSource {
        id: names.id(&[api_path, ds]),
        path: names.path(&[api_path, ds]),
        name: ds.to_string(),
        api: api.id.clone(),
        api_id: api.api_id(),
        role: names.id(&[api_path, ds, "ServiceRole"]),
        function: function.id.clone(),
        function_arn: function.arn(),
    }
}

fn resolver(
    names: &Names<'_>,
    config: &StackConfig,
    r: &ResolverConfig,
    occurrence: usize,
    api: &ApiGateway,
    data_source: &DataSource,
) -> ResolverBinding {
    let api_path = config.api.id.as_str();
    let ds = config.api.data_source_name.as_str();
    let mut leaf = format!("{}{}Resolver", r.type_name, r.field_name);
    if occurrence > 1 {
        leaf.push_str(&occurrence.to_string());
    }
    ResolverBinding {
        id: names.id(&[api_path, ds, leaf.as_str()]),
        path: names.path(&[api_path, ds, leaf.as_str()]),
        type_name: r.type_name,
        field_name: r.field_name.clone(),
        api: api.id.clone(),
        api_id: api.api_id(),
        schema: api.schema.clone(),
        data_source: data_source.id.clone(),
        data_source_name: data_source.name_value(),
    }
}
