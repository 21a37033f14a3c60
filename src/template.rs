//! Render a deployment plan into a CloudFormation template document.

use crate::plan::*;
use serde_json::{json, Map, Value as Json};

const POLICY_VERSION: &str = "2012-10-17";
const LAMBDA_BASIC_EXECUTION: &str = "service-role/AWSLambdaBasicExecutionRole";
/// Characters excluded from generated database passwords.
const PASSWORD_EXCLUDE: &str = " %+~`#$&*()|[]{}:;<>?!'/@\"\\";

pub fn render_value(value: &Value) -> Json {
    match value {
        Value::Literal(s) => Json::String(s.clone()),
        Value::Ref(id) => json!({ "Ref": id.as_str() }),
        Value::GetAtt {
            resource,
            attribute,
        } => json!({ "Fn::GetAtt": [resource.as_str(), attribute] }),
        Value::Pseudo(p) => json!({ "Ref": p.name() }),
        Value::Join(parts) => {
            let parts: Vec<Json> = parts.iter().map(render_value).collect();
            json!({ "Fn::Join": ["", parts] })
        }
    }
}

fn reference(id: &ResourceId) -> Json {
    json!({ "Ref": id.as_str() })
}

fn get_att(id: &ResourceId, attribute: &str) -> Json {
    json!({ "Fn::GetAtt": [id.as_str(), attribute] })
}

fn managed_policy_arn(name: &str) -> Json {
    json!({
        "Fn::Join": ["", ["arn:", { "Ref": "AWS::Partition" }, format!(":iam::aws:policy/{}", name)]]
    })
}

fn assume_role_policy(service: &str) -> Json {
    json!({
        "Statement": [{
            "Action": "sts:AssumeRole",
            "Effect": "Allow",
            "Principal": { "Service": service }
        }],
        "Version": POLICY_VERSION
    })
}

/// `{{resolve:secretsmanager:<secret>:SecretString:<key>::}}` dynamic reference.
fn secret_field(secret: &ResourceId, key: &str) -> Json {
    json!({
        "Fn::Join": ["", [
            "{{resolve:secretsmanager:",
            { "Ref": secret.as_str() },
            format!(":SecretString:{}::}}}}", key)
        ]]
    })
}

fn resources_for(resource: &Resource) -> Vec<(String, Json)> {
    match resource {
        Resource::Network(r) => network(r),
        Resource::Store(r) => store(r),
        Resource::Function(r) => function(r),
        Resource::Grant(r) => grant(r),
        Resource::Api(r) => api(r),
        Resource::DataSource(r) => data_source(r),
        Resource::Resolver(r) => resolver(r),
    }
}

fn network(r: &NetworkBoundary) -> Vec<(String, Json)> {
    let mut out = vec![(
        r.id.to_string(),
        json!({
            "Type": "AWS::EC2::VPC",
            "Properties": {
                "CidrBlock": r.cidr,
                "EnableDnsHostnames": true,
                "EnableDnsSupport": true,
                "InstanceTenancy": "default",
                "Tags": [{ "Key": "Name", "Value": r.path }]
            }
        }),
    )];
    for subnet in &r.subnets {
        out.push((
            subnet.id.to_string(),
            json!({
                "Type": "AWS::EC2::Subnet",
                "Properties": {
                    "VpcId": reference(&r.id),
                    "CidrBlock": subnet.cidr,
                    "AvailabilityZone": { "Fn::Select": [subnet.zone_index, { "Fn::GetAZs": "" }] },
                    "MapPublicIpOnLaunch": false
                }
            }),
        ));
    }
    out
}

fn store(r: &RelationalStore) -> Vec<(String, Json)> {
    let mut out = vec![(
        r.subnet_group.to_string(),
        json!({
            "Type": "AWS::RDS::DBSubnetGroup",
            "Properties": {
                "DBSubnetGroupDescription": format!("Subnets for {} database", r.path),
                "SubnetIds": r.subnets.iter().map(reference).collect::<Vec<_>>()
            }
        }),
    )];

    let mut cluster = json!({
        "Engine": r.engine.as_str(),
        "EngineMode": "serverless",
        "DatabaseName": r.database_name,
        "DBClusterParameterGroupName": r.parameter_group,
        "DBSubnetGroupName": reference(&r.subnet_group),
        "EnableHttpEndpoint": true,
        "StorageEncrypted": true
    });
    match &r.secret {
        Some(secret) => {
            out.push((
                secret.id.to_string(),
                json!({
                    "Type": "AWS::SecretsManager::Secret",
                    "Properties": {
                        "Description": format!("Generated by polygone-deploy for {}", r.path),
                        "GenerateSecretString": {
                            "ExcludeCharacters": PASSWORD_EXCLUDE,
                            "GenerateStringKey": "password",
                            "PasswordLength": 30,
                            "SecretStringTemplate": json!({ "username": secret.username }).to_string()
                        }
                    },
                    "UpdateReplacePolicy": "Delete",
                    "DeletionPolicy": "Delete"
                }),
            ));
            out.push((
                secret.attachment.to_string(),
                json!({
                    "Type": "AWS::SecretsManager::SecretTargetAttachment",
                    "Properties": {
                        "SecretId": reference(&secret.id),
                        "TargetId": reference(&r.id),
                        "TargetType": "AWS::RDS::DBCluster"
                    }
                }),
            ));
            cluster["MasterUsername"] = secret_field(&secret.id, "username");
            cluster["MasterUserPassword"] = secret_field(&secret.id, "password");
        }
        None => {
            // No generated secret: RDS owns the password in its own managed secret.
            cluster["MasterUsername"] = json!("postgres");
            cluster["ManageMasterUserPassword"] = json!(true);
        }
    }
    out.push((
        r.id.to_string(),
        json!({
            "Type": "AWS::RDS::DBCluster",
            "Properties": cluster,
            "UpdateReplacePolicy": "Snapshot",
            "DeletionPolicy": "Snapshot"
        }),
    ));
    out
}

fn function(r: &ComputeBinding) -> Vec<(String, Json)> {
    let variables: Map<String, Json> = r
        .environment
        .iter()
        .map(|(k, v)| (k.clone(), render_value(v)))
        .collect();
    vec![
        (
            r.role.to_string(),
            json!({
                "Type": "AWS::IAM::Role",
                "Properties": {
                    "AssumeRolePolicyDocument": assume_role_policy("lambda.amazonaws.com"),
                    "ManagedPolicyArns": [managed_policy_arn(LAMBDA_BASIC_EXECUTION)]
                }
            }),
        ),
        (
            r.id.to_string(),
            json!({
                "Type": "AWS::Lambda::Function",
                "Properties": {
                    "Code": {
                        "S3Bucket": render_value(&r.code_bucket),
                        "S3Key": r.code.object_key()
                    },
                    "Role": get_att(&r.role, "Arn"),
                    "Handler": r.handler,
                    "Runtime": r.runtime,
                    "MemorySize": r.memory_size,
                    "Environment": { "Variables": variables }
                },
                "DependsOn": [r.role.as_str()],
                "Metadata": { "aws:asset:path": r.code.source.display().to_string() }
            }),
        ),
    ]
}

fn grant(r: &AccessGrant) -> Vec<(String, Json)> {
    let statements: Vec<Json> = r
        .statements
        .iter()
        .map(|s| {
            let mut resources: Vec<Json> = s.resources.iter().map(render_value).collect();
            let resource = if resources.len() == 1 {
                resources.remove(0)
            } else {
                Json::Array(resources)
            };
            json!({
                "Action": s.actions,
                "Effect": "Allow",
                "Resource": resource
            })
        })
        .collect();
    vec![(
        r.id.to_string(),
        json!({
            "Type": "AWS::IAM::Policy",
            "Properties": {
                "PolicyName": r.id.as_str(),
                "PolicyDocument": { "Statement": statements, "Version": POLICY_VERSION },
                "Roles": [reference(&r.grantee_role)]
            }
        }),
    )]
}

fn api(r: &ApiGateway) -> Vec<(String, Json)> {
    let mut out = vec![
        (
            r.id.to_string(),
            json!({
                "Type": "AWS::AppSync::GraphQLApi",
                "Properties": {
                    "AuthenticationType": r.authorization.as_str(),
                    "Name": r.name
                }
            }),
        ),
        (
            r.schema.to_string(),
            json!({
                "Type": "AWS::AppSync::GraphQLSchema",
                "Properties": {
                    "ApiId": render_value(&r.api_id()),
                    "Definition": r.definition
                }
            }),
        ),
    ];
    if let Some(key) = &r.api_key {
        out.push((
            key.to_string(),
            json!({
                "Type": "AWS::AppSync::ApiKey",
                "Properties": { "ApiId": render_value(&r.api_id()) },
                "DependsOn": [r.schema.as_str()]
            }),
        ));
    }
    out
}

fn data_source(r: &DataSource) -> Vec<(String, Json)> {
    let function_arn = render_value(&r.function_arn);
    vec![
        (
            r.role.to_string(),
            json!({
                "Type": "AWS::IAM::Role",
                "Properties": {
                    "AssumeRolePolicyDocument": assume_role_policy("appsync.amazonaws.com"),
                    "Policies": [{
                        "PolicyName": "InvokeFunction",
                        "PolicyDocument": {
                            "Statement": [{
                                "Action": "lambda:InvokeFunction",
                                "Effect": "Allow",
                                "Resource": function_arn
                            }],
                            "Version": POLICY_VERSION
                        }
                    }]
                }
            }),
        ),
        (
            r.id.to_string(),
            json!({
                "Type": "AWS::AppSync::DataSource",
                "Properties": {
                    "ApiId": render_value(&r.api_id),
                    "Name": r.name,
                    "Type": "AWS_LAMBDA",
                    "LambdaConfig": { "LambdaFunctionArn": function_arn },
                    "ServiceRoleArn": get_att(&r.role, "Arn")
                }
            }),
        ),
    ]
}

fn resolver(r: &ResolverBinding) -> Vec<(String, Json)> {
    vec![(
        r.id.to_string(),
        json!({
            "Type": "AWS::AppSync::Resolver",
            "Properties": {
                "ApiId": render_value(&r.api_id),
                "FieldName": r.field_name,
                "TypeName": r.type_name.as_str(),
                "DataSourceName": render_value(&r.data_source_name),
                "Kind": "UNIT"
            },
            "DependsOn": [r.data_source.as_str(), r.schema.as_str()]
        }),
    )]
}

/// Render the whole plan: `Resources` keyed by logical id, `Outputs` keyed by name.
pub fn render(plan: &DeploymentPlan) -> Json {
    let mut resources = Map::new();
    for resource in &plan.resources {
        for (id, body) in resources_for(resource) {
            resources.insert(id, body);
        }
    }
    let outputs: Map<String, Json> = plan
        .outputs
        .iter()
        .map(|o| (o.name.clone(), json!({ "Value": render_value(&o.value) })))
        .collect();
    json!({
        "Description": format!("{} ({})", plan.stack_name, plan.env.uri()),
        "Resources": resources,
        "Outputs": outputs
    })
}
