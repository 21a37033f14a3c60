mod common;

use polygone_deploy::config::{OperationType, ResolverConfig};
use polygone_deploy::{compose, synthesize, ConfigError, DeployEnv, DeployError};
use serde_json::Value as Json;
use std::fs;

fn read_json(path: &std::path::Path) -> Json {
    serde_json::from_slice(&fs::read(path).unwrap()).unwrap()
}

fn resources_of_type<'a>(template: &'a Json, ty: &str) -> Vec<(&'a String, &'a Json)> {
    template["Resources"]
        .as_object()
        .unwrap()
        .iter()
        .filter(|(_, r)| r["Type"] == ty)
        .collect()
}

#[test]
fn writes_template_manifest_and_code_bundle() {
    let dir = common::project();
    let out = tempfile::tempdir().unwrap();
    let plan = compose(&common::config_for(&dir), &DeployEnv::default()).unwrap();

    let assembly = synthesize(&plan, out.path()).unwrap();
    assert_eq!(
        assembly.template_file,
        out.path().join("PolygoneAppStack.template.json")
    );
    assert!(assembly.manifest_file.is_file());
    assert_eq!(assembly.asset_files.len(), 1);
    assert!(assembly.asset_files[0].is_file());

    let manifest = read_json(&assembly.manifest_file);
    assert_eq!(manifest["stack_name"], "PolygoneAppStack");
    assert_eq!(manifest["environment"], "aws://unknown-account/unknown-region");
    assert_eq!(manifest["template_file"], "PolygoneAppStack.template.json");
    assert_eq!(manifest["assets"][0]["packaging"], "inline");
    assert_eq!(manifest["assets"][1]["packaging"], "zip");
    assert_eq!(
        manifest["outputs"],
        serde_json::json!(["AppSyncAPIURL", "AppSyncAPIKey", "ProjectRegion"])
    );
}

#[test]
fn template_wires_api_to_lambda_and_cluster() {
    let dir = common::project();
    let out = tempfile::tempdir().unwrap();
    let plan = compose(&common::config_for(&dir), &DeployEnv::default()).unwrap();
    let template = read_json(&synthesize(&plan, out.path()).unwrap().template_file);

    assert_eq!(resources_of_type(&template, "AWS::AppSync::Resolver").len(), 5);
    assert_eq!(resources_of_type(&template, "AWS::AppSync::ApiKey").len(), 1);
    assert_eq!(resources_of_type(&template, "AWS::IAM::Policy").len(), 1);

    let clusters = resources_of_type(&template, "AWS::RDS::DBCluster");
    assert_eq!(clusters.len(), 1);
    let cluster = &clusters[0].1["Properties"];
    assert_eq!(cluster["Engine"], "aurora-postgresql");
    assert_eq!(cluster["EngineMode"], "serverless");
    assert_eq!(cluster["EnableHttpEndpoint"], true);
    assert_eq!(cluster["DatabaseName"], "PolygoneDB");

    let functions = resources_of_type(&template, "AWS::Lambda::Function");
    let variables = &functions[0].1["Properties"]["Environment"]["Variables"];
    assert_eq!(variables["DB_NAME"], "PolygoneDB");
    assert_eq!(variables["AWS_NODEJS_CONNECTION_REUSE_ENABLED"], "1");
    assert!(variables["CLUSTER_ARN"]["Fn::Join"].is_array());
    assert!(variables["SECRET_ARN"]["Ref"].is_string());

    let schema = resources_of_type(&template, "AWS::AppSync::GraphQLSchema");
    assert_eq!(schema[0].1["Properties"]["Definition"], common::SCHEMA);
    for (_, resolver) in resources_of_type(&template, "AWS::AppSync::Resolver") {
        let depends_on = resolver["DependsOn"].as_array().unwrap();
        assert!(depends_on.iter().any(|d| d == schema[0].0.as_str()));
    }

    let outputs = template["Outputs"].as_object().unwrap();
    assert_eq!(outputs.len(), 3);
    assert!(outputs["AppSyncAPIURL"]["Value"]["Fn::GetAtt"].is_array());
    assert_eq!(outputs["ProjectRegion"]["Value"], serde_json::json!({ "Ref": "AWS::Region" }));
}

#[test]
fn code_bundle_lists_files_in_sorted_order() {
    let dir = common::project();
    let out = tempfile::tempdir().unwrap();
    let plan = compose(&common::config_for(&dir), &DeployEnv::default()).unwrap();
    let assembly = synthesize(&plan, out.path()).unwrap();

    let archive = zip::ZipArchive::new(fs::File::open(&assembly.asset_files[0]).unwrap()).unwrap();
    let names: Vec<&str> = archive.file_names().collect();
    let mut sorted = names.clone();
    sorted.sort_unstable();
    assert_eq!(names.len(), 2);
    assert_eq!(names, sorted);
    assert!(names.contains(&"index.js"));
    assert!(names.contains(&"lib/db.js"));
}

#[test]
fn invalid_plan_writes_nothing() {
    let dir = common::project();
    let out = tempfile::tempdir().unwrap();
    let mut config = common::config_for(&dir);
    config
        .api
        .resolvers
        .push(ResolverConfig::new(OperationType::Mutation, "deletePost"));
    let plan = compose(&config, &DeployEnv::default()).unwrap();

    let target = out.path().join("cdk.out");
    let err = synthesize(&plan, &target).unwrap_err();
    assert!(matches!(err, DeployError::Config(_)));
    assert!(!target.exists());
}

#[test]
fn code_changed_after_composition_fails_packaging() {
    let dir = common::project();
    let out = tempfile::tempdir().unwrap();
    let plan = compose(&common::config_for(&dir), &DeployEnv::default()).unwrap();
    fs::write(dir.path().join("lambda-fns/index.js"), "changed\n").unwrap();

    let target = out.path().join("cdk.out");
    let err = synthesize(&plan, &target).unwrap_err();
    assert!(matches!(
        err,
        DeployError::Config(ConfigError::AssetChanged { ref path, .. }) if path == "index.js"
    ));
    assert!(!target.exists());
}

#[test]
fn failed_packaging_leaves_no_partial_assembly() {
    let dir = common::project();
    let out = tempfile::tempdir().unwrap();
    let plan = compose(&common::config_for(&dir), &DeployEnv::default()).unwrap();
    fs::remove_dir_all(dir.path().join("lambda-fns")).unwrap();

    let target = out.path().join("cdk.out");
    assert!(matches!(synthesize(&plan, &target), Err(DeployError::Io(_))));
    assert!(!target.join("PolygoneAppStack.template.json").exists());
    assert!(!target.join("manifest.json").exists());
    // Neither the target nor the staging directory is left behind.
    let leftovers: Vec<_> = fs::read_dir(out.path()).unwrap().collect();
    assert!(leftovers.is_empty());
}

#[test]
fn resynthesis_replaces_an_existing_assembly() {
    let dir = common::project();
    let out = tempfile::tempdir().unwrap();
    let plan = compose(&common::config_for(&dir), &DeployEnv::default()).unwrap();

    let first = synthesize(&plan, out.path()).unwrap();
    let second = synthesize(&plan, out.path()).unwrap();
    assert_eq!(first, second);
    assert!(second.manifest_file.is_file());
    let entries: Vec<String> = fs::read_dir(out.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|n| n.starts_with(".polygone-synth"))
        .collect();
    assert!(entries.is_empty());
}
