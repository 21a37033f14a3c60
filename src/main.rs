//! Synthesize the Polygone stack: load config (or defaults), compose the plan, write the cloud assembly.

use aws_config::meta::region::RegionProviderChain;
use clap::Parser;
use polygone_deploy::{
    apply_env_overrides,
    compose,
    load_from_path,
    synthesize,
    DeployEnv,
    StackConfig,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a JSON stack configuration. Built-in defaults are used when omitted.
    #[arg(short = 'c', long, env = "POLYGONE_CONFIG")]
    config: Option<PathBuf>,

    /// Directory the cloud assembly is written to.
    #[arg(short = 'o', long, env = "POLYGONE_OUT_DIR", default_value = "cdk.out")]
    out: PathBuf,

    /// Resolve the target region through the AWS provider chain when CDK_DEFAULT_REGION is unset.
    /// Without it the stack stays region-agnostic.
    #[arg(long)]
    resolve_region: bool,

    /// Compose and validate the plan, then exit without writing anything.
    #[arg(long)]
    validate: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("polygone_deploy=info")),
        )
        .init();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => load_from_path(path)?,
        None => StackConfig::default(),
    };
    apply_env_overrides(&mut config);

    let mut env = DeployEnv::from_env();
    if env.region.is_none() && args.resolve_region {
        env.region = RegionProviderChain::default_provider()
            .region()
            .await
            .map(|r| r.to_string());
        tracing::info!(region = ?env.region, "resolved region from provider chain");
    }

    let plan = compose(&config, &env)?;
    if args.validate {
        plan.validate()?;
        tracing::info!(stack = %plan.stack_name, resources = plan.resources.len(), "plan is valid");
        return Ok(());
    }

    let assembly = synthesize(&plan, &args.out)?;
    for output in &plan.outputs {
        tracing::info!(name = %output.name, "output");
    }
    tracing::info!(template = %assembly.template_file.display(), "synthesized");
    Ok(())
}
