//! Cloud assembly output: template, manifest and packaged assets written to a directory.

use crate::asset::{self, Asset, AssetKind};
use crate::error::{ConfigError, DeployError};
use crate::plan::DeploymentPlan;
use crate::template;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

pub const MANIFEST_FILE: &str = "manifest.json";
pub const ASSEMBLY_VERSION: &str = "1";

#[derive(Debug, Serialize)]
pub struct Manifest {
    pub version: String,
    pub stack_name: String,
    pub environment: String,
    pub template_file: String,
    pub assets: Vec<ManifestAsset>,
    pub outputs: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ManifestAsset {
    pub id: String,
    pub source: String,
    pub hash: String,
    /// `inline` for files embedded in the template, `zip` for packaged directories.
    pub packaging: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudAssembly {
    pub directory: PathBuf,
    pub template_file: PathBuf,
    pub manifest_file: PathBuf,
    pub asset_files: Vec<PathBuf>,
}

pub fn template_file_name(stack_name: &str) -> String {
    format!("{}.template.json", stack_name)
}

/// Validate the plan, then write `<stack>.template.json`, `manifest.json` and one zip per
/// directory asset into `out_dir`. Nothing is written when validation fails.
///
/// The assembly is built in a staging directory next to `out_dir` and moved in only once
/// every file has been produced, so a failed synthesis leaves `out_dir` untouched.
pub fn synthesize(plan: &DeploymentPlan, out_dir: &Path) -> Result<CloudAssembly, DeployError> {
    plan.validate()?;
    let parent = match out_dir.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;
    let staging = tempfile::Builder::new()
        .prefix(".polygone-synth")
        .tempdir_in(parent)?;

    let mut written = Vec::new();
    let mut asset_names = Vec::new();
    let mut manifest_assets = Vec::new();
    for asset in &plan.assets {
        let file = match asset.kind {
            AssetKind::Directory => {
                let name = format!("asset.{}", asset.object_key());
                package_directory(asset, &staging.path().join(&name))?;
                asset_names.push(name.clone());
                written.push(name.clone());
                Some(name)
            }
            AssetKind::File => None,
        };
        manifest_assets.push(ManifestAsset {
            id: asset.id.clone(),
            source: asset.source.display().to_string(),
            hash: asset.hash.clone(),
            packaging: if file.is_some() { "zip" } else { "inline" },
            file,
        });
    }

    let template_name = template_file_name(&plan.stack_name);
    fs::write(
        staging.path().join(&template_name),
        serde_json::to_vec_pretty(&template::render(plan))?,
    )?;
    written.push(template_name.clone());

    let manifest = Manifest {
        version: ASSEMBLY_VERSION.to_string(),
        stack_name: plan.stack_name.clone(),
        environment: plan.env.uri(),
        template_file: template_name.clone(),
        assets: manifest_assets,
        outputs: plan.outputs.iter().map(|o| o.name.clone()).collect(),
    };
    fs::write(
        staging.path().join(MANIFEST_FILE),
        serde_json::to_vec_pretty(&manifest)?,
    )?;
    // Manifest goes last: its presence marks a complete assembly.
    written.push(MANIFEST_FILE.to_string());

    fs::create_dir_all(out_dir)?;
    for name in &written {
        fs::rename(staging.path().join(name), out_dir.join(name))?;
    }

    let template_file = out_dir.join(&template_name);
    tracing::info!(
        dir = %out_dir.display(),
        template = %template_file.display(),
        assets = asset_names.len(),
        "cloud assembly written"
    );
    Ok(CloudAssembly {
        directory: out_dir.to_path_buf(),
        template_file,
        manifest_file: out_dir.join(MANIFEST_FILE),
        asset_files: asset_names.iter().map(|n| out_dir.join(n)).collect(),
    })
}

/// Zip the files recorded when the directory was staged, with a fixed timestamp.
/// A file whose contents no longer match its staged digest fails packaging.
fn package_directory(asset: &Asset, target: &Path) -> Result<(), DeployError> {
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default())
        .unix_permissions(0o644);
    let mut zip = ZipWriter::new(fs::File::create(target)?);
    for file in &asset.files {
        let bytes = fs::read(asset.source.join(&file.path))?;
        if asset::file_digest(&bytes) != file.digest {
            return Err(ConfigError::AssetChanged {
                id: asset.id.clone(),
                path: file.path.clone(),
            }
            .into());
        }
        zip.start_file(file.path.as_str(), options)?;
        zip.write_all(&bytes)?;
    }
    zip.finish()?;
    tracing::debug!(asset = %asset.id, target = %target.display(), files = asset.files.len(), "packaged directory asset");
    Ok(())
}
