//! Cloud assembly output
//!
//! Writes synthesized templates into an output directory:
//!
//! - `<stack>.template.json` (or `.yaml`), the previous one kept as `.backup`
//! - `<stack>.assets.json` describing staged assets and their destinations
//! - `manifest.json` listing every stack artifact written so far
//! - `asset.<hash>` staged asset copies
//!
//! Writers hold `stackflow.lock` while writing. A lock older than one hour
//! is treated as stale.

use crate::assets::{self, AssetEntry};
use crate::error::{Result, SynthError};
use crate::template::{CloudFormationSynthesizer, Template};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stackflow_core::{Packaging, Stack};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Cloud assembly schema version written to the manifests
pub const ASSEMBLY_VERSION: &str = "36.0.0";

const MANIFEST_FILE: &str = "manifest.json";
const LOCK_FILE: &str = "stackflow.lock";

/// Template file format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Yaml => "yaml",
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "yaml" | "yml" => Ok(OutputFormat::Yaml),
            other => Err(format!("Unknown output format: {}", other)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// `manifest.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub version: String,
    pub updated_at: DateTime<Utc>,
    pub artifacts: BTreeMap<String, Artifact>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self {
            version: ASSEMBLY_VERSION.to_string(),
            updated_at: Utc::now(),
            artifacts: BTreeMap::new(),
        }
    }
}

/// One artifact entry of the manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    #[serde(rename = "type")]
    pub artifact_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    pub properties: serde_json::Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
}

/// `<stack>.assets.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetManifest {
    pub version: String,
    pub files: BTreeMap<String, FileAsset>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileAsset {
    pub source: FileAssetSource,
    pub destinations: BTreeMap<String, FileAssetDestination>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileAssetSource {
    pub path: String,
    pub packaging: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileAssetDestination {
    pub bucket_name: String,
    pub object_key: String,
}

/// Paths written for one stack
#[derive(Debug, Clone)]
pub struct AssemblyOutput {
    pub template_path: PathBuf,
    pub assets_path: PathBuf,
    pub manifest_path: PathBuf,
    pub backup_path: Option<PathBuf>,
    pub staged_assets: Vec<PathBuf>,
}

/// Writes templates, asset manifests and the assembly manifest
#[derive(Debug, Clone)]
pub struct CloudAssemblyWriter {
    outdir: PathBuf,
    format: OutputFormat,
    synthesizer: CloudFormationSynthesizer,
}

impl CloudAssemblyWriter {
    pub fn new(outdir: impl AsRef<Path>, format: OutputFormat) -> Self {
        Self {
            outdir: outdir.as_ref().to_path_buf(),
            format,
            synthesizer: CloudFormationSynthesizer::new(),
        }
    }

    pub fn with_synthesizer(mut self, synthesizer: CloudFormationSynthesizer) -> Self {
        self.synthesizer = synthesizer;
        self
    }

    pub fn outdir(&self) -> &Path {
        &self.outdir
    }

    pub fn template_path(&self, stack_name: &str) -> PathBuf {
        self.outdir
            .join(format!("{}.template.{}", stack_name, self.format.extension()))
    }

    fn assets_path(&self, stack_name: &str) -> PathBuf {
        self.outdir.join(format!("{}.assets.json", stack_name))
    }

    fn manifest_path(&self) -> PathBuf {
        self.outdir.join(MANIFEST_FILE)
    }

    fn lock_path(&self) -> PathBuf {
        self.outdir.join(LOCK_FILE)
    }

    async fn ensure_outdir(&self) -> Result<()> {
        if !self.outdir.exists() {
            fs::create_dir_all(&self.outdir).await?;
            tracing::debug!("Created output directory: {}", self.outdir.display());
        }
        Ok(())
    }

    /// Previously written template for `stack_name`, in either format
    pub async fn read_template(&self, stack_name: &str) -> Result<Option<Template>> {
        for format in [OutputFormat::Json, OutputFormat::Yaml] {
            let path = self
                .outdir
                .join(format!("{}.template.{}", stack_name, format.extension()));
            if !path.exists() {
                continue;
            }
            let content = fs::read_to_string(&path).await?;
            let template = match format {
                OutputFormat::Json => Template::from_json(&content)?,
                OutputFormat::Yaml => Template::from_yaml(&content)?,
            };
            tracing::debug!(path = %path.display(), "Loaded previous template");
            return Ok(Some(template));
        }
        Ok(None)
    }

    /// Acquire the output directory lock
    pub async fn acquire_lock(&self) -> Result<AssemblyLock> {
        self.ensure_outdir().await?;

        let lock_path = self.lock_path();
        if lock_path.exists() {
            let content = fs::read_to_string(&lock_path).await?;
            let lock_info: LockInfo = serde_json::from_str(&content)?;

            let age = Utc::now().signed_duration_since(lock_info.acquired_at);
            if age.num_hours() < 1 {
                return Err(SynthError::LockError(format!(
                    "{} is locked by {} since {}",
                    self.outdir.display(),
                    lock_info.holder,
                    lock_info.acquired_at
                )));
            }

            tracing::warn!("Removing stale lock from {}", lock_info.holder);
        }

        let lock_info = LockInfo {
            holder: std::env::var("HOSTNAME")
                .or_else(|_| std::env::var("HOST"))
                .unwrap_or_else(|_| "unknown".to_string()),
            acquired_at: Utc::now(),
        };
        fs::write(&lock_path, serde_json::to_string_pretty(&lock_info)?).await?;

        tracing::debug!("Acquired assembly lock");
        Ok(AssemblyLock {
            lock_path,
            released: false,
        })
    }

    /// Writes one synthesized stack into the assembly
    #[tracing::instrument(skip_all, fields(stack = %stack.name(), outdir = %self.outdir.display()))]
    pub async fn write(&self, stack: &Stack, template: &Template) -> Result<AssemblyOutput> {
        let lock = self.acquire_lock().await?;

        let template_path = self.template_path(stack.name());
        let backup_path = if template_path.exists() {
            let backup = template_path.with_extension(format!("{}.backup", self.format.extension()));
            if backup.exists() {
                fs::remove_file(&backup).await?;
            }
            fs::rename(&template_path, &backup).await?;
            tracing::debug!("Created template backup");
            Some(backup)
        } else {
            None
        };

        let body = match self.format {
            OutputFormat::Json => template.to_json()?,
            OutputFormat::Yaml => template.to_yaml()?,
        };
        fs::write(&template_path, body).await?;

        let mut staged_assets = Vec::new();
        for entry in &template.assets {
            staged_assets.push(assets::stage(entry, &self.outdir).await?);
        }

        let assets_path = self.assets_path(stack.name());
        let asset_manifest = self.asset_manifest(&template.assets);
        fs::write(&assets_path, serde_json::to_string_pretty(&asset_manifest)?).await?;

        let manifest_path = self.manifest_path();
        let mut manifest = self.read_manifest().await?;
        let assets_artifact = format!("{}.assets", stack.name());
        manifest.artifacts.insert(
            assets_artifact.clone(),
            Artifact {
                artifact_type: "cdk:asset-manifest".to_string(),
                environment: None,
                properties: serde_json::json!({ "file": file_name(&assets_path) }),
                dependencies: Vec::new(),
            },
        );
        manifest.artifacts.insert(
            stack.name().to_string(),
            Artifact {
                artifact_type: "aws:cloudformation:stack".to_string(),
                environment: Some(stack.environment().to_string()),
                properties: serde_json::json!({
                    "templateFile": file_name(&template_path),
                    "stackName": stack.name(),
                }),
                dependencies: vec![assets_artifact],
            },
        );
        manifest.updated_at = Utc::now();
        fs::write(&manifest_path, serde_json::to_string_pretty(&manifest)?).await?;

        lock.release().await?;

        tracing::info!(
            template = %template_path.display(),
            assets = staged_assets.len(),
            "Cloud assembly written"
        );
        Ok(AssemblyOutput {
            template_path,
            assets_path,
            manifest_path,
            backup_path,
            staged_assets,
        })
    }

    async fn read_manifest(&self) -> Result<Manifest> {
        let path = self.manifest_path();
        if !path.exists() {
            return Ok(Manifest::default());
        }
        let content = fs::read_to_string(&path).await?;
        Ok(serde_json::from_str(&content)?)
    }

    fn asset_manifest(&self, entries: &[AssetEntry]) -> AssetManifest {
        let files = entries
            .iter()
            .map(|entry| {
                let packaging = match entry.packaging {
                    Packaging::Zip => "zip",
                    Packaging::File => "file",
                };
                let destination = FileAssetDestination {
                    bucket_name: self.synthesizer.staging_bucket_template(),
                    object_key: entry.object_key(),
                };
                (
                    entry.hash.clone(),
                    FileAsset {
                        source: FileAssetSource {
                            path: entry.staged_name(),
                            packaging: packaging.to_string(),
                        },
                        destinations: BTreeMap::from([(
                            "current_account-current_region".to_string(),
                            destination,
                        )]),
                    },
                )
            })
            .collect();

        AssetManifest {
            version: ASSEMBLY_VERSION.to_string(),
            files,
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[derive(Debug, Serialize, Deserialize)]
struct LockInfo {
    holder: String,
    acquired_at: DateTime<Utc>,
}

/// RAII guard for the assembly lock
pub struct AssemblyLock {
    lock_path: PathBuf,
    released: bool,
}

impl AssemblyLock {
    pub async fn release(mut self) -> Result<()> {
        if !self.released {
            if self.lock_path.exists() {
                fs::remove_file(&self.lock_path).await?;
                tracing::debug!("Released assembly lock");
            }
            self.released = true;
        }
        Ok(())
    }
}

impl Drop for AssemblyLock {
    fn drop(&mut self) {
        if !self.released && self.lock_path.exists() {
            let _ = std::fs::remove_file(&self.lock_path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::Synthesizer;
    use stackflow_core::{AssetSource, Environment, ResourceDraft, StackBuilder, Value};
    use tempfile::tempdir;

    fn stack(code_dir: &Path) -> Stack {
        let mut builder = StackBuilder::new("Demo", Environment::new("123456789012", "us-east-1"));
        let asset = builder.add_asset(AssetSource::zip("FnCode", code_dir)).unwrap();
        builder
            .add(
                ResourceDraft::new("Fn", "AWS::Lambda::Function")
                    .property("Runtime", "python3.9")
                    .property("Handler", "index.lambda_handler")
                    .property(
                        "Code",
                        Value::map([("S3Bucket", asset.bucket_name()), ("S3Key", asset.object_key())]),
                    ),
            )
            .unwrap();
        builder.assemble().unwrap()
    }

    #[tokio::test]
    async fn test_write_assembly() {
        let code = tempdir().unwrap();
        std::fs::write(code.path().join("index.py"), "def lambda_handler(e, c): pass").unwrap();
        let outdir = tempdir().unwrap();

        let stack = stack(code.path());
        let template = CloudFormationSynthesizer::new().synthesize(&stack).unwrap();
        let writer = CloudAssemblyWriter::new(outdir.path(), OutputFormat::Json);
        let output = writer.write(&stack, &template).await.unwrap();

        assert_eq!(output.template_path, outdir.path().join("Demo.template.json"));
        assert!(output.backup_path.is_none());
        assert_eq!(output.staged_assets.len(), 1);
        assert!(!outdir.path().join(LOCK_FILE).exists());

        let manifest: Manifest =
            serde_json::from_str(&std::fs::read_to_string(&output.manifest_path).unwrap()).unwrap();
        let artifact = &manifest.artifacts["Demo"];
        assert_eq!(artifact.environment.as_deref(), Some("aws://123456789012/us-east-1"));
        assert_eq!(artifact.dependencies, vec!["Demo.assets".to_string()]);

        let assets: AssetManifest =
            serde_json::from_str(&std::fs::read_to_string(&output.assets_path).unwrap()).unwrap();
        let file = &assets.files[&template.assets[0].hash];
        assert_eq!(file.source.packaging, "zip");

        let reread = writer.read_template("Demo").await.unwrap().unwrap();
        assert_eq!(reread.resources, template.resources);
    }

    #[tokio::test]
    async fn test_second_write_keeps_backup() {
        let code = tempdir().unwrap();
        std::fs::write(code.path().join("index.py"), "v1").unwrap();
        let outdir = tempdir().unwrap();

        let stack = stack(code.path());
        let template = CloudFormationSynthesizer::new().synthesize(&stack).unwrap();
        let writer = CloudAssemblyWriter::new(outdir.path(), OutputFormat::Yaml);
        writer.write(&stack, &template).await.unwrap();
        let output = writer.write(&stack, &template).await.unwrap();

        let backup = output.backup_path.unwrap();
        assert_eq!(backup, outdir.path().join("Demo.template.yaml.backup"));
        assert!(backup.exists());
        assert!(writer.read_template("Demo").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_fresh_lock_blocks_writer() {
        let outdir = tempdir().unwrap();
        let writer = CloudAssemblyWriter::new(outdir.path(), OutputFormat::Json);

        let lock = writer.acquire_lock().await.unwrap();
        let err = writer.acquire_lock().await.err().unwrap();
        assert!(matches!(err, SynthError::LockError(_)));

        lock.release().await.unwrap();
        assert!(writer.acquire_lock().await.is_ok());
    }

    #[tokio::test]
    async fn test_stale_lock_is_replaced() {
        let outdir = tempdir().unwrap();
        let stale = LockInfo {
            holder: "old-host".to_string(),
            acquired_at: Utc::now() - chrono::Duration::hours(2),
        };
        std::fs::write(
            outdir.path().join(LOCK_FILE),
            serde_json::to_string(&stale).unwrap(),
        )
        .unwrap();

        let writer = CloudAssemblyWriter::new(outdir.path(), OutputFormat::Json);
        assert!(writer.acquire_lock().await.is_ok());
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!("yml".parse::<OutputFormat>().unwrap(), OutputFormat::Yaml);
        assert!("xml".parse::<OutputFormat>().is_err());
    }
}
