//! Loading an application's manifests from a checkout

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use stagehand_core::{InputConfig, Manifest};
use walkdir::WalkDir;

use crate::error::{KubeError, Result};

/// A repository checked out at one commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevisionCheckout {
    pub commit: String,
    pub repo_dir: PathBuf,
}

impl RevisionCheckout {
    pub fn new(commit: impl Into<String>, repo_dir: impl Into<PathBuf>) -> Self {
        Self {
            commit: commit.into(),
            repo_dir: repo_dir.into(),
        }
    }
}

/// Produces the manifest set of an application at a checkout
#[async_trait]
pub trait ManifestSource: Send + Sync {
    async fn load_manifests(&self, checkout: &RevisionCheckout) -> Result<Vec<Manifest>>;
}

/// Plain YAML files in the application directory
#[derive(Debug, Clone, Default)]
pub struct DirectorySource {
    app_path: PathBuf,
    input: InputConfig,
    excluded: Vec<PathBuf>,
}

impl DirectorySource {
    pub fn new(input: InputConfig) -> Self {
        Self {
            input,
            ..Default::default()
        }
    }

    /// Application directory relative to the checkout root
    pub fn with_app_path(mut self, app_path: impl Into<PathBuf>) -> Self {
        self.app_path = app_path.into();
        self
    }

    /// Skip a file (relative to the application directory) when listing
    pub fn exclude(mut self, file: impl Into<PathBuf>) -> Self {
        self.excluded.push(file.into());
        self
    }

    /// Files to read, in load order
    fn manifest_files(&self, app_dir: &Path) -> Result<Vec<PathBuf>> {
        if !self.input.manifests.is_empty() {
            return Ok(self.input.manifests.iter().map(|f| app_dir.join(f)).collect());
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(app_dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| KubeError::Load(e.to_string()))?;
            if !entry.file_type().is_file() || !is_yaml(entry.path()) {
                continue;
            }
            let relative = entry.path().strip_prefix(app_dir).unwrap_or(entry.path());
            if self.excluded.iter().any(|x| x == relative) {
                continue;
            }
            files.push(entry.into_path());
        }
        Ok(files)
    }
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

#[async_trait]
impl ManifestSource for DirectorySource {
    async fn load_manifests(&self, checkout: &RevisionCheckout) -> Result<Vec<Manifest>> {
        let app_dir = checkout.repo_dir.join(&self.app_path);
        let mut manifests = Vec::new();

        for file in self.manifest_files(&app_dir)? {
            let content = tokio::fs::read_to_string(&file)
                .await
                .map_err(|e| KubeError::Load(format!("{}: {}", file.display(), e)))?;
            let documents = Manifest::parse_documents(&content)
                .map_err(|e| KubeError::Load(format!("{}: {}", file.display(), e)))?;
            manifests.extend(documents);
        }

        if let Some(namespace) = self.input.namespace.as_deref() {
            for manifest in &mut manifests {
                manifest.set_namespace(namespace);
            }
        }

        tracing::debug!(
            commit = %checkout.commit,
            count = manifests.len(),
            "loaded manifests"
        );
        Ok(manifests)
    }
}
