//! Dependency loading
//!
//! A [`DependencyLoader`] contributes manifests for services the application
//! depends on. It writes them during the configuration stage and applies them
//! once the infrastructure is up.

use crate::error::{BuildError, Result};
use crate::process::{Command, ToolRunner};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Sub-directory of the output directory holding dependency manifests
pub const DEPENDENCY_DIR: &str = "deps";

/// Contributes and deploys dependency manifests
#[async_trait]
pub trait DependencyLoader: Send + Sync {
    /// Write dependency artifacts into `out`
    async fn build(&self, out: &Path) -> Result<()>;

    /// Deploy the artifacts written by [`DependencyLoader::build`]
    async fn apply(&self, out: &Path) -> Result<()>;
}

/// Loader for applications without dependencies
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDependencies;

#[async_trait]
impl DependencyLoader for NoDependencies {
    async fn build(&self, _out: &Path) -> Result<()> {
        Ok(())
    }

    async fn apply(&self, _out: &Path) -> Result<()> {
        Ok(())
    }
}

/// Copies pre-written manifests into `<out>/deps` and applies them with kubectl
pub struct ManifestDependencies {
    sources: Vec<PathBuf>,
    runner: Arc<dyn ToolRunner>,
}

impl ManifestDependencies {
    pub fn new(runner: Arc<dyn ToolRunner>) -> Self {
        Self {
            sources: Vec::new(),
            runner,
        }
    }

    /// Add a manifest file
    pub fn with_manifest(mut self, path: impl Into<PathBuf>) -> Self {
        self.sources.push(path.into());
        self
    }

    fn target(&self, out: &Path, source: &Path) -> Result<PathBuf> {
        let name = source.file_name().ok_or_else(|| {
            BuildError::Dependency(format!("{} is not a file", source.display()))
        })?;
        Ok(out.join(DEPENDENCY_DIR).join(name))
    }
}

#[async_trait]
impl DependencyLoader for ManifestDependencies {
    async fn build(&self, out: &Path) -> Result<()> {
        if self.sources.is_empty() {
            return Ok(());
        }
        tokio::fs::create_dir_all(out.join(DEPENDENCY_DIR)).await?;

        for source in &self.sources {
            let target = self.target(out, source)?;
            tokio::fs::copy(source, &target).await.map_err(|e| {
                BuildError::Dependency(format!("cannot copy {}: {}", source.display(), e))
            })?;
            debug!(from = %source.display(), to = %target.display(), "Copied dependency manifest");
        }
        Ok(())
    }

    async fn apply(&self, out: &Path) -> Result<()> {
        for source in &self.sources {
            let target = self.target(out, source)?;
            info!(manifest = %target.display(), "Applying dependency");
            self.runner
                .run(
                    &Command::new("kubectl")
                        .args(["apply", "-f"])
                        .arg(target.display().to_string()),
                )
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingRunner;

    #[tokio::test]
    async fn test_no_dependencies_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        NoDependencies.build(dir.path()).await.unwrap();
        NoDependencies.apply(dir.path()).await.unwrap();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_manifest_dependencies_copy_and_apply() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let redis = src.path().join("redis.yaml");
        std::fs::write(&redis, "kind: Deployment\n").unwrap();

        let runner = Arc::new(RecordingRunner::new());
        let loader = ManifestDependencies::new(runner.clone()).with_manifest(&redis);

        loader.build(out.path()).await.unwrap();
        assert!(out.path().join("deps/redis.yaml").exists());

        loader.apply(out.path()).await.unwrap();
        let lines = runner.command_lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("kubectl apply -f "));
        assert!(lines[0].ends_with("redis.yaml"));
    }

    #[tokio::test]
    async fn test_missing_manifest_is_dependency_error() {
        let out = tempfile::tempdir().unwrap();
        let loader = ManifestDependencies::new(Arc::new(RecordingRunner::new()))
            .with_manifest(out.path().join("missing.yaml"));

        let err = loader.build(out.path()).await.unwrap_err();
        assert!(matches!(err, BuildError::Dependency(_)));
    }
}
