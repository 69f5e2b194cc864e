//! Deployment stages
//!
//! The build is a fixed sequence of stages. Each stage mutates the shared
//! [`PipelineContext`] (artifact paths, the resolved gateway address) and
//! either completes or fails; the driver in [`crate::pipeline`] stops at the
//! first failure.

use crate::dockerfile;
use crate::error::Result;
use crate::gateway::{resolve_address, GatewayAdmin};
use crate::loader::DependencyLoader;
use crate::manifest::ManifestSynthesizer;
use crate::pipeline::BuildOptions;
use crate::process::{Command, ToolRunner};
use crate::subscriptions::SubscriptionSet;
use crate::templates::Template;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kubescript_core::{KubeScriptConfig, ProjectDescriptor, RegistrationSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

/// Namespace and deployment of the mesh controller
const MESH_NAMESPACE: &str = "conduit";
const MESH_CONTROLLER: &str = "controller";

/// Pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    Configuration,
    Image,
    Infrastructure,
    Dependencies,
    Application,
    Wiring,
}

impl StageKind {
    /// Progress label shown while the stage runs
    pub fn label(self) -> &'static str {
        match self {
            StageKind::Configuration => "Figuring out configurations...",
            StageKind::Image => "Building app image...",
            StageKind::Infrastructure => "Setting up infrastructure...",
            StageKind::Dependencies => "Building dependencies...",
            StageKind::Application => "Deploying your app...",
            StageKind::Wiring => "Wiring up events...",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StageKind::Configuration => "configuration",
            StageKind::Image => "image",
            StageKind::Infrastructure => "infrastructure",
            StageKind::Dependencies => "dependencies",
            StageKind::Application => "application",
            StageKind::Wiring => "wiring",
        };
        f.write_str(name)
    }
}

/// State shared by the stages of one pipeline run
pub struct PipelineContext {
    pub config: KubeScriptConfig,
    pub descriptor: ProjectDescriptor,
    pub registrations: RegistrationSet,
    pub options: BuildOptions,
    pub out_dir: PathBuf,
    pub built_at: DateTime<Utc>,
    pub runner: Arc<dyn ToolRunner>,
    pub loader: Arc<dyn DependencyLoader>,
    pub gateway: Arc<dyn GatewayAdmin>,

    /// Files written so far
    pub artifacts: Vec<PathBuf>,
    /// Set by the wiring stage
    pub gateway_address: Option<String>,
    /// Set by the wiring stage
    pub subscriptions: Option<SubscriptionSet>,
}

impl PipelineContext {
    /// Path of a materialised artifact in the output directory
    pub fn artifact(&self, template: Template) -> PathBuf {
        self.out_dir.join(template.artifact_name())
    }

    /// Binary the container starts
    pub fn entry(&self) -> &str {
        self.options
            .entry
            .as_deref()
            .unwrap_or_else(|| self.descriptor.entry_binary())
    }

    /// Where the generated Dockerfile is written
    pub fn dockerfile_output(&self) -> PathBuf {
        self.options
            .dockerfile_output
            .clone()
            .unwrap_or_else(|| self.context_dir().join("Dockerfile"))
    }

    /// Docker build context
    pub fn context_dir(&self) -> PathBuf {
        self.options
            .context_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }

    async fn run(&self, command: Command) -> Result<()> {
        self.runner.run(&command).await?;
        Ok(())
    }

    async fn kubectl_apply(&self, manifest: &Path) -> Result<()> {
        self.run(
            Command::new("kubectl")
                .args(["apply", "-f"])
                .arg(manifest.display().to_string()),
        )
        .await
    }

    async fn rollout_status(&self, deployment: &str, namespace: Option<&str>) -> Result<()> {
        let mut command = Command::new("kubectl")
            .args(["rollout", "status"])
            .arg(format!("deploy/{}", deployment));
        if let Some(namespace) = namespace {
            command = command.arg(format!("--namespace={}", namespace));
        }
        self.run(command).await
    }
}

/// One step of the deployment pipeline
#[async_trait]
pub trait Stage: Send + Sync {
    fn kind(&self) -> StageKind;

    async fn execute(&self, ctx: &mut PipelineContext) -> Result<()>;
}

/// Writes every artifact: infrastructure manifests, Dockerfile, application
/// manifests and dependency manifests
pub struct ConfigurationStage;

#[async_trait]
impl Stage for ConfigurationStage {
    fn kind(&self) -> StageKind {
        StageKind::Configuration
    }

    #[instrument(skip_all, fields(out = %ctx.out_dir.display()))]
    async fn execute(&self, ctx: &mut PipelineContext) -> Result<()> {
        tokio::fs::create_dir_all(&ctx.out_dir).await?;

        let synthesizer = ManifestSynthesizer::new(&ctx.descriptor, ctx.built_at)
            .with_app_port(ctx.config.build.app_port);

        let mut written = synthesizer.write_infrastructure(&ctx.out_dir).await?;

        let dockerfile_output = ctx.dockerfile_output();
        dockerfile::write(
            ctx.options.dockerfile_path.as_deref(),
            ctx.entry(),
            &dockerfile_output,
        )
        .await?;
        written.push(dockerfile_output);

        written.extend(
            synthesizer
                .write_application(&ctx.out_dir, ctx.runner.as_ref())
                .await?,
        );

        ctx.loader.build(&ctx.out_dir).await?;

        debug!(count = written.len(), "Artifacts written");
        ctx.artifacts.extend(written);
        Ok(())
    }
}

/// Builds and pushes the application image
pub struct ImageStage;

#[async_trait]
impl Stage for ImageStage {
    fn kind(&self) -> StageKind {
        StageKind::Image
    }

    #[instrument(skip_all, fields(tag = %ctx.descriptor.image_tag()))]
    async fn execute(&self, ctx: &mut PipelineContext) -> Result<()> {
        let tag = ctx.descriptor.image_tag();

        let mut build = Command::new("docker").args(["build", "-t"]).arg(&tag);
        if let Some(dockerfile) = &ctx.options.dockerfile_output {
            build = build.arg("-f").arg(dockerfile.display().to_string());
        }
        build = build.arg(ctx.context_dir().display().to_string());

        ctx.run(build).await?;
        ctx.run(Command::new("docker").arg("push").arg(tag)).await
    }
}

/// Applies the mesh, coordination store and gateway, then waits for them
pub struct InfrastructureStage;

#[async_trait]
impl Stage for InfrastructureStage {
    fn kind(&self) -> StageKind {
        StageKind::Infrastructure
    }

    #[instrument(skip_all)]
    async fn execute(&self, ctx: &mut PipelineContext) -> Result<()> {
        for template in Template::INFRASTRUCTURE {
            ctx.kubectl_apply(&ctx.artifact(template)).await?;
        }

        ctx.rollout_status(MESH_CONTROLLER, Some(MESH_NAMESPACE)).await?;
        let gateway = ctx.config.gateway.service_name.clone();
        ctx.rollout_status(&gateway, None).await
    }
}

/// Deploys whatever the dependency loader contributed
pub struct DependencyStage;

#[async_trait]
impl Stage for DependencyStage {
    fn kind(&self) -> StageKind {
        StageKind::Dependencies
    }

    async fn execute(&self, ctx: &mut PipelineContext) -> Result<()> {
        ctx.loader.apply(&ctx.out_dir).await
    }
}

/// Applies the application manifests and waits for the rollout
pub struct ApplicationStage;

#[async_trait]
impl Stage for ApplicationStage {
    fn kind(&self) -> StageKind {
        StageKind::Application
    }

    #[instrument(skip_all, fields(app = %ctx.descriptor.name))]
    async fn execute(&self, ctx: &mut PipelineContext) -> Result<()> {
        ctx.kubectl_apply(&ctx.artifact(Template::AppDeployment)).await?;
        ctx.kubectl_apply(&ctx.artifact(Template::AppService)).await?;

        let name = ctx.descriptor.name.clone();
        ctx.rollout_status(&name, None).await
    }
}

/// Resolves the gateway address and pushes the subscription set
pub struct WiringStage;

#[async_trait]
impl Stage for WiringStage {
    fn kind(&self) -> StageKind {
        StageKind::Wiring
    }

    #[instrument(skip_all)]
    async fn execute(&self, ctx: &mut PipelineContext) -> Result<()> {
        let gateway = &ctx.config.gateway;
        let address = resolve_address(
            ctx.runner.as_ref(),
            &gateway.service_name,
            gateway.address_attempts,
            Duration::from_secs(gateway.address_interval_secs),
        )
        .await?;

        let service_url = format!(
            "http://{}:{}",
            ctx.descriptor.name, ctx.config.build.app_port
        );
        let set = SubscriptionSet::from_registrations(
            ctx.descriptor.name.clone(),
            &service_url,
            &ctx.registrations,
        );

        ctx.gateway.push(&address, &set).await?;

        ctx.gateway_address = Some(address);
        ctx.subscriptions = Some(set);
        Ok(())
    }
}

/// The full deployment, in order
pub fn standard_stages() -> Vec<Box<dyn Stage>> {
    vec![
        Box::new(ConfigurationStage),
        Box::new(ImageStage),
        Box::new(InfrastructureStage),
        Box::new(DependencyStage),
        Box::new(ApplicationStage),
        Box::new(WiringStage),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_stage_order() {
        let kinds: Vec<StageKind> = standard_stages().iter().map(|s| s.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                StageKind::Configuration,
                StageKind::Image,
                StageKind::Infrastructure,
                StageKind::Dependencies,
                StageKind::Application,
                StageKind::Wiring,
            ]
        );
    }

    #[test]
    fn test_stage_labels() {
        assert_eq!(StageKind::Configuration.label(), "Figuring out configurations...");
        assert_eq!(StageKind::Wiring.label(), "Wiring up events...");
        assert_eq!(StageKind::Dependencies.to_string(), "dependencies");
    }
}
