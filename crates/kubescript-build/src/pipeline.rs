//! Pipeline driver
//!
//! [`Builder`] finalises the application's registrations, then runs the
//! stages strictly in order. The first failing stage aborts the run; nothing
//! is retried or rolled back.

use crate::error::{BuildError, PipelineError};
use crate::gateway::{EventGatewayAdmin, GatewayAdmin};
use crate::loader::{DependencyLoader, NoDependencies};
use crate::process::{ProcessRunner, ToolRunner};
use crate::progress::{Progress, SpinnerProgress};
use crate::stages::{standard_stages, PipelineContext, Stage, StageKind};
use crate::subscriptions::SubscriptionSet;
use chrono::{DateTime, Utc};
use kubescript_core::{App, KubeScriptConfig, ProjectDescriptor};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, instrument};

/// Per-run build options
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Dockerfile template overriding the bundled one
    pub dockerfile_path: Option<PathBuf>,
    /// Where the generated Dockerfile goes (default `<context>/Dockerfile`)
    pub dockerfile_output: Option<PathBuf>,
    /// Binary the container starts (default: the descriptor's entry)
    pub entry: Option<String>,
    /// Docker build context (default `.`)
    pub context_dir: Option<PathBuf>,
}

/// Outcome of a successful run
#[derive(Debug, Clone)]
pub struct DeployReport {
    pub image_tag: String,
    pub gateway_address: Option<String>,
    pub event_port: u16,
    pub artifacts: Vec<PathBuf>,
    pub subscriptions: Option<SubscriptionSet>,
}

impl DeployReport {
    /// Public URL of the deployed application
    pub fn url(&self) -> Option<String> {
        self.gateway_address
            .as_ref()
            .map(|address| format!("http://{}:{}/", address, self.event_port))
    }
}

/// Drives the build phase for one application
pub struct Builder {
    config: KubeScriptConfig,
    descriptor: ProjectDescriptor,
    runner: Arc<dyn ToolRunner>,
    loader: Arc<dyn DependencyLoader>,
    gateway: Arc<dyn GatewayAdmin>,
    progress: Arc<dyn Progress>,
    stages: Vec<Box<dyn Stage>>,
    built_at: Option<DateTime<Utc>>,
}

impl Builder {
    /// Builder with the process runner, the Event Gateway admin client and a
    /// terminal spinner
    pub fn new(config: KubeScriptConfig, descriptor: ProjectDescriptor) -> Self {
        let runner = Arc::new(ProcessRunner::new(config.build.verbose));
        let gateway = Arc::new(EventGatewayAdmin::new(config.gateway.admin_port));
        Self {
            config,
            descriptor,
            runner,
            loader: Arc::new(NoDependencies),
            gateway,
            progress: Arc::new(SpinnerProgress::new()),
            stages: standard_stages(),
            built_at: None,
        }
    }

    pub fn with_runner(mut self, runner: Arc<dyn ToolRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn with_loader(mut self, loader: Arc<dyn DependencyLoader>) -> Self {
        self.loader = loader;
        self
    }

    pub fn with_gateway_admin(mut self, gateway: Arc<dyn GatewayAdmin>) -> Self {
        self.gateway = gateway;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn Progress>) -> Self {
        self.progress = progress;
        self
    }

    /// Replace the stage list
    pub fn with_stages(mut self, stages: Vec<Box<dyn Stage>>) -> Self {
        self.stages = stages;
        self
    }

    /// Fix the build timestamp written into the manifests
    pub fn with_built_at(mut self, built_at: DateTime<Utc>) -> Self {
        self.built_at = Some(built_at);
        self
    }

    pub fn descriptor(&self) -> &ProjectDescriptor {
        &self.descriptor
    }

    fn fail(&self, kind: StageKind, source: BuildError) -> PipelineError {
        self.progress.stage_failed(kind.label(), &source.to_string());
        error!(stage = %kind, error = %source, "Build failed");
        PipelineError::new(kind, source)
    }

    /// Run every stage against `app`, writing artifacts to `out_dir`
    /// (default: the configured output directory)
    #[instrument(skip_all, fields(app = %self.descriptor.name, version = %self.descriptor.version))]
    pub async fn run(
        &self,
        app: &App,
        out_dir: Option<&Path>,
        options: BuildOptions,
    ) -> Result<DeployReport, PipelineError> {
        let registrations = app
            .registrations()
            .map_err(|e| self.fail(StageKind::Configuration, e.into()))?;
        info!(registrations = registrations.len(), "Starting build");

        let mut ctx = PipelineContext {
            config: self.config.clone(),
            descriptor: self.descriptor.clone(),
            registrations,
            options,
            out_dir: out_dir
                .map(Path::to_path_buf)
                .unwrap_or_else(|| self.config.build.out_dir.clone()),
            built_at: self.built_at.unwrap_or_else(Utc::now),
            runner: self.runner.clone(),
            loader: self.loader.clone(),
            gateway: self.gateway.clone(),
            artifacts: Vec::new(),
            gateway_address: None,
            subscriptions: None,
        };

        for stage in &self.stages {
            let kind = stage.kind();
            self.progress.stage_started(kind.label());
            match stage.execute(&mut ctx).await {
                Ok(()) => self.progress.stage_succeeded(kind.label()),
                Err(source) => return Err(self.fail(kind, source)),
            }
        }

        let report = DeployReport {
            image_tag: ctx.descriptor.image_tag(),
            gateway_address: ctx.gateway_address,
            event_port: self.config.gateway.event_port,
            artifacts: ctx.artifacts,
            subscriptions: ctx.subscriptions,
        };

        match report.url() {
            Some(url) => self.progress.finished(&format!("🎉 Your app is ready at {}", url)),
            None => self.progress.finished("Build complete"),
        }
        Ok(report)
    }
}
