//! Manifest synthesis
//!
//! Templates are parsed into [`serde_yaml::Value`] trees and patched by field
//! path. A path whose parent does not exist in the template is a configuration
//! error; the leaf itself may be created. Application manifests go through mesh
//! injection before they land in the output directory.

use crate::error::{BuildError, Result};
use crate::process::{Command, ToolRunner};
use crate::templates::Template;
use chrono::{DateTime, SecondsFormat, Utc};
use kubescript_core::ProjectDescriptor;
use serde::Serialize;
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Path of the readiness endpoint served by the dispatcher
pub const READINESS_PATH: &str = "/readinessProbe";

/// Annotation value identifying generated manifests
pub const BUILT_WITH: &str = "KubeScript";

/// Environment variable the run phase reads its listen address from
pub const LISTEN_ADDR_ENV: &str = "KUBESCRIPT__SERVER__LISTEN_ADDR";

/// Container readiness probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadinessProbe {
    pub http_get: HttpGetAction,
    pub initial_delay_seconds: u32,
    pub timeout_seconds: u32,
    pub period_seconds: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HttpGetAction {
    pub path: String,
    pub port: u16,
}

impl ReadinessProbe {
    pub fn for_port(port: u16) -> Self {
        Self {
            http_get: HttpGetAction {
                path: READINESS_PATH.to_string(),
                port,
            },
            initial_delay_seconds: 1,
            timeout_seconds: 1,
            period_seconds: 15,
        }
    }
}

fn child_mut<'v>(node: &'v mut Value, segment: &str) -> Option<&'v mut Value> {
    match node {
        Value::Mapping(map) => map.get_mut(segment),
        Value::Sequence(seq) => segment.parse::<usize>().ok().and_then(move |i| seq.get_mut(i)),
        _ => None,
    }
}

/// Look up a dotted field path; numeric segments index sequences
pub fn get_path<'v>(doc: &'v Value, path: &str) -> Option<&'v Value> {
    path.split('.').try_fold(doc, |node, segment| match node {
        Value::Mapping(map) => map.get(segment),
        Value::Sequence(seq) => segment.parse::<usize>().ok().and_then(|i| seq.get(i)),
        _ => None,
    })
}

/// Set a dotted field path.
///
/// Every parent along `path` must already exist. A missing final key is
/// inserted into its mapping; a sequence index must be in range.
pub fn set_path(doc: &mut Value, path: &str, value: Value) -> Result<()> {
    let segments: Vec<&str> = path.split('.').collect();
    let Some((leaf, parents)) = segments.split_last() else {
        return Err(BuildError::Configuration("empty manifest path".to_string()));
    };

    let mut cursor = doc;
    for (depth, segment) in parents.iter().enumerate() {
        cursor = child_mut(cursor, segment).ok_or_else(|| {
            BuildError::Configuration(format!(
                "template has no `{}` (while setting `{}`)",
                segments[..=depth].join("."),
                path
            ))
        })?;
    }

    match cursor {
        Value::Mapping(map) => {
            map.insert(Value::String((*leaf).to_string()), value);
            Ok(())
        }
        Value::Sequence(seq) => {
            let slot = leaf
                .parse::<usize>()
                .ok()
                .and_then(|i| seq.get_mut(i))
                .ok_or_else(|| {
                    BuildError::Configuration(format!("template has no `{}`", path))
                })?;
            *slot = value;
            Ok(())
        }
        _ => Err(BuildError::Configuration(format!(
            "cannot set `{}`: parent is not a mapping or sequence",
            path
        ))),
    }
}

/// Patches bundled templates with the project identity
#[derive(Debug, Clone)]
pub struct ManifestSynthesizer<'a> {
    descriptor: &'a ProjectDescriptor,
    built_at: DateTime<Utc>,
    app_port: u16,
}

impl<'a> ManifestSynthesizer<'a> {
    pub fn new(descriptor: &'a ProjectDescriptor, built_at: DateTime<Utc>) -> Self {
        Self {
            descriptor,
            built_at,
            app_port: kubescript_core::config::DEFAULT_APP_PORT,
        }
    }

    /// Port the container listens on, the service forwards to and the probe
    /// targets
    pub fn with_app_port(mut self, port: u16) -> Self {
        self.app_port = port;
        self
    }

    fn annotations(&self) -> Value {
        let mut map = Mapping::new();
        map.insert(
            Value::from("builtAt"),
            Value::from(self.built_at.to_rfc3339_opts(SecondsFormat::Secs, true)),
        );
        map.insert(Value::from("builtWith"), Value::from(BUILT_WITH));
        Value::Mapping(map)
    }

    /// Template env with the listen address pinned to the app port
    fn container_env(&self, doc: &Value) -> Value {
        let mut env = get_path(doc, "spec.template.spec.containers.0.env")
            .and_then(Value::as_sequence)
            .cloned()
            .unwrap_or_default();
        env.retain(|var| {
            get_path(var, "name").and_then(Value::as_str) != Some(LISTEN_ADDR_ENV)
        });

        let mut var = Mapping::new();
        var.insert(Value::from("name"), Value::from(LISTEN_ADDR_ENV));
        var.insert(
            Value::from("value"),
            Value::from(format!("0.0.0.0:{}", self.app_port)),
        );
        env.push(Value::Mapping(var));
        Value::Sequence(env)
    }

    /// Application deployment manifest
    pub fn deployment(&self) -> Result<Value> {
        let name = self.descriptor.name.as_str();
        let mut doc: Value = serde_yaml::from_str(Template::AppDeployment.source())?;

        set_path(&mut doc, "metadata.name", Value::from(name))?;
        set_path(&mut doc, "spec.selector.matchLabels.app", Value::from(name))?;
        set_path(&mut doc, "spec.template.metadata.labels.app", Value::from(name))?;
        set_path(&mut doc, "spec.template.metadata.annotations", self.annotations())?;
        set_path(
            &mut doc,
            "spec.template.spec.containers.0.name",
            Value::from(name),
        )?;
        set_path(
            &mut doc,
            "spec.template.spec.containers.0.image",
            Value::from(self.descriptor.image_tag()),
        )?;
        set_path(
            &mut doc,
            "spec.template.spec.containers.0.ports.0.containerPort",
            Value::from(self.app_port),
        )?;
        let env = self.container_env(&doc);
        set_path(&mut doc, "spec.template.spec.containers.0.env", env)?;
        set_path(
            &mut doc,
            "spec.template.spec.containers.0.readinessProbe",
            serde_yaml::to_value(ReadinessProbe::for_port(self.app_port))?,
        )?;

        Ok(doc)
    }

    /// Application service manifest
    pub fn service(&self) -> Result<Value> {
        let name = self.descriptor.name.as_str();
        let mut doc: Value = serde_yaml::from_str(Template::AppService.source())?;

        set_path(&mut doc, "metadata.name", Value::from(name))?;
        set_path(&mut doc, "spec.selector.app", Value::from(name))?;
        set_path(&mut doc, "spec.ports.0.port", Value::from(self.app_port))?;
        set_path(&mut doc, "spec.ports.0.targetPort", Value::from(self.app_port))?;

        Ok(doc)
    }

    /// Copy the infrastructure templates into `out` verbatim
    pub async fn write_infrastructure(&self, out: &Path) -> Result<Vec<PathBuf>> {
        let mut written = Vec::with_capacity(Template::INFRASTRUCTURE.len());
        for template in Template::INFRASTRUCTURE {
            let path = out.join(template.artifact_name());
            tokio::fs::write(&path, template.source()).await?;
            debug!(path = %path.display(), "Wrote infrastructure manifest");
            written.push(path);
        }
        Ok(written)
    }

    /// Patch, mesh-inject and write the application manifests into `out`
    pub async fn write_application(
        &self,
        out: &Path,
        runner: &dyn ToolRunner,
    ) -> Result<Vec<PathBuf>> {
        let deployment = out.join(Template::AppDeployment.artifact_name());
        inject_mesh(runner, &self.deployment()?, &deployment).await?;

        let service = out.join(Template::AppService.artifact_name());
        inject_mesh(runner, &self.service()?, &service).await?;

        Ok(vec![deployment, service])
    }
}

/// Intermediate file consumed by mesh injection (`app.yaml` -> `app.raw.yaml`)
pub fn raw_path(final_path: &Path) -> PathBuf {
    let name = final_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = name.strip_suffix(".yaml").unwrap_or(&name);
    final_path.with_file_name(format!("{}.raw.yaml", stem))
}

/// Write `doc` as a raw file, run `conduit inject` on it and keep the output
/// as `final_path`. The raw file is removed once consumed.
pub async fn inject_mesh(runner: &dyn ToolRunner, doc: &Value, final_path: &Path) -> Result<()> {
    let raw = raw_path(final_path);
    tokio::fs::write(&raw, serde_yaml::to_string(doc)?).await?;

    let output = runner
        .run(
            &Command::new("conduit")
                .arg("inject")
                .arg(raw.display().to_string())
                .captured(),
        )
        .await?;

    tokio::fs::write(final_path, output.stdout).await?;
    tokio::fs::remove_file(&raw).await?;
    debug!(path = %final_path.display(), "Wrote mesh-injected manifest");
    Ok(())
}
