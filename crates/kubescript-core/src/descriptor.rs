//! Project descriptor
//!
//! Project identity (name, version, registry prefix, entry binary) is read
//! once from the project's `Cargo.toml` and handed to the builder by
//! reference. KubeScript-specific settings live under
//! `[package.metadata.kubescript]`:
//!
//! ```toml
//! [package]
//! name = "shop"
//! version = "1.0.0"
//!
//! [package.metadata.kubescript]
//! prefix = "registry.example.com/team/"
//! entry = "shop-server"
//! ```

use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Identity of the deployable unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectDescriptor {
    /// Package name; also the deployment, container and gateway space name
    pub name: String,

    /// Package version; used as the image tag
    pub version: String,

    /// Registry prefix prepended verbatim to the image name
    #[serde(default)]
    pub registry_prefix: String,

    /// Binary started by the container; defaults to the package name
    #[serde(default)]
    pub entry: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Manifest {
    package: Option<Package>,
}

#[derive(Debug, Deserialize)]
struct Package {
    name: Option<String>,
    version: Option<toml::Value>,
    #[serde(default)]
    metadata: Option<Metadata>,
}

#[derive(Debug, Default, Deserialize)]
struct Metadata {
    #[serde(default)]
    kubescript: Option<KubeScriptMetadata>,
}

#[derive(Debug, Default, Deserialize)]
struct KubeScriptMetadata {
    #[serde(default)]
    prefix: Option<String>,
    #[serde(default)]
    entry: Option<String>,
}

impl ProjectDescriptor {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            registry_prefix: String::new(),
            entry: None,
        }
    }

    /// Set the registry prefix
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.registry_prefix = prefix.into();
        self
    }

    /// Set the entry binary
    pub fn with_entry(mut self, entry: impl Into<String>) -> Self {
        self.entry = Some(entry.into());
        self
    }

    /// Load from a `Cargo.toml` file
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&raw)
    }

    /// Parse `Cargo.toml` contents
    pub fn parse(raw: &str) -> ConfigResult<Self> {
        let manifest: Manifest = toml::from_str(raw)?;
        let package = manifest
            .package
            .ok_or(ConfigError::MissingField("[package]"))?;

        let name = package
            .name
            .filter(|n| !n.trim().is_empty())
            .ok_or(ConfigError::MissingField("package.name"))?;

        // `version.workspace = true` cannot be resolved without the workspace root
        let version = match package.version {
            Some(toml::Value::String(v)) if !v.trim().is_empty() => v,
            Some(toml::Value::Table(_)) => {
                return Err(ConfigError::Invalid(
                    "package.version must be a literal string, not inherited from the workspace"
                        .to_string(),
                ))
            }
            _ => return Err(ConfigError::MissingField("package.version")),
        };

        let meta = package
            .metadata
            .and_then(|m| m.kubescript)
            .unwrap_or_default();

        Ok(Self {
            name,
            version,
            registry_prefix: meta.prefix.unwrap_or_default(),
            entry: meta.entry.filter(|e| !e.trim().is_empty()),
        })
    }

    /// Container image tag: `prefix + name + ":" + version`
    pub fn image_tag(&self) -> String {
        format!("{}{}:{}", self.registry_prefix, self.name, self.version)
    }

    /// Binary the container should start
    pub fn entry_binary(&self) -> &str {
        self.entry.as_deref().unwrap_or(&self.name)
    }
}
