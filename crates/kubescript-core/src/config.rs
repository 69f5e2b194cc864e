//! Configuration for both phases
//!
//! Layered like the daemon configuration it is modelled on: built-in
//! defaults, then an optional file, then `KUBESCRIPT__<SECTION>__<KEY>`
//! environment variables. The legacy `VERBOSE` toggle is honoured last.

use crate::error::ConfigResult;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Port the application container listens on
pub const DEFAULT_APP_PORT: u16 = 3000;

/// Port of the gateway's event ingress
pub const DEFAULT_EVENT_PORT: u16 = 4000;

/// Port of the gateway's admin API
pub const DEFAULT_ADMIN_PORT: u16 = 4001;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KubeScriptConfig {
    /// Run-phase server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Gateway addressing
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Build-phase settings
    #[serde(default)]
    pub build: BuildSettings,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Enable CORS
    #[serde(default = "default_true")]
    pub enable_cors: bool,

    /// Maximum request body size in bytes
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            enable_cors: true,
            max_body_size: default_max_body_size(),
        }
    }
}

/// Gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Host the application uses to reach the gateway at run time
    #[serde(default = "default_gateway_host")]
    pub host: String,

    /// Event ingress port
    #[serde(default = "default_event_port")]
    pub event_port: u16,

    /// Admin API port
    #[serde(default = "default_admin_port")]
    pub admin_port: u16,

    /// Cluster service exposing the gateway
    #[serde(default = "default_gateway_host")]
    pub service_name: String,

    /// Number of address lookups before giving up
    #[serde(default = "default_address_attempts")]
    pub address_attempts: u32,

    /// Seconds between address lookups
    #[serde(default = "default_address_interval")]
    pub address_interval_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_gateway_host(),
            event_port: DEFAULT_EVENT_PORT,
            admin_port: DEFAULT_ADMIN_PORT,
            service_name: default_gateway_host(),
            address_attempts: default_address_attempts(),
            address_interval_secs: default_address_interval(),
        }
    }
}

/// Build-phase settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildSettings {
    /// Output directory for generated manifests
    #[serde(default = "default_out_dir")]
    pub out_dir: PathBuf,

    /// Port the application container exposes
    #[serde(default = "default_app_port")]
    pub app_port: u16,

    /// Stream external tool output to the console
    #[serde(default)]
    pub verbose: bool,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            out_dir: default_out_dir(),
            app_port: DEFAULT_APP_PORT,
            verbose: false,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value helpers
fn default_true() -> bool {
    true
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], DEFAULT_APP_PORT))
}

fn default_max_body_size() -> usize {
    10 * 1024 * 1024
}

fn default_gateway_host() -> String {
    "event-gateway".to_string()
}

fn default_event_port() -> u16 {
    DEFAULT_EVENT_PORT
}

fn default_admin_port() -> u16 {
    DEFAULT_ADMIN_PORT
}

fn default_address_attempts() -> u32 {
    30
}

fn default_address_interval() -> u64 {
    2
}

fn default_out_dir() -> PathBuf {
    PathBuf::from("./out")
}

fn default_app_port() -> u16 {
    DEFAULT_APP_PORT
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Interpret a `VERBOSE`-style toggle
pub fn is_truthy(value: &str) -> bool {
    let value = value.trim();
    !(value.is_empty() || value == "0" || value.eq_ignore_ascii_case("false"))
}

impl KubeScriptConfig {
    /// Load configuration from defaults, an optional file and the environment
    pub fn load(path: Option<&str>) -> ConfigResult<Self> {
        let mut builder = config::Config::builder();

        // Add default configuration
        builder = builder.add_source(config::Config::try_from(&KubeScriptConfig::default())?);

        // Add file configuration if provided
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(true));
        }

        // Add environment variables with KUBESCRIPT__ prefix
        builder = builder.add_source(
            config::Environment::with_prefix("KUBESCRIPT")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let mut loaded: Self = builder.build()?.try_deserialize()?;

        if let Ok(verbose) = std::env::var("VERBOSE") {
            loaded.build.verbose = is_truthy(&verbose);
        }

        Ok(loaded)
    }

    /// Gateway event ingress URL (`http://<host>:<event_port>/`)
    pub fn gateway_url(&self) -> String {
        format!("http://{}:{}/", self.gateway.host, self.gateway.event_port)
    }
}
