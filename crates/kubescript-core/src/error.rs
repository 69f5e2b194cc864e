//! Core error types

use crate::addressing::Identifier;
use thiserror::Error;

/// Errors raised when a declaration set is finalised
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistrationError {
    /// Two registrations derive the same identifier
    #[error("Duplicate identifier: {identifier} is declared by both {first} and {second}")]
    DuplicateIdentifier {
        identifier: Identifier,
        first: String,
        second: String,
    },

    /// HTTP path does not start with `/`
    #[error("Invalid path {path:?}: paths must start with '/'")]
    InvalidPath { path: String },

    /// Event name cannot be embedded verbatim in an endpoint path
    #[error("Invalid event name {name:?}: names must be non-empty URL path characters")]
    InvalidEventName { name: String },
}

/// Configuration and project descriptor errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Layered configuration could not be built
    #[error("Configuration error: {0}")]
    Source(#[from] config::ConfigError),

    /// Descriptor file could not be read
    #[error("Cannot read project descriptor {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Descriptor file is not valid TOML
    #[error("Malformed project descriptor: {0}")]
    Parse(#[from] toml::de::Error),

    /// A required descriptor field is absent or empty
    #[error("Project descriptor is missing {0}")]
    MissingField(&'static str),

    /// A value failed validation
    #[error("Invalid configuration value: {0}")]
    Invalid(String),
}

/// Result type for configuration loading
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
