//! Runtime error types

use kubescript_core::RegistrationError;
use std::net::SocketAddr;
use thiserror::Error;

/// Run-phase errors
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Declarations could not be finalised into a route table
    #[error("Registration error: {0}")]
    Registration(#[from] RegistrationError),

    /// Listener could not be bound
    #[error("Cannot listen on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Server loop failed
    #[error("Server error: {0}")]
    Server(String),
}

/// Result type for runtime operations
pub type RuntimeResult<T> = Result<T, RuntimeError>;
