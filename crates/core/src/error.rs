//! Error types for nodestore
//!
//! A single error enum is shared by the core and the operation clients so
//! the retry executor can decide, per failure, whether the storage node is
//! to blame.

/// Result alias used across nodestore crates
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by host selection, discovery and storage operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Deployment misconfiguration (empty host list, unreadable config file)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Host discovery failed and no hosts are available
    #[error("Discovery error: {0}")]
    Discovery(String),

    /// Transport failure talking to a storage node
    #[error("Network error: {0}")]
    Network(String),

    /// A storage node answered with an unexpected status
    #[error("Unexpected status {code}: {message}")]
    Status { code: u16, message: String },

    /// Malformed range request or response header
    #[error("Invalid range: {0}")]
    Range(String),

    /// Object or bucket does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller supplied an argument that cannot be used
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Local I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    General(String),
}

impl Error {
    /// Whether this failure should count against the host that produced it
    ///
    /// Host faults mark the node unhealthy and are retried on another
    /// node. Anything else means the node answered and the failure is the
    /// caller's or the object's, so retrying elsewhere cannot help.
    pub fn is_host_fault(&self) -> bool {
        match self {
            Error::Network(_) | Error::Status { .. } | Error::Range(_) | Error::Json(_) => true,
            Error::Config(_)
            | Error::Discovery(_)
            | Error::NotFound(_)
            | Error::InvalidArgument(_)
            | Error::Io(_)
            | Error::General(_) => false,
        }
    }

    /// Process exit code for command-line front ends
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Config(_) | Error::InvalidArgument(_) => 2,
            Error::Network(_) | Error::Status { .. } | Error::Discovery(_) | Error::Range(_) => 3,
            Error::NotFound(_) => 5,
            Error::Io(_) | Error::Json(_) | Error::General(_) => 1,
        }
    }

    /// Build a status error from a code and response body
    pub fn status(code: u16, message: impl Into<String>) -> Self {
        Error::Status {
            code,
            message: message.into(),
        }
    }
}

/// Lets nodestore errors travel through `std::io` based readers and streams
impl From<Error> for std::io::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::Io(io) => io,
            other => std::io::Error::other(other),
        }
    }
}
