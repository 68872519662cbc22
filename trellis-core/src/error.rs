// Error types for the Trellis runtime

use thiserror::Error;

/// Result alias used throughout the runtime.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// The identifier has no binding and names no constructible class.
    #[error("Service not found: {0}")]
    NotFound(String),

    /// Circular dependency, uninstantiable class, unresolved parameter,
    /// introspection failure or a malformed scanned source tree.
    #[error("Container error: {0}")]
    Container(String),

    #[error("Security violation: {0}")]
    Security(#[from] SecurityException),

    #[error("Route not found: {0}")]
    RouteNotFound(String),

    /// Route argument coercion failed before the action could run.
    #[error("Rendering error: {0}")]
    Rendering(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn circular(chain: &[String], id: &str) -> Self {
        let mut path = chain.join(" -> ");
        if !path.is_empty() {
            path.push_str(" -> ");
        }
        path.push_str(id);
        Error::Container(format!("Circular dependency detected: {}", path))
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Error::NotFound(_) | Error::RouteNotFound(_) => 404,
            Error::Rendering(_) => 400,
            Error::Security(exception) => exception.code,
            _ => 500,
        }
    }

    /// Check if this is a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }

    /// Check if this is a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }
}

/// Structured payload of a failed security check.
///
/// Carries the message, a status code for the response boundary and the
/// error that caused it, if any.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct SecurityException {
    pub message: String,
    pub code: u16,
    #[source]
    pub previous: Option<Box<Error>>,
}

impl SecurityException {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: 500,
            previous: None,
        }
    }

    pub fn with_code(mut self, code: u16) -> Self {
        self.code = code;
        self
    }

    pub fn with_previous(mut self, previous: Error) -> Self {
        self.previous = Some(Box::new(previous));
        self
    }
}
