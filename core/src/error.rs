use std::fmt;

use http::StatusCode;
use thiserror::Error;

/// The error type for tablestore operations
#[derive(Error, Debug)]
#[error("{kind}: {message}")]
pub struct Error {
    kind: ErrorKind,
    message: String,
    status: Option<StatusCode>,
    code: Option<String>,
    not_sent: bool,
    #[source]
    source: Option<anyhow::Error>,
}

/// The kind of error that occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// An entity cannot be represented on the wire (missing keys, bad property names, oversized values)
    SchemaError,

    /// A wire record cannot be read as the requested shape
    DecodeError,

    /// Credentials are absent or malformed
    AuthConfigError,

    /// Configuration error (missing fields, invalid values)
    ConfigInvalid,

    /// Request cannot be built (invalid table name, bad filter, etc.)
    RequestInvalid,

    /// The table already exists
    AlreadyExists,

    /// The entity already exists or the resource is in a conflicting state
    Conflict,

    /// The table or entity does not exist
    NotFound,

    /// The etag condition did not match
    PreconditionFailed,

    /// The service asked us to slow down (429, 503)
    Throttled,

    /// Any other status the service rejected the request with
    ServiceError,

    /// The request failed below HTTP (connect, reset, attempt timeout)
    NetworkError,

    /// The retry budget was spent; the last error is kept as source
    RetryExhausted,

    /// Unexpected errors (malformed responses, internal bugs, etc.)
    Unexpected,
}

impl Error {
    /// Create a new error with the given kind and message
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            code: None,
            not_sent: false,
            source: None,
        }
    }

    /// Add a source error
    pub fn with_source(mut self, source: impl Into<anyhow::Error>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Attach the HTTP status the service answered with
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    /// Attach the service error code, e.g. `EntityAlreadyExists`
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Get the error kind
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the HTTP status if the error came from a response
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Get the service error code if the response carried one
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    /// Check if the failed request is known not to have reached the server
    pub fn is_not_sent(&self) -> bool {
        self.not_sent
    }

    /// Get the last attempt's error of a [`ErrorKind::RetryExhausted`] error.
    pub fn last_error(&self) -> Option<&Error> {
        if self.kind != ErrorKind::RetryExhausted {
            return None;
        }
        self.source.as_ref()?.downcast_ref::<Error>()
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }

    /// Check if this is a conflict, including an existing table
    pub fn is_conflict(&self) -> bool {
        matches!(self.kind, ErrorKind::Conflict | ErrorKind::AlreadyExists)
    }

    /// Check if this is an etag mismatch
    pub fn is_precondition_failed(&self) -> bool {
        self.kind == ErrorKind::PreconditionFailed
    }

    /// Check if another attempt could succeed
    pub fn is_retryable(&self) -> bool {
        match self.kind {
            ErrorKind::Throttled | ErrorKind::NetworkError => true,
            ErrorKind::ServiceError => self.status.is_some_and(is_retryable_status),
            _ => false,
        }
    }

    /// Check if this is a local configuration error that must never be retried
    pub fn is_config_error(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::SchemaError
                | ErrorKind::DecodeError
                | ErrorKind::AuthConfigError
                | ErrorKind::ConfigInvalid
                | ErrorKind::RequestInvalid
        )
    }
}

// Convenience constructors
impl Error {
    /// Create a schema error
    pub fn schema(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SchemaError, message)
    }

    /// Create a decode error
    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::DecodeError, message)
    }

    /// Create an auth config error
    pub fn auth_config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AuthConfigError, message)
    }

    /// Create a config invalid error
    pub fn config_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConfigInvalid, message)
    }

    /// Create a request invalid error
    pub fn request_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RequestInvalid, message)
    }

    /// Create a network error
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NetworkError, message)
    }

    /// Create a network error for a request that never reached the server,
    /// e.g. a refused connection. Such requests are safe to resend.
    pub fn not_sent(message: impl Into<String>) -> Self {
        let mut err = Self::network(message);
        err.not_sent = true;
        err
    }

    /// Create a retry exhausted error that keeps `last` as its source
    pub fn retry_exhausted(attempts: u32, last: Error) -> Self {
        let message = format!("gave up after {attempts} attempts: {last}");
        Self {
            kind: ErrorKind::RetryExhausted,
            message,
            status: last.status,
            code: last.code.clone(),
            not_sent: false,
            source: Some(anyhow::Error::new(last)),
        }
    }

    /// Create an unexpected error
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unexpected, message)
    }
}

/// Statuses worth another attempt: request timeout, throttling and transient server failures.
pub fn is_retryable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::REQUEST_TIMEOUT
            | StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::SchemaError => write!(f, "schema error"),
            ErrorKind::DecodeError => write!(f, "decode error"),
            ErrorKind::AuthConfigError => write!(f, "invalid auth configuration"),
            ErrorKind::ConfigInvalid => write!(f, "invalid configuration"),
            ErrorKind::RequestInvalid => write!(f, "invalid request"),
            ErrorKind::AlreadyExists => write!(f, "already exists"),
            ErrorKind::Conflict => write!(f, "conflict"),
            ErrorKind::NotFound => write!(f, "not found"),
            ErrorKind::PreconditionFailed => write!(f, "precondition failed"),
            ErrorKind::Throttled => write!(f, "throttled"),
            ErrorKind::ServiceError => write!(f, "service error"),
            ErrorKind::NetworkError => write!(f, "network error"),
            ErrorKind::RetryExhausted => write!(f, "retry exhausted"),
            ErrorKind::Unexpected => write!(f, "unexpected error"),
        }
    }
}

/// Convenience type alias for Results
pub type Result<T> = std::result::Result<T, Error>;

// Common From implementations
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::unexpected(err.to_string()).with_source(err)
    }
}

impl From<std::fmt::Error> for Error {
    fn from(err: std::fmt::Error) -> Self {
        Self::unexpected(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<http::Error> for Error {
    fn from(err: http::Error) -> Self {
        Self::request_invalid(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<http::header::InvalidHeaderValue> for Error {
    fn from(err: http::header::InvalidHeaderValue) -> Self {
        Self::request_invalid(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<http::uri::InvalidUri> for Error {
    fn from(err: http::uri::InvalidUri) -> Self {
        Self::request_invalid(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<http::uri::InvalidUriParts> for Error {
    fn from(err: http::uri::InvalidUriParts) -> Self {
        Self::request_invalid(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<std::string::FromUtf8Error> for Error {
    fn from(err: std::string::FromUtf8Error) -> Self {
        Self::decode(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<http::header::ToStrError> for Error {
    fn from(err: http::header::ToStrError) -> Self {
        Self::request_invalid(err.to_string()).with_source(anyhow::Error::from(err))
    }
}
