//! # Connection Errors
//!
//! A single error type for every facade operation. Each variant keeps the
//! service it came from so callers can tell a refused Redis connection from a
//! PostgreSQL syntax error, and decide whether a retry makes sense.

use std::fmt;
use std::path::PathBuf;

use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use thiserror::Error;

/// The external service an error or handle belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    Postgres,
    Cache,
    ObjectStore,
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Service::Postgres => write!(f, "PostgreSQL"),
            Service::Cache => write!(f, "Redis"),
            Service::ObjectStore => write!(f, "S3"),
        }
    }
}

/// Coarse classification of a [`ConnectorError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotConnected,
    Network,
    Auth,
    InvalidInput,
    Backend,
    LocalFile,
}

#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("{0} connection not established")]
    NotConnected(Service),

    #[error("{service} network failure: {message}")]
    Network { service: Service, message: String },

    #[error("{service} authentication failed: {message}")]
    Auth { service: Service, message: String },

    #[error("{service} rejected the request: {message}")]
    InvalidInput { service: Service, message: String },

    #[error("{service} error: {message}")]
    Backend { service: Service, message: String },

    #[error("Local file error on {}: {source}", path.display())]
    LocalFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConnectorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConnectorError::NotConnected(_) => ErrorKind::NotConnected,
            ConnectorError::Network { .. } => ErrorKind::Network,
            ConnectorError::Auth { .. } => ErrorKind::Auth,
            ConnectorError::InvalidInput { .. } => ErrorKind::InvalidInput,
            ConnectorError::Backend { .. } => ErrorKind::Backend,
            ConnectorError::LocalFile { .. } => ErrorKind::LocalFile,
        }
    }

    /// The service involved, `None` for local file errors.
    pub fn service(&self) -> Option<Service> {
        match self {
            ConnectorError::NotConnected(service)
            | ConnectorError::Network { service, .. }
            | ConnectorError::Auth { service, .. }
            | ConnectorError::InvalidInput { service, .. }
            | ConnectorError::Backend { service, .. } => Some(*service),
            ConnectorError::LocalFile { .. } => None,
        }
    }

    /// Whether retrying the same call later may succeed.
    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Network
    }

    pub(crate) fn invalid_input(service: Service, message: impl Into<String>) -> Self {
        ConnectorError::InvalidInput {
            service,
            message: message.into(),
        }
    }

    pub(crate) fn local_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConnectorError::LocalFile {
            path: path.into(),
            source,
        }
    }
}

/// Maps a `tokio_postgres` error by SQLSTATE class.
///
/// Class 28 is an authorization failure, classes 22, 23, 42 and 0A are
/// problems with the statement itself. Errors without a server response are
/// connection problems.
impl From<tokio_postgres::Error> for ConnectorError {
    fn from(e: tokio_postgres::Error) -> Self {
        let service = Service::Postgres;
        let message = e.to_string();
        match e.as_db_error() {
            Some(db_err) => {
                let code = db_err.code().code();
                let detail = format!("{} ({})", db_err.message(), code);
                if code.starts_with("28") {
                    ConnectorError::Auth { service, message: detail }
                } else if ["22", "23", "42", "0A"].iter().any(|class| code.starts_with(class)) {
                    ConnectorError::InvalidInput { service, message: detail }
                } else if code.starts_with("08") || code.starts_with("57P") {
                    ConnectorError::Network { service, message: detail }
                } else {
                    ConnectorError::Backend { service, message: detail }
                }
            }
            None => ConnectorError::Network { service, message },
        }
    }
}

impl From<redis::RedisError> for ConnectorError {
    fn from(e: redis::RedisError) -> Self {
        let service = Service::Cache;
        let message = e.to_string();
        let auth_code = matches!(e.code(), Some("NOAUTH") | Some("WRONGPASS"));
        if auth_code || matches!(e.kind(), redis::ErrorKind::AuthenticationFailed) {
            ConnectorError::Auth { service, message }
        } else if e.is_io_error()
            || e.is_timeout()
            || e.is_connection_refusal()
            || e.is_connection_dropped()
        {
            ConnectorError::Network { service, message }
        } else {
            ConnectorError::Backend { service, message }
        }
    }
}

const S3_AUTH_CODES: &[&str] = &[
    "AccessDenied",
    "ExpiredToken",
    "InvalidAccessKeyId",
    "InvalidToken",
    "SignatureDoesNotMatch",
];

const S3_INPUT_CODES: &[&str] = &[
    "InvalidBucketName",
    "InvalidObjectState",
    "KeyTooLongError",
    "NoSuchBucket",
    "NoSuchKey",
];

/// Maps an AWS SDK error by dispatch stage and service error code.
pub(crate) fn from_sdk_error<E, R>(e: SdkError<E, R>) -> ConnectorError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: fmt::Debug,
{
    let service = Service::ObjectStore;
    let message = DisplayErrorContext(&e).to_string();
    match &e {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            ConnectorError::Network { service, message }
        }
        SdkError::ConstructionFailure(_) => ConnectorError::InvalidInput { service, message },
        SdkError::ServiceError(ctx) => match ctx.err().code() {
            Some(code) if S3_AUTH_CODES.contains(&code) => ConnectorError::Auth { service, message },
            Some(code) if S3_INPUT_CODES.contains(&code) => {
                ConnectorError::InvalidInput { service, message }
            }
            Some("SlowDown") | Some("ServiceUnavailable") | Some("RequestTimeout") => {
                ConnectorError::Network { service, message }
            }
            _ => ConnectorError::Backend { service, message },
        },
        _ => ConnectorError::Backend { service, message },
    }
}
