use aws_sdk_dynamodb::error::{DisplayErrorContext, ProvideErrorMetadata};

use crate::expression::ExpressionError;

/// Errors surfaced by the access layer.
///
/// Only [`Error::Throttled`] is ever retried; everything else reaches the caller as soon
/// as it happens.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A condition, key or filter expression could not be parsed.
    #[error("invalid expression: {0}")]
    Expression(#[from] ExpressionError),
    /// The caller passed arguments the operation cannot run with.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// A conditional write left the item unchanged.
    #[error("conditional check failed: {0}")]
    ConditionalCheckFailed(String),
    /// Provisioned throughput or request rate was exceeded.
    #[error("throughput exceeded: {0}")]
    Throttled(String),
    /// The table or index does not exist.
    #[error("resource not found: {0}")]
    ResourceNotFound(String),
    /// Any other failed request.
    #[error("request failed: {0}")]
    Request(String),
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

const THROTTLING_CODES: &[&str] = &[
    "ProvisionedThroughputExceededException",
    "ThrottlingException",
    "RequestLimitExceeded",
];

impl Error {
    /// Whether the error is transient and worth retrying.
    pub fn is_throttling(&self) -> bool {
        matches!(self, Self::Throttled(_))
    }

    /// Classifies an SDK error by its service error code.
    pub(crate) fn from_sdk<E>(err: E) -> Self
    where
        E: ProvideErrorMetadata + std::error::Error,
    {
        let message = DisplayErrorContext(&err).to_string();
        match err.code() {
            Some("ConditionalCheckFailedException") => Self::ConditionalCheckFailed(message),
            Some("ResourceNotFoundException") => Self::ResourceNotFound(message),
            Some(code) if THROTTLING_CODES.contains(&code) => Self::Throttled(message),
            _ => Self::Request(message),
        }
    }
}

impl From<aws_sdk_dynamodb::error::BuildError> for Error {
    fn from(err: aws_sdk_dynamodb::error::BuildError) -> Self {
        Self::InvalidArgument(err.to_string())
    }
}
