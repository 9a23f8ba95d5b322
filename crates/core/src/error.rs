//! Core error types for the stream resolver.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },

    #[error("external service error: {service} - {error}")]
    ExternalServiceError { service: String, error: String },

    #[error("configuration error: {field} - {message}")]
    ConfigurationError { field: String, message: String },
}

pub type Result<T> = std::result::Result<T, CoreError>;
