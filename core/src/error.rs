//! Error types for command execution.
//!
//! # Design
//! `ApiError` is the closed, status-driven taxonomy produced by the response
//! classifier. Every variant carries the same `ErrorDetails` so callers can
//! inspect the status, headers and body whichever variant they hit.
//! `CommandError` wraps it together with the two failures that do not come
//! from the server: a request that could not be built, and a decode hook
//! that rejected the body. Only `CommandError::Api` is ever retried.

use thiserror::Error;

use crate::http::Headers;

/// What the server (or transport) reported for a failed attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorDetails {
    /// `None` when the transport failed before any status was received.
    pub status: Option<u16>,
    pub headers: Headers,
    pub body: Vec<u8>,
    pub message: String,
}

impl ErrorDetails {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn from_response(
        status: u16,
        headers: &Headers,
        body: &[u8],
        message: impl Into<String>,
    ) -> Self {
        Self {
            status: Some(status),
            headers: headers.clone(),
            body: body.to_vec(),
            message: message.into(),
        }
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// A classified request failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// 3xx the transport did not follow.
    #[error("{}", .0.message)]
    Redirect(ErrorDetails),

    /// 401.
    #[error("{}", .0.message)]
    Authorization(ErrorDetails),

    /// 429.
    #[error("{}", .0.message)]
    RateLimit(ErrorDetails),

    /// 304, 400 and 402-499 other than 429.
    #[error("{}", .0.message)]
    Client(ErrorDetails),

    /// 500-599.
    #[error("{}", .0.message)]
    Server(ErrorDetails),

    /// Timeouts, socket errors and statuses nobody recognises.
    #[error("{}", .0.message)]
    Transmission(ErrorDetails),
}

impl ApiError {
    pub fn details(&self) -> &ErrorDetails {
        match self {
            ApiError::Redirect(d)
            | ApiError::Authorization(d)
            | ApiError::RateLimit(d)
            | ApiError::Client(d)
            | ApiError::Server(d)
            | ApiError::Transmission(d) => d,
        }
    }

    pub fn status(&self) -> Option<u16> {
        self.details().status
    }

    /// Server, rate-limit and transmission failures may succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ApiError::Server(_) | ApiError::RateLimit(_) | ApiError::Transmission(_)
        )
    }

    pub fn is_authorization(&self) -> bool {
        matches!(self, ApiError::Authorization(_))
    }
}

/// Everything `Command::execute` can surface.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The request could not be built, e.g. a template variable is missing.
    #[error("invalid request configuration: {0}")]
    Configuration(String),

    /// A decode hook could not turn the response body into its output.
    #[error("deserialization failed: {0}")]
    Deserialization(String),
}

impl CommandError {
    pub fn api(&self) -> Option<&ApiError> {
        match self {
            CommandError::Api(err) => Some(err),
            _ => None,
        }
    }

    pub(crate) fn is_transient(&self) -> bool {
        self.api().is_some_and(ApiError::is_transient)
    }

    pub(crate) fn is_authorization(&self) -> bool {
        self.api().is_some_and(ApiError::is_authorization)
    }
}
