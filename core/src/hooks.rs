//! Lifecycle hooks around command execution.
//!
//! # Design
//! The executor owns the control flow; a `Hooks` implementation only
//! customises what happens at fixed points: before the first attempt, when a
//! successful body is decoded, when the command finishes, before an
//! authorization retry, and on release. Every method except `decode` has a
//! default, so most implementations only pick an `Output` type.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::command::RequestParts;
use crate::error::CommandError;
use crate::http::Headers;
use crate::options::{Authorization, RequestOptions};

/// A decoded response together with what was observed on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse<T> {
    pub status: u16,
    pub headers: Headers,
    pub body: T,
}

impl<T> ApiResponse<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ApiResponse<U> {
        ApiResponse {
            status: self.status,
            headers: self.headers,
            body: f(self.body),
        }
    }
}

pub trait Hooks {
    type Output;

    /// Runs once, before headers, URL and form-encoding are resolved. Setting
    /// a body here opts the command out of form-encoding.
    fn prepare(
        &mut self,
        _parts: &mut RequestParts,
        _options: &RequestOptions,
    ) -> Result<(), CommandError> {
        Ok(())
    }

    /// Turn a 2xx body into the command's output.
    fn decode(
        &mut self,
        content_type: Option<&str>,
        body: Vec<u8>,
    ) -> Result<Self::Output, CommandError>;

    fn on_success(&mut self, response: ApiResponse<Self::Output>) -> ApiResponse<Self::Output> {
        debug!(status = response.status, "request succeeded");
        response
    }

    /// Sees the terminal error before it reaches the caller or callback.
    fn on_error(&mut self, error: CommandError) -> CommandError {
        debug!(%error, "request failed");
        error
    }

    /// Called before the single retry that follows a 401 on the first attempt.
    fn refresh_authorization(&mut self, options: &RequestOptions) {
        if let Some(Authorization::Credential(credential)) = &options.authorization {
            debug!("refreshing credential after authorization failure");
            if let Err(error) = credential.refresh() {
                warn!(%error, "credential refresh failed");
            }
        }
    }

    /// Runs once after the command finishes, on every exit path.
    fn release(&mut self) {}
}

/// Returns the raw body unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

impl Hooks for PassThrough {
    type Output = Vec<u8>;

    fn decode(
        &mut self,
        _content_type: Option<&str>,
        body: Vec<u8>,
    ) -> Result<Vec<u8>, CommandError> {
        Ok(body)
    }
}

/// Decodes JSON bodies with serde. An empty body (e.g. 204) decodes to `None`.
pub struct JsonHooks<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonHooks<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for JsonHooks<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for JsonHooks<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("JsonHooks")
    }
}

fn is_json(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    mime == "application/json" || mime.ends_with("+json")
}

impl<T: DeserializeOwned> Hooks for JsonHooks<T> {
    type Output = Option<T>;

    fn prepare(
        &mut self,
        parts: &mut RequestParts,
        _options: &RequestOptions,
    ) -> Result<(), CommandError> {
        parts.header.set_if_absent("Accept", "application/json");
        Ok(())
    }

    fn decode(
        &mut self,
        content_type: Option<&str>,
        body: Vec<u8>,
    ) -> Result<Option<T>, CommandError> {
        if body.is_empty() {
            return Ok(None);
        }
        if let Some(content_type) = content_type {
            if !is_json(content_type) {
                return Err(CommandError::Deserialization(format!(
                    "unexpected content type {content_type}"
                )));
            }
        }
        serde_json::from_slice(&body)
            .map(Some)
            .map_err(|e| CommandError::Deserialization(e.to_string()))
    }
}
