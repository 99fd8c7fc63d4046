//! Per-command configuration and process-wide defaults.
//!
//! # Design
//! Every `Command` owns its own `RequestOptions`, cloned from the process
//! defaults when the command is created. Defaults are installed once at
//! startup; there is no way to mutate them afterwards, so concurrent commands
//! never observe each other's configuration.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use serde::Deserialize;

use crate::error::CommandError;
use crate::http::Headers;

static PROCESS_DEFAULTS: OnceLock<RequestOptions> = OnceLock::new();

/// A credential that writes its own headers, e.g. a signed-request scheme or
/// an OAuth token holder.
pub trait Credential: Send + Sync {
    fn apply(&self, headers: &mut Headers);

    /// Whether `refresh` can obtain fresh credentials after a 401.
    fn can_refresh(&self) -> bool {
        false
    }

    fn refresh(&self) -> Result<(), String> {
        Ok(())
    }
}

#[derive(Clone)]
pub enum Authorization {
    /// Rendered as `Authorization: Bearer <token>`.
    Bearer(String),
    Credential(Arc<dyn Credential>),
}

impl Authorization {
    pub fn credential(credential: impl Credential + 'static) -> Self {
        Authorization::Credential(Arc::new(credential))
    }

    pub fn can_refresh(&self) -> bool {
        match self {
            Authorization::Bearer(_) => false,
            Authorization::Credential(c) => c.can_refresh(),
        }
    }

    pub fn apply(&self, headers: &mut Headers) {
        match self {
            Authorization::Bearer(token) => headers.set("Authorization", format!("Bearer {token}")),
            Authorization::Credential(c) => c.apply(headers),
        }
    }
}

impl fmt::Debug for Authorization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Authorization::Bearer(_) => f.write_str("Bearer(<redacted>)"),
            Authorization::Credential(_) => f.write_str("Credential(..)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RequestOptions {
    /// Extra attempts after the first one for transient failures.
    pub retries: u32,
    pub authorization: Option<Authorization>,
    /// Defaults merged under the command's explicit headers.
    pub header: Headers,
    pub backoff_base: Duration,
    pub backoff_multiplier: u32,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            retries: 0,
            authorization: None,
            header: Headers::new(),
            backoff_base: Duration::from_secs(1),
            backoff_multiplier: 2,
        }
    }
}

impl RequestOptions {
    /// Install the process-wide defaults. Only the first call wins; later
    /// calls get their value back.
    pub fn install_defaults(options: RequestOptions) -> Result<(), RequestOptions> {
        PROCESS_DEFAULTS.set(options)
    }

    /// A copy of the process-wide defaults.
    pub fn process_defaults() -> RequestOptions {
        PROCESS_DEFAULTS.get().cloned().unwrap_or_default()
    }

    pub fn from_json(raw: &str) -> Result<Self, CommandError> {
        let config: OptionsConfig =
            serde_json::from_str(raw).map_err(|e| CommandError::Configuration(e.to_string()))?;
        Ok(config.into())
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_authorization(mut self, authorization: Authorization) -> Self {
        self.authorization = Some(authorization);
        self
    }

    pub fn with_bearer(self, token: impl Into<String>) -> Self {
        self.with_authorization(Authorization::Bearer(token.into()))
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.header.set(name, value);
        self
    }

    pub fn with_backoff(mut self, base: Duration, multiplier: u32) -> Self {
        self.backoff_base = base;
        self.backoff_multiplier = multiplier.max(1);
        self
    }
}

/// Serialized form of `RequestOptions`. Credentials are runtime objects and
/// are attached in code, never read from configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptionsConfig {
    #[serde(default)]
    pub retries: u32,
    #[serde(default)]
    pub header: BTreeMap<String, String>,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
}

fn default_backoff_base_ms() -> u64 {
    1000
}

impl From<OptionsConfig> for RequestOptions {
    fn from(config: OptionsConfig) -> Self {
        RequestOptions {
            retries: config.retries,
            header: config.header.into_iter().collect(),
            backoff_base: Duration::from_millis(config.backoff_base_ms),
            ..RequestOptions::default()
        }
    }
}
