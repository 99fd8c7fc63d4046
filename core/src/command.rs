//! A single outbound API call: request preparation and the retry loop.
//!
//! # Design
//! `Command` is built once per logical call. `prepare` resolves the URL,
//! merges headers and query parameters and decides on form-encoding exactly
//! once; every attempt afterwards reuses that result. Execution nests two
//! `RetryPolicy` scopes around `execute_once`:
//!
//! - the outer scope retries server, rate-limit and transmission errors with
//!   exponential backoff, up to `retries + 1` attempts;
//! - the inner scope retries a 401 once, without delay, after refreshing the
//!   credential, and only on the first outer attempt.
//!
//! The transport is borrowed for the duration of `execute`; the command never
//! performs I/O itself apart from reading its own request body.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, warn};
use url::Url;

use crate::body::Body;
use crate::classify::{classify_status, classify_transport_error};
use crate::error::{ApiError, CommandError, ErrorDetails};
use crate::hooks::{ApiResponse, Hooks, PassThrough};
use crate::http::{Headers, HttpMethod, HttpRequest, Transport};
use crate::options::{Authorization, RequestOptions};
use crate::retry::{RetryPolicy, Sleep, ThreadSleep};
use crate::template::{SimpleTemplate, UrlTemplate};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=UTF-8";

/// Where the request goes, before parameters are applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandUrl {
    Literal(String),
    /// Contains `{name}` placeholders filled from the path parameters.
    Template(String),
}

impl From<&str> for CommandUrl {
    fn from(url: &str) -> Self {
        if url.contains('{') {
            CommandUrl::Template(url.to_string())
        } else {
            CommandUrl::Literal(url.to_string())
        }
    }
}

impl From<String> for CommandUrl {
    fn from(url: String) -> Self {
        CommandUrl::from(url.as_str())
    }
}

/// The mutable description of the request. Hooks may edit it in `prepare`.
#[derive(Debug)]
pub struct RequestParts {
    pub method: HttpMethod,
    pub url: CommandUrl,
    pub header: Headers,
    pub body: Option<Body>,
    pub query: Vec<(String, String)>,
    pub params: BTreeMap<String, String>,
}

pub struct Command<H: Hooks = PassThrough> {
    parts: RequestParts,
    options: RequestOptions,
    hooks: H,
    template: Arc<dyn UrlTemplate>,
    sleeper: Arc<dyn Sleep>,
    resolved_url: Option<String>,
    form_encoded: bool,
}

impl Command<PassThrough> {
    /// A command that returns the raw response body.
    pub fn new(method: HttpMethod, url: impl Into<CommandUrl>) -> Self {
        Command::with_hooks(method, url, PassThrough)
    }
}

impl<H: Hooks> Command<H> {
    /// Options are copied from the process defaults; see
    /// `RequestOptions::install_defaults`.
    pub fn with_hooks(method: HttpMethod, url: impl Into<CommandUrl>, hooks: H) -> Self {
        Self {
            parts: RequestParts {
                method,
                url: url.into(),
                header: Headers::new(),
                body: None,
                query: Vec::new(),
                params: BTreeMap::new(),
            },
            options: RequestOptions::process_defaults(),
            hooks,
            template: Arc::new(SimpleTemplate),
            sleeper: Arc::new(ThreadSleep),
            resolved_url: None,
            form_encoded: false,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.header.append(name, value);
        self
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.query.push((name.into(), value.into()));
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.params.insert(name.into(), value.into());
        self
    }

    pub fn body(mut self, body: impl Into<Body>) -> Self {
        self.parts.body = Some(body.into());
        self
    }

    pub fn options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    pub fn url_template(mut self, template: Arc<dyn UrlTemplate>) -> Self {
        self.template = template;
        self
    }

    pub fn sleeper(mut self, sleeper: Arc<dyn Sleep>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn parts(&self) -> &RequestParts {
        &self.parts
    }

    pub fn request_options(&self) -> &RequestOptions {
        &self.options
    }

    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    pub fn hooks_mut(&mut self) -> &mut H {
        &mut self.hooks
    }

    /// The concrete URL, once `prepare` has run.
    pub fn resolved_url(&self) -> Option<&str> {
        self.resolved_url.as_deref()
    }

    /// Whether `prepare` moved the query into a form-encoded body.
    pub fn is_form_encoded(&self) -> bool {
        self.form_encoded
    }

    /// Resolve URL, headers and body. Only the first call does any work.
    pub fn prepare(&mut self) -> Result<(), CommandError> {
        self.prepared_url().map(|_| ())
    }

    fn prepared_url(&mut self) -> Result<String, CommandError> {
        if let Some(url) = &self.resolved_url {
            return Ok(url.clone());
        }

        self.hooks.prepare(&mut self.parts, &self.options)?;

        let explicit = std::mem::take(&mut self.parts.header);
        let mut header = self.options.header.clone();
        header.update(&explicit);
        self.parts.header = header;

        let expanded = match &self.parts.url {
            CommandUrl::Literal(url) => url.clone(),
            CommandUrl::Template(template) => self.template.expand(template, &self.parts.params)?,
        };
        let mut url = Url::parse(&expanded)
            .map_err(|e| CommandError::Configuration(format!("invalid url {expanded}: {e}")))?;
        let query = merge_query(&url, &self.parts.query);

        let form_encode = matches!(self.parts.method, HttpMethod::Post | HttpMethod::Put)
            && self.parts.body.is_none();
        if form_encode {
            self.parts.body = Some(Body::form(&query)?);
            self.parts.header.set("Content-Type", FORM_CONTENT_TYPE);
            url.set_query(None);
        } else if query.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(&query);
        }
        if self.parts.body.is_none() && self.parts.method == HttpMethod::Patch {
            self.parts.body = Some(Body::Bytes(Vec::new()));
        }

        self.form_encoded = form_encode;
        let url = String::from(url);
        self.resolved_url = Some(url.clone());
        Ok(url)
    }

    /// Run the command, raising any error that survives both retry scopes.
    pub fn execute(
        &mut self,
        transport: &dyn Transport,
    ) -> Result<ApiResponse<H::Output>, CommandError> {
        let mut guard = ReleaseGuard { command: self };
        let result = match guard.command.run(transport) {
            Ok(response) => Ok(guard.command.hooks.on_success(response)),
            Err(error) => Err(guard.command.hooks.on_error(error)),
        };
        drop(guard);
        result
    }

    /// Run the command and hand the outcome to `callback` instead of
    /// returning it.
    pub fn execute_with<F>(&mut self, transport: &dyn Transport, callback: F)
    where
        F: FnOnce(Result<ApiResponse<H::Output>, CommandError>),
    {
        callback(self.execute(transport));
    }

    fn run(&mut self, transport: &dyn Transport) -> Result<ApiResponse<H::Output>, CommandError> {
        let url = self.prepared_url()?;
        let sleeper = Arc::clone(&self.sleeper);
        let outer = RetryPolicy::new(self.options.retries.saturating_add(1), transient)
            .backoff(self.options.backoff_base, self.options.backoff_multiplier);

        outer.run(
            self,
            sleeper.as_ref(),
            |command, attempt| {
                let refreshable = command
                    .options
                    .authorization
                    .as_ref()
                    .is_some_and(Authorization::can_refresh);
                let auth_attempts = if attempt == 1 && refreshable { 2 } else { 1 };
                RetryPolicy::new(auth_attempts, unauthorized).run(
                    command,
                    sleeper.as_ref(),
                    |command, _| command.execute_once(transport, &url),
                    |command, _, _| command.hooks.refresh_authorization(&command.options),
                )
            },
            |_, error, attempt| warn!(attempt, %error, "retrying after transient failure"),
        )
    }

    fn execute_once(
        &mut self,
        transport: &dyn Transport,
        url: &str,
    ) -> Result<ApiResponse<H::Output>, CommandError> {
        let body = match self.parts.body.as_mut() {
            Some(body) => {
                let payload = body.rewind().and_then(|()| body.read_payload()).map_err(|e| {
                    ApiError::Transmission(ErrorDetails::new(format!(
                        "failed to read request body: {e}"
                    )))
                })?;
                Some(payload)
            }
            None => None,
        };
        let request = HttpRequest {
            method: self.parts.method,
            url: url.to_string(),
            headers: self.attempt_headers(),
            body,
            follow_redirects: true,
        };

        debug!(method = %request.method, url = %request.url, "sending request");
        let response = transport.send(&request).map_err(classify_transport_error)?;
        debug!(status = response.status, "received response");

        classify_status(response.status, &response.headers, &response.body)?;
        let content_type = response.content_type().map(str::to_string);
        let body = self.hooks.decode(content_type.as_deref(), response.body)?;
        Ok(ApiResponse {
            status: response.status,
            headers: response.headers,
            body,
        })
    }

    /// Authorization first, then explicit headers on top. The credential
    /// keeps control of the `Authorization` header itself.
    fn attempt_headers(&self) -> Headers {
        let Some(authorization) = &self.options.authorization else {
            return self.parts.header.clone();
        };
        let mut headers = Headers::new();
        authorization.apply(&mut headers);
        let scheme: Vec<String> = headers
            .get_all("authorization")
            .map(str::to_string)
            .collect();
        headers.update(&self.parts.header);
        if !scheme.is_empty() {
            headers.remove("authorization");
            for value in scheme {
                headers.append("Authorization", value);
            }
        }
        headers
    }
}

fn transient(error: &CommandError) -> bool {
    error.is_transient()
}

fn unauthorized(error: &CommandError) -> bool {
    error.is_authorization()
}

/// URL-embedded pairs whose names are not overridden, followed by the
/// explicit pairs in insertion order.
fn merge_query(url: &Url, explicit: &[(String, String)]) -> Vec<(String, String)> {
    let mut merged: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(name, _)| !explicit.iter().any(|(e, _)| e == name))
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .collect();
    merged.extend(explicit.iter().cloned());
    merged
}

/// Calls `Hooks::release` when the execution scope ends, including unwinds.
struct ReleaseGuard<'a, H: Hooks> {
    command: &'a mut Command<H>,
}

impl<H: Hooks> Drop for ReleaseGuard<'_, H> {
    fn drop(&mut self) {
        self.command.hooks.release();
    }
}
