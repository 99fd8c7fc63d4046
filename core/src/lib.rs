//! Execution engine for a single outbound API call.
//!
//! # Overview
//! A `Command` describes one logical request (method, URL template, headers,
//! body, query and path parameters). `Command::execute` prepares it once,
//! then drives a caller-supplied `Transport` through two nested retry scopes
//! and classifies each response into either a decoded result or an
//! `ApiError`.
//!
//! # Design
//! - The engine is synchronous and never touches the network; the
//!   `Transport` does the I/O (host-does-IO pattern).
//! - Status handling is a pure function (`classify_status`), so the whole
//!   taxonomy can be tested without a server.
//! - Retry scopes are two instances of `RetryPolicy`, composed rather than
//!   hard-coded in one loop.
//! - Customisation happens through the `Hooks` trait, not by editing the
//!   control flow.

pub mod body;
pub mod classify;
pub mod command;
pub mod error;
pub mod hooks;
pub mod http;
pub mod options;
pub mod retry;
pub mod template;

pub use body::Body;
pub use classify::{classify_status, classify_transport_error};
pub use command::{Command, CommandUrl, RequestParts};
pub use error::{ApiError, CommandError, ErrorDetails};
pub use hooks::{ApiResponse, Hooks, JsonHooks, PassThrough};
pub use http::{Headers, HttpMethod, HttpRequest, HttpResponse, Transport, TransportError};
pub use options::{Authorization, Credential, OptionsConfig, RequestOptions};
pub use retry::{Cancelled, RetryPolicy, Sleep, ThreadSleep};
pub use template::{SimpleTemplate, UrlTemplate};
