//! Synchronous REST client for a Jenkins CI server.
//!
//! # Overview
//! Maps the server's JSON and XML endpoints to typed operations on jobs,
//! builds, nodes, views, promotions, the build queue and server lifecycle.
//! Every operation resolves a named URL template, goes through one
//! dispatcher and applies a status-code policy to the response.
//!
//! # Design
//! - `Jenkins<T>` owns the base URL, credentials, the CSRF crumb cache and a
//!   [`Transport`]. The default transport is [`UreqTransport`]; tests inject
//!   their own.
//! - Requests and responses are plain data (`HttpRequest`/`HttpResponse`),
//!   so the I/O boundary stays one trait call wide.
//! - Non-matching status codes are answers, not errors: they come back as
//!   [`Outcome::NotMatched`]. `Err` is reserved for missing items, conflicts
//!   and transport failures.
//! - Response bodies are decoded into `serde_json::Value` whatever their
//!   format. XML is folded into the same shape.

pub mod auth;
pub mod base;
pub mod build;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod job;
pub mod job_path;
pub mod node;
pub mod outcome;
pub mod promotion;
pub mod queue;
pub mod transport;
pub mod types;
pub mod unwrap;
pub mod urls;
pub mod view;

#[cfg(test)]
mod test_helpers;

pub use auth::Crumb;
pub use client::{false_or_contents, true_or_status_code, Jenkins};
pub use config::{ClientConfig, RetryPolicy};
pub use error::{JenkinsError, Result, TransportError};
pub use http::{HttpMethod, HttpRequest, HttpResponse, RequestBody, Transport};
pub use job_path::JobPath;
pub use outcome::Outcome;
pub use transport::UreqTransport;
pub use types::{GitBranch, GitInfo, GitLast, Launcher, NodeSpec, NodeSummary, RunningBuild};
pub use unwrap::unwrap_response;
