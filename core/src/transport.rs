//! [`Transport`] backed by a blocking `ureq` agent.
//!
//! The agent is configured with `http_status_as_error(false)` so 4xx/5xx
//! responses come back as data and the client decides what they mean.

use std::thread;
use std::time::{Duration, Instant};

use ureq::Agent;

use crate::config::RetryPolicy;
use crate::error::TransportError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse, RequestBody, Transport};

/// Blocking HTTP transport.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: Agent,
    retry: Option<RetryPolicy>,
}

impl UreqTransport {
    /// `timeout` bounds each attempt; `None` waits indefinitely.
    pub fn new(timeout: Option<Duration>, retry: Option<RetryPolicy>) -> Self {
        let agent = Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(timeout)
            .build()
            .new_agent();
        Self { agent, retry }
    }

    fn send_once(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let url = request.full_url();
        let connection = |e: ureq::Error| TransportError::Connection {
            url: url.clone(),
            message: e.to_string(),
        };

        let result = match request.method {
            HttpMethod::Get => {
                let mut builder = self.agent.get(&url);
                for (name, value) in &request.headers {
                    builder = builder.header(name.as_str(), value.as_str());
                }
                builder.call()
            }
            HttpMethod::Post => {
                let mut builder = self.agent.post(&url);
                for (name, value) in &request.headers {
                    builder = builder.header(name.as_str(), value.as_str());
                }
                match &request.body {
                    RequestBody::Empty => builder.send_empty(),
                    RequestBody::Form(fields) => builder
                        .send_form(fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))),
                    RequestBody::Raw { content_type, body } => {
                        builder.content_type(content_type.as_str()).send(body.as_bytes())
                    }
                    RequestBody::Json(value) => builder.send_json(value),
                }
            }
        };
        let mut response = result.map_err(connection)?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response
            .body_mut()
            .with_config()
            .limit(u64::MAX)
            .read_to_string()
            .map_err(|e| TransportError::Body {
                url: url.clone(),
                message: e.to_string(),
            })?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

impl Transport for UreqTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut attempt = 0;
        loop {
            let started = Instant::now();
            let response = self.send_once(request)?;
            let elapsed_ms = started.elapsed().as_millis() as u64;
            tracing::debug!(
                method = request.method.as_str(),
                url = %request.url,
                status = response.status,
                elapsed_ms,
                "request completed"
            );

            match self.retry {
                Some(policy) if response.status >= 500 && attempt < policy.times => {
                    attempt += 1;
                    tracing::warn!(
                        url = %request.url,
                        status = response.status,
                        attempt,
                        "server error, retrying"
                    );
                    thread::sleep(policy.delay());
                }
                _ => return Ok(response),
            }
        }
    }
}
