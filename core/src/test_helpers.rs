//! Scripted transport and response builders for unit tests.

use std::collections::VecDeque;

use parking_lot::Mutex;
use serde_json::Value;

use crate::client::Jenkins;
use crate::config::ClientConfig;
use crate::error::TransportError;
use crate::http::{HttpRequest, HttpResponse, Transport};

/// Replays canned responses in order and records every request.
pub(crate) struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub(crate) fn new(responses: impl IntoIterator<Item = HttpResponse>) -> Self {
        Self::with_results(responses.into_iter().map(Ok))
    }

    pub(crate) fn with_results(
        results: impl IntoIterator<Item = Result<HttpResponse, TransportError>>,
    ) -> Self {
        Self {
            responses: Mutex::new(results.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    pub(crate) fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    pub(crate) fn urls(&self) -> Vec<String> {
        self.requests.lock().iter().map(|r| r.url.clone()).collect()
    }
}

impl Transport for ScriptedTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().push(request.clone());
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| panic!("no scripted response left for {}", request.url))
    }
}

pub(crate) fn json(status: u16, body: Value) -> HttpResponse {
    HttpResponse::new(status, body.to_string()).with_header("Content-Type", "application/json")
}

pub(crate) fn text(status: u16, body: &str) -> HttpResponse {
    HttpResponse::new(status, body)
}

pub(crate) fn client(transport: ScriptedTransport) -> Jenkins<ScriptedTransport> {
    let config = ClientConfig::new("http://localhost:8080", "jenkins", "password");
    Jenkins::with_transport(config, transport)
}
