//! The `Jenkins` facade and its request dispatcher.
//!
//! # Design
//! Every domain operation funnels through [`Jenkins::dispatch`], which
//! attaches the `Authorization` header and, when the client is configured
//! for it, the CSRF crumb. Caller-supplied headers are merged last and win
//! on conflicts. The raw `HttpResponse` is then fed to one of two policy
//! helpers:
//!
//! - [`true_or_status_code`]: `Outcome::Ok(())` on the expected status,
//!   otherwise `Outcome::NotMatched(status)`.
//! - [`false_or_contents`]: the decoded body on the expected status,
//!   otherwise `Outcome::NotMatched(status)`.
//!
//! Domain operations are grouped by resource in sibling modules (`base`,
//! `job`, `build`, `node`, `view`, `promotion`, `queue`), each adding an
//! `impl` block to this type.

use serde_json::Value;

use crate::auth::{basic_authorization, Crumb, CrumbCache};
use crate::config::ClientConfig;
use crate::error::Result;
use crate::http::{HttpRequest, HttpResponse, Transport};
use crate::outcome::Outcome;
use crate::transport::UreqTransport;
use crate::unwrap::unwrap_response;
use crate::urls::{self, Params, Template};

/// Client for one CI server.
#[derive(Debug)]
pub struct Jenkins<T: Transport = UreqTransport> {
    base_url: String,
    config: ClientConfig,
    authorization: String,
    crumb: CrumbCache,
    http: T,
}

impl Jenkins<UreqTransport> {
    /// Build a client that talks to the server over `ureq`.
    pub fn new(config: ClientConfig) -> Self {
        let http = UreqTransport::new(config.timeout(), config.retry);
        Self::with_transport(config, http)
    }
}

impl<T: Transport> Jenkins<T> {
    /// Build a client over a caller-provided transport.
    pub fn with_transport(config: ClientConfig, http: T) -> Self {
        Self {
            base_url: config.normalized_base_url(),
            authorization: basic_authorization(&config.username, &config.password),
            config,
            crumb: CrumbCache::new(),
            http,
        }
    }

    /// Base URL, always ending in a single `/`.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.http
    }

    /// Forget the cached crumb so the next mutating request fetches a new one.
    pub fn reset_crumb(&self) {
        self.crumb.reset();
    }

    /// Absolute URL for `template` resolved with `params`.
    pub fn endpoint(&self, template: Template, params: &Params) -> Result<String> {
        Ok(format!("{}{}", self.base_url, template.resolve(params)?))
    }

    /// Dispatch with authorization and crumb.
    pub fn request(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.dispatch(request, true, true)
    }

    /// Execute `request` after attaching authorization (when `resolve_auth`)
    /// and the crumb (when `add_crumb` and the client enables crumbs).
    ///
    /// Any status code is returned as a response; only a transport failure
    /// with no response becomes an error.
    pub fn dispatch(
        &self,
        mut request: HttpRequest,
        add_crumb: bool,
        resolve_auth: bool,
    ) -> Result<HttpResponse> {
        let mut headers = Vec::new();
        if resolve_auth {
            headers.push(("Authorization".to_string(), self.authorization.clone()));
        }
        if add_crumb && self.config.maybe_add_crumb {
            if let Some(crumb) = self.crumb() {
                headers.push((crumb.field_name, crumb.value));
            }
        }
        request.headers = merge_headers(headers, std::mem::take(&mut request.headers));

        match self.http.execute(&request) {
            Ok(response) => Ok(response),
            Err(e) => {
                tracing::warn!(method = request.method.as_str(), url = %request.url, error = %e, "no response");
                Err(e.into())
            }
        }
    }

    /// Dispatch and decode the body whatever the status code.
    pub fn open(&self, request: HttpRequest) -> Result<Value> {
        let response = self.request(request)?;
        Ok(unwrap_response(&response))
    }

    fn crumb(&self) -> Option<Crumb> {
        self.crumb.get_or_fetch(|| self.fetch_crumb())
    }

    fn fetch_crumb(&self) -> Option<Crumb> {
        let url = self.endpoint(urls::CRUMB_URL, &Params::new()).ok()?;
        let response = match self.dispatch(HttpRequest::get(url), false, true) {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "crumb fetch failed, continuing without crumb");
                return None;
            }
        };
        if !(200..300).contains(&response.status) {
            tracing::warn!(status = response.status, "crumb issuer refused, continuing without crumb");
            return None;
        }
        match serde_json::from_value::<Crumb>(unwrap_response(&response)) {
            Ok(crumb) => {
                tracing::debug!(field = %crumb.field_name, "crumb cached");
                Some(crumb)
            }
            Err(e) => {
                tracing::warn!(error = %e, "malformed crumb, continuing without crumb");
                None
            }
        }
    }
}

/// `Outcome::Ok(())` when `response.status == expect`, else the status.
pub fn true_or_status_code(response: &HttpResponse, expect: u16) -> Outcome<()> {
    if response.status == expect {
        Outcome::Ok(())
    } else {
        Outcome::NotMatched(response.status)
    }
}

/// The decoded body when `response.status == expect`, else the status.
pub fn false_or_contents(response: &HttpResponse, expect: u16) -> Outcome<Value> {
    if response.status == expect {
        Outcome::Ok(unwrap_response(response))
    } else {
        Outcome::NotMatched(response.status)
    }
}

/// Merge header lists; entries in `overrides` replace same-named entries
/// (case-insensitive) in `base`.
fn merge_headers(
    mut base: Vec<(String, String)>,
    overrides: Vec<(String, String)>,
) -> Vec<(String, String)> {
    for (name, value) in overrides {
        match base.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case(&name)) {
            Some(slot) => *slot = (name, value),
            None => base.push((name, value)),
        }
    }
    base
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{JenkinsError, TransportError};
    use crate::test_helpers::{client, json, text, ScriptedTransport};
    use serde_json::json;

    fn crumb_client(transport: ScriptedTransport) -> Jenkins<ScriptedTransport> {
        let config = ClientConfig::new("http://localhost:8080", "jenkins", "password").with_crumb(true);
        Jenkins::with_transport(config, transport)
    }

    fn crumb_response() -> HttpResponse {
        json(200, json!({"crumbRequestField": "Jenkins-Crumb", "crumb": "abc"}))
    }

    #[test]
    fn true_or_status_code_reports_literal_status() {
        assert_eq!(true_or_status_code(&text(200, ""), 200), Outcome::Ok(()));
        assert_eq!(true_or_status_code(&text(404, ""), 200), Outcome::NotMatched(404));
        assert_eq!(true_or_status_code(&text(503, ""), 503), Outcome::Ok(()));
    }

    #[test]
    fn false_or_contents_decodes_on_match() {
        let resp = json(200, json!({"name": "job"}));
        assert_eq!(false_or_contents(&resp, 200), Outcome::Ok(json!({"name": "job"})));
        assert_eq!(false_or_contents(&text(500, "boom"), 200), Outcome::NotMatched(500));
    }

    #[test]
    fn dispatch_adds_authorization() {
        let jenkins = client(ScriptedTransport::new([text(200, "")]));
        let url = jenkins.endpoint(urls::QUIET_DOWN, &Params::new()).unwrap();
        jenkins.request(HttpRequest::post(url)).unwrap();

        let sent = jenkins.transport().requests();
        assert_eq!(sent[0].url, "http://localhost:8080/quietDown");
        assert_eq!(sent[0].header_value("authorization"), Some("Basic amVua2luczpwYXNzd29yZA=="));
    }

    #[test]
    fn dispatch_without_auth_sends_no_authorization() {
        let jenkins = client(ScriptedTransport::new([text(200, "")]));
        jenkins.dispatch(HttpRequest::get("http://localhost:8080/"), true, false).unwrap();
        assert_eq!(jenkins.transport().requests()[0].header_value("Authorization"), None);
    }

    #[test]
    fn caller_headers_win_on_conflict() {
        let jenkins = client(ScriptedTransport::new([text(200, "")]));
        let req = HttpRequest::get("http://localhost:8080/").header("authorization", "Bearer t");
        jenkins.request(req).unwrap();
        let sent = &jenkins.transport().requests()[0];
        assert_eq!(sent.headers, vec![("authorization".to_string(), "Bearer t".to_string())]);
    }

    #[test]
    fn crumb_disabled_by_config_is_never_fetched() {
        let jenkins = client(ScriptedTransport::new([text(200, "")]));
        jenkins.request(HttpRequest::post("http://localhost:8080/quietDown")).unwrap();
        assert_eq!(jenkins.transport().calls(), 1);
    }

    #[test]
    fn crumb_is_fetched_once_across_requests() {
        let transport = ScriptedTransport::new([
            crumb_response(),
            text(200, ""),
            text(200, ""),
            text(200, ""),
        ]);
        let jenkins = crumb_client(transport);
        for _ in 0..3 {
            jenkins.request(HttpRequest::post("http://localhost:8080/quietDown")).unwrap();
        }

        let sent = jenkins.transport().requests();
        assert_eq!(sent.len(), 4);
        assert_eq!(sent[0].url, "http://localhost:8080/crumbIssuer/api/json");
        assert_eq!(sent[0].header_value("Jenkins-Crumb"), None);
        for req in &sent[1..] {
            assert_eq!(req.header_value("Jenkins-Crumb"), Some("abc"));
        }
    }

    #[test]
    fn crumb_fetch_failure_is_silent_and_final() {
        let transport = ScriptedTransport::new([text(404, "no crumb issuer"), text(200, ""), text(200, "")]);
        let jenkins = crumb_client(transport);
        jenkins.request(HttpRequest::post("http://localhost:8080/a")).unwrap();
        jenkins.request(HttpRequest::post("http://localhost:8080/b")).unwrap();

        let sent = jenkins.transport().requests();
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[2].headers.len(), 1);
    }

    #[test]
    fn crumb_transport_failure_is_swallowed() {
        let transport = ScriptedTransport::with_results([
            Err(TransportError::Connection {
                url: "http://localhost:8080/crumbIssuer/api/json".to_string(),
                message: "refused".to_string(),
            }),
            Ok(text(200, "")),
        ]);
        let jenkins = crumb_client(transport);
        let resp = jenkins.request(HttpRequest::post("http://localhost:8080/a")).unwrap();
        assert_eq!(resp.status, 200);
    }

    #[test]
    fn suppressed_crumb_skips_fetch() {
        let jenkins = crumb_client(ScriptedTransport::new([text(200, "")]));
        jenkins.dispatch(HttpRequest::get("http://localhost:8080/"), false, true).unwrap();
        assert_eq!(jenkins.transport().calls(), 1);
    }

    #[test]
    fn reset_crumb_refetches() {
        let transport = ScriptedTransport::new([
            crumb_response(),
            text(200, ""),
            crumb_response(),
            text(200, ""),
        ]);
        let jenkins = crumb_client(transport);
        jenkins.request(HttpRequest::post("http://localhost:8080/a")).unwrap();
        jenkins.reset_crumb();
        jenkins.request(HttpRequest::post("http://localhost:8080/b")).unwrap();
        assert_eq!(jenkins.transport().calls(), 4);
    }

    #[test]
    fn transport_failure_propagates() {
        let transport = ScriptedTransport::with_results([Err(TransportError::Connection {
            url: "http://localhost:8080/".to_string(),
            message: "refused".to_string(),
        })]);
        let jenkins = client(transport);
        let err = jenkins.request(HttpRequest::get("http://localhost:8080/")).unwrap_err();
        assert!(matches!(err, JenkinsError::Transport(TransportError::Connection { .. })));
    }

    #[test]
    fn non_2xx_is_a_response_not_an_error() {
        let jenkins = client(ScriptedTransport::new([text(500, "oops")]));
        let resp = jenkins.request(HttpRequest::get("http://localhost:8080/")).unwrap();
        assert_eq!(resp.status, 500);
    }

    #[test]
    fn merge_headers_replaces_case_insensitively() {
        let merged = merge_headers(
            vec![("Authorization".into(), "a".into()), ("Jenkins-Crumb".into(), "c".into())],
            vec![("jenkins-crumb".into(), "d".into()), ("Referer".into(), "r".into())],
        );
        assert_eq!(
            merged,
            vec![
                ("Authorization".to_string(), "a".to_string()),
                ("jenkins-crumb".to_string(), "d".to_string()),
                ("Referer".to_string(), "r".to_string()),
            ]
        );
    }
}
