//! Build operations: trigger, inspect, stop, delete.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::client::{false_or_contents, true_or_status_code, Jenkins};
use crate::error::{JenkinsError, Result};
use crate::http::{encode_pairs, HttpRequest, Transport};
use crate::job_path::JobPath;
use crate::outcome::Outcome;
use crate::types::{GitBranch, GitInfo, GitLast, RunningBuild};
use crate::unwrap::unwrap_response;
use crate::urls::{self, Params};

static JOB_IN_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/job/([^/]+)").expect("constant regex pattern is valid"));

impl<T: Transport> Jenkins<T> {
    pub fn get_build_info(&self, name: &str, number: u64, depth: u32) -> Result<Outcome<Value>> {
        let url = self.endpoint(urls::BUILD_INFO, &build_params(name, number).with("depth", depth))?;
        let response = self.request(HttpRequest::get(url))?;
        Ok(false_or_contents(&response, 200))
    }

    /// Build parameters from the parameters action. Empty when the build
    /// does not exist or took no parameters.
    pub fn get_build_env_vars(&self, name: &str, number: u64, depth: u32) -> Result<BTreeMap<String, Value>> {
        let Outcome::Ok(info) = self.get_build_info(name, number, depth)? else {
            return Ok(BTreeMap::new());
        };
        let Some(action) = find_action(&info, urls::PARAM_CLASS) else {
            return Ok(BTreeMap::new());
        };
        Ok(action
            .get("parameters")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|param| {
                let key = param.get("name")?.as_str()?.to_string();
                Some((key, param.get("value").cloned().unwrap_or(Value::Null)))
            })
            .collect())
    }

    /// Environment captured by the EnvInject plugin.
    pub fn get_build_injected_env_vars(&self, name: &str, number: u64, depth: u32) -> Result<Outcome<Value>> {
        let url = self.endpoint(urls::BUILD_ENV_VARS, &build_params(name, number).with("depth", depth))?;
        let response = self.request(HttpRequest::get(url))?;
        Ok(false_or_contents(&response, 200))
    }

    /// Git details from the build's git action, `None` for builds without one.
    pub fn get_build_git_info(&self, name: &str, number: u64, depth: u32) -> Result<Option<GitInfo>> {
        let Outcome::Ok(info) = self.get_build_info(name, number, depth)? else {
            return Ok(None);
        };
        Ok(find_action(&info, urls::VCS_GIT).map(git_info))
    }

    pub fn get_build_test_report(&self, name: &str, number: u64, depth: u32) -> Result<Outcome<Value>> {
        let url = self.endpoint(urls::BUILD_TEST_REPORT, &build_params(name, number).with("depth", depth))?;
        let response = self.request(HttpRequest::get(url))?;
        Ok(false_or_contents(&response, 200))
    }

    /// URL that triggers a build: `buildWithParameters` when `parameters`
    /// is non-empty, `build` otherwise, with `token` appended when given.
    pub fn build_job_url(
        &self,
        name: &str,
        parameters: &[(String, String)],
        token: Option<&str>,
    ) -> Result<String> {
        let path = JobPath::parse(name).params();
        let mut query = parameters.to_vec();
        let url = if parameters.is_empty() {
            self.endpoint(urls::BUILD_JOB, &path)?
        } else {
            self.endpoint(urls::BUILD_WITH_PARAMS_JOB, &path)?
        };
        if let Some(token) = token {
            query.push(("token".to_string(), token.to_string()));
        }
        if query.is_empty() {
            return Ok(url);
        }
        Ok(format!("{url}?{}", encode_pairs(&query)))
    }

    /// Trigger a build and return its queue item id, or 0 when the server
    /// did not point at a queue item.
    pub fn build_job(&self, name: &str, parameters: &[(String, String)], token: Option<&str>) -> Result<u64> {
        let url = self.build_job_url(name, parameters, token)?;
        let response = match self.request(HttpRequest::post(url)) {
            Ok(response) => response,
            Err(JenkinsError::Transport(source)) => {
                return Err(JenkinsError::BuildFailed {
                    job: name.to_string(),
                    source,
                })
            }
            Err(e) => return Err(e),
        };
        Ok(response.header("Location").map_or(0, queue_id_from_location))
    }

    pub fn stop_build(&self, name: &str, number: u64) -> Result<Outcome<()>> {
        let url = self.endpoint(urls::STOP_BUILD, &build_params(name, number))?;
        let response = self.request(HttpRequest::post(url))?;
        Ok(true_or_status_code(&response, 200))
    }

    pub fn delete_build(&self, name: &str, number: u64) -> Result<Outcome<()>> {
        let url = self.endpoint(urls::DELETE_BUILD, &build_params(name, number))?;
        let response = self.request(HttpRequest::post(url))?;
        Ok(true_or_status_code(&response, 200))
    }

    /// Builds currently running on any online node. Nodes are queried one
    /// after another.
    pub fn get_running_builds(&self) -> Result<Vec<RunningBuild>> {
        let mut builds = Vec::new();
        for node in self.get_nodes(0)? {
            if node.offline {
                continue;
            }
            let Outcome::Ok(info) = self.get_node_info(&node.name, 2)? else {
                continue;
            };
            let executors = info.get("executors").and_then(Value::as_array);
            for executor in executors.into_iter().flatten() {
                if let Some(build) = running_build(&node.name, executor) {
                    builds.push(build);
                }
            }
        }
        Ok(builds)
    }

    /// Plain-text console log. An empty log means the build does not exist.
    pub fn get_build_console_output(&self, name: &str, number: u64) -> Result<String> {
        let url = self.endpoint(urls::BUILD_CONSOLE_OUTPUT, &build_params(name, number))?;
        let response = self.request(HttpRequest::get(url))?;
        let output = match unwrap_response(&response) {
            Value::String(text) => text,
            Value::Null => String::new(),
            other => other.to_string(),
        };
        if output.is_empty() {
            return Err(JenkinsError::NotFound(format!("job[{name}] number[{number}]")));
        }
        Ok(output)
    }
}

fn build_params(name: &str, number: u64) -> Params {
    JobPath::parse(name).params().with("number", number)
}

fn find_action<'a>(info: &'a Value, class: &str) -> Option<&'a Value> {
    info.get("actions")?
        .as_array()?
        .iter()
        .find(|action| action.get("_class").and_then(Value::as_str) == Some(class))
}

fn git_info(action: &Value) -> GitInfo {
    let branches: Vec<GitBranch> = action
        .pointer("/lastBuiltRevision/branch")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .map(|branch| {
            let sha1 = branch.get("SHA1").and_then(Value::as_str).unwrap_or_default().to_string();
            let name = match branch.get("name").and_then(Value::as_str) {
                Some("detached") | None => sha1.clone(),
                Some(name) => name.to_string(),
            };
            GitBranch { sha1, name }
        })
        .collect();
    let remote_urls: Vec<String> = action
        .get("remoteUrls")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|url| url.as_str().map(str::to_string))
        .collect();
    GitInfo {
        last: GitLast {
            remote_url: remote_urls.first().cloned().unwrap_or_default(),
            branch: branches.first().cloned(),
        },
        remote_urls,
        branches,
    }
}

fn running_build(node: &str, executor: &Value) -> Option<RunningBuild> {
    let executable = executor.get("currentExecutable").filter(|e| !e.is_null())?;
    let class = executable.get("_class").and_then(Value::as_str).unwrap_or_default();
    if class.contains("PlaceholderTask") {
        return None;
    }
    let url = executable.get("url")?.as_str()?;
    let raw = JOB_IN_PATH.captures(url_path(url))?.get(1)?.as_str();
    let name = urlencoding::decode(raw).map_or_else(|_| raw.to_string(), |n| n.into_owned());
    Some(RunningBuild {
        name,
        number: executable.get("number").and_then(Value::as_u64).unwrap_or_default(),
        queue: executable.get("queueId").and_then(Value::as_u64).unwrap_or_default(),
        url: url.to_string(),
        node: node.to_string(),
        executor: executor.get("number").and_then(Value::as_u64).unwrap_or_default(),
    })
}

/// Path component of an absolute or relative URL.
fn url_path(url: &str) -> &str {
    let rest = match url.split_once("://") {
        Some((_, rest)) => rest.find('/').map_or("", |i| &rest[i..]),
        None => url,
    };
    rest.split(['?', '#']).next().unwrap_or_default()
}

/// Last purely numeric segment of a `Location` header.
fn queue_id_from_location(location: &str) -> u64 {
    location
        .trim_end_matches('/')
        .split('/')
        .filter(|part| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()))
        .filter_map(|part| part.parse().ok())
        .last()
        .unwrap_or(0)
}
