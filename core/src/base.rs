//! Server-level operations: info, plugins, scripts, lifecycle.

use std::collections::BTreeMap;
use std::thread;
use std::time::Duration;

use serde_json::Value;

use crate::client::{true_or_status_code, Jenkins};
use crate::error::{JenkinsError, Result};
use crate::http::{HttpRequest, HttpResponse, Transport};
use crate::job_path::{encode_segment, JobPath};
use crate::outcome::Outcome;
use crate::urls::{self, Params};

/// Printed after every script so truncated output can be detected.
const SCRIPT_SENTINEL: &str = ")]}.";

/// Pause between deploying plugins and asking whether a restart is needed.
const PLUGIN_SETTLE: Duration = Duration::from_secs(2);

impl<T: Transport> Jenkins<T> {
    /// Server (or folder) info. With `item`, return only that key and fail
    /// with `NotFound` if it is absent or null.
    pub fn get_info(&self, item: Option<&str>) -> Result<Value> {
        self.info_at("", "", item)
    }

    /// Info for the folder at `folder_url` (`"job/a/job/b/"` style), with an
    /// optional raw query suffix such as [`urls::JOBS_QUERY`].
    pub(crate) fn info_at(&self, folder_url: &str, query: &str, item: Option<&str>) -> Result<Value> {
        let url = self.endpoint(urls::INFO, &Params::new().with("folder_url", folder_url))?;
        let mut info = self.open(HttpRequest::get(format!("{url}{query}")))?;
        match item {
            None => Ok(info),
            Some(key) => info
                .get_mut(key)
                .map(Value::take)
                .filter(|value| !value.is_null())
                .ok_or_else(|| JenkinsError::NotFound(format!("item[{key}]"))),
        }
    }

    /// The authenticated user, useful to check credentials.
    pub fn get_whoami(&self, depth: u32) -> Result<Value> {
        let url = self.endpoint(urls::WHOAMI_URL, &Params::new().with("depth", depth))?;
        self.open(HttpRequest::get(url))
    }

    /// Server version from the `X-Jenkins` header of the root page.
    pub fn get_version(&self) -> Result<Option<String>> {
        let response = self.request(HttpRequest::get(self.base_url()))?;
        Ok(response.header("X-Jenkins").map(str::to_string))
    }

    /// Installed plugins keyed by short name.
    pub fn get_plugins(&self, depth: u32) -> Result<BTreeMap<String, Value>> {
        let url = self.endpoint(urls::PLUGIN_INFO, &Params::new().with("depth", depth))?;
        let mut response = self.open(HttpRequest::get(url))?;
        let Some(Value::Array(plugins)) = response.get_mut("plugins").map(Value::take) else {
            return Err(JenkinsError::UnexpectedResponse("plugin list has no plugins".to_string()));
        };
        Ok(plugins
            .into_iter()
            .filter_map(|plugin| {
                let short = plugin.get("shortName")?.as_str()?.to_string();
                Some((short, plugin))
            })
            .collect())
    }

    /// Plugin whose long or short name equals `name`.
    pub fn get_plugin_info(&self, name: &str, depth: u32) -> Result<Option<Value>> {
        let plugins = self.get_plugins(depth)?;
        Ok(plugins.into_values().find(|plugin| {
            plugin.get("longName").and_then(Value::as_str) == Some(name)
                || plugin.get("shortName").and_then(Value::as_str) == Some(name)
        }))
    }

    /// Run a groovy script on the controller, or on `node` when given.
    ///
    /// Returns the script output, or `None` when the output did not end
    /// with the sentinel (the run failed or was cut short).
    pub fn run_script(&self, script: &str, node: Option<&str>) -> Result<Option<String>> {
        let url = match node {
            Some(node) => self.endpoint(urls::NODE_SCRIPT_TEXT, &Params::new().with("node", encode_segment(node)))?,
            None => self.endpoint(urls::SCRIPT_TEXT, &Params::new())?,
        };
        let script = format!("{script}\nprint(\"{SCRIPT_SENTINEL}\")");
        let response = self.request(HttpRequest::post(url).form([("script", script)]))?;
        Ok(strip_sentinel(response.body.trim()).map(str::to_string))
    }

    /// Install a plugin through the update center. Returns `true` when no
    /// restart is required to finish the installation.
    pub fn install_plugin(&self, name: &str, include_dependencies: bool) -> Result<bool> {
        let mut install = format!("Jenkins.instance.updateCenter.getPlugin(\"{name}\").deploy();");
        if include_dependencies {
            install = format!(
                "Jenkins.instance.updateCenter.getPlugin(\"{name}\").getNeededDependencies().each{{it.deploy()}};{install}"
            );
        }
        self.run_script(&install, None)?;

        thread::sleep(PLUGIN_SETTLE);

        let restart_required = self.run_script(
            "Jenkins.instance.updateCenter.isRestartRequiredForCompletion();",
            None,
        )?;
        Ok(restart_required.is_some_and(|out| out.is_empty()))
    }

    pub fn wipeout_job_workspace(&self, name: &str) -> Result<Outcome<()>> {
        let url = self.endpoint(urls::WIPEOUT_JOB_WORKSPACE, &JobPath::parse(name).params())?;
        let response = self.request(HttpRequest::post(url))?;
        Ok(true_or_status_code(&response, 200))
    }

    /// Stop scheduling new builds. `true` once the server reports it is
    /// quieting down.
    pub fn quiet_down(&self) -> Result<bool> {
        self.post_lifecycle(urls::QUIET_DOWN)?;
        self.quieting_down()
    }

    /// Leave quiet-down mode. `true` once the server has resumed.
    pub fn cancel_quiet_down(&self) -> Result<bool> {
        self.post_lifecycle(urls::CANCEL_QUIET_DOWN)?;
        Ok(!self.quieting_down()?)
    }

    /// Restart after running builds finish. The server answers 503 while
    /// it goes down.
    pub fn safe_restart(&self) -> Result<Outcome<()>> {
        let response = self.post_lifecycle(urls::SAFE_RESTART)?;
        Ok(true_or_status_code(&response, 503))
    }

    pub fn restart(&self) -> Result<Outcome<()>> {
        let response = self.post_lifecycle(urls::RESTART)?;
        Ok(true_or_status_code(&response, 503))
    }

    /// Shut down after running builds finish.
    pub fn safe_exit(&self) -> Result<Outcome<()>> {
        let response = self.post_lifecycle(urls::SAFE_EXIT)?;
        Ok(true_or_status_code(&response, 200))
    }

    pub fn exit(&self) -> Result<Outcome<()>> {
        let response = self.post_lifecycle(urls::EXIT)?;
        Ok(true_or_status_code(&response, 200))
    }

    fn post_lifecycle(&self, template: urls::Template) -> Result<HttpResponse> {
        let url = self.endpoint(template, &Params::new())?;
        self.request(HttpRequest::post(url))
    }

    fn quieting_down(&self) -> Result<bool> {
        let info = self.get_info(None)?;
        Ok(info.get("quietingDown").and_then(Value::as_bool).unwrap_or(false))
    }
}

fn strip_sentinel(output: &str) -> Option<&str> {
    output.strip_suffix(SCRIPT_SENTINEL)
}
