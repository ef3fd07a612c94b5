//! Named endpoint templates and placeholder substitution.
//!
//! # Design
//! Every endpoint is an immutable [`Template`] with `{placeholder}` tokens.
//! Resolution is a single pass: substituted values are never re-scanned, so
//! a value containing `{x}` lands in the path verbatim. A placeholder with
//! no supplied value fails fast with
//! [`JenkinsError::MissingPlaceholder`] rather than producing a malformed
//! path.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{JenkinsError, Result};

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([^{}]*)\}").expect("constant regex pattern is valid"));

/// A named endpoint path relative to the server base URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Template {
    pub name: &'static str,
    pub pattern: &'static str,
}

impl Template {
    pub const fn new(name: &'static str, pattern: &'static str) -> Self {
        Self { name, pattern }
    }

    /// Substitute every placeholder from `params`.
    pub fn resolve(&self, params: &Params) -> Result<String> {
        let mut out = String::with_capacity(self.pattern.len());
        let mut last = 0;
        for caps in PLACEHOLDER.captures_iter(self.pattern) {
            let (Some(whole), Some(key)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let key = key.as_str();
            let value = params
                .get(key)
                .ok_or_else(|| JenkinsError::MissingPlaceholder {
                    template: self.name,
                    placeholder: key.to_string(),
                })?;
            out.push_str(&self.pattern[last..whole.start()]);
            out.push_str(value);
            last = whole.end();
        }
        out.push_str(&self.pattern[last..]);
        Ok(out)
    }

    /// Placeholder names in order of appearance.
    pub fn placeholders(&self) -> Vec<&'static str> {
        PLACEHOLDER
            .captures_iter(self.pattern)
            .filter_map(|c| c.get(1).map(|m| m.as_str()))
            .collect()
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.pattern)
    }
}

/// Placeholder values for [`Template::resolve`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(BTreeMap<String, String>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, key: &str, value: impl ToString) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: impl ToString) {
        self.0.insert(key.to_string(), value.to_string());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }
}

pub const LAUNCHER_SSH: &str = "hudson.plugins.sshslaves.SSHLauncher";
pub const LAUNCHER_COMMAND: &str = "hudson.slaves.CommandLauncher";
pub const LAUNCHER_JNLP: &str = "hudson.slaves.JNLPLauncher";
pub const LAUNCHER_WINDOWS_SERVICE: &str = "hudson.os.windows.ManagedWindowsServiceLauncher";
pub const PARAM_CLASS: &str = "hudson.model.ParametersAction";
pub const FOLDER_CLASS: &str = "com.cloudbees.hudson.plugins.folder.Folder";
pub const VCS_GIT: &str = "hudson.plugins.git.util.BuildData";
pub const NODE_TYPE: &str = "hudson.slaves.DumbSlave$DescriptorImpl";
pub const DEFAULT_CONTENT_TYPE: &str = "text/xml; charset=utf-8";
pub const JOBS_QUERY: &str = "?tree=jobs[url,color,name,jobs,fullName]";

pub const INFO: Template = Template::new("info", "{folder_url}api/json");
pub const PLUGIN_INFO: Template = Template::new("plugin_info", "pluginManager/api/json?depth={depth}");
pub const CRUMB_URL: Template = Template::new("crumb_url", "crumbIssuer/api/json");
pub const WHOAMI_URL: Template = Template::new("whoami_url", "me/api/json?depth={depth}");
pub const JOB_INFO: Template =
    Template::new("job_info", "{folder_url}job/{short_name}/api/json?depth={depth}");
pub const JOB_NAME: Template =
    Template::new("job_name", "{folder_url}job/{short_name}/api/json?tree=name");
pub const JOB_POLLING: Template = Template::new("job_polling", "{folder_url}job/{short_name}/polling");
pub const ALL_BUILDS: Template = Template::new(
    "all_builds",
    "{folder_url}job/{short_name}/api/json?tree=allBuilds[number,url]",
);
pub const Q_INFO: Template = Template::new("q_info", "queue/api/json?depth=0");
pub const Q_ITEM: Template = Template::new("q_item", "queue/item/{number}/api/json?depth={depth}");
pub const CANCEL_QUEUE: Template = Template::new("cancel_queue", "queue/cancelItem?id={id}");
pub const CREATE_JOB: Template = Template::new("create_job", "{folder_url}createItem?name={short_name}");
pub const CONFIG_JOB: Template = Template::new("config_job", "{folder_url}job/{short_name}/config.xml");
pub const DELETE_JOB: Template = Template::new("delete_job", "{folder_url}job/{short_name}/doDelete");
pub const ENABLE_JOB: Template = Template::new("enable_job", "{folder_url}job/{short_name}/enable");
pub const DISABLE_JOB: Template = Template::new("disable_job", "{folder_url}job/{short_name}/disable");
pub const SET_JOB_BUILD_NUMBER: Template = Template::new(
    "set_job_build_number",
    "{folder_url}job/{short_name}/nextbuildnumber/submit",
);
pub const COPY_JOB: Template = Template::new(
    "copy_job",
    "{from_folder_url}createItem?name={to_short_name}&mode=copy&from={from_short_name}",
);
pub const RENAME_JOB: Template = Template::new(
    "rename_job",
    "{from_folder_url}job/{from_short_name}/doRename?newName={to_short_name}",
);
pub const BUILD_JOB: Template = Template::new("build_job", "{folder_url}job/{short_name}/build");
pub const STOP_BUILD: Template = Template::new("stop_build", "{folder_url}job/{short_name}/{number}/stop");
pub const BUILD_WITH_PARAMS_JOB: Template = Template::new(
    "build_with_params_job",
    "{folder_url}job/{short_name}/buildWithParameters",
);
pub const BUILD_INFO: Template = Template::new(
    "build_info",
    "{folder_url}job/{short_name}/{number}/api/json?depth={depth}",
);
pub const BUILD_CONSOLE_OUTPUT: Template = Template::new(
    "build_console_output",
    "{folder_url}job/{short_name}/{number}/consoleText",
);
pub const BUILD_ENV_VARS: Template = Template::new(
    "build_env_vars",
    "{folder_url}job/{short_name}/{number}/injectedEnvVars/api/json?depth={depth}",
);
pub const BUILD_TEST_REPORT: Template = Template::new(
    "build_test_report",
    "{folder_url}job/{short_name}/{number}/testReport/api/json?depth={depth}",
);
pub const DELETE_BUILD: Template =
    Template::new("delete_build", "{folder_url}job/{short_name}/{number}/doDelete");
pub const WIPEOUT_JOB_WORKSPACE: Template = Template::new(
    "wipeout_job_workspace",
    "{folder_url}job/{short_name}/doWipeOutWorkspace",
);
pub const NODE_LIST: Template = Template::new("node_list", "computer/api/json?depth={depth}");
pub const CREATE_NODE: Template = Template::new("create_node", "computer/doCreateItem");
pub const DELETE_NODE: Template = Template::new("delete_node", "computer/{name}/doDelete");
pub const NODE_INFO: Template = Template::new("node_info", "computer/{name}/api/json?depth={depth}");
pub const TOGGLE_OFFLINE: Template =
    Template::new("toggle_offline", "computer/{name}/toggleOffline?offlineMessage={msg}");
pub const CONFIG_NODE: Template = Template::new("config_node", "computer/{name}/config.xml");
pub const VIEW_JOBS: Template = Template::new(
    "view_jobs",
    "{folder_url}view/{short_name}/api/json?tree=jobs[url,color,name]",
);
pub const CREATE_VIEW: Template = Template::new("create_view", "{folder_url}createView?name={short_name}");
pub const CONFIG_VIEW: Template = Template::new("config_view", "{folder_url}view/{short_name}/config.xml");
pub const DELETE_VIEW: Template = Template::new("delete_view", "{folder_url}view/{short_name}/doDelete");
pub const SCRIPT_TEXT: Template = Template::new("script_text", "scriptText");
pub const NODE_SCRIPT_TEXT: Template = Template::new("node_script_text", "computer/{node}/scriptText");
pub const PROMOTION_NAME: Template = Template::new(
    "promotion_name",
    "{folder_url}job/{short_name}/promotion/process/{name}/api/json?tree=name",
);
pub const PROMOTION_INFO: Template = Template::new(
    "promotion_info",
    "{folder_url}job/{short_name}/promotion/api/json?depth={depth}",
);
pub const DELETE_PROMOTION: Template = Template::new(
    "delete_promotion",
    "{folder_url}job/{short_name}/promotion/process/{name}/doDelete",
);
pub const CREATE_PROMOTION: Template = Template::new(
    "create_promotion",
    "{folder_url}job/{short_name}/promotion/createProcess?name={name}",
);
pub const CONFIG_PROMOTION: Template = Template::new(
    "config_promotion",
    "{folder_url}job/{short_name}/promotion/process/{name}/config.xml",
);
pub const QUIET_DOWN: Template = Template::new("quiet_down", "quietDown");
pub const RESTART: Template = Template::new("restart", "restart");
pub const SAFE_RESTART: Template = Template::new("safe_restart", "safeRestart");
pub const EXIT: Template = Template::new("exit", "exit");
pub const SAFE_EXIT: Template = Template::new("safe_exit", "safeExit");
pub const CANCEL_QUIET_DOWN: Template = Template::new("cancel_quiet_down", "cancelQuietDown");

/// Every endpoint template, for lookup by name.
pub const TEMPLATES: &[Template] = &[
    INFO, PLUGIN_INFO, CRUMB_URL, WHOAMI_URL, JOB_INFO, JOB_NAME, JOB_POLLING, ALL_BUILDS,
    Q_INFO, Q_ITEM, CANCEL_QUEUE, CREATE_JOB, CONFIG_JOB, DELETE_JOB, ENABLE_JOB, DISABLE_JOB,
    SET_JOB_BUILD_NUMBER, COPY_JOB, RENAME_JOB, BUILD_JOB, STOP_BUILD, BUILD_WITH_PARAMS_JOB,
    BUILD_INFO, BUILD_CONSOLE_OUTPUT, BUILD_ENV_VARS, BUILD_TEST_REPORT, DELETE_BUILD,
    WIPEOUT_JOB_WORKSPACE, NODE_LIST, CREATE_NODE, DELETE_NODE, NODE_INFO, TOGGLE_OFFLINE,
    CONFIG_NODE, VIEW_JOBS, CREATE_VIEW, CONFIG_VIEW, DELETE_VIEW, SCRIPT_TEXT,
    NODE_SCRIPT_TEXT, PROMOTION_NAME, PROMOTION_INFO, DELETE_PROMOTION, CREATE_PROMOTION,
    CONFIG_PROMOTION, QUIET_DOWN, RESTART, SAFE_RESTART, EXIT, SAFE_EXIT, CANCEL_QUIET_DOWN,
];

/// The template registered under `name`.
pub fn lookup(name: &str) -> Option<Template> {
    TEMPLATES.iter().copied().find(|t| t.name == name)
}
