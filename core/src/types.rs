//! Typed values assembled by the client from server responses.
//!
//! Most endpoints hand back the server's JSON untouched as
//! `serde_json::Value`. The types here are the shapes the client builds
//! itself.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::urls;

/// Entry of the node list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSummary {
    pub name: String,
    pub offline: bool,
}

/// A build currently occupying an executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunningBuild {
    pub name: String,
    pub number: u64,
    pub queue: u64,
    pub url: String,
    pub node: String,
    pub executor: u64,
}

/// One branch of the last built git revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitBranch {
    pub sha1: String,
    /// Branch name, or the SHA1 when the checkout was detached.
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitLast {
    pub remote_url: String,
    pub branch: Option<GitBranch>,
}

/// Git checkout details recorded on a build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitInfo {
    pub last: GitLast,
    pub remote_urls: Vec<String>,
    pub branches: Vec<GitBranch>,
}

/// How the server starts the agent process on a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Launcher {
    #[default]
    Command,
    Ssh,
    Jnlp,
    WindowsService,
}

impl Launcher {
    pub fn class_name(&self) -> &'static str {
        match self {
            Launcher::Command => urls::LAUNCHER_COMMAND,
            Launcher::Ssh => urls::LAUNCHER_SSH,
            Launcher::Jnlp => urls::LAUNCHER_JNLP,
            Launcher::WindowsService => urls::LAUNCHER_WINDOWS_SERVICE,
        }
    }
}

/// Parameters for creating a permanent agent node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSpec {
    pub name: String,
    pub num_executors: u32,
    pub description: Option<String>,
    pub remote_fs: String,
    pub labels: Option<String>,
    /// Reserve the node for jobs tied to it.
    pub exclusive: bool,
    pub launcher: Launcher,
    /// Extra launcher fields, e.g. `host`, `port`, `credentialsId` for SSH.
    pub launcher_params: Map<String, Value>,
}

impl NodeSpec {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            num_executors: 2,
            description: None,
            remote_fs: "/var/lib/jenkins".to_string(),
            labels: None,
            exclusive: false,
            launcher: Launcher::default(),
            launcher_params: Map::new(),
        }
    }

    #[must_use]
    pub fn executors(mut self, n: u32) -> Self {
        self.num_executors = n;
        self
    }

    #[must_use]
    pub fn description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    #[must_use]
    pub fn remote_fs(mut self, path: &str) -> Self {
        self.remote_fs = path.to_string();
        self
    }

    #[must_use]
    pub fn labels(mut self, labels: &str) -> Self {
        self.labels = Some(labels.to_string());
        self
    }

    #[must_use]
    pub fn exclusive(mut self, exclusive: bool) -> Self {
        self.exclusive = exclusive;
        self
    }

    #[must_use]
    pub fn launcher(mut self, launcher: Launcher, params: Map<String, Value>) -> Self {
        self.launcher = launcher;
        self.launcher_params = params;
        self
    }

    /// Nested launcher configuration sent as the `json` form field.
    pub fn launcher_config(&self) -> Value {
        let mut launcher = self.launcher_params.clone();
        launcher.insert(
            "stapler-class".to_string(),
            Value::String(self.launcher.class_name().to_string()),
        );
        json!({
            "nodeDescription": self.description,
            "numExecutors": self.num_executors,
            "remoteFS": self.remote_fs,
            "labelString": self.labels,
            "mode": if self.exclusive { "EXCLUSIVE" } else { "NORMAL" },
            "retentionStrategy": {
                "stapler-class": "hudson.slaves.RetentionStrategy$Always"
            },
            "nodeProperties": {"stapler-class-bag": "true"},
            "launcher": launcher,
        })
    }
}
