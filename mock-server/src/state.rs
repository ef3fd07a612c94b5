//! In-memory model of the server: job tree, builds, queue, nodes, views.

use std::collections::BTreeMap;

use serde_json::{json, Value};

pub const FREESTYLE_CLASS: &str = "hudson.model.FreeStyleProject";
pub const FOLDER_CLASS: &str = "com.cloudbees.hudson.plugins.folder.Folder";
pub const PARAM_CLASS: &str = "hudson.model.ParametersAction";

/// Name of the built-in node. Its URL segment is `(master)`.
pub const BUILT_IN_NODE: &str = "master";

/// The server returns at most this many entries in a job's `builds`.
const BUILDS_PAGE: usize = 100;

#[derive(Clone, Debug, Default)]
pub struct Job {
    pub config: String,
    pub folder: bool,
    pub disabled: bool,
    pub next_build_number: u64,
    pub polls: u64,
    pub builds: BTreeMap<u64, Build>,
    pub children: BTreeMap<String, Job>,
}

impl Job {
    pub fn new(config: &str) -> Self {
        Self {
            config: config.to_string(),
            disabled: config.contains("<disabled>true</disabled>"),
            next_build_number: 1,
            ..Self::default()
        }
    }

    pub fn folder() -> Self {
        Self {
            config: format!("<{FOLDER_CLASS}/>"),
            folder: true,
            next_build_number: 1,
            ..Self::default()
        }
    }

    /// Run a build to completion and return its number.
    pub fn start_build(&mut self, queue_id: u64, parameters: Vec<(String, String)>) -> u64 {
        let number = self.next_build_number;
        self.next_build_number += 1;
        let mut console = String::from("Started by user jenkins\n");
        for (name, value) in &parameters {
            console.push_str(&format!("{name}={value}\n"));
        }
        console.push_str("Finished: SUCCESS\n");
        self.builds.insert(
            number,
            Build {
                number,
                queue_id,
                result: Some("SUCCESS".to_string()),
                building: false,
                parameters,
                console,
            },
        );
        number
    }

    fn color(&self) -> &'static str {
        if self.disabled {
            return "disabled";
        }
        match self.builds.values().next_back().and_then(|b| b.result.as_deref()) {
            Some("SUCCESS") => "blue",
            Some("ABORTED") => "aborted",
            Some(_) => "red",
            None => "notbuilt",
        }
    }

    /// Entry as shown in a parent's `jobs` list.
    pub fn summary(&self, base: &str, path: &[String]) -> Value {
        let mut entry = json!({
            "_class": if self.folder { FOLDER_CLASS } else { FREESTYLE_CLASS },
            "name": path.last(),
            "fullName": path.join("/"),
            "url": job_url(base, path),
            "color": self.color(),
        });
        if self.folder {
            entry["jobs"] = self.child_summaries(base, path);
        }
        entry
    }

    pub fn child_summaries(&self, base: &str, path: &[String]) -> Value {
        summaries(&self.children, base, path)
    }

    /// Full job document.
    pub fn info(&self, base: &str, path: &[String]) -> Value {
        let url = job_url(base, path);
        let build_ref = |b: &Build| json!({"number": b.number, "url": format!("{url}{}/", b.number)});
        let all: Vec<Value> = self.builds.values().rev().map(build_ref).collect();
        let mut info = self.summary(base, path);
        info["buildable"] = json!(!self.folder && !self.disabled);
        info["nextBuildNumber"] = json!(self.next_build_number);
        info["builds"] = Value::Array(all.iter().take(BUILDS_PAGE).cloned().collect());
        info["allBuilds"] = Value::Array(all);
        info["firstBuild"] = self.builds.values().next().map_or(Value::Null, build_ref);
        info["lastBuild"] = self.builds.values().next_back().map_or(Value::Null, build_ref);
        info
    }
}

#[derive(Clone, Debug)]
pub struct Build {
    pub number: u64,
    pub queue_id: u64,
    pub result: Option<String>,
    pub building: bool,
    pub parameters: Vec<(String, String)>,
    pub console: String,
}

impl Build {
    pub fn info(&self, job_url: &str) -> Value {
        let mut actions = Vec::new();
        if !self.parameters.is_empty() {
            let parameters: Vec<Value> = self
                .parameters
                .iter()
                .map(|(name, value)| json!({"name": name, "value": value}))
                .collect();
            actions.push(json!({"_class": PARAM_CLASS, "parameters": parameters}));
        }
        json!({
            "_class": "hudson.model.FreeStyleBuild",
            "number": self.number,
            "url": format!("{job_url}{}/", self.number),
            "queueId": self.queue_id,
            "result": self.result,
            "building": self.building,
            "actions": actions,
        })
    }
}

#[derive(Clone, Debug)]
pub struct QueueItem {
    pub id: u64,
    pub job: Vec<String>,
    pub parameters: Vec<(String, String)>,
    pub cancelled: bool,
    pub executable: Option<u64>,
}

impl QueueItem {
    pub fn is_pending(&self) -> bool {
        !self.cancelled && self.executable.is_none()
    }

    pub fn info(&self, base: &str) -> Value {
        let url = job_url(base, &self.job);
        json!({
            "_class": if self.is_pending() { "hudson.model.Queue$WaitingItem" } else { "hudson.model.Queue$LeftItem" },
            "id": self.id,
            "task": {"name": self.job.last(), "url": url},
            "cancelled": self.cancelled,
            "why": if self.is_pending() { Some("Jenkins is about to shut down") } else { None },
            "executable": self.executable.map(|n| json!({"number": n, "url": format!("{url}{n}/")})),
        })
    }
}

#[derive(Clone, Debug)]
pub struct Node {
    pub offline: bool,
    pub offline_message: String,
    pub num_executors: u64,
    pub config: String,
}

impl Node {
    pub fn info(&self, name: &str) -> Value {
        let executors: Vec<Value> = (0..self.num_executors)
            .map(|number| json!({"number": number, "idle": true, "currentExecutable": null}))
            .collect();
        json!({
            "_class": if name == BUILT_IN_NODE { "hudson.model.Hudson$MasterComputer" } else { "hudson.slaves.SlaveComputer" },
            "displayName": name,
            "offline": self.offline,
            "temporarilyOffline": self.offline,
            "offlineCauseReason": self.offline_message,
            "numExecutors": self.num_executors,
            "idle": true,
            "executors": executors,
        })
    }
}

/// Whole server state behind the router.
#[derive(Debug)]
pub struct Server {
    pub jobs: BTreeMap<String, Job>,
    pub nodes: BTreeMap<String, Node>,
    pub views: BTreeMap<String, String>,
    pub queue: BTreeMap<u64, QueueItem>,
    pub next_queue_id: u64,
    pub quieting_down: bool,
    /// Reject POSTs that lack the crumb header.
    pub require_crumb: bool,
    /// Number of times the crumb issuer was hit.
    pub crumbs_issued: u64,
}

impl Default for Server {
    fn default() -> Self {
        let built_in = Node {
            offline: false,
            offline_message: String::new(),
            num_executors: 2,
            config: String::new(),
        };
        Self {
            jobs: BTreeMap::new(),
            nodes: BTreeMap::from([(BUILT_IN_NODE.to_string(), built_in)]),
            views: BTreeMap::from([("all".to_string(), "<hudson.model.AllView/>".to_string())]),
            queue: BTreeMap::new(),
            next_queue_id: 1,
            quieting_down: false,
            require_crumb: true,
            crumbs_issued: 0,
        }
    }
}

impl Server {
    /// Children map of the folder at `folders`; the root for an empty path.
    pub fn container(&self, folders: &[String]) -> Option<&BTreeMap<String, Job>> {
        let mut container = &self.jobs;
        for name in folders {
            container = &container.get(name).filter(|job| job.folder)?.children;
        }
        Some(container)
    }

    pub fn container_mut(&mut self, folders: &[String]) -> Option<&mut BTreeMap<String, Job>> {
        let mut container = &mut self.jobs;
        for name in folders {
            let folder = container.get_mut(name).filter(|job| job.folder)?;
            container = &mut folder.children;
        }
        Some(container)
    }

    pub fn job(&self, path: &[String]) -> Option<&Job> {
        let (name, folders) = path.split_last()?;
        self.container(folders)?.get(name)
    }

    pub fn job_mut(&mut self, path: &[String]) -> Option<&mut Job> {
        let (name, folders) = path.split_last()?;
        self.container_mut(folders)?.get_mut(name)
    }

    /// Queue a build. It starts at once unless the server is quieting down.
    pub fn enqueue(&mut self, path: &[String], parameters: Vec<(String, String)>) -> u64 {
        let id = self.next_queue_id;
        self.next_queue_id += 1;
        self.queue.insert(
            id,
            QueueItem {
                id,
                job: path.to_vec(),
                parameters,
                cancelled: false,
                executable: None,
            },
        );
        if !self.quieting_down {
            self.start(id);
        }
        id
    }

    /// Start every pending queue item.
    pub fn drain_queue(&mut self) {
        let pending: Vec<u64> = self
            .queue
            .values()
            .filter(|item| item.is_pending())
            .map(|item| item.id)
            .collect();
        for id in pending {
            self.start(id);
        }
    }

    fn start(&mut self, id: u64) {
        let Some(item) = self.queue.get(&id) else {
            return;
        };
        let (path, parameters) = (item.job.clone(), item.parameters.clone());
        let Some(job) = self.job_mut(&path) else {
            return;
        };
        let number = job.start_build(id, parameters);
        if let Some(item) = self.queue.get_mut(&id) {
            item.executable = Some(number);
        }
    }

    /// Root jobs listed by a view: every job for `all`, otherwise the ones
    /// named in the view's config.
    pub fn view_jobs(&self, view: &str, base: &str) -> Option<Value> {
        let config = self.views.get(view)?;
        let jobs: Vec<Value> = self
            .jobs
            .iter()
            .filter(|(name, _)| view == "all" || config.contains(&format!("<string>{name}</string>")))
            .map(|(name, job)| {
                let path = [name.clone()];
                json!({"name": name, "url": job_url(base, &path), "color": job.color()})
            })
            .collect();
        Some(Value::Array(jobs))
    }
}

pub fn summaries(jobs: &BTreeMap<String, Job>, base: &str, folders: &[String]) -> Value {
    let entries: Vec<Value> = jobs
        .iter()
        .map(|(name, job)| {
            let mut path = folders.to_vec();
            path.push(name.clone());
            job.summary(base, &path)
        })
        .collect();
    Value::Array(entries)
}

/// `http://host/job/a/job/b/` for `["a", "b"]`.
pub fn job_url(base: &str, path: &[String]) -> String {
    let mut url = base.to_string();
    for name in path {
        url.push_str("job/");
        url.push_str(&urlencoding::encode(name));
        url.push('/');
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn nested_lookup_requires_folders() {
        let mut server = Server::default();
        let mut folder = Job::folder();
        folder.children.insert("app".to_string(), Job::new("<project/>"));
        server.jobs.insert("team".to_string(), folder);
        server.jobs.insert("plain".to_string(), Job::new("<project/>"));

        assert!(server.job(&path(&["team", "app"])).is_some());
        assert!(server.job(&path(&["team", "missing"])).is_none());
        assert!(server.container(&path(&["plain"])).is_none());
    }

    #[test]
    fn builds_start_unless_quieting_down() {
        let mut server = Server::default();
        server.jobs.insert("app".to_string(), Job::new("<project/>"));

        let first = server.enqueue(&path(&["app"]), Vec::new());
        assert_eq!(server.queue[&first].executable, Some(1));

        server.quieting_down = true;
        let second = server.enqueue(&path(&["app"]), Vec::new());
        assert!(server.queue[&second].is_pending());

        server.quieting_down = false;
        server.drain_queue();
        assert_eq!(server.queue[&second].executable, Some(2));
    }

    #[test]
    fn job_info_lists_newest_build_first() {
        let mut job = Job::new("<project/>");
        job.start_build(1, Vec::new());
        job.start_build(2, vec![("env".to_string(), "prod".to_string())]);
        let info = job.info("http://h/", &path(&["app"]));
        assert_eq!(info["builds"][0]["number"], 2);
        assert_eq!(info["firstBuild"]["number"], 1);
        assert_eq!(info["color"], "blue");
        assert_eq!(info["url"], "http://h/job/app/");

        let build = job.builds[&2].info("http://h/job/app/");
        assert_eq!(build["actions"][0]["parameters"][0]["value"], "prod");
    }

    #[test]
    fn disabled_config_is_detected() {
        assert!(Job::new("<project><disabled>true</disabled></project>").disabled);
        assert!(!Job::new("<project/>").disabled);
    }
}
