//! Job and folder operations.

use serde_json::Value;

use crate::client::{true_or_status_code, Jenkins};
use crate::error::{JenkinsError, Result};
use crate::http::{HttpRequest, Transport};
use crate::job_path::{encode_segment, folder_url, JobPath};
use crate::outcome::Outcome;
use crate::urls::{self, Params};

impl<T: Transport> Jenkins<T> {
    /// Job info. The server returns at most the latest 100 builds; with
    /// `fetch_all_builds` a second request replaces them with the full list.
    pub fn get_job_info(&self, name: &str, depth: u32, fetch_all_builds: bool) -> Result<Value> {
        let params = JobPath::parse(name).params().with("depth", depth);
        let info = self.open(HttpRequest::get(self.endpoint(urls::JOB_INFO, &params)?))?;
        if fetch_all_builds {
            self.add_missing_builds(info)
        } else {
            Ok(info)
        }
    }

    /// Replace a truncated `builds` list with the job's complete history.
    ///
    /// Nothing is fetched when the oldest loaded build is already the job's
    /// first build.
    pub fn add_missing_builds(&self, mut data: Value) -> Result<Value> {
        let Some(oldest_loaded) = data
            .get("builds")
            .and_then(Value::as_array)
            .and_then(|builds| builds.last())
            .and_then(|build| build.get("number"))
            .and_then(Value::as_u64)
        else {
            return Ok(data);
        };
        let first_build = data
            .get("firstBuild")
            .and_then(|b| b.get("number"))
            .and_then(Value::as_u64)
            .unwrap_or(oldest_loaded);
        if oldest_loaded == first_build {
            return Ok(data);
        }

        let name = data
            .get("fullName")
            .or_else(|| data.get("name"))
            .and_then(Value::as_str)
            .ok_or_else(|| JenkinsError::UnexpectedResponse("job info has no name".to_string()))?
            .to_string();
        let url = self.endpoint(urls::ALL_BUILDS, &JobPath::parse(&name).params())?;
        let mut response = self.open(HttpRequest::get(url))?;
        match response.get_mut("allBuilds").map(Value::take) {
            Some(all) if !all.is_null() => {
                data["builds"] = all;
                Ok(data)
            }
            _ => Err(JenkinsError::UnexpectedResponse(format!(
                "could not fetch all builds from job[{name}]"
            ))),
        }
    }

    /// The job's own name as reported by the server; a cheap existence probe.
    pub fn get_job_name(&self, name: &str) -> Result<Option<String>> {
        let url = self.endpoint(urls::JOB_NAME, &JobPath::parse(name).params())?;
        let response = self.open(HttpRequest::get(url))?;
        Ok(response
            .get("name")
            .and_then(Value::as_str)
            .filter(|n| !n.is_empty())
            .map(str::to_string))
    }

    pub fn job_exists(&self, name: &str) -> Result<bool> {
        let short_name = JobPath::parse(name).short_name;
        Ok(self.get_job_name(name)?.as_deref() == Some(short_name.as_str()))
    }

    /// All non-folder jobs below `base_folder`, descending at most
    /// `folder_depth` levels (`None` or `Some(0)` walks every level,
    /// `Some(1)` stays at the top).
    pub fn get_all_jobs(&self, base_folder: &str, folder_depth: Option<u32>) -> Result<Vec<Value>> {
        let mut jobs = Vec::new();
        self.collect_jobs(base_folder, 1, folder_depth, &mut jobs)?;
        Ok(jobs)
    }

    fn collect_jobs(
        &self,
        folder: &str,
        level: u32,
        max_depth: Option<u32>,
        out: &mut Vec<Value>,
    ) -> Result<()> {
        let listing = self.info_at(&folder_url(folder), urls::JOBS_QUERY, Some("jobs"))?;
        let Value::Array(entries) = listing else {
            return Ok(());
        };
        for job in entries {
            let is_folder = job.get("_class").and_then(Value::as_str) == Some(urls::FOLDER_CLASS);
            if !is_folder {
                out.push(job);
                continue;
            }
            let has_children = job
                .get("jobs")
                .and_then(Value::as_array)
                .is_some_and(|children| !children.is_empty());
            let within_depth = max_depth.filter(|&max| max > 0).map_or(true, |max| level < max);
            if within_depth && has_children {
                if let Some(full_name) = job.get("fullName").and_then(Value::as_str) {
                    self.collect_jobs(full_name, level + 1, max_depth, out)?;
                }
            }
        }
        Ok(())
    }

    pub fn jobs_count(&self) -> Result<usize> {
        Ok(self.get_all_jobs("", None)?.len())
    }

    pub fn copy_job(&self, from_name: &str, to_name: &str) -> Result<Outcome<()>> {
        let url = self.endpoint(urls::COPY_JOB, &from_to_params(from_name, to_name))?;
        let response = self.request(HttpRequest::post(url))?;
        Ok(true_or_status_code(&response, 200))
    }

    /// Rename a job within its folder. Moving between folders is rejected
    /// before any request is made.
    pub fn rename_job(&self, from_name: &str, to_name: &str) -> Result<Outcome<()>> {
        let from = JobPath::parse(from_name);
        let to = JobPath::parse(to_name);
        if from.folder_url != to.folder_url {
            return Err(JenkinsError::InvalidArgument(format!(
                "rename[{from_name} to {to_name}] failed, source and destination folder must be the same"
            )));
        }
        let url = self.endpoint(urls::RENAME_JOB, &from_to_params(from_name, to_name))?;
        let response = self.request(HttpRequest::post(url))?;
        Ok(true_or_status_code(&response, 200))
    }

    pub fn delete_job(&self, name: &str) -> Result<Outcome<()>> {
        self.post_job(urls::DELETE_JOB, name)
    }

    pub fn enable_job(&self, name: &str) -> Result<Outcome<()>> {
        self.post_job(urls::ENABLE_JOB, name)
    }

    pub fn disable_job(&self, name: &str) -> Result<Outcome<()>> {
        self.post_job(urls::DISABLE_JOB, name)
    }

    /// Schedule SCM polling.
    pub fn poll_job(&self, name: &str) -> Result<Outcome<()>> {
        self.post_job(urls::JOB_POLLING, name)
    }

    pub fn set_next_build_number(&self, name: &str, number: u64) -> Result<Outcome<()>> {
        let url = self.endpoint(urls::SET_JOB_BUILD_NUMBER, &JobPath::parse(name).params())?;
        let request = HttpRequest::post(url).form([("nextBuildNumber", number.to_string())]);
        let response = self.request(request)?;
        Ok(true_or_status_code(&response, 200))
    }

    /// Create a job from config XML. Fails with `AlreadyExists` before
    /// uploading anything if the name is taken.
    pub fn create_job(&self, name: &str, config_xml: &str) -> Result<Outcome<()>> {
        if self.job_exists(name)? {
            return Err(JenkinsError::AlreadyExists(format!("job[{name}]")));
        }
        let url = self.endpoint(urls::CREATE_JOB, &JobPath::parse(name).params())?;
        let request = HttpRequest::post(url).raw_body(urls::DEFAULT_CONTENT_TYPE, config_xml);
        let response = self.request(request)?;
        Ok(true_or_status_code(&response, 200))
    }

    /// Create an empty folder. A 404 means the parent folder is missing.
    pub fn create_folder(&self, name: &str) -> Result<Outcome<()>> {
        if self.job_exists(name)? {
            return Err(JenkinsError::AlreadyExists(format!("folder[{name}]")));
        }
        let path = JobPath::parse(name);
        let url = self.endpoint(urls::CREATE_JOB, &path.params())?;
        let request = HttpRequest::post(url).form([
            ("mode", urls::FOLDER_CLASS),
            ("name", path.short_name.as_str()),
            ("from", ""),
            ("Submit", "OK"),
        ]);
        let response = self.request(request)?;
        if response.status == 404 {
            let parent = name.rsplit_once('/').map_or("", |(parent, _)| parent);
            return Err(JenkinsError::NotFound(format!("parent folder[{parent}]")));
        }
        Ok(true_or_status_code(&response, 200))
    }

    /// Raw config XML, or `None` if the job does not exist.
    pub fn get_job_config(&self, name: &str) -> Result<Option<String>> {
        let url = self.endpoint(urls::CONFIG_JOB, &JobPath::parse(name).params())?;
        self.get_config(url)
    }

    pub fn reconfig_job(&self, name: &str, config_xml: &str) -> Result<Outcome<()>> {
        let url = self.endpoint(urls::CONFIG_JOB, &JobPath::parse(name).params())?;
        self.post_config(url, config_xml, 200)
    }

    fn post_job(&self, template: urls::Template, name: &str) -> Result<Outcome<()>> {
        let url = self.endpoint(template, &JobPath::parse(name).params())?;
        let response = self.request(HttpRequest::post(url))?;
        Ok(true_or_status_code(&response, 200))
    }

    /// GET a `config.xml` endpoint; the body verbatim on 200.
    pub(crate) fn get_config(&self, url: String) -> Result<Option<String>> {
        let response = self.request(HttpRequest::get(url))?;
        if response.status != 200 {
            return Ok(None);
        }
        Ok(Some(response.body))
    }

    /// POST XML to a `config.xml`-style endpoint.
    pub(crate) fn post_config(&self, url: String, config_xml: &str, expect: u16) -> Result<Outcome<()>> {
        let request = HttpRequest::post(url).raw_body(urls::DEFAULT_CONTENT_TYPE, config_xml);
        let response = self.request(request)?;
        Ok(true_or_status_code(&response, expect))
    }
}

fn from_to_params(from_name: &str, to_name: &str) -> Params {
    let from = JobPath::parse(from_name);
    let to = JobPath::parse(to_name);
    Params::new()
        .with("from_folder_url", from.folder_url)
        .with("from_short_name", encode_segment(&from.short_name))
        .with("to_folder_url", to.folder_url)
        .with("to_short_name", encode_segment(&to.short_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::RequestBody;
    use crate::test_helpers::{client, json, text, ScriptedTransport};
    use serde_json::json;

    #[test]
    fn get_job_info_resolves_folder_path() {
        let jenkins = client(ScriptedTransport::new([json(200, json!({"name": "c"}))]));
        jenkins.get_job_info("a/b/c", 1, false).unwrap();
        assert_eq!(
            jenkins.transport().urls(),
            vec!["http://localhost:8080/job/a/job/b/job/c/api/json?depth=1"]
        );
    }

    #[test]
    fn complete_build_list_is_returned_as_is() {
        let info = json!({
            "name": "job",
            "builds": [{"number": 3}, {"number": 2}, {"number": 1}],
            "firstBuild": {"number": 1}
        });
        let jenkins = client(ScriptedTransport::new([json(200, info.clone())]));
        assert_eq!(jenkins.get_job_info("job", 0, true).unwrap(), info);
        assert_eq!(jenkins.transport().calls(), 1);
    }

    #[test]
    fn truncated_build_list_is_completed() {
        let info = json!({
            "name": "job",
            "fullName": "folder/job",
            "builds": [{"number": 150}, {"number": 51}],
            "firstBuild": {"number": 1}
        });
        let all = json!({"allBuilds": [{"number": 150}, {"number": 51}, {"number": 1}]});
        let jenkins = client(ScriptedTransport::new([json(200, info), json(200, all)]));

        let result = jenkins.get_job_info("folder/job", 0, true).unwrap();
        assert_eq!(result["builds"].as_array().unwrap().len(), 3);
        assert_eq!(
            jenkins.transport().urls()[1],
            "http://localhost:8080/job/folder/job/job/api/json?tree=allBuilds[number,url]"
        );
    }

    #[test]
    fn missing_all_builds_is_an_error() {
        let info = json!({
            "name": "job",
            "builds": [{"number": 9}],
            "firstBuild": {"number": 1}
        });
        let jenkins = client(ScriptedTransport::new([json(200, info), text(404, "")]));
        let err = jenkins.get_job_info("job", 0, true).unwrap_err();
        assert!(matches!(err, JenkinsError::UnexpectedResponse(_)));
    }

    #[test]
    fn job_exists_compares_short_name() {
        let jenkins = client(ScriptedTransport::new([
            json(200, json!({"name": "c"})),
            text(404, "<html>Not Found</html>"),
        ]));
        assert!(jenkins.job_exists("a/b/c").unwrap());
        assert!(!jenkins.job_exists("a/b/c").unwrap());
        assert_eq!(
            jenkins.transport().urls()[0],
            "http://localhost:8080/job/a/job/b/job/c/api/json?tree=name"
        );
    }

    #[test]
    fn create_job_on_existing_name_fails_before_upload() {
        let jenkins = client(ScriptedTransport::new([json(200, json!({"name": "job"}))]));
        let err = jenkins.create_job("job", "<project/>").unwrap_err();
        assert!(matches!(err, JenkinsError::AlreadyExists(_)));
        assert_eq!(jenkins.transport().calls(), 1);
    }

    #[test]
    fn create_job_uploads_config_xml() {
        let jenkins = client(ScriptedTransport::new([text(404, ""), text(200, "")]));
        assert_eq!(jenkins.create_job("team/job", "<project/>").unwrap(), Outcome::Ok(()));

        let sent = jenkins.transport().requests();
        assert_eq!(sent[1].url, "http://localhost:8080/job/team/createItem?name=job");
        assert_eq!(
            sent[1].body,
            RequestBody::Raw {
                content_type: "text/xml; charset=utf-8".to_string(),
                body: "<project/>".to_string(),
            }
        );
    }

    #[test]
    fn create_folder_posts_folder_descriptor() {
        let jenkins = client(ScriptedTransport::new([text(404, ""), text(200, "")]));
        assert_eq!(jenkins.create_folder("team").unwrap(), Outcome::Ok(()));
        let sent = jenkins.transport().requests();
        let RequestBody::Form(fields) = &sent[1].body else {
            panic!("expected form body");
        };
        assert!(fields.contains(&("mode".to_string(), urls::FOLDER_CLASS.to_string())));
        assert!(fields.contains(&("name".to_string(), "team".to_string())));
    }

    #[test]
    fn create_folder_without_parent_is_not_found() {
        let jenkins = client(ScriptedTransport::new([text(404, ""), text(404, "")]));
        let err = jenkins.create_folder("missing/child").unwrap_err();
        assert!(matches!(err, JenkinsError::NotFound(ref what) if what == "parent folder[missing]"));
    }

    #[test]
    fn rename_across_folders_makes_no_request() {
        let jenkins = client(ScriptedTransport::new([]));
        let err = jenkins.rename_job("a/job", "b/job").unwrap_err();
        assert!(matches!(err, JenkinsError::InvalidArgument(_)));
        assert_eq!(jenkins.transport().calls(), 0);
    }

    #[test]
    fn rename_within_folder() {
        let jenkins = client(ScriptedTransport::new([text(200, "")]));
        assert_eq!(jenkins.rename_job("a/old", "a/new").unwrap(), Outcome::Ok(()));
        assert_eq!(
            jenkins.transport().urls(),
            vec!["http://localhost:8080/job/a/job/old/doRename?newName=new"]
        );
    }

    #[test]
    fn copy_job_builds_copy_url() {
        let jenkins = client(ScriptedTransport::new([text(200, "")]));
        jenkins.copy_job("src", "dst").unwrap();
        assert_eq!(
            jenkins.transport().urls(),
            vec!["http://localhost:8080/createItem?name=dst&mode=copy&from=src"]
        );
    }

    #[test]
    fn names_with_reserved_characters_are_encoded() {
        let jenkins = client(ScriptedTransport::new([
            json(200, json!({"name": "my job"})),
            text(404, ""),
            text(200, ""),
            text(200, ""),
            text(200, ""),
        ]));
        assert!(jenkins.job_exists("team a/my job").unwrap());
        jenkins.create_job("team a/r&d #2", "<project/>").unwrap();
        jenkins.rename_job("team a/my job", "team a/new?").unwrap();
        jenkins.copy_job("team a/my job", "team a/copy job").unwrap();

        assert_eq!(
            jenkins.transport().urls(),
            vec![
                "http://localhost:8080/job/team%20a/job/my%20job/api/json?tree=name",
                "http://localhost:8080/job/team%20a/job/r%26d%20%232/api/json?tree=name",
                "http://localhost:8080/job/team%20a/createItem?name=r%26d%20%232",
                "http://localhost:8080/job/team%20a/job/my%20job/doRename?newName=new%3F",
                "http://localhost:8080/job/team%20a/createItem?name=copy%20job&mode=copy&from=my%20job",
            ]
        );
    }

    #[test]
    fn toggles_report_status_codes() {
        let jenkins = client(ScriptedTransport::new([text(200, ""), text(404, ""), text(200, "")]));
        assert_eq!(jenkins.enable_job("job").unwrap(), Outcome::Ok(()));
        assert_eq!(jenkins.disable_job("job").unwrap(), Outcome::NotMatched(404));
        assert_eq!(jenkins.delete_job("job").unwrap(), Outcome::Ok(()));
        assert_eq!(
            jenkins.transport().urls(),
            vec![
                "http://localhost:8080/job/job/enable",
                "http://localhost:8080/job/job/disable",
                "http://localhost:8080/job/job/doDelete",
            ]
        );
    }

    #[test]
    fn poll_job_hits_polling_endpoint() {
        let jenkins = client(ScriptedTransport::new([text(200, "")]));
        jenkins.poll_job("job").unwrap();
        assert_eq!(jenkins.transport().urls(), vec!["http://localhost:8080/job/job/polling"]);
    }

    #[test]
    fn set_next_build_number_posts_form() {
        let jenkins = client(ScriptedTransport::new([text(200, "")]));
        jenkins.set_next_build_number("job", 42).unwrap();
        let sent = &jenkins.transport().requests()[0];
        assert_eq!(sent.url, "http://localhost:8080/job/job/nextbuildnumber/submit");
        assert_eq!(
            sent.body,
            RequestBody::Form(vec![("nextBuildNumber".to_string(), "42".to_string())])
        );
    }

    #[test]
    fn job_config_roundtrip_shapes() {
        let jenkins = client(ScriptedTransport::new([
            text(200, "<project/>").with_header("Content-Type", "application/xml"),
            text(404, ""),
            text(200, ""),
        ]));
        assert_eq!(jenkins.get_job_config("job").unwrap().as_deref(), Some("<project/>"));
        assert_eq!(jenkins.get_job_config("gone").unwrap(), None);
        assert_eq!(jenkins.reconfig_job("job", "<project/>").unwrap(), Outcome::Ok(()));
    }

    #[test]
    fn get_all_jobs_walks_folders() {
        let top = json!({"jobs": [
            {"_class": "hudson.model.FreeStyleProject", "name": "a", "fullName": "a"},
            {"_class": urls::FOLDER_CLASS, "name": "f", "fullName": "f", "jobs": [{"name": "b"}]},
            {"_class": urls::FOLDER_CLASS, "name": "empty", "fullName": "empty", "jobs": []}
        ]});
        let inner = json!({"jobs": [
            {"_class": "hudson.model.FreeStyleProject", "name": "b", "fullName": "f/b"}
        ]});
        let jenkins = client(ScriptedTransport::new([json(200, top), json(200, inner)]));

        let jobs = jenkins.get_all_jobs("", None).unwrap();
        let names: Vec<&str> = jobs.iter().map(|j| j["fullName"].as_str().unwrap()).collect();
        assert_eq!(names, vec!["a", "f/b"]);
        assert_eq!(
            jenkins.transport().urls(),
            vec![
                "http://localhost:8080/api/json?tree=jobs[url,color,name,jobs,fullName]",
                "http://localhost:8080/job/f/api/json?tree=jobs[url,color,name,jobs,fullName]",
            ]
        );
    }

    #[test]
    fn get_all_jobs_respects_depth() {
        let top = json!({"jobs": [
            {"_class": urls::FOLDER_CLASS, "name": "f", "fullName": "f", "jobs": [{"name": "b"}]}
        ]});
        let jenkins = client(ScriptedTransport::new([json(200, top)]));
        assert!(jenkins.get_all_jobs("", Some(1)).unwrap().is_empty());
        assert_eq!(jenkins.transport().calls(), 1);
    }

    #[test]
    fn zero_folder_depth_walks_every_level() {
        let top = json!({"jobs": [
            {"_class": urls::FOLDER_CLASS, "name": "f", "fullName": "f", "jobs": [{"name": "b"}]}
        ]});
        let inner = json!({"jobs": [
            {"_class": "hudson.model.FreeStyleProject", "name": "b", "fullName": "f/b"}
        ]});
        let jenkins = client(ScriptedTransport::new([json(200, top), json(200, inner)]));
        let jobs = jenkins.get_all_jobs("", Some(0)).unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0]["fullName"], "f/b");
    }
}
