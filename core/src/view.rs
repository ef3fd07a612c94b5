//! View operations. View names accept the same `folder/name` form as jobs.

use serde_json::Value;

use crate::client::{false_or_contents, true_or_status_code, Jenkins};
use crate::error::{JenkinsError, Result};
use crate::http::{HttpRequest, Transport};
use crate::job_path::JobPath;
use crate::outcome::Outcome;
use crate::urls;

impl<T: Transport> Jenkins<T> {
    /// Views listed on the server root, each with `name` and `url`.
    pub fn get_views(&self) -> Result<Value> {
        self.get_info(Some("views"))
    }

    /// Jobs shown in a view, each with `name`, `url` and `color`.
    pub fn get_view_jobs(&self, name: &str) -> Result<Vec<Value>> {
        let url = self.endpoint(urls::VIEW_JOBS, &JobPath::parse(name).params())?;
        let response = self.request(HttpRequest::get(url))?;
        let Outcome::Ok(mut data) = false_or_contents(&response, 200) else {
            return Err(JenkinsError::NotFound(format!("view[{name}]")));
        };
        match data.get_mut("jobs").map(Value::take) {
            Some(Value::Array(jobs)) => Ok(jobs),
            Some(Value::Null) | None => Ok(Vec::new()),
            Some(other) => Err(JenkinsError::UnexpectedResponse(format!(
                "view[{name}] jobs is not a list: {other}"
            ))),
        }
    }

    pub fn delete_view(&self, name: &str) -> Result<Outcome<()>> {
        let url = self.endpoint(urls::DELETE_VIEW, &JobPath::parse(name).params())?;
        let response = self.request(HttpRequest::post(url))?;
        Ok(true_or_status_code(&response, 200))
    }

    /// Create a view from its XML. The server answers 400 for a taken name.
    pub fn create_view(&self, name: &str, config_xml: &str) -> Result<Outcome<()>> {
        let url = self.endpoint(urls::CREATE_VIEW, &JobPath::parse(name).params())?;
        let outcome = self.post_config(url, config_xml, 200)?;
        if outcome.status() == Some(400) {
            return Err(JenkinsError::AlreadyExists(format!("view[{name}]")));
        }
        Ok(outcome)
    }

    pub fn reconfig_view(&self, name: &str, config_xml: &str) -> Result<Outcome<()>> {
        let url = self.endpoint(urls::CONFIG_VIEW, &JobPath::parse(name).params())?;
        self.post_config(url, config_xml, 200)
    }

    pub fn get_view_config(&self, name: &str) -> Result<Option<String>> {
        let url = self.endpoint(urls::CONFIG_VIEW, &JobPath::parse(name).params())?;
        self.get_config(url)
    }
}
