//! Promotion process operations, addressed by process name within a job.

use serde_json::Value;

use crate::client::{false_or_contents, true_or_status_code, Jenkins};
use crate::error::{JenkinsError, Result};
use crate::http::{HttpRequest, Transport};
use crate::job_path::{encode_segment, JobPath};
use crate::outcome::Outcome;
use crate::urls::{self, Params};

impl<T: Transport> Jenkins<T> {
    pub fn get_promotion_info(&self, job: &str, depth: u32) -> Result<Outcome<Value>> {
        let params = JobPath::parse(job).params().with("depth", depth);
        let response = self.request(HttpRequest::get(self.endpoint(urls::PROMOTION_INFO, &params)?))?;
        Ok(false_or_contents(&response, 200))
    }

    /// The job's promotion processes, or `None` when the job has no
    /// promotion support.
    pub fn get_promotions(&self, job: &str) -> Result<Option<Vec<Value>>> {
        let Outcome::Ok(mut info) = self.get_promotion_info(job, 0)? else {
            return Ok(None);
        };
        match info.get_mut("processes").map(Value::take) {
            Some(Value::Array(processes)) => Ok(Some(processes)),
            _ => Ok(None),
        }
    }

    pub fn promotion_exists(&self, name: &str, job: &str) -> Result<bool> {
        let url = self.endpoint(urls::PROMOTION_NAME, &promotion_params(name, job))?;
        let response = self.request(HttpRequest::get(url))?;
        let Outcome::Ok(data) = false_or_contents(&response, 200) else {
            return Ok(false);
        };
        Ok(data.get("name").and_then(Value::as_str) == Some(name))
    }

    pub fn delete_promotion(&self, name: &str, job: &str) -> Result<Outcome<()>> {
        let url = self.endpoint(urls::DELETE_PROMOTION, &promotion_params(name, job))?;
        let response = self.request(HttpRequest::post(url))?;
        Ok(true_or_status_code(&response, 200))
    }

    /// Create a promotion process. The server answers 400 for a taken name.
    pub fn create_promotion(&self, name: &str, job: &str, config_xml: &str) -> Result<Outcome<()>> {
        let url = self.endpoint(urls::CREATE_PROMOTION, &promotion_params(name, job))?;
        let outcome = self.post_config(url, config_xml, 200)?;
        if outcome.status() == Some(400) {
            return Err(JenkinsError::AlreadyExists(format!(
                "promotion[{name}] at job[{job}]"
            )));
        }
        Ok(outcome)
    }

    pub fn reconfig_promotion(&self, name: &str, job: &str, config_xml: &str) -> Result<Outcome<()>> {
        let url = self.endpoint(urls::CONFIG_PROMOTION, &promotion_params(name, job))?;
        self.post_config(url, config_xml, 200)
    }

    pub fn get_promotion_config(&self, name: &str, job: &str) -> Result<Option<String>> {
        let url = self.endpoint(urls::CONFIG_PROMOTION, &promotion_params(name, job))?;
        self.get_config(url)
    }
}

fn promotion_params(name: &str, job: &str) -> Params {
    JobPath::parse(job).params().with("name", encode_segment(name))
}
