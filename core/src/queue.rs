//! Build queue operations.

use serde_json::Value;

use crate::client::{false_or_contents, true_or_status_code, Jenkins};
use crate::error::Result;
use crate::http::{HttpRequest, Transport};
use crate::outcome::Outcome;
use crate::urls::{self, Params};

impl<T: Transport> Jenkins<T> {
    /// A queued item, e.g. the id returned by [`Jenkins::build_job`].
    /// Once the build starts, its `executable` key names the build.
    pub fn get_queue_item(&self, number: u64, depth: u32) -> Result<Outcome<Value>> {
        let params = Params::new().with("number", number).with("depth", depth);
        let response = self.request(HttpRequest::get(self.endpoint(urls::Q_ITEM, &params)?))?;
        Ok(false_or_contents(&response, 200))
    }

    pub fn get_queue_info(&self) -> Result<Outcome<Value>> {
        let response = self.request(HttpRequest::get(self.endpoint(urls::Q_INFO, &Params::new())?))?;
        Ok(false_or_contents(&response, 200))
    }

    /// Cancel a queued build. The server checks the `Referer` header on
    /// this endpoint.
    pub fn cancel_queue(&self, id: u64) -> Result<Outcome<()>> {
        let url = self.endpoint(urls::CANCEL_QUEUE, &Params::new().with("id", id))?;
        let request = HttpRequest::post(url).header("Referer", self.base_url());
        let response = self.request(request)?;
        Ok(true_or_status_code(&response, 200))
    }
}
