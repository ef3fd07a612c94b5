//! Agent node operations.

use serde_json::Value;

use crate::client::{false_or_contents, true_or_status_code, Jenkins};
use crate::error::{JenkinsError, Result};
use crate::http::{HttpRequest, Transport};
use crate::job_path::encode_segment;
use crate::outcome::Outcome;
use crate::types::{NodeSpec, NodeSummary};
use crate::urls::{self, Params};

impl<T: Transport> Jenkins<T> {
    /// Every node with its online state.
    pub fn get_nodes(&self, depth: u32) -> Result<Vec<NodeSummary>> {
        let url = self.endpoint(urls::NODE_LIST, &Params::new().with("depth", depth))?;
        let response = self.open(HttpRequest::get(url))?;
        let computers = response
            .get("computer")
            .and_then(Value::as_array)
            .ok_or_else(|| JenkinsError::UnexpectedResponse("node list has no computer entries".to_string()))?;
        Ok(computers
            .iter()
            .map(|node| NodeSummary {
                name: node
                    .get("displayName")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                offline: node.get("offline").and_then(Value::as_bool).unwrap_or(false),
            })
            .collect())
    }

    /// Node info. The built-in node is addressed as `(master)`.
    pub fn get_node_info(&self, name: &str, depth: u32) -> Result<Outcome<Value>> {
        let params = node_params(name).with("depth", depth);
        let response = self.request(HttpRequest::get(self.endpoint(urls::NODE_INFO, &params)?))?;
        Ok(false_or_contents(&response, 200))
    }

    pub fn node_exists(&self, name: &str) -> Result<bool> {
        Ok(self.get_node_info(name, 0)?.is_ok())
    }

    pub fn delete_node(&self, name: &str) -> Result<Outcome<()>> {
        let url = self.endpoint(urls::DELETE_NODE, &node_params(name))?;
        let response = self.request(HttpRequest::post(url))?;
        Ok(true_or_status_code(&response, 200))
    }

    /// Take a node offline with `message`. Already-offline nodes are left
    /// alone and report success.
    pub fn disable_node(&self, name: &str, message: &str) -> Result<Outcome<()>> {
        if self.is_offline(name)? {
            return Ok(Outcome::Ok(()));
        }
        self.toggle_offline(name, message)
    }

    /// Bring a node back online. Already-online nodes report success.
    pub fn enable_node(&self, name: &str) -> Result<Outcome<()>> {
        if !self.is_offline(name)? {
            return Ok(Outcome::Ok(()));
        }
        self.toggle_offline(name, "")
    }

    /// Create a permanent agent. Fails with `AlreadyExists` if the name is
    /// taken.
    pub fn create_node(&self, spec: &NodeSpec) -> Result<Outcome<()>> {
        if self.node_exists(&spec.name)? {
            return Err(JenkinsError::AlreadyExists(format!("node[{}]", spec.name)));
        }
        let config = serde_json::to_string(&spec.launcher_config())?;
        let url = self.endpoint(urls::CREATE_NODE, &Params::new())?;
        let request = HttpRequest::post(url).form([
            ("name", spec.name.as_str()),
            ("type", urls::NODE_TYPE),
            ("json", config.as_str()),
        ]);
        let response = self.request(request)?;
        Ok(true_or_status_code(&response, 200))
    }

    pub fn get_node_config(&self, name: &str) -> Result<Option<String>> {
        let url = self.endpoint(urls::CONFIG_NODE, &node_params(name))?;
        self.get_config(url)
    }

    pub fn reconfig_node(&self, name: &str, config_xml: &str) -> Result<Outcome<()>> {
        let url = self.endpoint(urls::CONFIG_NODE, &node_params(name))?;
        self.post_config(url, config_xml, 200)
    }

    fn is_offline(&self, name: &str) -> Result<bool> {
        let Outcome::Ok(node) = self.get_node_info(name, 0)? else {
            return Err(JenkinsError::NotFound(format!("node[{name}]")));
        };
        Ok(node.get("offline").and_then(Value::as_bool).unwrap_or(false))
    }

    fn toggle_offline(&self, name: &str, message: &str) -> Result<Outcome<()>> {
        let params = node_params(name).with("msg", encode_segment(message));
        let response = self.request(HttpRequest::post(self.endpoint(urls::TOGGLE_OFFLINE, &params)?))?;
        Ok(true_or_status_code(&response, 200))
    }
}

fn node_params(name: &str) -> Params {
    let name = if name == "master" { "(master)" } else { name };
    Params::new().with("name", encode_segment(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::RequestBody;
    use crate::test_helpers::{client, json, text, ScriptedTransport};
    use crate::types::Launcher;
    use serde_json::json;

    #[test]
    fn get_nodes_maps_display_name() {
        let body = json!({"computer": [
            {"displayName": "master", "offline": false},
            {"displayName": "slave", "offline": true}
        ]});
        let jenkins = client(ScriptedTransport::new([json(200, body)]));
        assert_eq!(
            jenkins.get_nodes(0).unwrap(),
            vec![
                NodeSummary { name: "master".to_string(), offline: false },
                NodeSummary { name: "slave".to_string(), offline: true },
            ]
        );
    }

    #[test]
    fn node_info_and_existence() {
        let jenkins = client(ScriptedTransport::new([
            json(200, json!({"displayName": "agent", "offline": false})),
            text(404, "not found"),
        ]));
        assert!(jenkins.node_exists("agent").unwrap());
        assert!(!jenkins.node_exists("gone").unwrap());
    }

    #[test]
    fn master_is_addressed_by_alias() {
        let jenkins = client(ScriptedTransport::new([json(200, json!({}))]));
        jenkins.get_node_info("master", 0).unwrap();
        assert_eq!(
            jenkins.transport().urls(),
            vec!["http://localhost:8080/computer/%28master%29/api/json?depth=0"]
        );
    }

    #[test]
    fn node_names_are_encoded() {
        let jenkins = client(ScriptedTransport::new([json(200, json!({})), text(200, "")]));
        jenkins.get_node_info("build agent #1", 0).unwrap();
        jenkins.delete_node("caf\u{e9}").unwrap();
        assert_eq!(
            jenkins.transport().urls(),
            vec![
                "http://localhost:8080/computer/build%20agent%20%231/api/json?depth=0",
                "http://localhost:8080/computer/caf%C3%A9/doDelete",
            ]
        );
    }

    #[test]
    fn delete_node_reports_status() {
        let jenkins = client(ScriptedTransport::new([text(200, "success"), text(404, "not found")]));
        assert_eq!(jenkins.delete_node("slave").unwrap(), Outcome::Ok(()));
        assert_eq!(jenkins.delete_node("gone").unwrap(), Outcome::NotMatched(404));
    }

    #[test]
    fn disable_missing_node_is_not_found() {
        let jenkins = client(ScriptedTransport::new([text(404, "")]));
        let err = jenkins.disable_node("gone", "").unwrap_err();
        assert!(matches!(err, JenkinsError::NotFound(_)));
    }

    #[test]
    fn disable_offline_node_is_noop() {
        let jenkins = client(ScriptedTransport::new([json(200, json!({"offline": true}))]));
        assert_eq!(jenkins.disable_node("agent", "").unwrap(), Outcome::Ok(()));
        assert_eq!(jenkins.transport().calls(), 1);
    }

    #[test]
    fn disable_online_node_toggles_with_message() {
        let jenkins = client(ScriptedTransport::new([
            json(200, json!({"offline": false})),
            text(200, ""),
        ]));
        assert_eq!(jenkins.disable_node("agent", "disk full").unwrap(), Outcome::Ok(()));
        assert_eq!(
            jenkins.transport().urls()[1],
            "http://localhost:8080/computer/agent/toggleOffline?offlineMessage=disk%20full"
        );
    }

    #[test]
    fn enable_online_node_is_noop() {
        let jenkins = client(ScriptedTransport::new([json(200, json!({"offline": false}))]));
        assert_eq!(jenkins.enable_node("agent").unwrap(), Outcome::Ok(()));
        assert_eq!(jenkins.transport().calls(), 1);
    }

    #[test]
    fn enable_offline_node_toggles() {
        let jenkins = client(ScriptedTransport::new([
            json(200, json!({"offline": true})),
            text(403, ""),
        ]));
        assert_eq!(jenkins.enable_node("agent").unwrap(), Outcome::NotMatched(403));
        assert_eq!(
            jenkins.transport().urls()[1],
            "http://localhost:8080/computer/agent/toggleOffline?offlineMessage="
        );
    }

    #[test]
    fn create_existing_node_fails() {
        let jenkins = client(ScriptedTransport::new([json(200, json!({"offline": false}))]));
        let err = jenkins.create_node(&NodeSpec::new("agent")).unwrap_err();
        assert!(matches!(err, JenkinsError::AlreadyExists(_)));
    }

    #[test]
    fn create_node_sends_json_field() {
        let jenkins = client(ScriptedTransport::new([text(404, ""), text(200, "")]));
        let spec = NodeSpec::new("agent").launcher(Launcher::Jnlp, Default::default());
        assert_eq!(jenkins.create_node(&spec).unwrap(), Outcome::Ok(()));

        let sent = jenkins.transport().requests();
        assert_eq!(sent[1].url, "http://localhost:8080/computer/doCreateItem");
        let RequestBody::Form(fields) = &sent[1].body else {
            panic!("expected form body");
        };
        assert_eq!(fields[0], ("name".to_string(), "agent".to_string()));
        assert_eq!(fields[1], ("type".to_string(), urls::NODE_TYPE.to_string()));
        let payload: Value = serde_json::from_str(&fields[2].1).unwrap();
        assert_eq!(payload["launcher"]["stapler-class"], urls::LAUNCHER_JNLP);
        assert_eq!(payload["numExecutors"], 2);
    }

    #[test]
    fn node_config_shapes() {
        let jenkins = client(ScriptedTransport::new([
            text(200, "<slave/>"),
            text(404, ""),
            text(200, ""),
        ]));
        assert_eq!(jenkins.get_node_config("agent").unwrap().as_deref(), Some("<slave/>"));
        assert_eq!(jenkins.get_node_config("gone").unwrap(), None);
        assert_eq!(jenkins.reconfig_node("agent", "<slave/>").unwrap(), Outcome::Ok(()));
        assert!(matches!(
            &jenkins.transport().requests()[2].body,
            RequestBody::Raw { body, .. } if body == "<slave/>"
        ));
    }
}
