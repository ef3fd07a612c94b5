//! In-memory stand-in for a Jenkins controller.
//!
//! # Design
//! - All state lives in one [`Server`] behind a `tokio::sync::RwLock`.
//! - Fixed endpoints (crumb issuer, queue, computers, views, lifecycle) are
//!   axum routes. The nested job hierarchy is parsed by [`jobs::dispatch`]
//!   from the fallback.
//! - A middleware layer rejects requests without Basic credentials and,
//!   while [`Server::require_crumb`] is set, POSTs without the crumb header.
//!   Every response carries an `X-Jenkins` version header.

pub mod jobs;
pub mod state;

use std::sync::Arc;

use axum::{
    extract::{Path, Query, Request, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};

pub use state::Server;
use state::{summaries, Node, BUILT_IN_NODE};

pub const CRUMB_FIELD: &str = "Jenkins-Crumb";
pub const CRUMB_VALUE: &str = "4b8c2f0e9d1a";
pub const VERSION: &str = "2.440.3";

pub type Db = Arc<RwLock<Server>>;

pub fn app() -> Router {
    app_with_state(Db::default())
}

/// Router over caller-owned state, so tests can inspect it.
pub fn app_with_state(db: Db) -> Router {
    Router::new()
        .route("/", get(dashboard))
        .route("/api/json", get(root_info))
        .route("/crumbIssuer/api/json", get(crumb_issuer))
        .route("/me/api/json", get(whoami))
        .route("/pluginManager/api/json", get(plugins))
        .route("/scriptText", post(script_text))
        .route("/queue/api/json", get(queue_info))
        .route("/queue/item/{id}/api/json", get(queue_item))
        .route("/queue/cancelItem", post(cancel_item))
        .route("/computer/api/json", get(node_list))
        .route("/computer/doCreateItem", post(create_node))
        .route("/computer/{name}/api/json", get(node_info))
        .route("/computer/{name}/toggleOffline", post(toggle_offline))
        .route("/computer/{name}/doDelete", post(delete_node))
        .route("/computer/{name}/config.xml", get(node_config).post(reconfig_node))
        .route("/computer/{name}/scriptText", post(node_script_text))
        .route("/createView", post(create_view))
        .route("/view/{name}/api/json", get(view_info))
        .route("/view/{name}/config.xml", get(view_config).post(reconfig_view))
        .route("/view/{name}/doDelete", post(delete_view))
        .route("/quietDown", post(quiet_down))
        .route("/cancelQuietDown", post(cancel_quiet_down))
        .route("/restart", post(going_down))
        .route("/safeRestart", post(going_down))
        .route("/exit", post(exit))
        .route("/safeExit", post(exit))
        .fallback(jobs::dispatch)
        .layer(middleware::from_fn_with_state(db.clone(), guard))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    run_with_state(listener, Db::default()).await
}

pub async fn run_with_state(listener: TcpListener, db: Db) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with_state(db)).await
}

async fn guard(State(db): State<Db>, request: Request, next: Next) -> Response {
    let authorized = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("Basic "));
    if !authorized {
        tracing::debug!(uri = %request.uri(), "rejected: no credentials");
        return (StatusCode::UNAUTHORIZED, "Authentication required").into_response();
    }
    if request.method() == Method::POST && db.read().await.require_crumb {
        let crumb = request.headers().get(CRUMB_FIELD).and_then(|v| v.to_str().ok());
        if crumb != Some(CRUMB_VALUE) {
            tracing::debug!(uri = %request.uri(), "rejected: missing crumb");
            return (StatusCode::FORBIDDEN, "No valid crumb was included in the request")
                .into_response();
        }
    }
    let mut response = next.run(request).await;
    response
        .headers_mut()
        .insert("X-Jenkins", HeaderValue::from_static(VERSION));
    response
}

/// `http://<host>/` from the request's `Host` header.
pub(crate) fn base_url(headers: &HeaderMap) -> String {
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    format!("http://{host}/")
}

/// Decode `a=1&b=x+y` style pairs from a query string or form body.
pub(crate) fn parse_pairs(input: &str) -> Vec<(String, String)> {
    let decode = |s: &str| {
        let s = s.replace('+', " ");
        urlencoding::decode(&s).map_or(s.clone(), |d| d.into_owned())
    };
    input
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (decode(k), decode(v)),
            None => (decode(pair), String::new()),
        })
        .collect()
}

/// Output of a script: the literal arguments of its `print`/`println`
/// lines. Anything else is treated as a statement with no output.
fn run_script(script: &str) -> String {
    script
        .lines()
        .filter_map(|line| {
            let line = line.trim().trim_end_matches(';');
            let (inner, newline) = match line.strip_prefix("println(") {
                Some(inner) => (inner, true),
                None => (line.strip_prefix("print(")?, false),
            };
            let literal = inner.strip_suffix(')')?.trim().strip_prefix('"')?.strip_suffix('"')?;
            Some(if newline { format!("{literal}\n") } else { literal.to_string() })
        })
        .collect()
}

fn script_field(body: &str) -> String {
    parse_pairs(body)
        .into_iter()
        .find(|(k, _)| k == "script")
        .map(|(_, v)| v)
        .unwrap_or_default()
}

fn node_key(name: &str) -> &str {
    if name == "(master)" {
        BUILT_IN_NODE
    } else {
        name
    }
}

pub(crate) fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "Not Found").into_response()
}

async fn dashboard() -> &'static str {
    "Dashboard [Jenkins]"
}

async fn root_info(State(db): State<Db>, headers: HeaderMap) -> Json<Value> {
    let server = db.read().await;
    let base = base_url(&headers);
    let views: Vec<Value> = server
        .views
        .keys()
        .map(|name| json!({"name": name, "url": format!("{base}view/{name}/")}))
        .collect();
    Json(json!({
        "_class": "hudson.model.Hudson",
        "mode": "NORMAL",
        "nodeDescription": "the master Jenkins node",
        "numExecutors": server.nodes.get(BUILT_IN_NODE).map_or(0, |n| n.num_executors),
        "quietingDown": server.quieting_down,
        "useCrumbs": server.require_crumb,
        "url": base,
        "jobs": summaries(&server.jobs, &base, &[]),
        "views": views,
    }))
}

async fn crumb_issuer(State(db): State<Db>) -> Json<Value> {
    db.write().await.crumbs_issued += 1;
    Json(json!({
        "_class": "hudson.security.csrf.DefaultCrumbIssuer",
        "crumb": CRUMB_VALUE,
        "crumbRequestField": CRUMB_FIELD,
    }))
}

async fn whoami(headers: HeaderMap) -> Json<Value> {
    let user = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Basic "))
        .and_then(|encoded| STANDARD.decode(encoded).ok())
        .and_then(|raw| String::from_utf8(raw).ok())
        .and_then(|pair| pair.split_once(':').map(|(user, _)| user.to_string()))
        .unwrap_or_else(|| "anonymous".to_string());
    Json(json!({
        "_class": "hudson.model.User",
        "id": user,
        "fullName": user,
        "absoluteUrl": format!("{}user/{user}", base_url(&headers)),
    }))
}

async fn plugins() -> Json<Value> {
    Json(json!({
        "_class": "hudson.LocalPluginManager",
        "plugins": [
            {"shortName": "git", "longName": "Git plugin", "version": "5.2.1", "active": true, "enabled": true},
            {"shortName": "cloudbees-folder", "longName": "Folders Plugin", "version": "6.858", "active": true, "enabled": true},
        ],
    }))
}

async fn script_text(body: String) -> String {
    run_script(&script_field(&body))
}

async fn node_script_text(
    State(db): State<Db>,
    Path(name): Path<String>,
    body: String,
) -> Response {
    if !db.read().await.nodes.contains_key(node_key(&name)) {
        return not_found();
    }
    run_script(&script_field(&body)).into_response()
}

async fn queue_info(State(db): State<Db>, headers: HeaderMap) -> Json<Value> {
    let server = db.read().await;
    let base = base_url(&headers);
    let items: Vec<Value> = server
        .queue
        .values()
        .filter(|item| item.is_pending())
        .map(|item| item.info(&base))
        .collect();
    Json(json!({"_class": "hudson.model.Queue", "items": items}))
}

async fn queue_item(State(db): State<Db>, Path(id): Path<u64>, headers: HeaderMap) -> Response {
    match db.read().await.queue.get(&id) {
        Some(item) => Json(item.info(&base_url(&headers))).into_response(),
        None => not_found(),
    }
}

#[derive(Deserialize)]
struct CancelQuery {
    id: u64,
}

async fn cancel_item(State(db): State<Db>, Query(query): Query<CancelQuery>) -> StatusCode {
    match db.write().await.queue.get_mut(&query.id) {
        Some(item) if item.is_pending() => {
            item.cancelled = true;
            tracing::info!(queue_id = query.id, "queue item cancelled");
            StatusCode::OK
        }
        _ => StatusCode::NOT_FOUND,
    }
}

async fn node_list(State(db): State<Db>) -> Json<Value> {
    let server = db.read().await;
    let computers: Vec<Value> = server.nodes.iter().map(|(name, node)| node.info(name)).collect();
    let total: u64 = server.nodes.values().map(|n| n.num_executors).sum();
    Json(json!({
        "_class": "hudson.model.ComputerSet",
        "busyExecutors": 0,
        "totalExecutors": total,
        "computer": computers,
    }))
}

async fn create_node(State(db): State<Db>, body: String) -> Response {
    let fields = parse_pairs(&body);
    let get = |key: &str| fields.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str());
    let Some(name) = get("name").filter(|n| !n.is_empty()) else {
        return (StatusCode::BAD_REQUEST, "name required").into_response();
    };
    let launcher: Value = get("json")
        .and_then(|raw| serde_json::from_str(raw).ok())
        .unwrap_or(Value::Null);
    let mut server = db.write().await;
    if server.nodes.contains_key(name) {
        return (StatusCode::BAD_REQUEST, format!("Agent called '{name}' already exists"))
            .into_response();
    }
    let num_executors = launcher["numExecutors"].as_u64().unwrap_or(1);
    let config = format!(
        "<slave><name>{name}</name><description>{}</description><remoteFS>{}</remoteFS><numExecutors>{num_executors}</numExecutors><label>{}</label></slave>",
        launcher["nodeDescription"].as_str().unwrap_or_default(),
        launcher["remoteFS"].as_str().unwrap_or_default(),
        launcher["labelString"].as_str().unwrap_or_default(),
    );
    server.nodes.insert(
        name.to_string(),
        Node {
            offline: false,
            offline_message: String::new(),
            num_executors,
            config,
        },
    );
    tracing::info!(node = name, "node created");
    StatusCode::OK.into_response()
}

async fn node_info(State(db): State<Db>, Path(name): Path<String>) -> Response {
    let key = node_key(&name);
    match db.read().await.nodes.get(key) {
        Some(node) => Json(node.info(key)).into_response(),
        None => not_found(),
    }
}

#[derive(Deserialize)]
struct ToggleQuery {
    #[serde(rename = "offlineMessage", default)]
    offline_message: String,
}

async fn toggle_offline(
    State(db): State<Db>,
    Path(name): Path<String>,
    Query(query): Query<ToggleQuery>,
) -> StatusCode {
    match db.write().await.nodes.get_mut(node_key(&name)) {
        Some(node) => {
            node.offline = !node.offline;
            node.offline_message = if node.offline { query.offline_message } else { String::new() };
            StatusCode::OK
        }
        None => StatusCode::NOT_FOUND,
    }
}

async fn delete_node(State(db): State<Db>, Path(name): Path<String>) -> StatusCode {
    let key = node_key(&name);
    if key == BUILT_IN_NODE {
        return StatusCode::BAD_REQUEST;
    }
    match db.write().await.nodes.remove(key) {
        Some(_) => StatusCode::OK,
        None => StatusCode::NOT_FOUND,
    }
}

async fn node_config(State(db): State<Db>, Path(name): Path<String>) -> Response {
    match db.read().await.nodes.get(node_key(&name)) {
        Some(node) => xml(node.config.clone()),
        None => not_found(),
    }
}

async fn reconfig_node(State(db): State<Db>, Path(name): Path<String>, body: String) -> StatusCode {
    match db.write().await.nodes.get_mut(node_key(&name)) {
        Some(node) => {
            node.config = body;
            StatusCode::OK
        }
        None => StatusCode::NOT_FOUND,
    }
}

#[derive(Deserialize)]
struct NameQuery {
    name: String,
}

async fn create_view(State(db): State<Db>, Query(query): Query<NameQuery>, body: String) -> Response {
    let mut server = db.write().await;
    if server.views.contains_key(&query.name) {
        return (StatusCode::BAD_REQUEST, format!("A view already exists with the name \"{}\"", query.name))
            .into_response();
    }
    server.views.insert(query.name, body);
    StatusCode::OK.into_response()
}

async fn view_info(State(db): State<Db>, Path(name): Path<String>, headers: HeaderMap) -> Response {
    let base = base_url(&headers);
    match db.read().await.view_jobs(&name, &base) {
        Some(jobs) => Json(json!({
            "_class": "hudson.model.ListView",
            "name": name,
            "url": format!("{base}view/{name}/"),
            "jobs": jobs,
        }))
        .into_response(),
        None => not_found(),
    }
}

async fn view_config(State(db): State<Db>, Path(name): Path<String>) -> Response {
    match db.read().await.views.get(&name) {
        Some(config) => xml(config.clone()),
        None => not_found(),
    }
}

async fn reconfig_view(State(db): State<Db>, Path(name): Path<String>, body: String) -> StatusCode {
    match db.write().await.views.get_mut(&name) {
        Some(config) => {
            *config = body;
            StatusCode::OK
        }
        None => StatusCode::NOT_FOUND,
    }
}

async fn delete_view(State(db): State<Db>, Path(name): Path<String>) -> StatusCode {
    if name == "all" {
        return StatusCode::BAD_REQUEST;
    }
    match db.write().await.views.remove(&name) {
        Some(_) => StatusCode::OK,
        None => StatusCode::NOT_FOUND,
    }
}

async fn quiet_down(State(db): State<Db>) -> StatusCode {
    db.write().await.quieting_down = true;
    StatusCode::OK
}

async fn cancel_quiet_down(State(db): State<Db>) -> StatusCode {
    let mut server = db.write().await;
    server.quieting_down = false;
    server.drain_queue();
    StatusCode::OK
}

async fn going_down() -> (StatusCode, &'static str) {
    (StatusCode::SERVICE_UNAVAILABLE, "Jenkins is going to shut down")
}

async fn exit() -> StatusCode {
    StatusCode::OK
}

pub(crate) fn xml(body: String) -> Response {
    ([(header::CONTENT_TYPE, "application/xml")], body).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairs_decode_plus_and_percent() {
        assert_eq!(
            parse_pairs("script=print(%22a+b%22)&empty"),
            vec![
                ("script".to_string(), "print(\"a b\")".to_string()),
                ("empty".to_string(), String::new()),
            ]
        );
        assert!(parse_pairs("").is_empty());
    }

    #[test]
    fn script_prints_literals_only() {
        let script = "Jenkins.instance.doSomething();\nprintln(\"hello\")\nprint(\")]}.\")";
        assert_eq!(run_script(script), "hello\n)]}.");
        assert_eq!(run_script("def x = 1"), "");
    }

    #[test]
    fn built_in_node_alias() {
        assert_eq!(node_key("(master)"), BUILT_IN_NODE);
        assert_eq!(node_key("agent"), "agent");
    }

    #[test]
    fn base_url_uses_host_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(base_url(&headers), "http://localhost/");
        headers.insert(header::HOST, HeaderValue::from_static("127.0.0.1:8080"));
        assert_eq!(base_url(&headers), "http://127.0.0.1:8080/");
    }
}
