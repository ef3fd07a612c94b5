//! Handler for everything under the nested `job/<name>/` hierarchy.
//!
//! Job paths nest to arbitrary depth (`/job/a/job/b/config.xml`), so they
//! are routed by hand from the router's fallback instead of by pattern.

use axum::{
    extract::State,
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};

use crate::state::{job_url, Job, Server, FOLDER_CLASS};
use crate::{base_url, not_found, parse_pairs, xml, Db};

pub async fn dispatch(
    State(db): State<Db>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> Response {
    let segments: Vec<String> = uri
        .path()
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| urlencoding::decode(s).map_or_else(|_| s.to_string(), |d| d.into_owned()))
        .collect();
    let mut path = Vec::new();
    let mut i = 0;
    while i + 1 < segments.len() && segments[i] == "job" {
        path.push(segments[i + 1].clone());
        i += 2;
    }
    let rest: Vec<&str> = segments[i..].iter().map(String::as_str).collect();
    let query = uri.query().map(parse_pairs).unwrap_or_default();
    let base = base_url(&headers);
    tracing::debug!(%method, job = %path.join("/"), action = %rest.join("/"), "job request");

    let mut server = db.write().await;
    let server = &mut *server;
    match (method.as_str(), rest.as_slice()) {
        ("GET", ["api", "json"]) => match server.job(&path) {
            Some(job) => Json(job.info(&base, &path)).into_response(),
            None => not_found(),
        },
        ("POST", ["createItem"]) => create_item(server, &path, query, &headers, &body),
        ("GET", ["config.xml"]) => match server.job(&path) {
            Some(job) => xml(job.config.clone()),
            None => not_found(),
        },
        ("POST", ["config.xml"]) => update_job(server, &path, |job| {
            job.disabled = body.contains("<disabled>true</disabled>");
            job.config = body.clone();
        }),
        ("POST", ["doDelete"]) => {
            let removed = path
                .split_last()
                .and_then(|(name, folders)| server.container_mut(folders)?.remove(name));
            status(removed.is_some())
        }
        ("POST", ["enable"]) => update_job(server, &path, |job| job.disabled = false),
        ("POST", ["disable"]) => update_job(server, &path, |job| job.disabled = true),
        ("POST", ["polling"]) => update_job(server, &path, |job| job.polls += 1),
        ("POST", ["doWipeOutWorkspace"]) => update_job(server, &path, |_| {}),
        ("POST", ["doRename"]) => rename(server, &path, &query),
        ("POST", ["nextbuildnumber", "submit"]) => {
            let fields = parse_pairs(&body);
            let Some(number) = field(&fields, "nextBuildNumber").and_then(|n| n.parse().ok()) else {
                return (StatusCode::BAD_REQUEST, "nextBuildNumber required").into_response();
            };
            update_job(server, &path, |job| job.next_build_number = number)
        }
        ("POST", ["build"]) | ("POST", ["buildWithParameters"]) => build(server, &path, query, &base),
        ("GET", [number, "api", "json"]) => match find_build(server, &path, number) {
            Some(build) => Json(build.info(&job_url(&base, &path))).into_response(),
            None => not_found(),
        },
        ("GET", [number, "consoleText"]) => match find_build(server, &path, number) {
            Some(build) => build.console.clone().into_response(),
            None => not_found(),
        },
        ("POST", [number, "stop"]) => {
            let Ok(number) = number.parse::<u64>() else {
                return not_found();
            };
            let Some(build) = server.job_mut(&path).and_then(|job| job.builds.get_mut(&number)) else {
                return not_found();
            };
            if build.building {
                build.building = false;
                build.result = Some("ABORTED".to_string());
            }
            StatusCode::OK.into_response()
        }
        ("POST", [number, "doDelete"]) => {
            let Ok(number) = number.parse::<u64>() else {
                return not_found();
            };
            status(server.job_mut(&path).and_then(|job| job.builds.remove(&number)).is_some())
        }
        _ => not_found(),
    }
}

/// `createItem` covers XML job creation, folder creation and copying.
fn create_item(
    server: &mut Server,
    folders: &[String],
    query: Vec<(String, String)>,
    headers: &HeaderMap,
    body: &str,
) -> Response {
    let is_form = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/x-www-form-urlencoded"));
    let mut fields = query;
    if is_form {
        fields.extend(parse_pairs(body));
    }
    let Some(container) = server.container_mut(folders) else {
        return not_found();
    };
    let Some(name) = field(&fields, "name").filter(|n| !n.is_empty()) else {
        return (StatusCode::BAD_REQUEST, "name required").into_response();
    };
    if container.contains_key(name) {
        return (StatusCode::BAD_REQUEST, format!("A job already exists with the name '{name}'"))
            .into_response();
    }
    let job = match field(&fields, "mode") {
        Some("copy") => {
            let source = field(&fields, "from").and_then(|from| container.get(from));
            let Some(source) = source else {
                return not_found();
            };
            let mut copy = source.clone();
            copy.builds.clear();
            copy.next_build_number = 1;
            copy
        }
        Some(FOLDER_CLASS) => Job::folder(),
        _ => Job::new(body),
    };
    tracing::info!(item = %name, folder = job.folder, "item created");
    container.insert(name.to_string(), job);
    StatusCode::OK.into_response()
}

fn rename(server: &mut Server, path: &[String], query: &[(String, String)]) -> Response {
    let Some((from, folders)) = path.split_last() else {
        return not_found();
    };
    let Some(to) = field(query, "newName").filter(|n| !n.is_empty()) else {
        return (StatusCode::BAD_REQUEST, "newName required").into_response();
    };
    let Some(container) = server.container_mut(folders) else {
        return not_found();
    };
    if container.contains_key(to) {
        return StatusCode::BAD_REQUEST.into_response();
    }
    match container.remove(from) {
        Some(job) => {
            container.insert(to.to_string(), job);
            StatusCode::OK.into_response()
        }
        None => not_found(),
    }
}

fn build(server: &mut Server, path: &[String], query: Vec<(String, String)>, base: &str) -> Response {
    match server.job(path) {
        Some(job) if job.folder => return not_found(),
        Some(job) if job.disabled => return StatusCode::CONFLICT.into_response(),
        Some(_) => {}
        None => return not_found(),
    }
    let parameters = query.into_iter().filter(|(k, _)| k != "token").collect();
    let id = server.enqueue(path, parameters);
    tracing::info!(job = %path.join("/"), queue_id = id, "build queued");
    (
        StatusCode::CREATED,
        [(header::LOCATION, format!("{base}queue/item/{id}/"))],
    )
        .into_response()
}

fn update_job(server: &mut Server, path: &[String], f: impl FnOnce(&mut Job)) -> Response {
    match server.job_mut(path) {
        Some(job) => {
            f(job);
            StatusCode::OK.into_response()
        }
        None => not_found(),
    }
}

fn find_build<'a>(server: &'a Server, path: &[String], number: &str) -> Option<&'a crate::state::Build> {
    let number: u64 = number.parse().ok()?;
    server.job(path)?.builds.get(&number)
}

fn field<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
}

fn status(found: bool) -> Response {
    if found {
        StatusCode::OK.into_response()
    } else {
        not_found()
    }
}
