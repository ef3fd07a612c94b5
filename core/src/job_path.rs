//! Decomposition of slash-separated job names into URL segments.
//!
//! Names go into URLs percent-encoded, one segment at a time, so spaces,
//! `#`, `?`, `&` and non-ASCII characters survive the trip.

use crate::urls::Params;

/// Folder prefix and short name of a job.
///
/// `"teamA/sub/job1"` becomes `folder_url = "job/teamA/job/sub/"` and
/// `short_name = "job1"`. A bare name has an empty `folder_url`.
///
/// `folder_url` is already encoded for use in a URL; `short_name` is the
/// plain name the server reports back, and [`JobPath::params`] encodes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobPath {
    pub folder_url: String,
    pub short_name: String,
}

impl JobPath {
    pub fn parse(name: &str) -> Self {
        match name.rsplit_once('/') {
            Some((folders, short_name)) => Self {
                folder_url: folder_url(folders),
                short_name: short_name.to_string(),
            },
            None => Self {
                folder_url: String::new(),
                short_name: name.to_string(),
            },
        }
    }

    /// `folder_url` and the encoded `short_name` as template parameters.
    pub fn params(&self) -> Params {
        Params::new()
            .with("folder_url", &self.folder_url)
            .with("short_name", encode_segment(&self.short_name))
    }
}

/// `"a/b"` -> `"job/a/job/b/"`; `""` -> `""`.
pub fn folder_url(folder: &str) -> String {
    if folder.is_empty() {
        return String::new();
    }
    folder
        .split('/')
        .map(|segment| format!("job/{}/", encode_segment(segment)))
        .collect()
}

/// Percent-encode one name for a path segment or a query value.
pub fn encode_segment(name: &str) -> String {
    urlencoding::encode(name).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_name_becomes_job_chain() {
        let path = JobPath::parse("a/b/c");
        assert_eq!(path.folder_url, "job/a/job/b/");
        assert_eq!(path.short_name, "c");
    }

    #[test]
    fn bare_name_has_empty_folder() {
        let path = JobPath::parse("job");
        assert_eq!(path.folder_url, "");
        assert_eq!(path.short_name, "job");
    }

    #[test]
    fn single_folder() {
        let path = JobPath::parse("teamA/job1");
        assert_eq!(path.folder_url, "job/teamA/");
        assert_eq!(path.short_name, "job1");
    }

    #[test]
    fn params_carry_both_fields() {
        let params = JobPath::parse("x/y").params();
        assert_eq!(params.get("folder_url"), Some("job/x/"));
        assert_eq!(params.get("short_name"), Some("y"));
    }

    #[test]
    fn names_are_encoded_per_segment() {
        let path = JobPath::parse("team a/my job");
        assert_eq!(path.folder_url, "job/team%20a/");
        assert_eq!(path.short_name, "my job");
        assert_eq!(path.params().get("short_name"), Some("my%20job"));

        let path = JobPath::parse("r&d/build #1?/caf\u{e9}");
        assert_eq!(path.folder_url, "job/r%26d/job/build%20%231%3F/");
        assert_eq!(path.params().get("short_name"), Some("caf%C3%A9"));
    }

    #[test]
    fn folder_url_of_nested_folder() {
        assert_eq!(folder_url("top/mid"), "job/top/job/mid/");
        assert_eq!(folder_url(""), "");
    }
}
