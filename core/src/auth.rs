//! Basic authorization and CSRF crumb caching.
//!
//! # Design
//! The crumb is fetched lazily on the first request that wants one and then
//! reused for the life of the client. The fetch is attempted exactly once:
//! if it fails the client carries on without a crumb and does not retry.
//! A crumb the server rotates later is not refreshed automatically; call
//! [`Jenkins::reset_crumb`](crate::Jenkins::reset_crumb) or build a new
//! client.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use parking_lot::Mutex;
use serde::Deserialize;

/// `Basic <base64(username:password)>`.
pub fn basic_authorization(username: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{username}:{password}")))
}

/// CSRF token issued by the server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Crumb {
    /// Header name the server expects the token in.
    #[serde(rename = "crumbRequestField")]
    pub field_name: String,
    #[serde(rename = "crumb")]
    pub value: String,
}

#[derive(Debug, Default)]
enum CrumbState {
    #[default]
    Unfetched,
    Fetched(Option<Crumb>),
}

/// Set-once crumb slot shared by every request on one client.
#[derive(Debug, Default)]
pub struct CrumbCache {
    state: Mutex<CrumbState>,
}

impl CrumbCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached crumb, running `fetch` first if no attempt has
    /// been made yet. The lock is held during `fetch` so concurrent callers
    /// never issue a second request.
    pub fn get_or_fetch(&self, fetch: impl FnOnce() -> Option<Crumb>) -> Option<Crumb> {
        let mut state = self.state.lock();
        if let CrumbState::Fetched(crumb) = &*state {
            return crumb.clone();
        }
        let crumb = fetch();
        *state = CrumbState::Fetched(crumb.clone());
        crumb
    }

    pub fn reset(&self) {
        *self.state.lock() = CrumbState::Unfetched;
    }

    pub fn is_fetched(&self) -> bool {
        matches!(*self.state.lock(), CrumbState::Fetched(_))
    }
}
