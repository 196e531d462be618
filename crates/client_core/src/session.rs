use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, warn};
use url::Url;

/// Authenticated API context handed to every remote store.
///
/// A session starts with the bearer token obtained at login and ends either
/// on `logout` or the first time the backend answers 401. Once invalidated it
/// never becomes active again; callers create a new session after re-login.
#[derive(Debug)]
pub struct Session {
    api_url: Url,
    token: RwLock<Option<String>>,
}

impl Session {
    pub fn new(api_url: &str, token: impl Into<String>) -> Result<Arc<Self>, url::ParseError> {
        let api_url = Url::parse(api_url.trim())?;
        Ok(Arc::new(Self {
            api_url,
            token: RwLock::new(Some(token.into())),
        }))
    }

    pub fn api_url(&self) -> &Url {
        &self.api_url
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.api_url.as_str().trim_end_matches('/'))
    }

    pub async fn bearer(&self) -> Option<String> {
        self.token.read().await.clone()
    }

    pub async fn is_active(&self) -> bool {
        self.token.read().await.is_some()
    }

    pub async fn invalidate(&self) {
        let mut token = self.token.write().await;
        if token.take().is_some() {
            warn!(api_url = %self.api_url, "session: invalidated after unauthorized response");
        }
    }

    pub async fn logout(&self) {
        let mut token = self.token.write().await;
        if token.take().is_some() {
            info!(api_url = %self.api_url, "session: logged out");
        }
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
