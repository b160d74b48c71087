//! Web research collaborators.

use anyhow::{Result, anyhow};

use crate::core::project::ProjectId;

pub trait WebSearch: Send + Sync {
    /// First result link for `query`.
    fn first_link(&self, query: &str) -> Result<String>;
}

/// What a browser saw on a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCapture {
    /// Screenshot, base64-encoded, when the browser took one.
    pub screenshot: Option<String>,
    /// Visible page text.
    pub text: String,
}

pub trait Browser: Send + Sync {
    /// Open `url` in a fresh session, capture it and close the session.
    fn capture(&self, url: &str, project: &ProjectId) -> Result<PageCapture>;
}

/// Stand-in used when no search backend is configured.
///
/// Every call fails, so research degrades to announcing the queries only.
pub struct DisabledWeb;

impl WebSearch for DisabledWeb {
    fn first_link(&self, query: &str) -> Result<String> {
        Err(anyhow!("web search is not configured (query {query:?})"))
    }
}

impl Browser for DisabledWeb {
    fn capture(&self, url: &str, _project: &ProjectId) -> Result<PageCapture> {
        Err(anyhow!("browser is not configured (url {url:?})"))
    }
}
