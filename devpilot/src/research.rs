//! Web research: one search, capture and summary per query.

use anyhow::Result;
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::agent::{Agent, Task};
use crate::core::project::ProjectId;
use crate::core::types::{BrowserSession, SearchResult};
use crate::io::broadcast::SCREENSHOT;
use crate::stages::StageError;
use crate::stages::formatter::FormatterStage;

impl Agent {
    /// Research each query in order.
    ///
    /// A query whose search, capture or summary fails is skipped with a
    /// warning. Only failures of the agent's own stores abort the task.
    #[instrument(skip_all, fields(project = %project, queries = queries.len()))]
    pub(crate) fn search_queries(
        &self,
        task: &Task,
        queries: &[String],
        project: &ProjectId,
    ) -> Result<Vec<SearchResult>> {
        let mut results = Vec::new();
        for query in queries {
            let query = query.trim().to_lowercase();
            if query.is_empty() {
                continue;
            }

            let link = match self.services.search.first_link(&query) {
                Ok(link) => link,
                Err(err) => {
                    warn!(query = %query, err = %format!("{err:#}"), "search failed; skipping query");
                    continue;
                }
            };
            let capture = match self.services.browser.capture(&link, project) {
                Ok(capture) => capture,
                Err(err) => {
                    warn!(link = %link, err = %format!("{err:#}"), "page capture failed; skipping query");
                    continue;
                }
            };

            if let Some(data) = &capture.screenshot {
                self.services.broadcaster.emit(
                    SCREENSHOT,
                    &json!({ "data": data, "project_name": project.name() }),
                );
            }
            self.push_snapshot(project, task.phase(), |snapshot| {
                snapshot.browser_session = Some(BrowserSession {
                    url: Some(link.clone()),
                    screenshot: capture.screenshot.clone(),
                });
            })?;

            let summary = match self.executor.execute(
                &FormatterStage {
                    raw_text: &capture.text,
                },
                Some(project),
            ) {
                Ok(summary) => summary,
                Err(err @ StageError::RetriesExhausted { .. }) => {
                    warn!(link = %link, err = %err, "could not summarize page; skipping query");
                    continue;
                }
                Err(err) => return Err(err.into()),
            };

            info!(query = %query, link = %link, "query researched");
            results.push(SearchResult {
                query,
                link,
                summary,
            });
        }
        Ok(results)
    }
}
