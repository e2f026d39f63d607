//! Web search tool

use crate::agent::provider::{Tool, ToolError, ToolInput};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Tool name
pub const NAME: &str = "Search";

const DESCRIPTION: &str = "Useful for when you need to answer questions about current events";

/// A search engine returning a plain text digest of results
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Runs `query` and returns the results as text
    async fn search(&self, query: &str) -> Result<String, String>;
}

/// Answers questions about current events through a search backend
pub struct SearchTool {
    backend: Arc<dyn SearchBackend>,
}

impl SearchTool {
    /// Create a new search tool
    #[must_use]
    pub fn new(backend: Arc<dyn SearchBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> String {
        DESCRIPTION.to_string()
    }

    async fn run(&self, input: ToolInput) -> Result<String, ToolError> {
        let query = input.as_prompt();
        debug!(query = %query, "Web search");
        self.backend
            .search(&query)
            .await
            .map_err(|message| ToolError::Backend {
                tool: NAME,
                message,
            })
    }
}

#[cfg(feature = "tavily")]
pub use tavily_backend::TavilySearch;

#[cfg(feature = "tavily")]
mod tavily_backend {
    use super::SearchBackend;
    use async_trait::async_trait;
    use std::fmt::Write;
    use std::time::Duration;
    use tavily::Tavily;
    use tracing::debug;

    const MAX_RESULTS: i32 = 5;

    /// Tavily search backend
    pub struct TavilySearch {
        client: Tavily,
        api_key: String,
    }

    impl TavilySearch {
        /// Create a new Tavily backend with the given API key
        ///
        /// # Errors
        ///
        /// Returns an error if the Tavily client cannot be created.
        pub fn new(api_key: &str) -> anyhow::Result<Self> {
            let client = Tavily::builder(api_key)
                .timeout(Duration::from_secs(30))
                .max_retries(2)
                .build()
                .map_err(|e| anyhow::anyhow!("Failed to create Tavily client: {e}"))?;

            Ok(Self {
                client,
                api_key: api_key.to_string(),
            })
        }
    }

    #[async_trait]
    impl SearchBackend for TavilySearch {
        async fn search(&self, query: &str) -> Result<String, String> {
            let request = tavily::SearchRequest::new(&self.api_key, query)
                .max_results(MAX_RESULTS)
                .search_depth("basic");

            let response = self
                .client
                .call(&request)
                .await
                .map_err(|e| format!("Search failed: {e}"))?;
            debug!(query, results = response.results.len(), "Tavily search done");

            if response.results.is_empty() {
                return Ok("No results found.".to_string());
            }

            let mut output = String::new();
            for (i, result) in response.results.iter().enumerate() {
                let _ = write!(
                    output,
                    "{}. {}\n{}\n{}\n\n",
                    i + 1,
                    result.title,
                    result.url,
                    result.content
                );
            }
            Ok(output.trim_end().to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_returns_backend_text() {
        let mut backend = MockSearchBackend::new();
        backend
            .expect_search()
            .withf(|query| query == "What's the weather today?")
            .returning(|_| Ok("Sunny, 21°C".to_string()));

        let tool = SearchTool::new(Arc::new(backend));
        let out = tool
            .run("What's the weather today?".into())
            .await
            .expect("search");
        assert_eq!(out, "Sunny, 21°C");
    }

    #[tokio::test]
    async fn test_backend_failure_is_tool_error() {
        let mut backend = MockSearchBackend::new();
        backend
            .expect_search()
            .returning(|_| Err("rate limited".to_string()));

        let tool = SearchTool::new(Arc::new(backend));
        let err = tool.run("news".into()).await.expect_err("must fail");
        assert!(matches!(err, ToolError::Backend { tool: NAME, message } if message == "rate limited"));
    }
}
