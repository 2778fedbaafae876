//! Concurrent multi-tool search fan-out.

use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Parallel snippet/URL vectors from a single tool. Indexes stay aligned
/// within one tool's contribution.
#[derive(Debug, Clone, Default)]
pub struct SearchHits {
    pub texts: Vec<String>,
    pub urls: Vec<String>,
}

impl SearchHits {
    pub fn new(texts: Vec<String>, urls: Vec<String>) -> Self {
        Self { texts, urls }
    }
}

#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct SearchToolError(pub String);

impl SearchToolError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

/// Search-provider adapter: query in, snippets and URLs out, fallible,
/// possibly slow. The fan-out treats every failure identically regardless of
/// cause.
#[async_trait]
pub trait SearchTool: Send + Sync {
    fn name(&self) -> &str;
    async fn invoke(&self, query: &str) -> Result<SearchHits, SearchToolError>;
}

/// One failed branch, recovered locally and logged.
#[derive(Debug, Clone)]
pub struct ToolFailure {
    pub tool: String,
    pub reason: String,
}

/// Invokes every registered tool concurrently with the same query and merges
/// the successes in registration order. Total tool failure yields two empty
/// vectors, never an error.
#[derive(Clone)]
pub struct SearchFanout {
    tools: Vec<Arc<dyn SearchTool>>,
}

impl SearchFanout {
    pub fn new(tools: Vec<Arc<dyn SearchTool>>) -> Self {
        Self { tools }
    }

    pub fn tool_count(&self) -> usize {
        self.tools.len()
    }

    /// `(texts, urls)` concatenated across tools in registration order.
    /// Duplicate URLs across tools are kept; deduplication happens later, by
    /// note text.
    pub async fn call_search_tools(&self, query: &str) -> (Vec<String>, Vec<String>) {
        let branches = self.tools.iter().map(|tool| {
            let tool = tool.clone();
            let query = query.to_string();
            async move {
                match tool.invoke(&query).await {
                    Ok(hits) => Ok(hits),
                    Err(err) => Err(ToolFailure {
                        tool: tool.name().to_string(),
                        reason: err.to_string(),
                    }),
                }
            }
        });

        // join_all buffers every branch before the merge, so completion order
        // cannot reorder the aggregation.
        let outcomes = join_all(branches).await;

        let mut texts = Vec::new();
        let mut urls = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(hits) => {
                    texts.extend(hits.texts);
                    urls.extend(hits.urls);
                }
                Err(failure) => {
                    warn!(tool = %failure.tool, reason = %failure.reason, "search tool dropped");
                }
            }
        }

        if urls.is_empty() {
            debug!(%query, "search fan-out produced no candidate urls");
        }
        (texts, urls)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    struct FixedTool {
        name: &'static str,
        hits: SearchHits,
        delay: Duration,
    }

    impl FixedTool {
        fn new(name: &'static str, texts: &[&str], urls: &[&str]) -> Self {
            Self {
                name,
                hits: SearchHits::new(
                    texts.iter().map(|t| t.to_string()).collect(),
                    urls.iter().map(|u| u.to_string()).collect(),
                ),
                delay: Duration::ZERO,
            }
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }
    }

    #[async_trait]
    impl SearchTool for FixedTool {
        fn name(&self) -> &str {
            self.name
        }

        async fn invoke(&self, _query: &str) -> Result<SearchHits, SearchToolError> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            Ok(self.hits.clone())
        }
    }

    struct FailingTool;

    #[async_trait]
    impl SearchTool for FailingTool {
        fn name(&self) -> &str {
            "broken"
        }

        async fn invoke(&self, _query: &str) -> Result<SearchHits, SearchToolError> {
            Err(SearchToolError::new("backend unavailable"))
        }
    }

    #[tokio::test]
    async fn single_surviving_tool_carries_the_call() {
        let fanout = SearchFanout::new(vec![
            Arc::new(FailingTool),
            Arc::new(FailingTool),
            Arc::new(FailingTool),
            Arc::new(FixedTool::new("ok", &["t"], &["http://x"])),
        ]);

        let (texts, urls) = fanout.call_search_tools("anything").await;
        assert_eq!(texts, vec!["t".to_string()]);
        assert_eq!(urls, vec!["http://x".to_string()]);
    }

    #[tokio::test]
    async fn total_failure_yields_empty_results_not_error() {
        let fanout = SearchFanout::new(vec![Arc::new(FailingTool), Arc::new(FailingTool)]);
        let (texts, urls) = fanout.call_search_tools("anything").await;
        assert!(texts.is_empty());
        assert!(urls.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn merge_follows_registration_order_not_completion_order() {
        let slow = FixedTool::new("slow", &["first"], &["http://first"])
            .with_delay(Duration::from_millis(250));
        let fast = FixedTool::new("fast", &["second"], &["http://second"]);
        let fanout = SearchFanout::new(vec![Arc::new(slow), Arc::new(fast)]);

        let (texts, urls) = fanout.call_search_tools("anything").await;
        assert_eq!(texts, vec!["first".to_string(), "second".to_string()]);
        assert_eq!(
            urls,
            vec!["http://first".to_string(), "http://second".to_string()]
        );
    }

    #[tokio::test]
    async fn duplicate_urls_across_tools_are_preserved() {
        let fanout = SearchFanout::new(vec![
            Arc::new(FixedTool::new("a", &["same text"], &["http://dup"])),
            Arc::new(FixedTool::new("b", &["same text"], &["http://dup"])),
        ]);
        let (texts, urls) = fanout.call_search_tools("anything").await;
        assert_eq!(texts.len(), 2);
        assert_eq!(urls, vec!["http://dup".to_string(), "http://dup".to_string()]);
    }
}
