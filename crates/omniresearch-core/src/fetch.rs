//! Concurrent page-fetch fan-out with per-URL failure isolation.

use async_trait::async_trait;
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::ResearchError;
use crate::extract;

/// Per-fetch budget. A page that cannot respond within this window is dropped
/// without affecting sibling fetches.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(6);

const USER_AGENT: &str = "omniresearch/0.1 (research pipeline)";

#[derive(Debug, Clone)]
pub struct PageResponse {
    pub status: u16,
    pub body: String,
}

#[derive(Debug, Clone, Error)]
pub enum PageFetchError {
    #[error("request timed out")]
    Timeout,
    #[error("transport failure: {0}")]
    Transport(String),
}

/// Page-fetch adapter. Production uses reqwest; tests inject deterministic
/// stubs.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn get(&self, url: &str, timeout: Duration) -> Result<PageResponse, PageFetchError>;
}

/// One failed fan-out branch, kept inspectable for logging rather than raised.
#[derive(Debug, Clone)]
pub struct FetchFailure {
    pub url: String,
    pub reason: String,
}

/// reqwest-backed [`PageFetcher`].
pub struct HttpPageFetcher {
    client: reqwest::Client,
}

impl HttpPageFetcher {
    pub fn new() -> Result<Self, ResearchError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|err| {
                ResearchError::internal(format!("failed to build fetch client: {err}"))
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn get(&self, url: &str, timeout: Duration) -> Result<PageResponse, PageFetchError> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .header("Accept", "text/html")
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    PageFetchError::Timeout
                } else {
                    PageFetchError::Transport(err.to_string())
                }
            })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|err| PageFetchError::Transport(err.to_string()))?;
        Ok(PageResponse { status, body })
    }
}

/// Fetches every candidate URL concurrently and extracts text from the pages
/// that respond. Individual timeouts, non-2xx statuses and transport failures
/// drop that URL only; the fan-out itself never fails.
#[derive(Clone)]
pub struct FetchFanout {
    fetcher: Arc<dyn PageFetcher>,
    timeout: Duration,
}

impl FetchFanout {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self {
            fetcher,
            timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// `(url, extracted_text)` for every URL that yielded non-empty text.
    /// No retries; partial failure is expected and recovered here.
    pub async fn fetch_all(&self, urls: &[String]) -> Vec<(String, String)> {
        let outcomes = self.fetch_outcomes(urls).await;

        let mut notes = Vec::new();
        let mut failed = 0usize;
        for outcome in outcomes {
            match outcome {
                Ok(Some(note)) => notes.push(note),
                Ok(None) => {}
                Err(failure) => {
                    failed += 1;
                    warn!(url = %failure.url, reason = %failure.reason, "page fetch dropped");
                }
            }
        }

        debug!(fetched = notes.len(), failed, "fetch fan-out complete");
        notes
    }

    /// Per-branch outcomes in input order: `Ok(Some)` fetched and extracted,
    /// `Ok(None)` fetched but no extractable text, `Err` the branch failure.
    pub async fn fetch_outcomes(
        &self,
        urls: &[String],
    ) -> Vec<Result<Option<(String, String)>, FetchFailure>> {
        let mut seen: HashSet<&str> = HashSet::new();
        let unique: Vec<&String> = urls.iter().filter(|url| seen.insert(url.as_str())).collect();

        let branches = unique.into_iter().map(|url| {
            let fetcher = self.fetcher.clone();
            let timeout = self.timeout;
            let url = url.clone();
            async move {
                let response = match tokio::time::timeout(timeout, fetcher.get(&url, timeout)).await
                {
                    Err(_) => {
                        return Err(FetchFailure {
                            url,
                            reason: "timed out".to_string(),
                        });
                    }
                    Ok(Err(err)) => {
                        return Err(FetchFailure {
                            url,
                            reason: err.to_string(),
                        });
                    }
                    Ok(Ok(response)) => response,
                };

                if !(200..300).contains(&response.status) {
                    return Err(FetchFailure {
                        reason: format!("http status {}", response.status),
                        url,
                    });
                }

                let text = extract::extract(&response.body);
                if text.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some((url, text)))
                }
            }
        });

        join_all(branches).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const LONG_PARA: &str =
        "Hello world, this paragraph carries enough characters to pass extraction.";

    enum StubPage {
        Ok(u16, String),
        Hang,
        Fail(String),
    }

    struct StubFetcher {
        pages: HashMap<String, StubPage>,
    }

    #[async_trait]
    impl PageFetcher for StubFetcher {
        async fn get(&self, url: &str, _timeout: Duration) -> Result<PageResponse, PageFetchError> {
            match self.pages.get(url) {
                Some(StubPage::Ok(status, body)) => Ok(PageResponse {
                    status: *status,
                    body: body.clone(),
                }),
                Some(StubPage::Hang) => {
                    tokio::time::sleep(Duration::from_secs(120)).await;
                    Err(PageFetchError::Timeout)
                }
                Some(StubPage::Fail(reason)) => Err(PageFetchError::Transport(reason.clone())),
                None => Err(PageFetchError::Transport("unknown url".to_string())),
            }
        }
    }

    fn page(body: &str) -> StubPage {
        StubPage::Ok(200, format!("<html><body><p>{body}</p></body></html>"))
    }

    fn fanout(pages: HashMap<String, StubPage>) -> FetchFanout {
        FetchFanout::new(Arc::new(StubFetcher { pages }))
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_isolated_to_its_url() {
        let pages = HashMap::from([
            ("http://a".to_string(), page(LONG_PARA)),
            ("http://b".to_string(), StubPage::Hang),
        ]);
        let notes = fanout(pages)
            .fetch_all(&["http://a".to_string(), "http://b".to_string()])
            .await;

        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].0, "http://a");
        assert_eq!(notes[0].1, LONG_PARA);
    }

    #[tokio::test]
    async fn non_2xx_and_transport_failures_are_soft() {
        let pages = HashMap::from([
            ("http://ok".to_string(), page(LONG_PARA)),
            (
                "http://gone".to_string(),
                StubPage::Ok(404, "<html><body></body></html>".to_string()),
            ),
            (
                "http://down".to_string(),
                StubPage::Fail("connection refused".to_string()),
            ),
        ]);
        let urls = vec![
            "http://ok".to_string(),
            "http://gone".to_string(),
            "http://down".to_string(),
        ];
        let notes = fanout(pages).fetch_all(&urls).await;
        assert_eq!(notes, vec![("http://ok".to_string(), LONG_PARA.to_string())]);
    }

    #[tokio::test]
    async fn empty_extraction_is_no_result_not_failure() {
        let pages = HashMap::from([(
            "http://thin".to_string(),
            StubPage::Ok(200, "<html><body><p>tiny</p></body></html>".to_string()),
        )]);
        let outcomes = fanout(pages)
            .fetch_outcomes(&["http://thin".to_string()])
            .await;
        assert!(matches!(outcomes.as_slice(), [Ok(None)]));
    }

    #[tokio::test]
    async fn duplicate_urls_are_fetched_once() {
        let pages = HashMap::from([("http://a".to_string(), page(LONG_PARA))]);
        let urls = vec!["http://a".to_string(), "http://a".to_string()];
        let notes = fanout(pages).fetch_all(&urls).await;
        assert_eq!(notes.len(), 1);
    }
}
