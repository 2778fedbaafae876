//! Concrete search-provider adapters.
//!
//! Each adapter satisfies the [`SearchTool`] contract: query in, aligned
//! snippet/URL vectors out, any failure reported as a tool error for the
//! fan-out to drop. Providers cap their own result counts and snippet sizes.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use percent_encoding::percent_decode_str;
use regex::Regex;
use scraper::{Html, Selector};
use std::time::Duration;

use crate::error::ResearchError;
use crate::extract::truncate_chars;
use crate::search::{SearchHits, SearchTool, SearchToolError};

const TOOL_TIMEOUT: Duration = Duration::from_secs(10);
const USER_AGENT: &str = "omniresearch/0.1 (research pipeline)";

const SNIPPET_CHAR_LIMIT: usize = 1000;
const TAVILY_CHAR_LIMIT: usize = 500;

fn build_client() -> Result<reqwest::Client, ResearchError> {
    reqwest::Client::builder()
        .timeout(TOOL_TIMEOUT)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|err| ResearchError::internal(format!("failed to build search client: {err}")))
}

fn tool_err(err: impl std::fmt::Display) -> SearchToolError {
    SearchToolError::new(err.to_string())
}

/// General knowledge and history lookups via the MediaWiki search API.
pub struct WikipediaSearch {
    client: reqwest::Client,
    top_k: usize,
}

impl WikipediaSearch {
    pub fn new() -> Result<Self, ResearchError> {
        Ok(Self {
            client: build_client()?,
            top_k: 2,
        })
    }
}

static MARKUP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("invalid markup regex"));

fn strip_markup(snippet: &str) -> String {
    MARKUP_RE
        .replace_all(snippet, "")
        .replace("&quot;", "\"")
        .replace("&amp;", "&")
        .replace("&#39;", "'")
}

#[async_trait]
impl SearchTool for WikipediaSearch {
    fn name(&self) -> &str {
        "wikipedia"
    }

    async fn invoke(&self, query: &str) -> Result<SearchHits, SearchToolError> {
        let limit = self.top_k.to_string();
        let response = self
            .client
            .get("https://en.wikipedia.org/w/api.php")
            .query(&[
                ("action", "query"),
                ("list", "search"),
                ("format", "json"),
                ("srlimit", limit.as_str()),
                ("srsearch", query),
            ])
            .send()
            .await
            .map_err(tool_err)?;

        if !response.status().is_success() {
            return Err(tool_err(format!("http status {}", response.status())));
        }

        let value: serde_json::Value = response.json().await.map_err(tool_err)?;
        let mut texts = Vec::new();
        let mut urls = Vec::new();
        if let Some(results) = value["query"]["search"].as_array() {
            for item in results.iter().take(self.top_k) {
                let title = item["title"].as_str().unwrap_or("").trim();
                if title.is_empty() {
                    continue;
                }
                let snippet = strip_markup(item["snippet"].as_str().unwrap_or(""));
                texts.push(truncate_chars(snippet.trim(), SNIPPET_CHAR_LIMIT));
                urls.push(format!(
                    "https://en.wikipedia.org/wiki/{}",
                    title.replace(' ', "_")
                ));
            }
        }
        Ok(SearchHits::new(texts, urls))
    }
}

/// Research-paper search over the Arxiv Atom API.
pub struct ArxivSearch {
    client: reqwest::Client,
    top_k: usize,
}

impl ArxivSearch {
    pub fn new() -> Result<Self, ResearchError> {
        Ok(Self {
            client: build_client()?,
            top_k: 2,
        })
    }
}

static ENTRY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<entry>(.*?)</entry>").expect("invalid entry regex"));
static ENTRY_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<id>\s*(.*?)\s*</id>").expect("invalid id regex"));
static ENTRY_SUMMARY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<summary[^>]*>\s*(.*?)\s*</summary>").expect("invalid summary regex")
});

pub(crate) fn parse_atom_entries(feed: &str, top_k: usize) -> SearchHits {
    let mut texts = Vec::new();
    let mut urls = Vec::new();
    for captures in ENTRY_RE.captures_iter(feed).take(top_k) {
        let entry = &captures[1];
        let Some(id) = ENTRY_ID_RE.captures(entry).map(|c| c[1].trim().to_string()) else {
            continue;
        };
        let summary = ENTRY_SUMMARY_RE
            .captures(entry)
            .map(|c| c[1].split_whitespace().collect::<Vec<_>>().join(" "))
            .unwrap_or_default();
        texts.push(truncate_chars(&summary, SNIPPET_CHAR_LIMIT));
        urls.push(id);
    }
    SearchHits::new(texts, urls)
}

#[async_trait]
impl SearchTool for ArxivSearch {
    fn name(&self) -> &str {
        "arxiv"
    }

    async fn invoke(&self, query: &str) -> Result<SearchHits, SearchToolError> {
        let search_query = format!("all:{query}");
        let max_results = self.top_k.to_string();
        let response = self
            .client
            .get("http://export.arxiv.org/api/query")
            .query(&[
                ("search_query", search_query.as_str()),
                ("start", "0"),
                ("max_results", max_results.as_str()),
            ])
            .send()
            .await
            .map_err(tool_err)?;

        if !response.status().is_success() {
            return Err(tool_err(format!("http status {}", response.status())));
        }

        let feed = response.text().await.map_err(tool_err)?;
        Ok(parse_atom_entries(&feed, self.top_k))
    }
}

/// General web search by scraping the DuckDuckGo HTML endpoint.
pub struct DuckDuckGoSearch {
    client: reqwest::Client,
    max_results: usize,
}

impl DuckDuckGoSearch {
    pub fn new() -> Result<Self, ResearchError> {
        Ok(Self {
            client: build_client()?,
            max_results: 5,
        })
    }
}

static DDG_RESULT: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".result").expect("invalid result selector"));
static DDG_LINK: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a.result__a").expect("invalid link selector"));
static DDG_SNIPPET: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("a.result__snippet, .result__snippet").expect("invalid snippet selector")
});

/// DuckDuckGo wraps result URLs in redirect links like
/// `//duckduckgo.com/l/?uddg=https%3A%2F%2Fexample.com&rut=...`; unwrap and
/// percent-decode the destination.
pub(crate) fn extract_ddg_url(href: &str) -> String {
    if let Some(pos) = href.find("uddg=") {
        let start = pos + 5;
        let end = href[start..]
            .find('&')
            .map(|i| start + i)
            .unwrap_or(href.len());
        let encoded = &href[start..end];
        if !encoded.is_empty() {
            return percent_decode_str(encoded).decode_utf8_lossy().into_owned();
        }
    }
    href.to_string()
}

pub(crate) fn parse_ddg_results(body: &str, max_results: usize) -> SearchHits {
    let doc = Html::parse_document(body);
    let mut texts = Vec::new();
    let mut urls = Vec::new();

    for result in doc.select(&DDG_RESULT).take(max_results) {
        let Some(link) = result.select(&DDG_LINK).next() else {
            continue;
        };
        let url = extract_ddg_url(link.value().attr("href").unwrap_or(""));
        if !url.starts_with("http") {
            continue;
        }
        let snippet = result
            .select(&DDG_SNIPPET)
            .next()
            .map(|el| el.text().collect::<String>())
            .unwrap_or_default();
        texts.push(truncate_chars(snippet.trim(), SNIPPET_CHAR_LIMIT));
        urls.push(url);
    }

    SearchHits::new(texts, urls)
}

#[async_trait]
impl SearchTool for DuckDuckGoSearch {
    fn name(&self) -> &str {
        "duckduckgo"
    }

    async fn invoke(&self, query: &str) -> Result<SearchHits, SearchToolError> {
        let response = self
            .client
            .post("https://html.duckduckgo.com/html/")
            .form(&[("q", query)])
            .header("Accept", "text/html")
            .send()
            .await
            .map_err(tool_err)?;

        if !response.status().is_success() {
            return Err(tool_err(format!("http status {}", response.status())));
        }

        let body = response.text().await.map_err(tool_err)?;
        // Parsed synchronously: the scraper document is !Send and must not
        // live across an await.
        Ok(parse_ddg_results(&body, self.max_results))
    }
}

/// Tavily JSON search API, for broader or more intensive queries. Requires an
/// API key; construct only when one is configured.
pub struct TavilySearch {
    client: reqwest::Client,
    api_key: String,
    max_results: usize,
}

impl TavilySearch {
    pub fn new(api_key: impl Into<String>) -> Result<Self, ResearchError> {
        Ok(Self {
            client: build_client()?,
            api_key: api_key.into(),
            max_results: 3,
        })
    }
}

#[async_trait]
impl SearchTool for TavilySearch {
    fn name(&self) -> &str {
        "tavily"
    }

    async fn invoke(&self, query: &str) -> Result<SearchHits, SearchToolError> {
        let response = self
            .client
            .post("https://api.tavily.com/search")
            .json(&serde_json::json!({
                "api_key": self.api_key,
                "query": query,
                "max_results": self.max_results,
            }))
            .send()
            .await
            .map_err(tool_err)?;

        if !response.status().is_success() {
            return Err(tool_err(format!("http status {}", response.status())));
        }

        let value: serde_json::Value = response.json().await.map_err(tool_err)?;
        let mut texts = Vec::new();
        let mut urls = Vec::new();
        if let Some(results) = value["results"].as_array() {
            for item in results.iter().take(self.max_results) {
                let Some(url) = item["url"].as_str() else {
                    continue;
                };
                texts.push(truncate_chars(
                    item["content"].as_str().unwrap_or(""),
                    TAVILY_CHAR_LIMIT,
                ));
                urls.push(url.to_string());
            }
        }
        Ok(SearchHits::new(texts, urls))
    }
}
