//! Encyclopedia article client
//!
//! Fetches the plain-text content of an encyclopedia page by title via the
//! MediaWiki action API. Every failure mode is reported as a [`LookupError`];
//! the resolver collapses all of them to "no article".

use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde::Deserialize;
use songpedia_common::config::EncyclopediaConfig;
use std::num::NonZeroU32;
use std::time::Duration;
use thiserror::Error;

/// Article lookup errors
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("No page titled {0:?}")]
    NotFound(String),

    #[error("{0:?} is a disambiguation page")]
    Disambiguation(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl LookupError {
    /// Failure of the transport rather than an answer from the service
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            LookupError::Network(_) | LookupError::Api(..) | LookupError::Parse(_)
        )
    }
}

/// Plain-text article lookup by title
#[async_trait]
pub trait Encyclopedia: Send + Sync {
    async fn page(&self, title: &str) -> Result<String, LookupError>;
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    query: Option<QueryBody>,
}

#[derive(Debug, Default, Deserialize)]
struct QueryBody {
    #[serde(default)]
    pages: Vec<PageEntry>,
    #[serde(default)]
    search: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct PageEntry {
    title: String,
    #[serde(default)]
    missing: bool,
    #[serde(default)]
    invalid: bool,
    #[serde(default)]
    extract: Option<String>,
    #[serde(default)]
    pageprops: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    title: String,
}

/// Outcome of an exact-title fetch
#[derive(Debug)]
enum PageFetch {
    Content(String),
    Missing,
}

/// MediaWiki (Wikipedia) client
pub struct WikipediaClient {
    client: Client,
    api_url: String,
    auto_suggest: bool,
    rate_limiter: RateLimiter<
        governor::state::direct::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl WikipediaClient {
    pub fn new(config: &EncyclopediaConfig) -> Result<Self, LookupError> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| LookupError::Network(e.to_string()))?;

        let per_second = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            client,
            api_url: config.base_url.clone(),
            auto_suggest: config.auto_suggest,
            rate_limiter: RateLimiter::direct(Quota::per_second(per_second)),
        })
    }

    async fn get_json(&self, params: &[(&str, &str)]) -> Result<QueryResponse, LookupError> {
        self.rate_limiter.until_ready().await;

        let response = self
            .client
            .get(&self.api_url)
            .query(&[("action", "query"), ("format", "json"), ("formatversion", "2")])
            .query(params)
            .send()
            .await
            .map_err(|e| LookupError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(LookupError::Api(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| LookupError::Parse(e.to_string()))
    }

    async fn fetch_exact(&self, title: &str) -> Result<PageFetch, LookupError> {
        tracing::debug!(title = %title, "Fetching encyclopedia page");

        let body = self
            .get_json(&[
                ("prop", "extracts|pageprops"),
                ("explaintext", "1"),
                ("redirects", "1"),
                ("ppprop", "disambiguation"),
                ("titles", title),
            ])
            .await?;

        interpret_page(title, body)
    }

    async fn suggest(&self, title: &str) -> Result<Option<String>, LookupError> {
        let body = self
            .get_json(&[("list", "search"), ("srlimit", "1"), ("srsearch", title)])
            .await?;

        Ok(body
            .query
            .unwrap_or_default()
            .search
            .into_iter()
            .next()
            .map(|hit| hit.title))
    }
}

fn interpret_page(title: &str, body: QueryResponse) -> Result<PageFetch, LookupError> {
    let Some(page) = body.query.unwrap_or_default().pages.into_iter().next() else {
        return Ok(PageFetch::Missing);
    };

    if page.missing || page.invalid {
        return Ok(PageFetch::Missing);
    }

    if page
        .pageprops
        .as_ref()
        .is_some_and(|props| props.contains_key("disambiguation"))
    {
        return Err(LookupError::Disambiguation(page.title));
    }

    match page.extract {
        Some(text) if !text.trim().is_empty() => Ok(PageFetch::Content(text)),
        _ => Err(LookupError::NotFound(title.to_string())),
    }
}

#[async_trait]
impl Encyclopedia for WikipediaClient {
    async fn page(&self, title: &str) -> Result<String, LookupError> {
        if title.trim().is_empty() {
            return Err(LookupError::NotFound(title.to_string()));
        }

        if let PageFetch::Content(text) = self.fetch_exact(title).await? {
            return Ok(text);
        }

        if !self.auto_suggest {
            return Err(LookupError::NotFound(title.to_string()));
        }

        let Some(suggestion) = self.suggest(title).await? else {
            return Err(LookupError::NotFound(title.to_string()));
        };

        tracing::debug!(title = %title, suggestion = %suggestion, "Using suggested page title");
        match self.fetch_exact(&suggestion).await? {
            PageFetch::Content(text) => Ok(text),
            PageFetch::Missing => Err(LookupError::NotFound(title.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: &str) -> QueryResponse {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn test_client_creation() {
        assert!(WikipediaClient::new(&EncyclopediaConfig::default()).is_ok());
    }

    #[test]
    fn test_interpret_content() {
        let body = parse(
            r#"{"batchcomplete": true, "query": {"pages": [
                {"pageid": 1, "title": "Yesterday (Beatles song)",
                 "extract": "\"Yesterday\" is a song by the English rock band the Beatles."}
            ]}}"#,
        );
        match interpret_page("Yesterday", body).unwrap() {
            PageFetch::Content(text) => assert!(text.contains("is a song")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_interpret_missing() {
        let body = parse(
            r#"{"query": {"pages": [{"ns": 0, "title": "Zzqx Song", "missing": true}]}}"#,
        );
        assert!(matches!(
            interpret_page("Zzqx Song", body).unwrap(),
            PageFetch::Missing
        ));
    }

    #[test]
    fn test_interpret_disambiguation() {
        let body = parse(
            r#"{"query": {"pages": [{"title": "Help", "extract": "Help may refer to:",
                "pageprops": {"disambiguation": ""}}]}}"#,
        );
        assert!(matches!(
            interpret_page("Help", body),
            Err(LookupError::Disambiguation(_))
        ));
    }

    #[test]
    fn test_interpret_empty_extract_is_not_found() {
        let body = parse(r#"{"query": {"pages": [{"title": "Stub", "extract": "  "}]}}"#);
        assert!(matches!(
            interpret_page("Stub", body),
            Err(LookupError::NotFound(_))
        ));
    }

    #[test]
    fn test_transport_classification() {
        assert!(LookupError::Network("timeout".into()).is_transport());
        assert!(LookupError::Api(503, String::new()).is_transport());
        assert!(!LookupError::NotFound("x".into()).is_transport());
        assert!(!LookupError::Disambiguation("x".into()).is_transport());
    }
}
