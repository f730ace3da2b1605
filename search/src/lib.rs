//! Web-search backend for the `web_search` tool.
//!
//! Wraps a hosted search API (Brave or Serper) and formats the hits into the
//! numbered snippets the model reads back. An empty result set is still a
//! well-formed answer, not an error, so the model can tell the user nothing
//! turned up.

use async_trait::async_trait;
use cortex::Searcher;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum SearchError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("api error ({status}): {message}")]
    Api { status: u16, message: String },
}

/// Which hosted API answers the query.
#[derive(Debug, Clone)]
pub enum SearchProvider {
    /// Brave Search API.
    Brave { api_key: String },
    /// Serper (Google) Search API.
    Serper { api_key: String },
}

/// One search hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// Web-search client implementing [`cortex::Searcher`].
pub struct SearchClient {
    provider: SearchProvider,
    client: reqwest::Client,
    max_results: usize,
}

impl SearchClient {
    pub fn new(provider: SearchProvider) -> Self {
        Self {
            provider,
            client: reqwest::Client::new(),
            max_results: 3,
        }
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    /// Raw hits for programmatic use.
    pub async fn search_raw(&self, query: &str) -> Result<Vec<SearchHit>, SearchError> {
        debug!(%query, "searching the web");
        let hits = match &self.provider {
            SearchProvider::Brave { api_key } => self.search_brave(api_key, query).await?,
            SearchProvider::Serper { api_key } => self.search_serper(api_key, query).await?,
        };
        info!(%query, hits = hits.len(), "search finished");
        Ok(hits)
    }

    async fn search_brave(&self, api_key: &str, query: &str) -> Result<Vec<SearchHit>, SearchError> {
        let response = self
            .client
            .get("https://api.search.brave.com/res/v1/web/search")
            .header("X-Subscription-Token", api_key)
            .query(&[("q", query), ("count", &self.max_results.to_string())])
            .send()
            .await?;
        let response = check(response).await?;
        let parsed: BraveResponse = response.json().await?;
        Ok(parsed
            .web
            .map(|web| web.results)
            .unwrap_or_default()
            .into_iter()
            .take(self.max_results)
            .map(|r| SearchHit {
                title: r.title,
                url: r.url,
                snippet: r.description,
            })
            .collect())
    }

    async fn search_serper(
        &self,
        api_key: &str,
        query: &str,
    ) -> Result<Vec<SearchHit>, SearchError> {
        let response = self
            .client
            .post("https://google.serper.dev/search")
            .header("X-API-KEY", api_key)
            .json(&SerperRequest {
                q: query,
                num: self.max_results,
            })
            .send()
            .await?;
        let response = check(response).await?;
        let parsed: SerperResponse = response.json().await?;
        Ok(parsed
            .organic
            .unwrap_or_default()
            .into_iter()
            .take(self.max_results)
            .map(|r| SearchHit {
                title: r.title,
                url: r.link,
                snippet: r.snippet,
            })
            .collect())
    }
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response, SearchError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    warn!(status = status.as_u16(), %message, "search request rejected");
    Err(SearchError::Api {
        status: status.as_u16(),
        message,
    })
}

/// Render hits as the numbered snippets fed back to the model.
pub fn format_hits(query: &str, hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return format!("No search results found for '{query}'");
    }
    let mut out = format!("Web search results for '{query}':\n\n");
    for (i, hit) in hits.iter().enumerate() {
        out.push_str(&format!("{}. {}\n   {}\n", i + 1, hit.title, hit.snippet));
        if !hit.url.is_empty() {
            out.push_str(&format!("   Source: {}\n", hit.url));
        }
        out.push('\n');
    }
    out.trim_end().to_string()
}

#[async_trait]
impl Searcher for SearchClient {
    async fn search(&self, query: &str) -> anyhow::Result<String> {
        let hits = self.search_raw(query).await?;
        Ok(format_hits(query, &hits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(title: &str, url: &str, snippet: &str) -> SearchHit {
        SearchHit {
            title: title.into(),
            url: url.into(),
            snippet: snippet.into(),
        }
    }

    #[test]
    fn formats_numbered_snippets_with_sources() {
        let hits = vec![
            hit("First", "https://a.example", "one"),
            hit("Second", "", "two"),
        ];
        let text = format_hits("robots", &hits);
        assert!(text.starts_with("Web search results for 'robots':"));
        assert!(text.contains("1. First"));
        assert!(text.contains("   Source: https://a.example"));
        assert!(text.contains("2. Second"));
        // No source line for a hit without a URL.
        assert_eq!(text.matches("Source:").count(), 1);
    }

    #[test]
    fn empty_results_are_still_an_answer() {
        let text = format_hits("nothing", &[]);
        assert_eq!(text, "No search results found for 'nothing'");
    }

    #[test]
    fn parses_brave_and_serper_bodies() {
        let brave: BraveResponse = serde_json::from_str(
            r#"{"web": {"results": [{"title": "T", "url": "U", "description": "D"}]}}"#,
        )
        .unwrap();
        assert_eq!(brave.web.unwrap().results[0].title, "T");

        let serper: SerperResponse = serde_json::from_str(
            r#"{"organic": [{"title": "T", "link": "L", "snippet": "S"}]}"#,
        )
        .unwrap();
        assert_eq!(serper.organic.unwrap()[0].link, "L");
    }
}

#[derive(Debug, Deserialize)]
struct BraveResponse {
    web: Option<BraveWeb>,
}

#[derive(Debug, Deserialize)]
struct BraveWeb {
    results: Vec<BraveResult>,
}

#[derive(Debug, Deserialize)]
struct BraveResult {
    title: String,
    url: String,
    description: String,
}

#[derive(Debug, Serialize)]
struct SerperRequest<'a> {
    q: &'a str,
    num: usize,
}

#[derive(Debug, Deserialize)]
struct SerperResponse {
    organic: Option<Vec<SerperResult>>,
}

#[derive(Debug, Deserialize)]
struct SerperResult {
    title: String,
    link: String,
    snippet: String,
}
