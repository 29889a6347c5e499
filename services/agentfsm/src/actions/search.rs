//! `search` action backed by a SearxNG instance.

use agentfsm_core::{ActionHandler, ActionParams};
use anyhow::{Context, bail};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

const MAX_RESULTS: usize = 5;

#[derive(Debug, Default, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub results: Vec<SearchHit>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchHit {
    pub title: Option<String>,
    pub url: Option<String>,
    pub content: Option<String>,
}

pub struct SearchAction {
    http: reqwest::Client,
    url: String,
}

impl SearchAction {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl ActionHandler for SearchAction {
    async fn invoke(&self, params: &ActionParams) -> anyhow::Result<String> {
        let query = params
            .get("query")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .context("No search query provided")?;

        debug!(%query, url = %self.url, "Searching");
        let response = self
            .http
            .post(&self.url)
            .form(&[("q", query), ("format", "json")])
            .send()
            .await
            .context("Search request failed")?;

        let status = response.status();
        if !status.is_success() {
            bail!("Could not complete search. Status code: {}", status.as_u16());
        }

        let body: SearchResponse = response
            .json()
            .await
            .context("Search returned an unreadable response")?;
        Ok(format_results(query, &body))
    }
}

/// Renders the top hits as a numbered list for the model.
pub fn format_results(query: &str, response: &SearchResponse) -> String {
    if response.results.is_empty() {
        return format!("No results found for query: {query}");
    }

    let mut out = String::from("Search Results:\n\n");
    for (i, hit) in response.results.iter().take(MAX_RESULTS).enumerate() {
        let title = hit.title.as_deref().unwrap_or("No Title");
        let url = hit.url.as_deref().unwrap_or("No URL");
        let content = hit.content.as_deref().unwrap_or("No Description").trim();
        out.push_str(&format!(
            "{}. {title}\n   URL: {url}\n   Description: {content}\n\n",
            i + 1
        ));
    }
    out.push_str(&format!("Total results found: {}", response.results.len()));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(value: serde_json::Value) -> SearchResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_format_results_top_five() {
        let hits: Vec<_> = (1..=7)
            .map(|i| json!({"title": format!("Result {i}"), "url": format!("https://example.com/{i}"), "content": format!("  Snippet {i}  ")}))
            .collect();
        let body = response(json!({ "results": hits }));

        let text = format_results("rust", &body);

        assert!(text.starts_with("Search Results:\n\n1. Result 1\n"));
        assert!(text.contains("   URL: https://example.com/5\n   Description: Snippet 5\n"));
        assert!(!text.contains("Result 6"));
        assert!(text.ends_with("Total results found: 7"));
    }

    #[test]
    fn test_format_results_missing_fields() {
        let body = response(json!({ "results": [{}] }));

        let text = format_results("rust", &body);

        assert!(text.contains("1. No Title\n   URL: No URL\n   Description: No Description"));
        assert!(text.ends_with("Total results found: 1"));
    }

    #[test]
    fn test_format_results_empty() {
        let body = response(json!({ "query": "zzz" }));
        assert_eq!(format_results("zzz", &body), "No results found for query: zzz");
    }

    #[tokio::test]
    async fn test_missing_query_is_an_error() {
        let action = SearchAction::new("http://127.0.0.1:9/search");

        let err = action.invoke(&ActionParams::new()).await.unwrap_err();
        assert!(err.to_string().contains("No search query"));

        let mut params = ActionParams::new();
        params.insert("query".to_string(), json!("   "));
        assert!(action.invoke(&params).await.is_err());
    }
}
