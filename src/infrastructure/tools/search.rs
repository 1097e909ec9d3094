//! Web search through SerpAPI.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

use crate::domain::config::{SearchConfig, resolve_secret};
use crate::domain::traits::SearchProvider;
use crate::domain::types::{MAX_NUM_RESULTS, SearchHit};

pub struct SerpApiSearch {
    http: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl SerpApiSearch {
    pub fn new(config: &SearchConfig) -> Self {
        let api_key = match resolve_secret(config.api_key.as_deref(), config.api_key_env.as_deref()) {
            Ok(key) => Some(key),
            Err(e) => {
                tracing::warn!("Search disabled: {e}");
                None
            }
        };
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            http,
            endpoint: config.endpoint.clone(),
            api_key,
        }
    }
}

/// Maps a SerpAPI answer to at most `num_results` hits.
pub fn parse_results(data: &Value, num_results: usize) -> Result<Vec<SearchHit>> {
    if let Some(error) = data.get("error") {
        let message = error
            .as_str()
            .map(String::from)
            .unwrap_or_else(|| error.to_string());
        bail!("SerpAPI error: {message}");
    }
    let hits = data
        .get("organic_results")
        .and_then(Value::as_array)
        .map(|results| {
            results
                .iter()
                .take(num_results)
                .filter_map(|r| serde_json::from_value::<SearchHit>(r.clone()).ok())
                .collect()
        })
        .unwrap_or_default();
    Ok(hits)
}

#[async_trait]
impl SearchProvider for SerpApiSearch {
    async fn search(&self, query: &str, num_results: u8) -> Result<Vec<SearchHit>> {
        let Some(api_key) = &self.api_key else {
            bail!("Search API key is not configured");
        };
        let num = num_results.clamp(1, MAX_NUM_RESULTS);
        let num_param = num.to_string();

        let response = self
            .http
            .get(&self.endpoint)
            .query(&[
                ("q", query),
                ("num", num_param.as_str()),
                ("api_key", api_key.as_str()),
                ("engine", "google"),
            ])
            .send()
            .await
            .context("Search request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("SerpAPI request failed ({status}): {body}");
        }

        let data: Value = response
            .json()
            .await
            .context("Failed to parse search results")?;
        let hits = parse_results(&data, num as usize)?;
        tracing::debug!(query, hits = hits.len(), "Search finished");
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_results_limits_and_maps() {
        let data = json!({
            "organic_results": [
                {"title": "Rust", "link": "https://rust-lang.org", "snippet": "A language", "position": 1, "extra": true},
                {"title": "Crates", "link": "https://crates.io", "snippet": "Registry", "position": 2},
                {"title": "Docs", "link": "https://docs.rs", "position": 3}
            ]
        });
        let hits = parse_results(&data, 2).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].title, "Rust");
        assert_eq!(hits[1].position, Some(2));

        let hits = parse_results(&data, 10).unwrap();
        assert_eq!(hits[2].snippet, "");
    }

    #[test]
    fn test_parse_results_error_and_empty() {
        assert!(parse_results(&json!({"error": "Invalid API key"}), 5).is_err());
        assert!(parse_results(&json!({}), 5).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_key_fails_at_call() {
        let config = SearchConfig {
            api_key: None,
            api_key_env: Some("TOOLBRIDGE_TEST_UNSET_SERP".into()),
            ..Default::default()
        };
        let search = SerpApiSearch::new(&config);
        let err = search.search("rust", 5).await.unwrap_err();
        assert!(err.to_string().contains("not configured"));
    }
}
