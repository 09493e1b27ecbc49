//! Optional AI categorization collaborator. Advisory only: a suggestion is
//! surfaced alongside the ingest outcome and never feeds tag resolution or
//! routing.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[async_trait]
pub trait TagSuggester: Send + Sync {
    async fn suggest_tag(&self, content: &str, existing: &[String]) -> Option<String>;
}

#[derive(Serialize)]
struct SuggestRequest<'a> {
    content: &'a str,
    existing_tags: &'a [String],
}

#[derive(Deserialize)]
struct SuggestResponse {
    tag: Option<String>,
}

/// Posts content to a configured categorization endpoint.
pub struct HttpTagSuggester {
    client: reqwest::Client,
    url: String,
}

impl HttpTagSuggester {
    pub fn new(url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
        }
    }
}

#[async_trait]
impl TagSuggester for HttpTagSuggester {
    async fn suggest_tag(&self, content: &str, existing: &[String]) -> Option<String> {
        let response = self
            .client
            .post(&self.url)
            .json(&SuggestRequest {
                content,
                existing_tags: existing,
            })
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .ok()?;

        let suggestion = response.json::<SuggestResponse>().await.ok()?.tag;
        if let Some(tag) = &suggestion {
            debug!("categorizer suggested #{}", tag);
        }
        suggestion
    }
}

/// Used when no categorizer is configured.
pub struct NoSuggestions;

#[async_trait]
impl TagSuggester for NoSuggestions {
    async fn suggest_tag(&self, _content: &str, _existing: &[String]) -> Option<String> {
        None
    }
}
