//! URL enrichment: Open Graph metadata for display. Never consulted for
//! tagging or routing decisions.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::Serialize;
use tracing::debug;

static OG_TITLE: LazyLock<Regex> = LazyLock::new(|| og_property("og:title"));
static OG_DESCRIPTION: LazyLock<Regex> = LazyLock::new(|| og_property("og:description"));
static OG_IMAGE: LazyLock<Regex> = LazyLock::new(|| og_property("og:image"));
static TITLE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>([^<]+)</title>").unwrap());

fn og_property(name: &str) -> Regex {
    Regex::new(&format!(
        r#"(?is)<meta[^>]+property\s*=\s*["']{name}["'][^>]+content\s*=\s*["']([^"']+)["']"#
    ))
    .unwrap()
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Enrichment {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
}

pub struct Enricher {
    client: reqwest::Client,
}

impl Enricher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(5))
                .build()
                .unwrap_or_default(),
        }
    }

    /// Fetch a page and pull Open Graph metadata out of it. Any failure is
    /// just an empty result — enrichment is cosmetic.
    pub async fn enrich(&self, url: &str) -> Enrichment {
        let Ok(response) = self.client.get(url).send().await else {
            debug!("enrichment fetch failed for {}", url);
            return Enrichment::default();
        };
        let Ok(html) = response.text().await else {
            return Enrichment::default();
        };

        let grab = |re: &Regex| re.captures(&html).map(|c| c[1].trim().to_string());

        Enrichment {
            title: grab(&OG_TITLE).or_else(|| grab(&TITLE_TAG)),
            description: grab(&OG_DESCRIPTION),
            image: grab(&OG_IMAGE),
        }
    }
}

impl Default for Enricher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn og_tags_parse() {
        let html = r#"<html><head>
            <meta property="og:title" content="A Great Film" />
            <meta property="og:description" content="Everyone liked it">
            <meta property="og:image" content="https://img.example/poster.jpg"/>
            <title>fallback title</title>
        </head></html>"#;

        assert_eq!(
            OG_TITLE.captures(html).map(|c| c[1].to_string()),
            Some("A Great Film".to_string())
        );
        assert_eq!(
            OG_DESCRIPTION.captures(html).map(|c| c[1].to_string()),
            Some("Everyone liked it".to_string())
        );
        assert_eq!(
            OG_IMAGE.captures(html).map(|c| c[1].to_string()),
            Some("https://img.example/poster.jpg".to_string())
        );
    }

    #[test]
    fn title_tag_fallback() {
        let html = "<html><head><title>Just a Title</title></head></html>";
        assert!(OG_TITLE.captures(html).is_none());
        assert_eq!(
            TITLE_TAG.captures(html).map(|c| c[1].to_string()),
            Some("Just a Title".to_string())
        );
    }
}
