//! Outbound SMS collaborator. Best-effort by contract: a failed send is
//! logged and reported as `false`, never escalated — onboarding progress is
//! not allowed to block on delivery.

use async_trait::async_trait;
use tracing::{debug, warn};

#[async_trait]
pub trait SmsSender: Send + Sync {
    async fn send(&self, to: &str, body: &str) -> bool;
}

/// Posts form-encoded `To`/`From`/`Body` to the provider's message endpoint.
pub struct HttpSmsSender {
    client: reqwest::Client,
    api_url: String,
    api_token: Option<String>,
    from: String,
}

impl HttpSmsSender {
    pub fn new(api_url: String, api_token: Option<String>, from: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url,
            api_token,
            from,
        }
    }
}

#[async_trait]
impl SmsSender for HttpSmsSender {
    async fn send(&self, to: &str, body: &str) -> bool {
        let mut request = self
            .client
            .post(&self.api_url)
            .form(&[("To", to), ("From", self.from.as_str()), ("Body", body)]);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        match request.send().await {
            Ok(response) if response.status().is_success() => {
                debug!("sent SMS to {}", to);
                true
            }
            Ok(response) => {
                warn!("SMS provider returned {} for {}", response.status(), to);
                false
            }
            Err(e) => {
                warn!("SMS send to {} failed: {}", to, e);
                false
            }
        }
    }
}

/// Stand-in when no provider is configured; sends are logged and dropped.
pub struct NoopSmsSender;

#[async_trait]
impl SmsSender for NoopSmsSender {
    async fn send(&self, to: &str, body: &str) -> bool {
        debug!("SMS provider unconfigured, dropping send to {}: {}", to, body);
        true
    }
}
