use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// -- Messages --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub tags: Vec<String>,
    pub media_url: Option<String>,
    pub media_type: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    50
}

// -- Boards --

#[derive(Debug, Deserialize)]
pub struct BoardMessagesQuery {
    /// Requesting user; membership is checked before any shared content is
    /// returned.
    pub user_id: Uuid,
    #[serde(default = "default_limit")]
    pub limit: u32,
}
