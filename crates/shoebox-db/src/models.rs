//! Database row types — these map directly to SQLite rows.
//! Distinct from shoebox-types API models to keep the DB layer independent.
//! Timestamps are unix milliseconds.

use chrono::{DateTime, TimeZone, Utc};
use shoebox_types::models::{Board, Message, OnboardingStep, User};
use uuid::Uuid;

pub struct UserRow {
    pub id: String,
    pub phone: String,
    pub display_name: Option<String>,
    pub onboarding_step: String,
    pub onboarded_at: Option<i64>,
    pub created_at: i64,
}

pub struct MessageRow {
    pub id: String,
    pub user_id: String,
    pub sender_phone: String,
    pub content: String,
    pub media_url: Option<String>,
    pub media_type: Option<String>,
    pub provider_message_id: Option<String>,
    pub created_at: i64,
}

pub struct BoardRow {
    pub id: String,
    pub name: String,
    pub owner_id: String,
    pub created_at: i64,
}

pub fn ts_to_datetime(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .unwrap_or_default()
}

impl UserRow {
    pub fn into_user(self) -> anyhow::Result<User> {
        Ok(User {
            id: self.id.parse::<Uuid>()?,
            phone: self.phone,
            display_name: self.display_name,
            onboarding_step: OnboardingStep::parse(&self.onboarding_step)
                .ok_or_else(|| anyhow::anyhow!("unknown onboarding step: {}", self.onboarding_step))?,
            onboarded_at: self.onboarded_at.map(ts_to_datetime),
            created_at: ts_to_datetime(self.created_at),
        })
    }
}

impl MessageRow {
    pub fn into_message(self, tags: Vec<String>) -> anyhow::Result<Message> {
        Ok(Message {
            id: self.id.parse::<Uuid>()?,
            user_id: self.user_id.parse::<Uuid>()?,
            sender_phone: self.sender_phone,
            content: self.content,
            tags,
            media_url: self.media_url,
            media_type: self.media_type,
            provider_message_id: self.provider_message_id,
            created_at: ts_to_datetime(self.created_at),
        })
    }
}

impl BoardRow {
    pub fn into_board(self) -> anyhow::Result<Board> {
        Ok(Board {
            id: self.id.parse::<Uuid>()?,
            name: self.name,
            owner_id: self.owner_id.parse::<Uuid>()?,
            created_at: ts_to_datetime(self.created_at),
        })
    }
}
