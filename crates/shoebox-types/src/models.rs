use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Sentinel tag applied when a message carries no explicit or inherited tags.
/// The stored tag set is never empty.
pub const UNTAGGED: &str = "untagged";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    /// Canonical phone identity (`+` plus digits). All lookups go through
    /// this form; raw provider strings are canonicalized first.
    pub phone: String,
    pub display_name: Option<String>,
    pub onboarding_step: OnboardingStep,
    pub onboarded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A saved message, settled by the dedup/merge engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub user_id: Uuid,
    pub sender_phone: String,
    pub content: String,
    /// Non-empty; insertion order preserved, `untagged` sentinel when bare.
    pub tags: Vec<String>,
    pub media_url: Option<String>,
    pub media_type: Option<String>,
    pub provider_message_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// An explicit shared board. Private boards are implicit (a tag string
/// scoped to one user) and have no row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Board {
    pub id: Uuid,
    /// Globally unique. A private tag may lexically collide with a board
    /// name; collision never grants access.
    pub name: String,
    pub owner_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoardRole {
    Owner,
    Member,
}

/// Guided onboarding steps, forward-only. `Completed` is absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingStep {
    WelcomeSent,
    FirstText,
    FirstHashtag,
    FirstLink,
    Completed,
}

impl OnboardingStep {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WelcomeSent => "welcome_sent",
            Self::FirstText => "first_text",
            Self::FirstHashtag => "first_hashtag",
            Self::FirstLink => "first_link",
            Self::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "welcome_sent" => Some(Self::WelcomeSent),
            "first_text" => Some(Self::FirstText),
            "first_hashtag" => Some(Self::FirstHashtag),
            "first_link" => Some(Self::FirstLink),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

impl std::fmt::Display for OnboardingStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_roundtrip() {
        for step in [
            OnboardingStep::WelcomeSent,
            OnboardingStep::FirstText,
            OnboardingStep::FirstHashtag,
            OnboardingStep::FirstLink,
            OnboardingStep::Completed,
        ] {
            assert_eq!(OnboardingStep::parse(step.as_str()), Some(step));
        }
        assert_eq!(OnboardingStep::parse("unknown"), None);
    }

    #[test]
    fn step_order_is_forward() {
        assert!(OnboardingStep::WelcomeSent < OnboardingStep::FirstText);
        assert!(OnboardingStep::FirstText < OnboardingStep::FirstHashtag);
        assert!(OnboardingStep::FirstHashtag < OnboardingStep::FirstLink);
        assert!(OnboardingStep::FirstLink < OnboardingStep::Completed);
    }
}
