pub mod categorize;
pub mod dedup;
pub mod enrich;
pub mod error;
pub mod normalize;
pub mod onboarding;
pub mod phone;
pub mod pipeline;
pub mod router;
pub mod sms;
pub mod tags;
