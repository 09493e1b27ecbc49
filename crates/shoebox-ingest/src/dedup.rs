//! Dedup/merge engine: decides whether an inbound payload is a duplicate
//! delivery, a continuation of a very recent message, or genuinely new.

use std::collections::HashSet;

use anyhow::Result;
use shoebox_db::Database;
use shoebox_db::models::MessageRow;
use shoebox_db::queries::NewMessage;
use uuid::Uuid;

use crate::normalize::IngestionRequest;

/// Two physical deliveries inside this window with the same resolved tag
/// set are one logical message.
pub const MERGE_WINDOW_MS: i64 = 5_000;

pub enum StoreOutcome {
    /// Fresh row.
    New(MessageRow),
    /// Continuation: content appended onto the existing row, no new row.
    Merged(MessageRow),
    /// Redelivery of a known provider message id: stored row returned
    /// unchanged, no write, no re-notification.
    Duplicate(MessageRow),
}

impl StoreOutcome {
    pub fn row(&self) -> &MessageRow {
        match self {
            Self::New(row) | Self::Merged(row) | Self::Duplicate(row) => row,
        }
    }
}

/// Idempotent with respect to `provider_message_id`, including ids whose
/// delivery was folded into an earlier row by a merge. Without an id, dedup
/// is best-effort inside the merge window: two deliveries racing ahead of
/// either commit can both insert. The unique provider-id index closes the
/// race where an id exists; the id-less case is accepted as-is.
pub fn store(
    db: &Database,
    user_id: Uuid,
    req: &IngestionRequest,
    tags: &[String],
    now_ms: i64,
) -> Result<StoreOutcome> {
    if let Some(provider_id) = &req.provider_message_id {
        if let Some(existing) = db.find_message_by_provider_id(provider_id)? {
            return Ok(StoreOutcome::Duplicate(existing));
        }
    }

    let user_key = user_id.to_string();
    if let Some(recent) = db.find_recent_message(&req.sender, &user_key, now_ms - MERGE_WINDOW_MS)? {
        let recent_tags = db.tags_of(&recent.id)?;
        if set_equal(&recent_tags, tags) {
            db.append_message_content(
                &recent.id,
                &req.content,
                req.provider_message_id.as_deref(),
            )?;
            let merged = db
                .find_message_by_id(&recent.id)?
                .ok_or_else(|| anyhow::anyhow!("merged message vanished: {}", recent.id))?;
            return Ok(StoreOutcome::Merged(merged));
        }
        // Same timing, different intent: a distinct message.
    }

    let id = Uuid::new_v4().to_string();
    let inserted = db.insert_message(&NewMessage {
        id: &id,
        user_id: &user_key,
        sender_phone: &req.sender,
        content: &req.content,
        tags,
        media_url: req.media_url.as_deref(),
        media_type: req.media_type.as_deref(),
        provider_message_id: req.provider_message_id.as_deref(),
        created_at: now_ms,
    })?;

    if !inserted {
        // Lost a first-sighting race on the provider id; the winner's row is
        // the canonical one.
        let provider_id = req
            .provider_message_id
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("insert skipped without provider id"))?;
        let existing = db
            .find_message_by_provider_id(provider_id)?
            .ok_or_else(|| anyhow::anyhow!("conflicting message vanished: {provider_id}"))?;
        return Ok(StoreOutcome::Duplicate(existing));
    }

    let row = db
        .find_message_by_id(&id)?
        .ok_or_else(|| anyhow::anyhow!("inserted message vanished: {id}"))?;
    Ok(StoreOutcome::New(row))
}

fn set_equal(a: &[String], b: &[String]) -> bool {
    let a: HashSet<&str> = a.iter().map(String::as_str).collect();
    let b: HashSet<&str> = b.iter().map(String::as_str).collect();
    a == b
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(content: &str, provider_id: Option<&str>) -> IngestionRequest {
        IngestionRequest {
            content: content.to_string(),
            sender: "+15551234567".to_string(),
            media_url: None,
            media_type: None,
            provider_message_id: provider_id.map(str::to_string),
            segment_count: None,
        }
    }

    fn tags(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn setup() -> (Database, Uuid) {
        let db = Database::open_in_memory().unwrap();
        let user = Uuid::new_v4();
        db.create_user(&user.to_string(), "+15551234567", 0).unwrap();
        (db, user)
    }

    #[test]
    fn redelivery_returns_stored_row() {
        let (db, user) = setup();

        let first = store(&db, user, &req("#movies dune", Some("SM1")), &tags(&["movies"]), 1_000).unwrap();
        assert!(matches!(first, StoreOutcome::New(_)));

        let second = store(&db, user, &req("#movies dune", Some("SM1")), &tags(&["movies"]), 2_000).unwrap();
        let StoreOutcome::Duplicate(row) = second else {
            panic!("expected duplicate");
        };
        assert_eq!(row.id, first.row().id);
        assert_eq!(row.content, "#movies dune");
    }

    #[test]
    fn merge_when_tags_equal_within_window() {
        let (db, user) = setup();

        store(&db, user, &req("#recipes pasta", Some("SM1")), &tags(&["recipes"]), 1_000).unwrap();
        let outcome = store(
            &db,
            user,
            &req("https://example.com", Some("SM2")),
            &tags(&["recipes"]),
            4_000,
        )
        .unwrap();

        let StoreOutcome::Merged(row) = outcome else {
            panic!("expected merge");
        };
        assert_eq!(row.content, "#recipes pasta https://example.com");
    }

    #[test]
    fn redelivery_after_merge_is_still_duplicate() {
        let (db, user) = setup();

        let first = store(&db, user, &req("#recipes pasta", Some("SM1")), &tags(&["recipes"]), 1_000).unwrap();
        let merged = store(
            &db,
            user,
            &req("https://example.com", Some("SM2")),
            &tags(&["recipes"]),
            2_000,
        )
        .unwrap();
        assert!(matches!(merged, StoreOutcome::Merged(_)));

        // Carrier retries the merged-in delivery: the id resolves to the
        // merged row, nothing is appended twice.
        let replay = store(
            &db,
            user,
            &req("https://example.com", Some("SM2")),
            &tags(&["recipes"]),
            3_000,
        )
        .unwrap();
        let StoreOutcome::Duplicate(row) = replay else {
            panic!("expected duplicate");
        };
        assert_eq!(row.id, first.row().id);
        assert_eq!(row.content, "#recipes pasta https://example.com");
    }

    #[test]
    fn no_merge_when_tags_differ() {
        let (db, user) = setup();

        store(&db, user, &req("#recipes pasta", Some("SM1")), &tags(&["recipes"]), 1_000).unwrap();
        let outcome = store(&db, user, &req("#news story", Some("SM2")), &tags(&["news"]), 2_000).unwrap();
        assert!(matches!(outcome, StoreOutcome::New(_)));
    }

    #[test]
    fn no_merge_outside_window() {
        let (db, user) = setup();

        store(&db, user, &req("#recipes pasta", Some("SM1")), &tags(&["recipes"]), 1_000).unwrap();
        let outcome = store(
            &db,
            user,
            &req("more pasta", Some("SM2")),
            &tags(&["recipes"]),
            1_000 + MERGE_WINDOW_MS + 1,
        )
        .unwrap();
        assert!(matches!(outcome, StoreOutcome::New(_)));
    }

    #[test]
    fn tag_order_does_not_block_merge() {
        let (db, user) = setup();

        store(&db, user, &req("#a #b one", Some("SM1")), &tags(&["a", "b"]), 1_000).unwrap();
        let outcome = store(&db, user, &req("#b #a two", Some("SM2")), &tags(&["b", "a"]), 2_000).unwrap();
        assert!(matches!(outcome, StoreOutcome::Merged(_)));
    }
}
