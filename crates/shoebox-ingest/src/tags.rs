//! Tag extraction and the inheritance resolver.

use std::sync::LazyLock;

use anyhow::Result;
use regex::Regex;
use shoebox_db::Database;
use shoebox_types::models::UNTAGGED;

/// Carriers and OS clients may split one logical submission (caption plus
/// URL) into two physical deliveries; the second, tagless segment inherits
/// tags from any message this recent.
pub const INHERIT_WINDOW_MS: i64 = 5 * 60 * 1000;

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"#(\w+)").unwrap());
static LINK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"https?://\S+").unwrap());

/// Scan content for `#word` tokens. First-seen order, duplicates dropped,
/// case preserved (board matching is exact).
pub fn extract(content: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for cap in TAG_RE.captures_iter(content) {
        let tag = cap[1].to_string();
        if !seen.contains(&tag) {
            seen.push(tag);
        }
    }
    seen
}

pub fn contains_link(content: &str) -> bool {
    LINK_RE.is_match(content)
}

/// Resolve the tag set for an inbound message: explicit tags win; an empty
/// extraction falls back to the most recent tagged message from the same
/// sender inside the inheritance window; otherwise the sentinel.
pub fn resolve(
    db: &Database,
    sender_phone: &str,
    user_id: &str,
    content: &str,
    now_ms: i64,
) -> Result<Vec<String>> {
    let explicit = extract(content);
    if !explicit.is_empty() {
        return Ok(explicit);
    }

    let since = now_ms - INHERIT_WINDOW_MS;
    if let Some(donor) = db.find_recent_tagged_message(sender_phone, user_id, since, UNTAGGED)? {
        let inherited = db.tags_of(&donor.id)?;
        if !inherited.is_empty() {
            return Ok(inherited);
        }
    }

    Ok(vec![UNTAGGED.to_string()])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_preserves_first_seen_order() {
        assert_eq!(extract("#movies great film #scifi #movies"), vec!["movies", "scifi"]);
    }

    #[test]
    fn extract_empty_for_plain_text() {
        assert!(extract("no tags here").is_empty());
        assert!(extract("trailing hash # alone").is_empty());
    }

    #[test]
    fn extract_keeps_case() {
        assert_eq!(extract("#Recipes #recipes"), vec!["Recipes", "recipes"]);
    }

    #[test]
    fn link_detection() {
        assert!(contains_link("check https://example.com out"));
        assert!(contains_link("http://example.com"));
        assert!(!contains_link("example.com without scheme"));
    }

    #[test]
    fn resolve_inherits_within_window() {
        let db = Database::open_in_memory().unwrap();
        db.create_user("u1", "+15551234567", 0).unwrap();
        db.insert_message(&shoebox_db::queries::NewMessage {
            id: "m1",
            user_id: "u1",
            sender_phone: "+15551234567",
            content: "#recipes pasta",
            tags: &["recipes".to_string()],
            media_url: None,
            media_type: None,
            provider_message_id: None,
            created_at: 10_000,
        })
        .unwrap();

        // 2 seconds later, a tagless URL segment
        let tags = resolve(&db, "+15551234567", "u1", "https://example.com", 12_000).unwrap();
        assert_eq!(tags, vec!["recipes"]);

        // Explicit tags always win over inheritance
        let tags = resolve(&db, "+15551234567", "u1", "#news thing", 12_000).unwrap();
        assert_eq!(tags, vec!["news"]);

        // Past the window: sentinel
        let tags = resolve(
            &db,
            "+15551234567",
            "u1",
            "late segment",
            10_000 + INHERIT_WINDOW_MS + 1,
        )
        .unwrap();
        assert_eq!(tags, vec![UNTAGGED]);
    }

    #[test]
    fn resolve_ignores_sentinel_only_donors() {
        let db = Database::open_in_memory().unwrap();
        db.create_user("u1", "+15551234567", 0).unwrap();
        db.insert_message(&shoebox_db::queries::NewMessage {
            id: "m1",
            user_id: "u1",
            sender_phone: "+15551234567",
            content: "plain note",
            tags: &[UNTAGGED.to_string()],
            media_url: None,
            media_type: None,
            provider_message_id: None,
            created_at: 10_000,
        })
        .unwrap();

        let tags = resolve(&db, "+15551234567", "u1", "another plain one", 11_000).unwrap();
        assert_eq!(tags, vec![UNTAGGED]);
    }
}
