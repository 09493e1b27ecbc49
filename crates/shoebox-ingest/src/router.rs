//! Board router: per tag, decide private vs shared and who gets notified.

use std::collections::HashSet;

use anyhow::Result;
use shoebox_db::Database;
use shoebox_types::models::UNTAGGED;
use tracing::warn;
use uuid::Uuid;

/// Compute the fan-out set for a message: the union of member sets across
/// all shared tags, plus the owner.
///
/// A tag is shared only when a board with that exact name exists AND the
/// owner belongs to it. A lexical collision with a board the owner is not a
/// member of keeps the tag private — no cross-user notification, and no
/// redirect of the owner's private listing.
pub fn notification_targets(db: &Database, owner: Uuid, tags: &[String]) -> Result<Vec<Uuid>> {
    let owner_key = owner.to_string();
    let mut targets: HashSet<Uuid> = HashSet::new();
    targets.insert(owner);

    for tag in tags {
        if tag == UNTAGGED {
            continue;
        }
        let Some(board) = db.find_board_by_name(tag)? else {
            continue;
        };
        if !db.is_member(&board.id, &owner_key)? {
            continue;
        }
        for member in db.members_of(&board.id)? {
            match member.parse::<Uuid>() {
                Ok(id) => {
                    targets.insert(id);
                }
                Err(e) => warn!("corrupt member id '{}' on board '{}': {}", member, board.name, e),
            }
        }
    }

    Ok(targets.into_iter().collect())
}
