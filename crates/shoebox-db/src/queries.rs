use crate::Database;
use crate::models::{BoardRow, MessageRow, UserRow};
use anyhow::Result;
use rusqlite::Connection;

/// Parameters for a message insert. Tags are written in the same
/// transaction; an empty tag list is rejected at this layer too.
pub struct NewMessage<'a> {
    pub id: &'a str,
    pub user_id: &'a str,
    pub sender_phone: &'a str,
    pub content: &'a str,
    pub tags: &'a [String],
    pub media_url: Option<&'a str>,
    pub media_type: Option<&'a str>,
    pub provider_message_id: Option<&'a str>,
    pub created_at: i64,
}

impl Database {
    // -- Users --

    pub fn create_user(&self, id: &str, phone: &str, created_at: i64) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, phone, onboarding_step, created_at)
                 VALUES (?1, ?2, 'welcome_sent', ?3)",
                rusqlite::params![id, phone, created_at],
            )?;
            Ok(())
        })
    }

    pub fn find_user_by_phone(&self, phone: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            query_user(conn, "SELECT id, phone, display_name, onboarding_step, onboarded_at, created_at FROM users WHERE phone = ?1", phone)
        })
    }

    pub fn find_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            query_user(conn, "SELECT id, phone, display_name, onboarding_step, onboarded_at, created_at FROM users WHERE id = ?1", id)
        })
    }

    pub fn update_onboarding_step(
        &self,
        user_id: &str,
        step: &str,
        onboarded_at: Option<i64>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET onboarding_step = ?2,
                        onboarded_at = COALESCE(?3, onboarded_at)
                 WHERE id = ?1",
                rusqlite::params![user_id, step, onboarded_at],
            )?;
            Ok(())
        })
    }

    // -- Messages --

    /// Insert a message and its tags in one transaction.
    ///
    /// Returns `false` when a row with the same `provider_message_id`
    /// already exists (the unique index absorbs redelivery races); nothing
    /// is written in that case.
    pub fn insert_message(&self, msg: &NewMessage<'_>) -> Result<bool> {
        anyhow::ensure!(!msg.tags.is_empty(), "message tag set must not be empty");

        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;

            let inserted = tx.execute(
                "INSERT INTO messages
                    (id, user_id, sender_phone, content, media_url, media_type,
                     provider_message_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT (provider_message_id)
                     WHERE provider_message_id IS NOT NULL
                     DO NOTHING",
                rusqlite::params![
                    msg.id,
                    msg.user_id,
                    msg.sender_phone,
                    msg.content,
                    msg.media_url,
                    msg.media_type,
                    msg.provider_message_id,
                    msg.created_at,
                ],
            )?;

            if inserted == 0 {
                tx.rollback()?;
                return Ok(false);
            }

            for (position, tag) in msg.tags.iter().enumerate() {
                tx.execute(
                    "INSERT OR IGNORE INTO message_tags (message_id, tag, position)
                     VALUES (?1, ?2, ?3)",
                    rusqlite::params![msg.id, tag, position as i64],
                )?;
            }

            if let Some(provider_id) = msg.provider_message_id {
                tx.execute(
                    "INSERT OR IGNORE INTO message_provider_ids (provider_id, message_id)
                     VALUES (?1, ?2)",
                    rusqlite::params![provider_id, msg.id],
                )?;
            }

            tx.commit()?;
            Ok(true)
        })
    }

    /// Resolve a provider id to its row, including ids that were folded into
    /// an earlier row by a merge.
    pub fn find_message_by_provider_id(&self, provider_id: &str) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT m.id, m.user_id, m.sender_phone, m.content, m.media_url,
                        m.media_type, m.provider_message_id, m.created_at
                 FROM messages m
                 JOIN message_provider_ids p ON p.message_id = m.id
                 WHERE p.provider_id = ?1",
            )?;
            stmt.query_row([provider_id], map_message_row).optional()
        })
    }

    pub fn find_message_by_id(&self, id: &str) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, sender_phone, content, media_url, media_type,
                        provider_message_id, created_at
                 FROM messages WHERE id = ?1",
            )?;
            stmt.query_row([id], map_message_row).optional()
        })
    }

    /// Most recent message from (sender, user) created at or after `since`.
    pub fn find_recent_message(
        &self,
        sender_phone: &str,
        user_id: &str,
        since: i64,
    ) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, sender_phone, content, media_url, media_type,
                        provider_message_id, created_at
                 FROM messages
                 WHERE sender_phone = ?1 AND user_id = ?2 AND created_at >= ?3
                 ORDER BY created_at DESC
                 LIMIT 1",
            )?;
            stmt.query_row(rusqlite::params![sender_phone, user_id, since], map_message_row)
                .optional()
        })
    }

    /// Most recent message from (sender, user) since `since` that carries at
    /// least one tag other than the sentinel. Used by the inheritance
    /// resolver and the post-processing corrector.
    pub fn find_recent_tagged_message(
        &self,
        sender_phone: &str,
        user_id: &str,
        since: i64,
        sentinel: &str,
    ) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT m.id, m.user_id, m.sender_phone, m.content, m.media_url,
                        m.media_type, m.provider_message_id, m.created_at
                 FROM messages m
                 WHERE m.sender_phone = ?1 AND m.user_id = ?2 AND m.created_at >= ?3
                   AND EXISTS (SELECT 1 FROM message_tags t
                               WHERE t.message_id = m.id AND t.tag != ?4)
                 ORDER BY m.created_at DESC
                 LIMIT 1",
            )?;
            stmt.query_row(
                rusqlite::params![sender_phone, user_id, since, sentinel],
                map_message_row,
            )
            .optional()
        })
    }

    /// Merge path: append `extra` onto an existing row's content. The
    /// merged delivery's provider id is recorded against the row in the same
    /// transaction so a retry of that id resolves here instead of merging
    /// again.
    pub fn append_message_content(
        &self,
        id: &str,
        extra: &str,
        provider_id: Option<&str>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            tx.execute(
                "UPDATE messages SET content = content || ' ' || ?2 WHERE id = ?1",
                rusqlite::params![id, extra],
            )?;
            if let Some(provider_id) = provider_id {
                tx.execute(
                    "INSERT OR IGNORE INTO message_provider_ids (provider_id, message_id)
                     VALUES (?1, ?2)",
                    rusqlite::params![provider_id, id],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
    }

    pub fn tags_of(&self, message_id: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| query_tags(conn, message_id))
    }

    /// Replace a message's tag set. Used by the post-processing corrector
    /// when a late donor for inheritance appears.
    pub fn replace_tags(&self, message_id: &str, tags: &[String]) -> Result<()> {
        anyhow::ensure!(!tags.is_empty(), "message tag set must not be empty");

        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            tx.execute(
                "DELETE FROM message_tags WHERE message_id = ?1",
                [message_id],
            )?;
            for (position, tag) in tags.iter().enumerate() {
                tx.execute(
                    "INSERT OR IGNORE INTO message_tags (message_id, tag, position)
                     VALUES (?1, ?2, ?3)",
                    rusqlite::params![message_id, tag, position as i64],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
    }

    /// Private-tag listing: strictly the user's own messages with this tag.
    /// A lexical collision with a shared board name never redirects here.
    pub fn messages_for_tag(
        &self,
        user_id: &str,
        tag: &str,
        limit: u32,
    ) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT m.id, m.user_id, m.sender_phone, m.content, m.media_url,
                        m.media_type, m.provider_message_id, m.created_at
                 FROM messages m
                 JOIN message_tags t ON t.message_id = m.id
                 WHERE m.user_id = ?1 AND t.tag = ?2
                 ORDER BY m.created_at DESC
                 LIMIT ?3",
            )?;
            let rows = stmt
                .query_map(rusqlite::params![user_id, tag, limit], map_message_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Shared-board listing: messages tagged with the board name authored by
    /// current members.
    pub fn messages_for_board(&self, board_id: &str, name: &str, limit: u32) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT m.id, m.user_id, m.sender_phone, m.content, m.media_url,
                        m.media_type, m.provider_message_id, m.created_at
                 FROM messages m
                 JOIN message_tags t ON t.message_id = m.id
                 JOIN board_members b ON b.user_id = m.user_id
                 WHERE b.board_id = ?1 AND t.tag = ?2
                 ORDER BY m.created_at DESC
                 LIMIT ?3",
            )?;
            let rows = stmt
                .query_map(rusqlite::params![board_id, name, limit], map_message_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Boards --

    pub fn create_board(&self, id: &str, name: &str, owner_id: &str, created_at: i64) -> Result<()> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            tx.execute(
                "INSERT INTO boards (id, name, owner_id, created_at) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![id, name, owner_id, created_at],
            )?;
            tx.execute(
                "INSERT INTO board_members (board_id, user_id, role, joined_at)
                 VALUES (?1, ?2, 'owner', ?3)",
                rusqlite::params![id, owner_id, created_at],
            )?;
            tx.commit()?;
            Ok(())
        })
    }

    pub fn add_member(&self, board_id: &str, user_id: &str, joined_at: i64) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO board_members (board_id, user_id, role, joined_at)
                 VALUES (?1, ?2, 'member', ?3)",
                rusqlite::params![board_id, user_id, joined_at],
            )?;
            Ok(())
        })
    }

    pub fn find_board_by_name(&self, name: &str) -> Result<Option<BoardRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT id, name, owner_id, created_at FROM boards WHERE name = ?1")?;
            stmt.query_row([name], map_board_row).optional()
        })
    }

    pub fn is_member(&self, board_id: &str, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM board_members WHERE board_id = ?1 AND user_id = ?2",
                    [board_id, user_id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    pub fn members_of(&self, board_id: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT user_id FROM board_members WHERE board_id = ?1")?;
            let rows = stmt
                .query_map([board_id], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;
            Ok(rows)
        })
    }

    pub fn boards_for_user(&self, user_id: &str) -> Result<Vec<BoardRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT b.id, b.name, b.owner_id, b.created_at
                 FROM boards b
                 JOIN board_members m ON m.board_id = b.id
                 WHERE m.user_id = ?1
                 ORDER BY b.created_at",
            )?;
            let rows = stmt
                .query_map([user_id], map_board_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn query_user(conn: &Connection, sql: &str, key: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(sql)?;
    stmt.query_row([key], |row| {
        Ok(UserRow {
            id: row.get(0)?,
            phone: row.get(1)?,
            display_name: row.get(2)?,
            onboarding_step: row.get(3)?,
            onboarded_at: row.get(4)?,
            created_at: row.get(5)?,
        })
    })
    .optional()
}

fn query_tags(conn: &Connection, message_id: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT tag FROM message_tags WHERE message_id = ?1 ORDER BY position",
    )?;
    let tags = stmt
        .query_map([message_id], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(tags)
}

fn map_message_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        sender_phone: row.get(2)?,
        content: row.get(3)?,
        media_url: row.get(4)?,
        media_type: row.get(5)?,
        provider_message_id: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn map_board_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<BoardRow> {
    Ok(BoardRow {
        id: row.get(0)?,
        name: row.get(1)?,
        owner_id: row.get(2)?,
        created_at: row.get(3)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
