use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id               TEXT PRIMARY KEY,
            phone            TEXT NOT NULL UNIQUE,
            display_name     TEXT,
            onboarding_step  TEXT NOT NULL DEFAULT 'welcome_sent',
            onboarded_at     INTEGER,
            created_at       INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS messages (
            id                   TEXT PRIMARY KEY,
            user_id              TEXT NOT NULL REFERENCES users(id),
            sender_phone         TEXT NOT NULL,
            content              TEXT NOT NULL,
            media_url            TEXT,
            media_type           TEXT,
            provider_message_id  TEXT,
            created_at           INTEGER NOT NULL
        );

        -- Idempotent redelivery: a provider id is stored at most once.
        CREATE UNIQUE INDEX IF NOT EXISTS idx_messages_provider_id
            ON messages(provider_message_id)
            WHERE provider_message_id IS NOT NULL;

        -- Every provider id ever accepted, mapped to the row it settled
        -- into. A merge folds a delivery into an earlier row; its id still
        -- has to resolve there on retry.
        CREATE TABLE IF NOT EXISTS message_provider_ids (
            provider_id  TEXT PRIMARY KEY,
            message_id   TEXT NOT NULL REFERENCES messages(id)
        );

        CREATE INDEX IF NOT EXISTS idx_messages_sender_recent
            ON messages(user_id, sender_phone, created_at);

        CREATE TABLE IF NOT EXISTS message_tags (
            message_id  TEXT NOT NULL REFERENCES messages(id),
            tag         TEXT NOT NULL,
            position    INTEGER NOT NULL,
            PRIMARY KEY (message_id, tag)
        );

        CREATE INDEX IF NOT EXISTS idx_message_tags_tag
            ON message_tags(tag);

        CREATE TABLE IF NOT EXISTS boards (
            id          TEXT PRIMARY KEY,
            name        TEXT NOT NULL UNIQUE,
            owner_id    TEXT NOT NULL REFERENCES users(id),
            created_at  INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS board_members (
            board_id    TEXT NOT NULL REFERENCES boards(id),
            user_id     TEXT NOT NULL REFERENCES users(id),
            role        TEXT NOT NULL DEFAULT 'member',
            joined_at   INTEGER NOT NULL,
            PRIMARY KEY (board_id, user_id)
        );
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
