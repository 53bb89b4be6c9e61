use anyhow::{Error, Result};
use tokio_rusqlite::Connection;

/// Open (or create) the SQLite database at `db_path`.
pub async fn async_db(db_path: &str) -> Result<Connection, Error> {
    let db = Connection::open(db_path).await?;
    db.call(|conn| {
        conn.pragma_update(None, "foreign_keys", true)?;
        Ok(())
    })
    .await?;
    Ok(db)
}

/// Create the schema. Safe to run repeatedly.
pub fn initialize_db(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS persona (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            system_prompt TEXT NOT NULL,
            greeting TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS conversation (
            id TEXT PRIMARY KEY,
            persona_id TEXT NOT NULL REFERENCES persona(id),
            summary TEXT,
            session_prompt TEXT,
            last_message_at TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_conversation_persona
            ON conversation(persona_id);

        -- Rows are only ever appended, so rowid order is conversation order
        CREATE TABLE IF NOT EXISTS message (
            id TEXT PRIMARY KEY,
            conversation_id TEXT NOT NULL REFERENCES conversation(id) ON DELETE CASCADE,
            role TEXT NOT NULL CHECK (role IN ('user', 'assistant', 'system')),
            content TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_message_conversation
            ON message(conversation_id);
        "#,
    )
}
