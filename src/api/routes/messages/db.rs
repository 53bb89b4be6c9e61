use anyhow::{Error, Result};
use rusqlite::OptionalExtension;
use tokio_rusqlite::Connection;

/// Delete a single message. Returns the ID of the conversation it
/// belonged to, or `None` if there was no such message.
pub async fn delete_message(db: &Connection, id: &str) -> Result<Option<String>, Error> {
    let m_id = id.to_owned();
    let conversation_id = db
        .call(move |conn| {
            let tx = conn.transaction()?;
            let conversation_id: Option<String> = tx
                .query_row(
                    "SELECT conversation_id FROM message WHERE id = ?",
                    [&m_id],
                    |row| row.get(0),
                )
                .optional()?;
            if conversation_id.is_some() {
                tx.execute("DELETE FROM message WHERE id = ?", [&m_id])?;
            }
            tx.commit()?;
            Ok(conversation_id)
        })
        .await?;
    Ok(conversation_id)
}
