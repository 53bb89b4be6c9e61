use anyhow::{Error, Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_rusqlite::{Connection, params};

use super::models::{Role, StoredMessage, Turn};
use crate::core::generate_id;

/// The durable, append-only log of conversation messages.
#[async_trait]
pub trait Persistence: Send + Sync {
    async fn append_message(
        &self,
        conversation_id: &str,
        role: Role,
        content: &str,
    ) -> Result<StoredMessage, Error>;

    async fn update_message_content(&self, message_id: &str, content: &str) -> Result<(), Error>;

    async fn touch_conversation(
        &self,
        conversation_id: &str,
        last_activity: DateTime<Utc>,
    ) -> Result<(), Error>;

    async fn load_history(&self, conversation_id: &str) -> Result<Vec<Turn>, Error>;
}

pub(crate) fn row_to_message(row: &rusqlite::Row) -> rusqlite::Result<StoredMessage> {
    let role: String = row.get(2)?;
    let role = role.parse::<Role>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, e.into())
    })?;
    Ok(StoredMessage {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        role,
        content: row.get(3)?,
        created_at: row.get(4)?,
    })
}

pub async fn insert_message(
    db: &Connection,
    conversation_id: &str,
    role: Role,
    content: &str,
) -> Result<StoredMessage, Error> {
    let msg = StoredMessage {
        id: generate_id(),
        conversation_id: conversation_id.to_owned(),
        role,
        content: content.to_owned(),
        created_at: Utc::now(),
    };
    let row = msg.clone();
    db.call(move |conn| {
        let mut stmt = conn.prepare(
            "INSERT INTO message (id, conversation_id, role, content, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )?;
        let result = stmt.execute(params![
            row.id,
            row.conversation_id,
            row.role.as_str(),
            row.content,
            row.created_at
        ])?;
        Ok(result)
    })
    .await?;

    Ok(msg)
}

pub async fn update_message_content(
    db: &Connection,
    message_id: &str,
    content: &str,
) -> Result<(), Error> {
    let m_id = message_id.to_owned();
    let content = content.to_owned();
    let updated = db
        .call(move |conn| {
            let result = conn.execute(
                "UPDATE message SET content = ? WHERE id = ?",
                params![content, m_id],
            )?;
            Ok(result)
        })
        .await?;

    if updated == 0 {
        bail!("Message {} not found", message_id);
    }
    Ok(())
}

pub async fn touch_conversation(
    db: &Connection,
    conversation_id: &str,
    last_activity: DateTime<Utc>,
) -> Result<(), Error> {
    let c_id = conversation_id.to_owned();
    db.call(move |conn| {
        conn.execute(
            "UPDATE conversation SET last_message_at = ? WHERE id = ?",
            params![last_activity, c_id],
        )?;
        Ok(())
    })
    .await?;
    Ok(())
}

/// All messages of a conversation in the order they were appended.
pub async fn find_messages_by_conversation(
    db: &Connection,
    conversation_id: &str,
) -> Result<Vec<StoredMessage>, Error> {
    let c_id = conversation_id.to_owned();
    let messages = db
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, conversation_id, role, content, created_at
                 FROM message WHERE conversation_id = ? ORDER BY rowid",
            )?;
            let rows = stmt
                .query_map([c_id], row_to_message)?
                .collect::<Result<Vec<StoredMessage>, _>>()?;
            Ok(rows)
        })
        .await?;
    Ok(messages)
}

#[async_trait]
impl Persistence for Connection {
    async fn append_message(
        &self,
        conversation_id: &str,
        role: Role,
        content: &str,
    ) -> Result<StoredMessage, Error> {
        insert_message(self, conversation_id, role, content).await
    }

    async fn update_message_content(&self, message_id: &str, content: &str) -> Result<(), Error> {
        update_message_content(self, message_id, content).await
    }

    async fn touch_conversation(
        &self,
        conversation_id: &str,
        last_activity: DateTime<Utc>,
    ) -> Result<(), Error> {
        touch_conversation(self, conversation_id, last_activity).await
    }

    async fn load_history(&self, conversation_id: &str) -> Result<Vec<Turn>, Error> {
        let messages = find_messages_by_conversation(self, conversation_id).await?;
        Ok(messages.into_iter().map(Turn::from).collect())
    }
}
