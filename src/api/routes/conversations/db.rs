use anyhow::{Error, Result, bail};
use chrono::Utc;
use rusqlite::OptionalExtension;
use tokio_rusqlite::{Connection, params};

use super::public::Conversation;
use crate::api::public::Page;
use crate::api::routes::personas::public::Persona;
use crate::chat::db::row_to_message;
use crate::chat::{Persistence, Role, StoredMessage};
use crate::core::generate_id;

fn row_to_conversation(row: &rusqlite::Row) -> rusqlite::Result<Conversation> {
    Ok(Conversation {
        id: row.get(0)?,
        persona_id: row.get(1)?,
        summary: row.get(2)?,
        session_prompt: row.get(3)?,
        last_message_at: row.get(4)?,
        created_at: row.get(5)?,
    })
}

pub async fn insert_conversation(
    db: &Connection,
    persona_id: &str,
    summary: Option<&str>,
    session_prompt: Option<&str>,
) -> Result<Conversation, Error> {
    let now = Utc::now();
    let conversation = Conversation {
        id: generate_id(),
        persona_id: persona_id.to_owned(),
        summary: summary.map(String::from),
        session_prompt: session_prompt.map(String::from),
        last_message_at: now,
        created_at: now,
    };
    let row = conversation.clone();
    db.call(move |conn| {
        let mut stmt = conn.prepare(
            "INSERT INTO conversation (id, persona_id, summary, session_prompt, last_message_at, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )?;
        stmt.execute(params![
            row.id,
            row.persona_id,
            row.summary,
            row.session_prompt,
            row.last_message_at,
            row.created_at
        ])?;
        Ok(())
    })
    .await?;

    Ok(conversation)
}

/// Create a conversation with `persona`. The summary starts out as a
/// title naming the persona and a non-empty greeting is stored as the
/// first assistant message.
pub async fn start_conversation(
    db: &Connection,
    persona: &Persona,
    session_prompt: Option<&str>,
) -> Result<Conversation, Error> {
    let summary = format!("与{}的对话", persona.name);
    let conversation = insert_conversation(db, &persona.id, Some(&summary), session_prompt).await?;

    if !persona.greeting.trim().is_empty() {
        db.append_message(&conversation.id, Role::Assistant, &persona.greeting)
            .await?;
    }

    Ok(conversation)
}

pub async fn find_conversation_by_id(
    db: &Connection,
    id: &str,
) -> Result<Option<Conversation>, Error> {
    let c_id = id.to_owned();
    let conversation = db
        .call(move |conn| {
            let conversation = conn
                .query_row(
                    "SELECT id, persona_id, summary, session_prompt, last_message_at, created_at
                     FROM conversation WHERE id = ?",
                    [c_id],
                    row_to_conversation,
                )
                .optional()?;
            Ok(conversation)
        })
        .await?;
    Ok(conversation)
}

/// Conversations most recently messaged first, optionally only those
/// with one persona.
pub async fn conversation_page(
    db: &Connection,
    persona_id: Option<&str>,
    page: Page,
) -> Result<(Vec<Conversation>, i64), Error> {
    let p_id = persona_id.map(String::from);
    let result = db
        .call(move |conn| {
            let total: i64 = conn.query_row(
                "SELECT COUNT(*) FROM conversation WHERE (?1 IS NULL OR persona_id = ?1)",
                params![p_id],
                |row| row.get(0),
            )?;
            let mut stmt = conn.prepare(
                "SELECT id, persona_id, summary, session_prompt, last_message_at, created_at
                 FROM conversation
                 WHERE (?1 IS NULL OR persona_id = ?1)
                 ORDER BY last_message_at DESC, rowid DESC
                 LIMIT ?2 OFFSET ?3",
            )?;
            let conversations = stmt
                .query_map(
                    params![p_id, page.limit as i64, page.offset()],
                    row_to_conversation,
                )?
                .collect::<Result<Vec<Conversation>, _>>()?;
            Ok((conversations, total))
        })
        .await?;
    Ok(result)
}

pub async fn conversation_count_for_persona(db: &Connection, persona_id: &str) -> Result<i64, Error> {
    let p_id = persona_id.to_owned();
    let count = db
        .call(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM conversation WHERE persona_id = ?",
                [p_id],
                |row| row.get(0),
            )?;
            Ok(count)
        })
        .await?;
    Ok(count)
}

/// Delete a conversation and its messages. Returns false if there was
/// no such conversation.
pub async fn delete_conversation(db: &Connection, id: &str) -> Result<bool, Error> {
    let c_id = id.to_owned();
    let deleted = db
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM message WHERE conversation_id = ?", [&c_id])?;
            let deleted = tx.execute("DELETE FROM conversation WHERE id = ?", [&c_id])?;
            tx.commit()?;
            Ok(deleted)
        })
        .await?;
    Ok(deleted > 0)
}

pub async fn update_summary(db: &Connection, id: &str, summary: &str) -> Result<(), Error> {
    let c_id = id.to_owned();
    let summary = summary.to_owned();
    let updated = db
        .call(move |conn| {
            let result = conn.execute(
                "UPDATE conversation SET summary = ? WHERE id = ?",
                params![summary, c_id],
            )?;
            Ok(result)
        })
        .await?;

    if updated == 0 {
        bail!("Conversation {} not found", id);
    }
    Ok(())
}

pub async fn message_count(db: &Connection, conversation_id: &str) -> Result<i64, Error> {
    let c_id = conversation_id.to_owned();
    let count = db
        .call(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM message WHERE conversation_id = ?",
                [c_id],
                |row| row.get(0),
            )?;
            Ok(count)
        })
        .await?;
    Ok(count)
}

/// One page of a conversation's messages, oldest first.
pub async fn message_page(
    db: &Connection,
    conversation_id: &str,
    page: Page,
) -> Result<Vec<StoredMessage>, Error> {
    let c_id = conversation_id.to_owned();
    let messages = db
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, conversation_id, role, content, created_at
                 FROM message WHERE conversation_id = ?
                 ORDER BY rowid
                 LIMIT ? OFFSET ?",
            )?;
            let rows = stmt
                .query_map(params![c_id, page.limit as i64, page.offset()], row_to_message)?
                .collect::<Result<Vec<StoredMessage>, _>>()?;
            Ok(rows)
        })
        .await?;
    Ok(messages)
}
