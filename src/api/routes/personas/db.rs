use anyhow::{Error, Result};
use chrono::Utc;
use rusqlite::OptionalExtension;
use tokio_rusqlite::{Connection, params};

use super::public::Persona;
use crate::api::public::Page;
use crate::core::generate_id;

fn row_to_persona(row: &rusqlite::Row) -> rusqlite::Result<Persona> {
    Ok(Persona {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        system_prompt: row.get(3)?,
        greeting: row.get(4)?,
        created_at: row.get(5)?,
    })
}

pub async fn insert_persona(
    db: &Connection,
    name: &str,
    description: &str,
    system_prompt: &str,
    greeting: &str,
) -> Result<Persona, Error> {
    let persona = Persona {
        id: generate_id(),
        name: name.to_owned(),
        description: description.to_owned(),
        system_prompt: system_prompt.to_owned(),
        greeting: greeting.to_owned(),
        created_at: Utc::now(),
    };
    let row = persona.clone();
    db.call(move |conn| {
        let mut stmt = conn.prepare(
            "INSERT INTO persona (id, name, description, system_prompt, greeting, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )?;
        stmt.execute(params![
            row.id,
            row.name,
            row.description,
            row.system_prompt,
            row.greeting,
            row.created_at
        ])?;
        Ok(())
    })
    .await?;

    Ok(persona)
}

pub async fn find_persona_by_id(db: &Connection, id: &str) -> Result<Option<Persona>, Error> {
    let p_id = id.to_owned();
    let persona = db
        .call(move |conn| {
            let persona = conn
                .query_row(
                    "SELECT id, name, description, system_prompt, greeting, created_at
                     FROM persona WHERE id = ?",
                    [p_id],
                    row_to_persona,
                )
                .optional()?;
            Ok(persona)
        })
        .await?;
    Ok(persona)
}

/// Newest personas first.
pub async fn persona_page(db: &Connection, page: Page) -> Result<(Vec<Persona>, i64), Error> {
    let result = db
        .call(move |conn| {
            let total: i64 = conn.query_row("SELECT COUNT(*) FROM persona", [], |row| row.get(0))?;
            let mut stmt = conn.prepare(
                "SELECT id, name, description, system_prompt, greeting, created_at
                 FROM persona
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ? OFFSET ?",
            )?;
            let personas = stmt
                .query_map(params![page.limit as i64, page.offset()], row_to_persona)?
                .collect::<Result<Vec<Persona>, _>>()?;
            Ok((personas, total))
        })
        .await?;
    Ok(result)
}

/// Overwrite the editable fields of an existing persona.
pub async fn update_persona(db: &Connection, persona: &Persona) -> Result<(), Error> {
    let row = persona.clone();
    db.call(move |conn| {
        conn.execute(
            "UPDATE persona SET name = ?, description = ?, system_prompt = ?, greeting = ?
             WHERE id = ?",
            params![
                row.name,
                row.description,
                row.system_prompt,
                row.greeting,
                row.id
            ],
        )?;
        Ok(())
    })
    .await?;
    Ok(())
}

/// Returns false if there was no such persona.
pub async fn delete_persona(db: &Connection, id: &str) -> Result<bool, Error> {
    let p_id = id.to_owned();
    let deleted = db
        .call(move |conn| {
            let deleted = conn.execute("DELETE FROM persona WHERE id = ?", [p_id])?;
            Ok(deleted)
        })
        .await?;
    Ok(deleted > 0)
}
