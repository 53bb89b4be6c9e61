use anyhow::Result;

use crate::api::routes::personas::db::insert_persona;
use crate::core::AppConfig;

pub async fn run(
    config: &AppConfig,
    name: &str,
    system_prompt: &str,
    greeting: &str,
    description: Option<&str>,
) -> Result<()> {
    let db = super::open_db(config).await?;
    let persona = insert_persona(
        &db,
        name,
        description.unwrap_or_default(),
        system_prompt,
        greeting,
    )
    .await?;
    println!("{}", persona.id);
    Ok(())
}
