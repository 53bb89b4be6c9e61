use anyhow::{Result, anyhow};

use crate::api::routes::conversations::db::{find_conversation_by_id, update_summary};
use crate::chat::ResponseStreamCoordinator;
use crate::core::AppConfig;
use crate::openai::OpenAiBackend;

pub async fn run(config: &AppConfig, conversation_id: &str, max_length: usize) -> Result<()> {
    let db = super::open_db(config).await?;
    find_conversation_by_id(&db, conversation_id)
        .await?
        .ok_or(anyhow!("Conversation {} not found", conversation_id))?;

    let backend = OpenAiBackend::new(config);
    let summary =
        ResponseStreamCoordinator::summarize(&db, &backend, conversation_id, max_length).await;
    update_summary(&db, conversation_id, &summary).await?;
    println!("{}", summary);
    Ok(())
}
