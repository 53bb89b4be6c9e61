use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{Result, anyhow, bail};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio::sync::mpsc;

use crate::api::routes::conversations::db::{find_conversation_by_id, start_conversation};
use crate::api::routes::personas::db::find_persona_by_id;
use crate::chat::{
    BoxedBackend, ContextSource, ConversationMemoryStore, CoordinatorBuilder, Persistence,
    StreamEvent,
};
use crate::core::AppConfig;
use crate::openai::OpenAiBackend;

/// Print fragments as they arrive.
async fn print_events(mut rx: mpsc::UnboundedReceiver<StreamEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            StreamEvent::Content { content } => {
                print!("{}", content);
                let _ = io::stdout().flush();
            }
            StreamEvent::MessageEnd { .. } => println!(),
            StreamEvent::Error { message } => println!("\n{}", message),
            _ => {}
        }
    }
}

pub async fn run(
    config: AppConfig,
    persona_id: &str,
    session_prompt: Option<String>,
    conversation_id: Option<String>,
) -> Result<()> {
    // Keep logs out of the way of the conversation
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let db = super::open_db(&config).await?;
    let persona = find_persona_by_id(&db, persona_id)
        .await?
        .ok_or(anyhow!("Persona {} not found", persona_id))?;

    let conversation = match conversation_id {
        Some(id) => {
            let conversation = find_conversation_by_id(&db, &id)
                .await?
                .ok_or(anyhow!("Conversation {} not found", id))?;
            if conversation.persona_id != persona.id {
                bail!(
                    "Conversation {} belongs to persona {}",
                    id,
                    conversation.persona_id
                );
            }
            conversation
        }
        None => {
            let conversation =
                start_conversation(&db, &persona, session_prompt.as_deref()).await?;
            if !persona.greeting.trim().is_empty() {
                println!("{}", persona.greeting);
            }
            conversation
        }
    };
    let session_prompt = session_prompt.or(conversation.session_prompt.clone());
    println!("Conversation {}", conversation.id);

    let backend: BoxedBackend = Arc::new(OpenAiBackend::new(&config));
    let memory = Arc::new(ConversationMemoryStore::new(config.transcript_capacity));
    let persistence: Arc<dyn Persistence> = Arc::new(db);
    let prompt = persona.prompt();

    let mut rl = DefaultEditor::new()?;

    loop {
        let readline = rl.readline(">>> ");
        match readline {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line);

                let (tx, rx) = mpsc::unbounded_channel();
                let coordinator = CoordinatorBuilder::new(
                    Arc::clone(&persistence),
                    Arc::clone(&backend),
                    Arc::clone(&memory),
                    tx,
                )
                .max_context_chars(config.max_context_chars)
                .context_source(ContextSource::Transcript)
                .build();

                tokio::join!(
                    print_events(rx),
                    coordinator.handle_turn(
                        &conversation.id,
                        &prompt,
                        session_prompt.as_deref(),
                        line
                    )
                );
            }
            Err(ReadlineError::Interrupted) => break,
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        }
    }

    Ok(())
}
