use anyhow::{Error, Result};
use clap::{Parser, Subcommand};
use tokio_rusqlite::Connection;

pub mod chat;
pub mod init;
pub mod persona;
pub mod serve;
pub mod summarize;

use crate::core::AppConfig;
use crate::core::db::{async_db, initialize_db};

#[derive(Subcommand)]
enum Command {
    /// Create or migrate the db schema
    Init {},
    /// Run the API server
    Serve {
        /// Set the server host address
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Set the server port
        #[arg(long, default_value = "2222")]
        port: String,
    },
    /// Create a persona and print its ID
    Persona {
        #[arg(long)]
        name: String,
        #[arg(long)]
        system_prompt: String,
        #[arg(long, default_value = "")]
        greeting: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// Chat with a persona in the terminal
    Chat {
        /// ID of the persona to talk to
        #[arg(long)]
        persona: String,
        /// Extra instructions for this conversation only
        #[arg(long)]
        session_prompt: Option<String>,
        /// Resume an existing conversation instead of starting one
        #[arg(long)]
        conversation: Option<String>,
    },
    /// Summarize a conversation
    Summarize {
        #[arg(long)]
        conversation: String,
        #[arg(long, default_value = "100")]
        max_length: usize,
    },
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

/// Open the db and make sure the schema exists.
async fn open_db(config: &AppConfig) -> Result<Connection, Error> {
    let db = async_db(&config.db_path).await?;
    db.call(|conn| {
        initialize_db(conn)?;
        Ok(())
    })
    .await?;
    Ok(db)
}

pub async fn run() -> Result<()> {
    let args = Cli::parse();
    let config = AppConfig::default();

    // Handle each sub command
    match args.command {
        Some(Command::Init {}) => {
            init::run(&config).await?;
        }
        Some(Command::Serve { host, port }) => {
            serve::run(host, port, config).await?;
        }
        Some(Command::Persona {
            name,
            system_prompt,
            greeting,
            description,
        }) => {
            persona::run(&config, &name, &system_prompt, &greeting, description.as_deref())
                .await?;
        }
        Some(Command::Chat {
            persona,
            session_prompt,
            conversation,
        }) => {
            chat::run(config, &persona, session_prompt, conversation).await?;
        }
        Some(Command::Summarize {
            conversation,
            max_length,
        }) => {
            summarize::run(&config, &conversation, max_length).await?;
        }
        None => {}
    }

    Ok(())
}
