use anyhow::Result;
use persona_chat::cli;

#[tokio::main]
async fn main() -> Result<()> {
    cli::run().await
}
