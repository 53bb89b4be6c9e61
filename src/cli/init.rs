use std::fs;

use anyhow::Result;

use crate::core::AppConfig;

pub async fn run(config: &AppConfig) -> Result<()> {
    println!("Initializing db...");
    fs::create_dir_all(&config.storage_path)?;
    super::open_db(config).await?;
    println!("Finished initializing db at {}", config.db_path);
    Ok(())
}
