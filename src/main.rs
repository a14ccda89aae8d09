mod api;
mod config;
mod document;
mod server;
mod store;
mod tools;
mod upload;

use std::path::Path;

use anyhow::Result;

use api::ApiClient;
use config::Config;
use server::ToolServer;
use store::NoteStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    pretty_env_logger::init();
    log::info!("Starting inkpost tool server...");

    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Load configuration
    let config = Config::from_file("config.toml")?;
    log::info!("Configuration loaded successfully");

    let api = ApiClient::new(config.api.base_url.clone(), config.api.api_key.clone());
    let store = NoteStore::open(Path::new(&config.storage.db_path)).await?;
    log::info!("Note store ready at {}", config.storage.db_path);

    // Serve requests over stdin/stdout until the host closes the pipe
    ToolServer::new(api, store).run().await?;

    log::info!("Server stopped");
    Ok(())
}
