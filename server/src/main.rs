use clap::Parser;
use log::{error, info};
use server::config::ServerConfig;
use server::directory::InMemoryRoomDirectory;
use server::engine::GameEngine;
use server::network::{NetResult, Server, ServerMessage};
use server::store::InMemorySessionStore;
use server::words::InMemoryWordSource;
use std::sync::Arc;

fn load_words(config: &ServerConfig) -> NetResult<InMemoryWordSource> {
    match &config.word_list {
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            let words = InMemoryWordSource::from_lines(&text);
            info!(
                "Loaded categories {:?} from {}",
                words.categories(),
                path.display()
            );
            Ok(words)
        }
        None => Ok(InMemoryWordSource::with_defaults()),
    }
}

#[tokio::main]
async fn main() -> NetResult<()> {
    env_logger::init();

    let config = ServerConfig::parse();
    info!("Starting sketch server with {:?}", config);

    let words = Arc::new(load_words(&config)?);
    let rooms = Arc::new(InMemoryRoomDirectory::new());
    let engine = Arc::new(GameEngine::new(
        Arc::new(InMemorySessionStore::new()),
        rooms.clone(),
        words,
    ));

    let mut server = Server::new(&config, engine, rooms).await?;

    let shutdown = server.shutdown_handle();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C, shutting down");
                let _ = shutdown.send(ServerMessage::Shutdown);
            }
            Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
        }
    });

    let result = server.run().await;
    if let Err(e) = &result {
        error!("Server stopped with error: {}", e);
    }
    result
}
