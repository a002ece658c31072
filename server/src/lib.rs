//! # Sketch Server Library
//!
//! Authoritative server for a turn-based drawing and guessing game. One
//! player draws a secret word while the others race to guess it; earlier
//! correct guesses score more, and the drawer role rotates each turn.
//!
//! ## Core Responsibilities
//!
//! ### Game Session Engine
//! `engine::GameEngine` owns every rule: who draws, what is shown to whom,
//! how guesses are graded and scored, and when turns, rounds and games
//! end. It is the only code that mutates a `session::GameSession`.
//!
//! ### Per-Room Consistency
//! Operations on the same room are serialized through a per-room mutex
//! (`locks::RoomLocks`), while different rooms proceed in parallel. A
//! turn's ending is claimed by flipping its phase under the lock, so a
//! correct guess and an expiring timer can race without double-advancing.
//!
//! ### Collaborators
//! The engine depends on three async traits so storage and content can be
//! swapped without touching game rules:
//! - `store::GameSessionStore` persists sessions by room id
//! - `directory::RoomDirectory` answers membership, host and settings
//! - `words::WordSource` picks random words per category
//!
//! In-memory implementations of each ship with the crate.
//!
//! ## Module Organization
//!
//! - `session`: session state and its pure transitions
//! - `engine`: the operations clients and timers trigger
//! - `gateway`: maps player actions to engine calls and outcomes to packets,
//!   and runs the per-turn drawing timers
//! - `client_manager`: address, name and room tracking per player
//! - `network`: UDP transport and the server event loop
//! - `config`: command line and environment settings
//! - `error`: the domain error type
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use clap::Parser;
//! use server::config::ServerConfig;
//! use server::directory::InMemoryRoomDirectory;
//! use server::engine::GameEngine;
//! use server::network::Server;
//! use server::store::InMemorySessionStore;
//! use server::words::InMemoryWordSource;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let config = ServerConfig::parse();
//!     let rooms = Arc::new(InMemoryRoomDirectory::new());
//!     let engine = Arc::new(GameEngine::new(
//!         Arc::new(InMemorySessionStore::new()),
//!         rooms.clone(),
//!         Arc::new(InMemoryWordSource::with_defaults()),
//!     ));
//!
//!     let mut server = Server::new(&config, engine, rooms).await?;
//!     server.run().await
//! }
//! ```
//!
//! The server runs three background tasks next to its main loop:
//! - **Network Receiver**: decodes incoming datagrams
//! - **Network Sender**: resolves player and room targets to addresses
//! - **Timeout Checker**: drops silent clients and reports them as leaving

pub mod client_manager;
pub mod config;
pub mod directory;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod locks;
pub mod network;
pub mod session;
pub mod store;
pub mod words;
