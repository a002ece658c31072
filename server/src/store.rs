//! Keyed storage of one `GameSession` per room.
//!
//! The store only guarantees that individual calls are safe under
//! concurrent access. Serializing read-modify-write cycles on a single room
//! is the engine's job (see `locks`).

use crate::error::GameResult;
use crate::session::GameSession;
use async_trait::async_trait;
use dashmap::DashMap;

#[async_trait]
pub trait GameSessionStore: Send + Sync {
    /// Inserts or overwrites the session for `session.room_id()`.
    async fn save(&self, session: GameSession) -> GameResult<()>;

    async fn find_by_id(&self, room_id: &str) -> GameResult<Option<GameSession>>;

    /// Returns true if a session existed and was removed.
    async fn delete_by_id(&self, room_id: &str) -> GameResult<bool>;

    /// Snapshot of every live session.
    async fn get_all(&self) -> GameResult<Vec<GameSession>>;
}

/// Process-local store backed by a sharded concurrent map.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: DashMap<String, GameSession>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[async_trait]
impl GameSessionStore for InMemorySessionStore {
    async fn save(&self, session: GameSession) -> GameResult<()> {
        self.sessions.insert(session.room_id().to_string(), session);
        Ok(())
    }

    async fn find_by_id(&self, room_id: &str) -> GameResult<Option<GameSession>> {
        Ok(self.sessions.get(room_id).map(|entry| entry.value().clone()))
    }

    async fn delete_by_id(&self, room_id: &str) -> GameResult<bool> {
        Ok(self.sessions.remove(room_id).is_some())
    }

    async fn get_all(&self) -> GameResult<Vec<GameSession>> {
        Ok(self
            .sessions
            .iter()
            .map(|entry| entry.value().clone())
            .collect())
    }
}
