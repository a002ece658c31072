//! Room directory: membership, host, settings and lobby lifecycle.
//!
//! The engine only reads from the directory (plus marking a room in-game
//! and deleting it). The lobby operations on `InMemoryRoomDirectory` are
//! what the gateway uses before a game exists.

use crate::error::{GameError, GameResult};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::info;
use rand::Rng;
use shared::{PlayerId, RoomId, MIN_PLAYERS};
use std::collections::HashMap;
use std::time::Duration;

pub const ROOM_CODE_LEN: usize = 6;
pub const MAX_ROOM_MEMBERS: usize = 12;
const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomStatus {
    Lobby,
    StartingGame,
    InGame,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSettings {
    pub total_rounds: u32,
    pub category_id: String,
    pub drawing_time: Duration,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            total_rounds: 3,
            category_id: "animals".to_string(),
            drawing_time: Duration::from_secs(80),
        }
    }
}

#[async_trait]
pub trait RoomDirectory: Send + Sync {
    async fn status(&self, room_id: &str) -> GameResult<RoomStatus>;

    /// Stable member order used to seed turn rotation.
    async fn ordered_players(&self, room_id: &str) -> GameResult<Vec<PlayerId>>;

    async fn settings(&self, room_id: &str) -> GameResult<RoomSettings>;

    async fn host(&self, room_id: &str) -> GameResult<PlayerId>;

    async fn display_names(&self, room_id: &str) -> GameResult<HashMap<PlayerId, String>>;

    async fn mark_in_game(&self, room_id: &str) -> GameResult<()>;

    /// Returns true if the room existed.
    async fn delete_room(&self, room_id: &str) -> GameResult<bool>;
}

#[derive(Debug, Clone)]
struct Room {
    host: PlayerId,
    members: Vec<(PlayerId, String)>,
    settings: RoomSettings,
    status: RoomStatus,
}

#[derive(Debug, Default)]
pub struct InMemoryRoomDirectory {
    rooms: DashMap<RoomId, Room>,
}

impl InMemoryRoomDirectory {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
        }
    }

    /// Opens a lobby hosted by `host` and returns its code.
    pub fn create_room(&self, host: PlayerId, host_name: &str, settings: RoomSettings) -> RoomId {
        let room = Room {
            host,
            members: vec![(host, host_name.to_string())],
            settings,
            status: RoomStatus::Lobby,
        };

        loop {
            let code = generate_room_code();
            if let Entry::Vacant(slot) = self.rooms.entry(code.clone()) {
                slot.insert(room);
                info!("Room {} created by player {}", code, host);
                return code;
            }
        }
    }

    /// Adds a member to a room that is still in its lobby. Joining twice is
    /// a no-op.
    pub fn join_room(&self, room_id: &str, player_id: PlayerId, name: &str) -> GameResult<()> {
        let mut room = self
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| GameError::room_not_found(room_id))?;

        if room.members.iter().any(|(id, _)| *id == player_id) {
            return Ok(());
        }
        if room.status != RoomStatus::Lobby {
            return Err(GameError::invalid_state(format!(
                "room {room_id} is no longer accepting players"
            )));
        }
        if room.members.len() >= MAX_ROOM_MEMBERS {
            return Err(GameError::invalid_state(format!("room {room_id} is full")));
        }

        room.members.push((player_id, name.to_string()));
        info!("Player {} joined room {}", player_id, room_id);
        Ok(())
    }

    /// Removes a lobby member. Returns false if they were not a member.
    pub fn leave_room(&self, room_id: &str, player_id: PlayerId) -> GameResult<bool> {
        let mut room = self
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| GameError::room_not_found(room_id))?;

        let before = room.members.len();
        room.members.retain(|(id, _)| *id != player_id);
        Ok(room.members.len() != before)
    }

    /// Lobby -> StartingGame, requested by the host with enough members.
    pub fn begin_start(&self, room_id: &str, requester: PlayerId) -> GameResult<()> {
        let mut room = self
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| GameError::room_not_found(room_id))?;

        if room.host != requester {
            return Err(GameError::invalid_state("only the host can start the game"));
        }
        if room.status != RoomStatus::Lobby {
            return Err(GameError::invalid_state(format!(
                "room {room_id} has already started"
            )));
        }
        if room.members.len() < MIN_PLAYERS {
            return Err(GameError::InsufficientPlayers {
                required: MIN_PLAYERS,
                actual: room.members.len(),
            });
        }

        room.status = RoomStatus::StartingGame;
        Ok(())
    }

    /// StartingGame -> Lobby, used when game creation fails.
    pub fn abort_start(&self, room_id: &str) {
        if let Some(mut room) = self.rooms.get_mut(room_id) {
            if room.status == RoomStatus::StartingGame {
                room.status = RoomStatus::Lobby;
            }
        }
    }

    pub fn is_member(&self, room_id: &str, player_id: PlayerId) -> bool {
        self.rooms
            .get(room_id)
            .map(|room| room.members.iter().any(|(id, _)| *id == player_id))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    fn with_room<T>(&self, room_id: &str, f: impl FnOnce(&Room) -> T) -> GameResult<T> {
        self.rooms
            .get(room_id)
            .map(|room| f(&room))
            .ok_or_else(|| GameError::room_not_found(room_id))
    }
}

#[async_trait]
impl RoomDirectory for InMemoryRoomDirectory {
    async fn status(&self, room_id: &str) -> GameResult<RoomStatus> {
        self.with_room(room_id, |room| room.status)
    }

    async fn ordered_players(&self, room_id: &str) -> GameResult<Vec<PlayerId>> {
        self.with_room(room_id, |room| room.members.iter().map(|(id, _)| *id).collect())
    }

    async fn settings(&self, room_id: &str) -> GameResult<RoomSettings> {
        self.with_room(room_id, |room| room.settings.clone())
    }

    async fn host(&self, room_id: &str) -> GameResult<PlayerId> {
        self.with_room(room_id, |room| room.host)
    }

    async fn display_names(&self, room_id: &str) -> GameResult<HashMap<PlayerId, String>> {
        self.with_room(room_id, |room| room.members.iter().cloned().collect())
    }

    async fn mark_in_game(&self, room_id: &str) -> GameResult<()> {
        let mut room = self
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| GameError::room_not_found(room_id))?;
        room.status = RoomStatus::InGame;
        Ok(())
    }

    async fn delete_room(&self, room_id: &str) -> GameResult<bool> {
        let removed = self.rooms.remove(room_id).is_some();
        if removed {
            info!("Room {} deleted", room_id);
        }
        Ok(removed)
    }
}

fn generate_room_code() -> RoomId {
    let mut rng = rand::thread_rng();
    (0..ROOM_CODE_LEN)
        .map(|_| ROOM_CODE_ALPHABET[rng.gen_range(0..ROOM_CODE_ALPHABET.len())] as char)
        .collect()
}
