//! Transport-level client bookkeeping for the sketch server
//!
//! This module tracks who is on the other end of each UDP address:
//! - Player id assignment and capacity limits
//! - Display name and current room per player
//! - Activity timestamps for timeout detection
//! - A short memory of departed players so a dropped client can resume
//!   within `RESUME_WINDOW`
//!
//! Game state lives in the engine; the client manager only answers
//! "which address is player N" and "who is in room R".

use log::info;
use shared::{PlayerId, RoomId};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// How long a departed player can come back under the same id.
pub const RESUME_WINDOW: Duration = Duration::from_secs(600);

/// Represents a connected client
#[derive(Debug)]
pub struct Client {
    pub id: PlayerId,
    pub addr: SocketAddr,
    pub name: String,
    /// Room the player is currently attached to
    pub room: Option<RoomId>,
    /// Last time we received any packet from this client
    pub last_seen: Instant,
}

impl Client {
    pub fn new(id: PlayerId, addr: SocketAddr, name: String) -> Self {
        Self {
            id,
            addr,
            name,
            room: None,
            last_seen: Instant::now(),
        }
    }

    /// Returns true if nothing has arrived from this client within `timeout`
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Identity kept for a player after their connection goes away
#[derive(Debug, Clone, PartialEq, Eq)]
struct Departed {
    name: String,
    room: Option<RoomId>,
    left_at: Instant,
}

/// A client removed from the roster, with the room it was in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Removed {
    pub player_id: PlayerId,
    pub room: Option<RoomId>,
}

/// Manages all connected clients
///
/// The ClientManager enforces server capacity, maps addresses to players
/// and resolves room broadcasts into address lists for the sender task.
pub struct ClientManager {
    clients: HashMap<PlayerId, Client>,
    departed: HashMap<PlayerId, Departed>,
    next_player_id: PlayerId,
    max_clients: usize,
    timeout: Duration,
    resume_window: Duration,
}

impl ClientManager {
    pub fn new(max_clients: usize, timeout: Duration) -> Self {
        Self {
            clients: HashMap::new(),
            departed: HashMap::new(),
            next_player_id: 1,
            max_clients,
            timeout,
            resume_window: RESUME_WINDOW,
        }
    }

    /// Attempts to add a new client connection
    ///
    /// Returns Some(player_id) if successful, None if the server is full.
    pub fn add_client(&mut self, addr: SocketAddr, name: &str) -> Option<PlayerId> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let player_id = self.next_player_id;
        self.next_player_id += 1;

        self.clients
            .insert(player_id, Client::new(player_id, addr, clean_name(name, player_id)));
        info!("Player {} connected from {}", player_id, addr);
        Some(player_id)
    }

    /// Restores a departed player on a new address
    ///
    /// Returns the room they were in, or None if the id is unknown, still
    /// connected, or the server is full.
    pub fn resume_client(&mut self, player_id: PlayerId, addr: SocketAddr) -> Option<Option<RoomId>> {
        if self.clients.len() >= self.max_clients || self.clients.contains_key(&player_id) {
            return None;
        }
        let departed = self.departed.remove(&player_id)?;

        let mut client = Client::new(player_id, addr, departed.name);
        client.room = departed.room.clone();
        self.clients.insert(player_id, client);
        info!("Player {} resumed from {}", player_id, addr);
        Some(departed.room)
    }

    /// Removes a client, remembering it for a later resume
    pub fn remove_client(&mut self, player_id: PlayerId) -> Option<Removed> {
        let client = self.clients.remove(&player_id)?;
        info!("Player {} disconnected", player_id);

        self.departed.insert(
            player_id,
            Departed {
                name: client.name,
                room: client.room.clone(),
                left_at: Instant::now(),
            },
        );
        Some(Removed {
            player_id,
            room: client.room,
        })
    }

    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<PlayerId> {
        self.clients
            .iter()
            .find(|(_, client)| client.addr == addr)
            .map(|(id, _)| *id)
    }

    pub fn get(&self, player_id: PlayerId) -> Option<&Client> {
        self.clients.get(&player_id)
    }

    /// Refreshes the activity timestamp. Returns false for unknown players.
    pub fn touch(&mut self, player_id: PlayerId) -> bool {
        match self.clients.get_mut(&player_id) {
            Some(client) => {
                client.last_seen = Instant::now();
                true
            }
            None => false,
        }
    }

    pub fn set_room(&mut self, player_id: PlayerId, room: Option<RoomId>) {
        if let Some(client) = self.clients.get_mut(&player_id) {
            client.room = room;
        }
    }

    pub fn room_of(&self, player_id: PlayerId) -> Option<RoomId> {
        self.clients.get(&player_id).and_then(|c| c.room.clone())
    }

    pub fn addr_of(&self, player_id: PlayerId) -> Option<SocketAddr> {
        self.clients.get(&player_id).map(|c| c.addr)
    }

    /// Connected players attached to `room_id`, lowest id first
    pub fn players_in_room(&self, room_id: &str) -> Vec<PlayerId> {
        let mut players: Vec<PlayerId> = self
            .clients
            .values()
            .filter(|c| c.room.as_deref() == Some(room_id))
            .map(|c| c.id)
            .collect();
        players.sort_unstable();
        players
    }

    /// Addresses for a room broadcast
    pub fn room_addrs(&self, room_id: &str, exclude: Option<PlayerId>) -> Vec<(PlayerId, SocketAddr)> {
        self.clients
            .values()
            .filter(|c| c.room.as_deref() == Some(room_id) && Some(c.id) != exclude)
            .map(|c| (c.id, c.addr))
            .collect()
    }

    /// Detaches everyone, connected or departed, from a closed room
    pub fn clear_room(&mut self, room_id: &str) {
        for client in self.clients.values_mut() {
            if client.room.as_deref() == Some(room_id) {
                client.room = None;
            }
        }
        for departed in self.departed.values_mut() {
            if departed.room.as_deref() == Some(room_id) {
                departed.room = None;
            }
        }
    }

    /// Removes clients that have been silent past the timeout, and forgets
    /// departed players whose resume window has passed
    pub fn check_timeouts(&mut self) -> Vec<Removed> {
        let window = self.resume_window;
        self.departed
            .retain(|_, departed| departed.left_at.elapsed() <= window);

        let timeout = self.timeout;
        let timed_out: Vec<PlayerId> = self
            .clients
            .values()
            .filter(|client| client.is_timed_out(timeout))
            .map(|client| client.id)
            .collect();

        timed_out
            .into_iter()
            .filter_map(|id| self.remove_client(id))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

fn clean_name(name: &str, player_id: PlayerId) -> String {
    let name: String = name.trim().chars().filter(|c| !c.is_control()).take(20).collect();
    if name.is_empty() {
        format!("Player {player_id}")
    } else {
        name
    }
}
