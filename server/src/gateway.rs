//! Connection gateway: turns player actions into engine calls and engine
//! outcomes into packets.
//!
//! Rejections go only to the acting player; turn and game transitions go
//! to the whole room. The gateway also owns the per-turn drawing timers.
//! Addressing is by player and room id; the network layer resolves those
//! to socket addresses.

use crate::directory::{InMemoryRoomDirectory, RoomDirectory, RoomSettings, RoomStatus};
use crate::engine::{ConnectStatus, GameEngine};
use crate::error::{GameError, NotFoundKind};
use crate::session::GuessVerdict;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::{debug, error, info, warn};
use shared::{Packet, PlayerId, RoomId, Stroke};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub const MAX_STROKE_POINTS: usize = 256;
pub const MAX_GUESS_LEN: usize = 100;
/// Delay before a turn whose advance failed is ended again.
pub const TIMER_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Messages sent from the gateway to the network sender task
#[derive(Debug, Clone, PartialEq)]
pub enum GameMessage {
    SendPacket {
        player_id: PlayerId,
        packet: Packet,
    },
    BroadcastPacket {
        room_id: RoomId,
        packet: Packet,
        exclude: Option<PlayerId>,
    },
    /// Detach every client from a room that no longer exists.
    CloseRoom { room_id: RoomId },
}

/// Bounds applied to player-chosen room settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoomLimits {
    pub max_rounds: u32,
    pub min_drawing_secs: u32,
    pub max_drawing_secs: u32,
}

impl Default for RoomLimits {
    fn default() -> Self {
        Self {
            max_rounds: 10,
            min_drawing_secs: 30,
            max_drawing_secs: 240,
        }
    }
}

impl RoomLimits {
    pub fn settings(&self, rounds: u32, category: &str, drawing_secs: u32) -> RoomSettings {
        RoomSettings {
            total_rounds: rounds.clamp(1, self.max_rounds.max(1)),
            category_id: category.trim().to_lowercase(),
            drawing_time: Duration::from_secs(
                drawing_secs.clamp(self.min_drawing_secs, self.max_drawing_secs.max(self.min_drawing_secs))
                    as u64,
            ),
        }
    }
}

pub struct Gateway {
    engine: Arc<GameEngine>,
    rooms: Arc<InMemoryRoomDirectory>,
    outbound: mpsc::UnboundedSender<GameMessage>,
    timers: DashMap<RoomId, (u64, JoinHandle<()>)>,
    limits: RoomLimits,
}

impl Gateway {
    pub fn new(
        engine: Arc<GameEngine>,
        rooms: Arc<InMemoryRoomDirectory>,
        outbound: mpsc::UnboundedSender<GameMessage>,
        limits: RoomLimits,
    ) -> Self {
        Self {
            engine,
            rooms,
            outbound,
            timers: DashMap::new(),
            limits,
        }
    }

    pub fn engine(&self) -> &Arc<GameEngine> {
        &self.engine
    }

    /// Opens a lobby hosted by `player_id` and returns its code.
    pub async fn create_room(
        &self,
        player_id: PlayerId,
        name: &str,
        rounds: u32,
        category: &str,
        drawing_secs: u32,
    ) -> RoomId {
        let settings = self.limits.settings(rounds, category, drawing_secs);
        let code = self.rooms.create_room(player_id, name, settings);
        self.send(
            player_id,
            Packet::RoomJoined {
                code: code.clone(),
                host: player_id,
            },
        );
        code
    }

    /// Adds a player to a lobby, or reattaches a member to a game already
    /// running in that room.
    pub async fn join_room(
        self: &Arc<Self>,
        player_id: PlayerId,
        name: &str,
        code: &str,
    ) -> Option<RoomId> {
        let code = code.trim().to_uppercase();
        if let Err(err) = self.rooms.join_room(&code, player_id, name) {
            self.reject(player_id, &err);
            return None;
        }

        let host = match self.rooms.host(&code).await {
            Ok(host) => host,
            Err(err) => {
                self.reject(player_id, &err);
                return None;
            }
        };
        self.send(
            player_id,
            Packet::RoomJoined {
                code: code.clone(),
                host,
            },
        );

        match self.rooms.status(&code).await {
            Ok(RoomStatus::InGame) => self.enter_game(&code, player_id).await,
            Ok(_) => self.broadcast(
                &code,
                Packet::System {
                    text: format!("{name} joined the lobby"),
                },
                Some(player_id),
            ),
            Err(err) => warn!("Room {} vanished while player {} joined: {}", code, player_id, err),
        }
        Some(code)
    }

    /// Host asks to start. `present` lists the room members currently
    /// attached at the transport level; each is connected to the new game.
    pub async fn start_game(self: &Arc<Self>, player_id: PlayerId, room_id: &str, present: Vec<PlayerId>) {
        if let Err(err) = self.rooms.begin_start(room_id, player_id) {
            self.reject(player_id, &err);
            return;
        }

        if let Err(err) = self.engine.start_game(room_id).await {
            warn!("Could not start game in room {}: {}", room_id, err);
            self.rooms.abort_start(room_id);
            self.reject(player_id, &err);
            return;
        }

        self.broadcast(
            room_id,
            Packet::System {
                text: "The game is starting".to_string(),
            },
            None,
        );
        for member in present {
            self.enter_game(room_id, member).await;
        }
    }

    /// Connects (or reconnects) a player to the room's running game.
    pub async fn enter_game(self: &Arc<Self>, room_id: &str, player_id: PlayerId) {
        let outcome = match self.engine.handle_connect(room_id, player_id).await {
            Ok(outcome) => outcome,
            Err(err) => {
                self.reject(player_id, &err);
                return;
            }
        };

        if outcome.is_new_connection {
            let name = self.name_of(room_id, player_id).await;
            self.broadcast(
                room_id,
                Packet::System {
                    text: format!("{name} joined the game"),
                },
                None,
            );
        }

        match outcome.status {
            ConnectStatus::Waiting { connected, needed } => {
                self.broadcast(room_id, Packet::Waiting { connected, needed }, None);
            }
            ConnectStatus::InProgress(_) if outcome.just_started => {
                self.announce_turn(room_id).await;
            }
            ConnectStatus::InProgress(view) => {
                self.send(
                    player_id,
                    Packet::TurnStarted {
                        round: view.round,
                        total_rounds: view.total_rounds,
                        drawer: view.drawer_id,
                        word: view.word,
                    },
                );
                if let Ok(standings) = self.engine.get_player_statuses(room_id).await {
                    self.send(player_id, Packet::Leaderboard { standings });
                }
            }
        }
    }

    /// Grades a chat line. Only correct guesses are announced as such; the
    /// guessed text itself is never echoed when it would reveal the word.
    pub async fn guess(self: &Arc<Self>, room_id: &str, player_id: PlayerId, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        if text.chars().count() > MAX_GUESS_LEN {
            self.send(
                player_id,
                Packet::Rejected {
                    reason: "Message is too long".to_string(),
                },
            );
            return;
        }

        let outcome = match self.engine.add_guessed_player(room_id, player_id, text).await {
            Ok(outcome) => outcome,
            Err(err) => {
                self.reject(player_id, &err);
                return;
            }
        };

        match outcome.verdict {
            GuessVerdict::Correct { points } => {
                self.broadcast(room_id, Packet::CorrectGuess { player_id, points }, None);
                self.broadcast_leaderboard(room_id).await;
            }
            GuessVerdict::AlreadyGuessed => self.send(
                player_id,
                Packet::System {
                    text: "You already guessed the word".to_string(),
                },
            ),
            GuessVerdict::DrawerMessage { reveals_word: true } => self.send(
                player_id,
                Packet::System {
                    text: "You can't give away the word".to_string(),
                },
            ),
            GuessVerdict::Wrong
            | GuessVerdict::NotAccepting
            | GuessVerdict::NotAPlayer
            | GuessVerdict::DrawerMessage { reveals_word: false } => self.broadcast(
                room_id,
                Packet::Chat {
                    player_id,
                    text: text.to_string(),
                },
                None,
            ),
        }

        if outcome.turn_ended {
            let word = outcome.revealed_word.unwrap_or_default();
            self.finish_turn(room_id, word, outcome.round_ended, outcome.game_ended)
                .await;
        }
    }

    /// Relays a stroke from the current drawer to everyone else.
    pub async fn draw(&self, room_id: &str, player_id: PlayerId, stroke: Stroke) {
        let session = match self.engine.get_game(room_id).await {
            Ok(session) => session,
            Err(err) => {
                self.reject(player_id, &err);
                return;
            }
        };

        if !session.is_drawer(player_id) {
            self.send(
                player_id,
                Packet::Rejected {
                    reason: "Only the drawer can draw".to_string(),
                },
            );
            return;
        }
        if stroke.is_empty() || stroke.points.len() > MAX_STROKE_POINTS {
            debug!(
                "Dropping stroke with {} points from player {}",
                stroke.points.len(),
                player_id
            );
            return;
        }

        self.broadcast(room_id, Packet::Strokes { stroke }, Some(player_id));
    }

    /// Transport lost a player (explicit leave or timeout).
    pub async fn player_left(&self, room_id: &str, player_id: PlayerId) {
        let name = self.name_of(room_id, player_id).await;
        let status = self.rooms.status(room_id).await.ok();

        let outcome = match self.engine.handle_disconnect(room_id, player_id).await {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(
                    "Disconnect cleanup for player {} in room {} failed: {}",
                    player_id, room_id, err
                );
                return;
            }
        };

        if outcome.host_left {
            self.cancel_timer(room_id);
            self.broadcast(
                room_id,
                Packet::Disconnected {
                    reason: "The host left the room".to_string(),
                },
                Some(player_id),
            );
            self.close_room(room_id);
            return;
        }

        if status == Some(RoomStatus::Lobby) {
            if let Err(err) = self.rooms.leave_room(room_id, player_id) {
                debug!("Player {} leaving room {}: {}", player_id, room_id, err);
            }
        }
        self.broadcast(
            room_id,
            Packet::System {
                text: format!("{name} left"),
            },
            Some(player_id),
        );
    }

    /// Called by a timer task when a turn's drawing time runs out.
    pub async fn timer_fired(self: &Arc<Self>, room_id: &str, turn_id: u64) {
        self.timers
            .remove_if(room_id, |_, (scheduled, _)| *scheduled == turn_id);

        match self.engine.handle_turn_timer(room_id, turn_id).await {
            Ok(outcome) if outcome.already_handled => {
                debug!("Room {}: timer for turn {} already handled", room_id, turn_id);
            }
            Ok(outcome) => {
                self.finish_turn(
                    room_id,
                    outcome.word_to_draw,
                    outcome.round_ended,
                    outcome.game_ended,
                )
                .await;
            }
            Err(GameError::NotFound(NotFoundKind::Session(_) | NotFoundKind::Room(_))) => {
                debug!("Room {}: timer fired after the game was removed", room_id);
            }
            Err(err) => {
                warn!(
                    "Room {}: timer for turn {} failed ({}); retrying in {}s",
                    room_id,
                    turn_id,
                    err,
                    TIMER_RETRY_DELAY.as_secs()
                );
                self.schedule_timer(room_id, turn_id, TIMER_RETRY_DELAY);
            }
        }
    }

    /// Number of rooms with a running drawing timer.
    pub fn active_timers(&self) -> usize {
        self.timers.len()
    }

    async fn finish_turn(
        self: &Arc<Self>,
        room_id: &str,
        word: String,
        round_ended: bool,
        game_ended: bool,
    ) {
        self.cancel_timer(room_id);
        self.broadcast(room_id, Packet::TurnEnded { word }, None);

        if round_ended {
            if let Ok(session) = self.engine.get_game(room_id).await {
                self.broadcast(
                    room_id,
                    Packet::RoundEnded {
                        round: session.current_round() - 1,
                    },
                    None,
                );
            }
        }

        if game_ended {
            self.end_game(room_id).await;
        } else {
            self.announce_turn(room_id).await;
        }
    }

    async fn end_game(&self, room_id: &str) {
        let standings = match self.engine.get_player_statuses(room_id).await {
            Ok(standings) => standings,
            Err(err) => {
                error!("Room {}: could not build final standings: {}", room_id, err);
                Vec::new()
            }
        };
        self.broadcast(room_id, Packet::GameEnded { standings }, None);

        if let Err(err) = self.engine.delete_game(room_id).await {
            debug!("Room {}: game already removed: {}", room_id, err);
        }
        if let Err(err) = self.rooms.delete_room(room_id).await {
            warn!("Room {}: could not delete room: {}", room_id, err);
        }
        self.close_room(room_id);
        info!("Room {}: game finished and room closed", room_id);
    }

    /// Sends every connected player their own view of the new turn and
    /// starts its timer.
    async fn announce_turn(self: &Arc<Self>, room_id: &str) {
        let session = match self.engine.get_game(room_id).await {
            Ok(session) => session,
            Err(err) => {
                warn!("Room {}: cannot announce turn: {}", room_id, err);
                return;
            }
        };

        for &player_id in session.connected_player_ids() {
            match self.engine.turn_view(room_id, player_id).await {
                Ok(view) => self.send(
                    player_id,
                    Packet::TurnStarted {
                        round: view.round,
                        total_rounds: view.total_rounds,
                        drawer: view.drawer_id,
                        word: view.word,
                    },
                ),
                Err(err) => warn!("Room {}: no view for player {}: {}", room_id, player_id, err),
            }
        }
        self.broadcast_leaderboard(room_id).await;

        let drawing_time = match self.rooms.settings(room_id).await {
            Ok(settings) => settings.drawing_time,
            Err(err) => {
                warn!("Room {}: no settings, using defaults: {}", room_id, err);
                RoomSettings::default().drawing_time
            }
        };
        self.schedule_timer(room_id, session.turn_id(), drawing_time);
    }

    fn schedule_timer(self: &Arc<Self>, room_id: &str, turn_id: u64, after: Duration) {
        let gateway = Arc::clone(self);
        let room = room_id.to_string();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            gateway.timer_fired(&room, turn_id).await;
        });

        // A timer for a later turn wins over a retry for an earlier one.
        match self.timers.entry(room_id.to_string()) {
            Entry::Occupied(slot) if slot.get().0 > turn_id => {
                handle.abort();
                return;
            }
            Entry::Occupied(mut slot) => {
                let (_, previous) = slot.insert((turn_id, handle));
                previous.abort();
            }
            Entry::Vacant(slot) => {
                slot.insert((turn_id, handle));
            }
        }
        debug!(
            "Room {}: turn {} ends in {}s",
            room_id,
            turn_id,
            after.as_secs()
        );
    }

    fn cancel_timer(&self, room_id: &str) {
        if let Some((_, (_, handle))) = self.timers.remove(room_id) {
            handle.abort();
        }
    }

    async fn broadcast_leaderboard(&self, room_id: &str) {
        match self.engine.get_player_statuses(room_id).await {
            Ok(standings) => self.broadcast(room_id, Packet::Leaderboard { standings }, None),
            Err(err) => debug!("Room {}: no leaderboard: {}", room_id, err),
        }
    }

    async fn name_of(&self, room_id: &str, player_id: PlayerId) -> String {
        self.rooms
            .display_names(room_id)
            .await
            .ok()
            .and_then(|names| names.get(&player_id).cloned())
            .unwrap_or_else(|| format!("Player {player_id}"))
    }

    fn reject(&self, player_id: PlayerId, err: &GameError) {
        debug!("Rejected action from player {}: {}", player_id, err);
        self.send(
            player_id,
            Packet::Rejected {
                reason: err.to_string(),
            },
        );
    }

    fn send(&self, player_id: PlayerId, packet: Packet) {
        if let Err(e) = self.outbound.send(GameMessage::SendPacket { player_id, packet }) {
            error!("Failed to queue packet for player {}: {}", player_id, e);
        }
    }

    fn broadcast(&self, room_id: &str, packet: Packet, exclude: Option<PlayerId>) {
        if let Err(e) = self.outbound.send(GameMessage::BroadcastPacket {
            room_id: room_id.to_string(),
            packet,
            exclude,
        }) {
            error!("Failed to queue broadcast for room {}: {}", room_id, e);
        }
    }

    fn close_room(&self, room_id: &str) {
        if let Err(e) = self.outbound.send(GameMessage::CloseRoom {
            room_id: room_id.to_string(),
        }) {
            error!("Failed to queue close for room {}: {}", room_id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GameResult;
    use crate::store::InMemorySessionStore;
    use crate::words::{InMemoryWordSource, WordSource};
    use async_trait::async_trait;
    use shared::WordView;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Always answers "apple", after failing `outages` times.
    struct OutageWords {
        outages: AtomicUsize,
    }

    #[async_trait]
    impl WordSource for OutageWords {
        async fn random_word(&self, _category_id: &str) -> GameResult<String> {
            let failing = self
                .outages
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failing {
                Err(GameError::Unavailable("word service down".to_string()))
            } else {
                Ok("apple".to_string())
            }
        }
    }

    struct Harness {
        gateway: Arc<Gateway>,
        rooms: Arc<InMemoryRoomDirectory>,
        rx: mpsc::UnboundedReceiver<GameMessage>,
    }

    fn harness() -> Harness {
        let words = InMemoryWordSource::new();
        words.add_word("fruit", "apple");
        harness_with_words(Arc::new(words))
    }

    fn harness_with_words(words: Arc<dyn WordSource>) -> Harness {
        let rooms = Arc::new(InMemoryRoomDirectory::new());
        let engine = Arc::new(GameEngine::new(
            Arc::new(InMemorySessionStore::new()),
            rooms.clone(),
            words,
        ));
        let (tx, rx) = mpsc::unbounded_channel();
        let gateway = Arc::new(Gateway::new(engine, rooms.clone(), tx, RoomLimits::default()));
        Harness { gateway, rooms, rx }
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<GameMessage>) -> Vec<GameMessage> {
        let mut messages = Vec::new();
        while let Ok(message) = rx.try_recv() {
            messages.push(message);
        }
        messages
    }

    fn sent_to(messages: &[GameMessage], player: PlayerId) -> Vec<&Packet> {
        messages
            .iter()
            .filter_map(|m| match m {
                GameMessage::SendPacket { player_id, packet } if *player_id == player => {
                    Some(packet)
                }
                _ => None,
            })
            .collect()
    }

    fn broadcasts(messages: &[GameMessage]) -> Vec<&Packet> {
        messages
            .iter()
            .filter_map(|m| match m {
                GameMessage::BroadcastPacket { packet, .. } => Some(packet),
                _ => None,
            })
            .collect()
    }

    /// Room with players 1 (host), 2 and 3, game started and everyone in.
    async fn running_game(h: &mut Harness) -> RoomId {
        let code = h
            .gateway
            .create_room(1, "Ada", 1, "Fruit", 60)
            .await;
        h.gateway.join_room(2, "Bo", &code).await.unwrap();
        h.gateway.join_room(3, "Cy", &code).await.unwrap();
        h.gateway.start_game(1, &code, vec![1, 2, 3]).await;
        code
    }

    #[test]
    fn test_room_limits_clamp() {
        let limits = RoomLimits::default();
        let settings = limits.settings(0, " Animals ", 5);
        assert_eq!(settings.total_rounds, 1);
        assert_eq!(settings.category_id, "animals");
        assert_eq!(settings.drawing_time, Duration::from_secs(30));

        let settings = limits.settings(99, "food", 9999);
        assert_eq!(settings.total_rounds, 10);
        assert_eq!(settings.drawing_time, Duration::from_secs(240));
    }

    #[tokio::test]
    async fn test_start_game_announces_private_views() {
        let mut h = harness();
        running_game(&mut h).await;
        let messages = drain(&mut h.rx);

        let drawer_view = sent_to(&messages, 1)
            .into_iter()
            .find_map(|p| match p {
                Packet::TurnStarted { word, .. } => Some(word.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(drawer_view, WordView::Plain("apple".to_string()));

        for guesser in [2, 3] {
            let view = sent_to(&messages, guesser)
                .into_iter()
                .find_map(|p| match p {
                    Packet::TurnStarted { word, .. } => Some(word.clone()),
                    _ => None,
                })
                .unwrap();
            assert_eq!(view, WordView::Masked("*****".to_string()));
        }

        // The plain word is never broadcast.
        for packet in broadcasts(&messages) {
            assert!(!format!("{packet:?}").contains("apple"));
        }
        assert_eq!(h.gateway.active_timers(), 1);
    }

    #[tokio::test]
    async fn test_only_host_can_start() {
        let mut h = harness();
        let code = h.gateway.create_room(1, "Ada", 1, "fruit", 60).await;
        h.gateway.join_room(2, "Bo", &code).await.unwrap();
        drain(&mut h.rx);

        h.gateway.start_game(2, &code, vec![1, 2]).await;
        let messages = drain(&mut h.rx);
        assert!(matches!(
            sent_to(&messages, 2).as_slice(),
            [Packet::Rejected { .. }]
        ));
        assert_eq!(h.rooms.status(&code).await.unwrap(), RoomStatus::Lobby);
    }

    #[tokio::test]
    async fn test_unknown_category_aborts_start() {
        let mut h = harness();
        let code = h.gateway.create_room(1, "Ada", 1, "planets", 60).await;
        h.gateway.join_room(2, "Bo", &code).await.unwrap();
        drain(&mut h.rx);

        h.gateway.start_game(1, &code, vec![1, 2]).await;
        let messages = drain(&mut h.rx);
        assert!(matches!(
            sent_to(&messages, 1).as_slice(),
            [Packet::Rejected { .. }]
        ));
        assert_eq!(h.rooms.status(&code).await.unwrap(), RoomStatus::Lobby);
    }

    #[tokio::test]
    async fn test_correct_guess_is_not_echoed() {
        let mut h = harness();
        let code = running_game(&mut h).await;
        drain(&mut h.rx);

        h.gateway.guess(&code, 2, "APPLE").await;
        let messages = drain(&mut h.rx);
        let room = broadcasts(&messages);

        assert!(room.iter().any(|p| matches!(
            p,
            Packet::CorrectGuess {
                player_id: 2,
                points: 3
            }
        )));
        assert!(!room.iter().any(|p| matches!(p, Packet::Chat { .. })));
    }

    #[tokio::test]
    async fn test_drawer_cannot_leak_word() {
        let mut h = harness();
        let code = running_game(&mut h).await;
        drain(&mut h.rx);

        h.gateway.guess(&code, 1, "it's an apple").await;
        let messages = drain(&mut h.rx);

        assert!(broadcasts(&messages).is_empty());
        assert!(matches!(
            sent_to(&messages, 1).as_slice(),
            [Packet::System { .. }]
        ));
    }

    #[tokio::test]
    async fn test_last_guess_ends_turn_and_restarts_timer() {
        let mut h = harness();
        let code = running_game(&mut h).await;
        drain(&mut h.rx);

        h.gateway.guess(&code, 2, "apple").await;
        h.gateway.guess(&code, 3, "apple").await;
        let messages = drain(&mut h.rx);

        assert!(broadcasts(&messages)
            .iter()
            .any(|p| matches!(p, Packet::TurnEnded { word } if word == "apple")));
        let new_drawer = sent_to(&messages, 2)
            .into_iter()
            .find_map(|p| match p {
                Packet::TurnStarted { drawer, word, .. } => Some((*drawer, word.clone())),
                _ => None,
            })
            .unwrap();
        assert_eq!(new_drawer, (2, WordView::Plain("apple".to_string())));
        assert_eq!(h.gateway.active_timers(), 1);
    }

    #[tokio::test]
    async fn test_only_drawer_strokes_are_relayed() {
        let mut h = harness();
        let code = running_game(&mut h).await;
        drain(&mut h.rx);

        let stroke = Stroke {
            points: vec![(0.0, 0.0), (1.0, 1.0)],
            color: 0,
            width: 2.0,
        };
        h.gateway.draw(&code, 2, stroke.clone()).await;
        h.gateway.draw(&code, 1, stroke).await;
        let messages = drain(&mut h.rx);

        assert!(matches!(
            sent_to(&messages, 2).as_slice(),
            [Packet::Rejected { .. }]
        ));
        assert!(messages.iter().any(|m| matches!(
            m,
            GameMessage::BroadcastPacket {
                packet: Packet::Strokes { .. },
                exclude: Some(1),
                ..
            }
        )));
    }

    #[tokio::test]
    async fn test_host_leaving_closes_room() {
        let mut h = harness();
        let code = running_game(&mut h).await;
        drain(&mut h.rx);

        h.gateway.player_left(&code, 1).await;
        let messages = drain(&mut h.rx);

        assert!(messages
            .iter()
            .any(|m| matches!(m, GameMessage::CloseRoom { room_id } if *room_id == code)));
        assert!(h.rooms.is_empty());
        assert_eq!(h.gateway.active_timers(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_expiry_ends_game() {
        let mut h = harness();
        let code = h.gateway.create_room(1, "Ada", 1, "fruit", 30).await;
        h.gateway.join_room(2, "Bo", &code).await.unwrap();
        h.gateway.start_game(1, &code, vec![1, 2]).await;
        drain(&mut h.rx);

        // Two turns of 30s each; the clock auto-advances while paused.
        tokio::time::sleep(Duration::from_secs(61)).await;
        let messages = drain(&mut h.rx);
        let room = broadcasts(&messages);

        assert_eq!(
            room.iter()
                .filter(|p| matches!(p, Packet::TurnEnded { .. }))
                .count(),
            2
        );
        assert!(room.iter().any(|p| matches!(p, Packet::RoundEnded { round: 1 })));
        assert!(room.iter().any(|p| matches!(p, Packet::GameEnded { .. })));
        assert!(h.rooms.is_empty());
        assert!(h.gateway.engine().get_game(&code).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_advance_on_timer_is_retried() {
        let words = Arc::new(OutageWords {
            outages: AtomicUsize::new(0),
        });
        let mut h = harness_with_words(words.clone());
        let code = h.gateway.create_room(1, "Ada", 3, "fruit", 30).await;
        h.gateway.join_room(2, "Bo", &code).await.unwrap();
        h.gateway.join_room(3, "Cy", &code).await.unwrap();
        h.gateway.start_game(1, &code, vec![1, 2, 3]).await;
        drain(&mut h.rx);

        words.outages.store(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(31)).await;
        let messages = drain(&mut h.rx);
        assert!(!broadcasts(&messages)
            .iter()
            .any(|p| matches!(p, Packet::TurnEnded { .. })));
        let session = h.gateway.engine().get_game(&code).await.unwrap();
        assert_eq!(session.phase(), crate::session::Phase::Drawing);
        assert_eq!(session.turn_id(), 0);
        assert_eq!(h.gateway.active_timers(), 1);

        tokio::time::sleep(TIMER_RETRY_DELAY).await;
        let messages = drain(&mut h.rx);
        assert_eq!(
            broadcasts(&messages)
                .iter()
                .filter(|p| matches!(p, Packet::TurnEnded { word } if word == "apple"))
                .count(),
            1
        );
        let session = h.gateway.engine().get_game(&code).await.unwrap();
        assert_eq!(session.turn_id(), 1);
        assert_eq!(session.current_drawer_id(), 2);
        assert_eq!(h.gateway.active_timers(), 1);
    }

    #[tokio::test]
    async fn test_scored_guess_is_announced_when_advance_fails() {
        let words = Arc::new(OutageWords {
            outages: AtomicUsize::new(0),
        });
        let mut h = harness_with_words(words.clone());
        let code = running_game(&mut h).await;
        drain(&mut h.rx);

        words.outages.store(1, Ordering::SeqCst);
        h.gateway.guess(&code, 2, "apple").await;
        h.gateway.guess(&code, 3, "apple").await;
        let messages = drain(&mut h.rx);
        let room = broadcasts(&messages);

        assert!(room.iter().any(|p| matches!(
            p,
            Packet::CorrectGuess {
                player_id: 3,
                points: 2
            }
        )));
        assert!(room
            .iter()
            .any(|p| matches!(p, Packet::Leaderboard { standings } if standings.len() == 3)));
        assert!(!room.iter().any(|p| matches!(p, Packet::TurnEnded { .. })));
        assert!(!sent_to(&messages, 3)
            .iter()
            .any(|p| matches!(p, Packet::Rejected { .. })));

        // The turn stays open and its timer is still pending.
        let session = h.gateway.engine().get_game(&code).await.unwrap();
        assert_eq!(session.phase(), crate::session::Phase::Drawing);
        assert_eq!(session.round_scores().get(&3), Some(&2));
        assert_eq!(h.gateway.active_timers(), 1);
    }
}
