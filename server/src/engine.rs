//! Game session engine: the only component that interprets and mutates
//! `GameSession` state.
//!
//! Every operation follows the same shape: take the room's lock, load the
//! session from the store, apply a transition, write it back, and report
//! outcome flags to the caller. The engine never talks to the transport;
//! turning outcomes into messages is the gateway's job.
//!
//! ## Turn endings
//!
//! A turn ends either when every non-drawer has guessed or when the drawing
//! timer fires. Both paths first flip the session's phase from `Drawing` to
//! `Ending` under the lock. Whoever performs that flip owns the advance; the
//! other path sees `Ending` and does nothing. The next word is fetched with
//! the lock released (the word source may be remote), after which the lock
//! is taken again to commit the new turn.

use crate::directory::{RoomDirectory, RoomStatus};
use crate::error::{GameError, GameResult};
use crate::locks::RoomLocks;
use crate::session::{GameSession, GuessVerdict, Phase, TurnAdvance};
use crate::store::GameSessionStore;
use crate::words::WordSource;
use log::{debug, info, warn};
use shared::{masked_word, PlayerId, PlayerStatus, WordView, MIN_PLAYERS};
use std::sync::Arc;
use tokio::sync::Mutex;

/// What one player is shown about the current turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnView {
    pub drawer_id: PlayerId,
    pub word: WordView,
    pub round: u32,
    pub total_rounds: u32,
    pub turn_id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectStatus {
    /// Not every player has connected yet.
    Waiting { connected: usize, needed: usize },
    InProgress(TurnView),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOutcome {
    /// False on a reconnect.
    pub is_new_connection: bool,
    /// This connection completed the roster for the first time.
    pub just_started: bool,
    pub status: ConnectStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuessOutcome {
    pub verdict: GuessVerdict,
    pub is_correct: bool,
    pub points_awarded: u32,
    pub turn_ended: bool,
    pub round_ended: bool,
    pub game_ended: bool,
    /// The word of the turn that just ended, when `turn_ended` is set.
    pub revealed_word: Option<String>,
    /// The guess completed the turn and was scored, but the turn could not
    /// advance. It stays open in `Drawing` for the timer to end.
    pub advance_error: Option<GameError>,
}

impl GuessOutcome {
    fn graded(verdict: GuessVerdict) -> Self {
        Self {
            verdict,
            is_correct: verdict.is_correct(),
            points_awarded: verdict.points(),
            turn_ended: false,
            round_ended: false,
            game_ended: false,
            revealed_word: None,
            advance_error: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerOutcome {
    /// The word of the expired turn, empty when `already_handled`.
    pub word_to_draw: String,
    pub round_ended: bool,
    pub game_ended: bool,
    pub already_handled: bool,
}

impl TimerOutcome {
    fn already_handled() -> Self {
        Self {
            word_to_draw: String::new(),
            round_ended: false,
            game_ended: false,
            already_handled: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisconnectOutcome {
    pub was_connected: bool,
    /// The room's host left, so the room and its game were torn down.
    pub host_left: bool,
}

/// State captured under the lock when a turn starts ending.
struct PendingAdvance {
    turn_id: u64,
    category_id: String,
    ends_game: bool,
}

impl PendingAdvance {
    fn capture(session: &GameSession) -> Self {
        Self {
            turn_id: session.turn_id(),
            category_id: session.category_id().to_string(),
            ends_game: session.next_advance_ends_game(),
        }
    }
}

pub struct GameEngine {
    store: Arc<dyn GameSessionStore>,
    rooms: Arc<dyn RoomDirectory>,
    words: Arc<dyn WordSource>,
    locks: RoomLocks,
}

impl GameEngine {
    pub fn new(
        store: Arc<dyn GameSessionStore>,
        rooms: Arc<dyn RoomDirectory>,
        words: Arc<dyn WordSource>,
    ) -> Self {
        Self {
            store,
            rooms,
            words,
            locks: RoomLocks::new(),
        }
    }

    /// Masks a word for non-drawers. Pure; touches no session.
    pub fn masked_word(word: &str) -> String {
        masked_word(word)
    }

    /// Creates the session for a room that is transitioning into a game.
    pub async fn create_game(
        &self,
        room_id: &str,
        ordered_player_ids: Vec<PlayerId>,
        total_rounds: u32,
        category_id: &str,
    ) -> GameResult<GameSession> {
        if ordered_player_ids.len() < MIN_PLAYERS {
            return Err(GameError::InsufficientPlayers {
                required: MIN_PLAYERS,
                actual: ordered_player_ids.len(),
            });
        }

        let status = self.rooms.status(room_id).await?;
        if status != RoomStatus::StartingGame {
            return Err(GameError::invalid_state(format!(
                "room {room_id} is {status:?}, not starting a game"
            )));
        }

        let first_word = self.words.random_word(category_id).await?;
        let session = GameSession::new(
            room_id,
            ordered_player_ids,
            total_rounds,
            category_id,
            first_word,
        )?;

        let _guard = self.locks.acquire(room_id).await;
        if self.store.find_by_id(room_id).await?.is_some() {
            return Err(GameError::invalid_state(format!(
                "room {room_id} already has a game in progress"
            )));
        }
        self.store.save(session.clone()).await?;

        info!(
            "Game created in room {}: {} players, {} rounds, category {}",
            room_id,
            session.player_count(),
            session.total_rounds(),
            category_id
        );
        Ok(session)
    }

    /// Creates a game from the room's own member order and settings, then
    /// marks the room in-game.
    pub async fn start_game(&self, room_id: &str) -> GameResult<GameSession> {
        let players = self.rooms.ordered_players(room_id).await?;
        let settings = self.rooms.settings(room_id).await?;

        let session = self
            .create_game(
                room_id,
                players,
                settings.total_rounds,
                &settings.category_id,
            )
            .await?;
        self.rooms.mark_in_game(room_id).await?;
        Ok(session)
    }

    pub async fn get_game(&self, room_id: &str) -> GameResult<GameSession> {
        self.load(room_id).await
    }

    /// Removes the room's session. A second call reports `NotFound`.
    pub async fn delete_game(&self, room_id: &str) -> GameResult<()> {
        let guard = self.locks.acquire(room_id).await;
        if !self.store.delete_by_id(room_id).await? {
            drop(guard);
            return Err(self.release_missing(room_id, GameError::session_not_found(room_id)));
        }
        self.locks.forget(room_id);
        info!("Game in room {} deleted", room_id);
        Ok(())
    }

    /// Snapshot of every live session.
    pub async fn active_games(&self) -> GameResult<Vec<GameSession>> {
        self.store.get_all().await
    }

    /// The current turn as `player_id` may see it: plain word for the
    /// drawer, masked for everyone else.
    pub async fn turn_view(&self, room_id: &str, player_id: PlayerId) -> GameResult<TurnView> {
        let session = self.load(room_id).await?;
        if !session.is_player(player_id) {
            return Err(GameError::invalid_state(format!(
                "player {player_id} is not in the game in room {room_id}"
            )));
        }
        Ok(Self::view_for(&session, player_id))
    }

    /// Marks a player connected and tells the caller what to show them.
    pub async fn handle_connect(
        &self,
        room_id: &str,
        player_id: PlayerId,
    ) -> GameResult<ConnectOutcome> {
        let guard = self.locks.acquire(room_id).await;
        let mut session = match self.load(room_id).await {
            Ok(session) => session,
            Err(err) => {
                drop(guard);
                return Err(self.release_missing(room_id, err));
            }
        };
        if !session.is_player(player_id) {
            return Err(GameError::invalid_state(format!(
                "player {player_id} is not in the game in room {room_id}"
            )));
        }

        let was_started = session.has_started();
        let is_new_connection = session.mark_connected(player_id);
        self.store.save(session.clone()).await?;

        let status = if session.has_started() {
            ConnectStatus::InProgress(Self::view_for(&session, player_id))
        } else {
            ConnectStatus::Waiting {
                connected: session.connected_player_ids().len(),
                needed: session.player_count(),
            }
        };

        info!(
            "Player {} {} room {}",
            player_id,
            if is_new_connection { "connected to" } else { "reconnected to" },
            room_id
        );
        Ok(ConnectOutcome {
            is_new_connection,
            just_started: !was_started && session.has_started(),
            status,
        })
    }

    /// Drops a player's connection. If the player hosts the room, the game
    /// and the room are torn down.
    pub async fn handle_disconnect(
        &self,
        room_id: &str,
        player_id: PlayerId,
    ) -> GameResult<DisconnectOutcome> {
        let host = match self.rooms.host(room_id).await {
            Ok(host) => Some(host),
            Err(err) if err.is_not_found() => None,
            Err(err) => return Err(err),
        };
        let host_left = host == Some(player_id);

        let guard = self.locks.acquire(room_id).await;
        let session = self.store.find_by_id(room_id).await?;
        let has_session = session.is_some();
        let was_connected = match session {
            Some(mut session) => {
                let was_connected = session.mark_disconnected(player_id);
                if was_connected && !host_left {
                    self.store.save(session).await?;
                }
                was_connected
            }
            None => false,
        };
        if host_left {
            self.store.delete_by_id(room_id).await?;
        }
        drop(guard);
        if !has_session && !host_left {
            self.locks.release_idle(room_id);
        }

        if host_left {
            self.rooms.delete_room(room_id).await?;
            self.locks.forget(room_id);
            info!("Host {} left room {}; room closed", player_id, room_id);
        } else {
            debug!("Player {} disconnected from room {}", player_id, room_id);
        }

        Ok(DisconnectOutcome {
            was_connected,
            host_left,
        })
    }

    /// Grades a chat message as a guess. A first correct guess is scored;
    /// the guess that completes the turn also advances it. A failed advance
    /// does not undo the score; it is reported in `advance_error`.
    pub async fn add_guessed_player(
        &self,
        room_id: &str,
        player_id: PlayerId,
        guess: &str,
    ) -> GameResult<GuessOutcome> {
        let lock = self.locks.lock_for(room_id);
        let guard = lock.lock().await;

        let mut session = match self.load(room_id).await {
            Ok(session) => session,
            Err(err) => {
                drop(guard);
                drop(lock);
                return Err(self.release_missing(room_id, err));
            }
        };
        let verdict = session.grade_guess(player_id, guess);
        let mut outcome = GuessOutcome::graded(verdict);

        if !verdict.is_correct() {
            debug!(
                "Room {}: message from player {} not scored ({:?})",
                room_id, player_id, verdict
            );
            return Ok(outcome);
        }

        if !session.turn_complete() {
            self.store.save(session).await?;
            return Ok(outcome);
        }

        session.begin_ending();
        let finished_word = session.word_to_draw().to_string();
        let pending = PendingAdvance::capture(&session);
        self.store.save(session).await?;
        drop(guard);

        match self.complete_advance(room_id, &lock, pending).await {
            Ok(advance) => {
                outcome.turn_ended = true;
                outcome.round_ended = advance.round_ended;
                outcome.game_ended = advance.game_ended;
                outcome.revealed_word = Some(finished_word);
            }
            Err(err) => {
                warn!(
                    "Room {}: guess from player {} scored but the turn did not advance: {}",
                    room_id, player_id, err
                );
                outcome.advance_error = Some(err);
            }
        }
        Ok(outcome)
    }

    /// Reacts to a drawing timer expiring for whatever turn is current.
    pub async fn handle_timer_end(&self, room_id: &str) -> GameResult<TimerOutcome> {
        self.end_turn_on_timer(room_id, None).await
    }

    /// Like `handle_timer_end`, but a timer scheduled for an earlier turn
    /// is reported as already handled.
    pub async fn handle_turn_timer(&self, room_id: &str, turn_id: u64) -> GameResult<TimerOutcome> {
        self.end_turn_on_timer(room_id, Some(turn_id)).await
    }

    /// Live leaderboard: committed totals plus the current round's points,
    /// highest first, ties in turn order.
    pub async fn get_player_statuses(&self, room_id: &str) -> GameResult<Vec<PlayerStatus>> {
        let names = self.rooms.display_names(room_id).await?;
        let session = self.load(room_id).await?;
        Ok(session.standings(&names))
    }

    async fn end_turn_on_timer(
        &self,
        room_id: &str,
        expected_turn: Option<u64>,
    ) -> GameResult<TimerOutcome> {
        let lock = self.locks.lock_for(room_id);
        let guard = lock.lock().await;

        let mut session = match self.load(room_id).await {
            Ok(session) => session,
            Err(err) => {
                drop(guard);
                drop(lock);
                return Err(self.release_missing(room_id, err));
            }
        };
        if expected_turn.is_some_and(|turn_id| turn_id != session.turn_id()) {
            debug!(
                "Room {}: timer for turn {:?} is stale (current turn {})",
                room_id,
                expected_turn,
                session.turn_id()
            );
            return Ok(TimerOutcome::already_handled());
        }
        if !session.begin_ending() {
            debug!("Room {}: timer fired after the turn already ended", room_id);
            return Ok(TimerOutcome::already_handled());
        }

        let word_to_draw = session.word_to_draw().to_string();
        let pending = PendingAdvance::capture(&session);
        self.store.save(session).await?;
        drop(guard);

        let advance = self.complete_advance(room_id, &lock, pending).await?;
        Ok(TimerOutcome {
            word_to_draw,
            round_ended: advance.round_ended,
            game_ended: advance.game_ended,
            already_handled: false,
        })
    }

    /// Second half of a turn ending: fetch the next word without holding the
    /// lock, then commit the advance. The session must still be `Ending` on
    /// the same turn; nothing else can move it while it is.
    async fn complete_advance(
        &self,
        room_id: &str,
        lock: &Mutex<()>,
        pending: PendingAdvance,
    ) -> GameResult<TurnAdvance> {
        let next_word = if pending.ends_game {
            String::new()
        } else {
            match self.words.random_word(&pending.category_id).await {
                Ok(word) => word,
                Err(err) => {
                    warn!(
                        "Room {}: could not draw the next word ({}); reopening turn {}",
                        room_id, err, pending.turn_id
                    );
                    let _guard = lock.lock().await;
                    if let Some(mut session) = self.store.find_by_id(room_id).await? {
                        if session.turn_id() == pending.turn_id {
                            session.cancel_ending();
                            self.store.save(session).await?;
                        }
                    }
                    return Err(err);
                }
            }
        };

        let _guard = lock.lock().await;
        let mut session = self.load(room_id).await?;
        if session.turn_id() != pending.turn_id || session.phase() != Phase::Ending {
            return Err(GameError::invalid_state(format!(
                "turn {} in room {} changed while it was ending",
                pending.turn_id, room_id
            )));
        }

        let advance = session.advance_turn(next_word);
        if advance.game_ended {
            info!(
                "Room {}: game over after {} rounds",
                room_id,
                session.total_rounds()
            );
        } else {
            if advance.round_ended {
                info!(
                    "Room {}: round {} of {} begins",
                    room_id,
                    session.current_round(),
                    session.total_rounds()
                );
            }
            info!(
                "Room {}: turn {} goes to player {}",
                room_id,
                session.turn_id(),
                session.current_drawer_id()
            );
        }
        self.store.save(session).await?;
        Ok(advance)
    }

    /// Called with no lock held after a lookup failed, so a room without a
    /// session does not keep a lock entry.
    fn release_missing(&self, room_id: &str, err: GameError) -> GameError {
        if err.is_not_found() {
            self.locks.release_idle(room_id);
        }
        err
    }

    async fn load(&self, room_id: &str) -> GameResult<GameSession> {
        self.store
            .find_by_id(room_id)
            .await?
            .ok_or_else(|| GameError::session_not_found(room_id))
    }

    fn view_for(session: &GameSession, player_id: PlayerId) -> TurnView {
        TurnView {
            drawer_id: session.current_drawer_id(),
            word: session.word_for(player_id),
            round: session.current_round(),
            total_rounds: session.total_rounds(),
            turn_id: session.turn_id(),
        }
    }
}
