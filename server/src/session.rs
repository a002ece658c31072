//! Live game state for one room and the state transitions applied to it.
//!
//! Everything in here is synchronous and lock-free: the engine loads a
//! session, applies one of these transitions while holding the room lock,
//! and writes it back. Fields are private so the only way to change a
//! session is through the transitions below.

use crate::error::{GameError, GameResult};
use log::debug;
use shared::{masked_word, PlayerId, PlayerStatus, RoomId, WordView, MIN_PLAYERS};
use std::collections::{HashMap, HashSet};

/// Whether the current turn still accepts guesses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Drawing,
    /// The turn-end transition has started (or the game is over).
    Ending,
}

/// How a single chat message was graded against the secret word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuessVerdict {
    Correct { points: u32 },
    Wrong,
    /// Matched the word but this player was already credited this turn.
    AlreadyGuessed,
    /// The drawer is never graded. `reveals_word` is set when the message
    /// contains the secret word so the caller can withhold it.
    DrawerMessage { reveals_word: bool },
    /// The turn is ending or the game is over.
    NotAccepting,
    NotAPlayer,
}

impl GuessVerdict {
    pub fn is_correct(&self) -> bool {
        matches!(self, GuessVerdict::Correct { .. })
    }

    pub fn points(&self) -> u32 {
        match self {
            GuessVerdict::Correct { points } => *points,
            _ => 0,
        }
    }
}

/// Result of one Advance-Turn step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TurnAdvance {
    pub round_ended: bool,
    pub game_ended: bool,
}

/// Points for the guesser at 0-based `position` among this turn's correct
/// guessers. Earlier guessers get strictly more, never less than 1.
pub fn points_for_position(player_count: usize, position: usize) -> u32 {
    player_count.saturating_sub(position).max(1) as u32
}

/// Trimmed, case-insensitive comparison.
pub fn guess_matches(guess: &str, word: &str) -> bool {
    let word = word.trim();
    !word.is_empty() && guess.trim().to_lowercase() == word.to_lowercase()
}

#[derive(Debug, Clone, PartialEq)]
pub struct GameSession {
    room_id: RoomId,
    player_order: Vec<PlayerId>,
    current_round: u32,
    total_rounds: u32,
    current_turn_index: usize,
    current_drawer_id: PlayerId,
    word_to_draw: String,
    phase: Phase,
    guessed_player_ids: HashSet<PlayerId>,
    round_scores: HashMap<PlayerId, u32>,
    total_scores: HashMap<PlayerId, u32>,
    connected_player_ids: HashSet<PlayerId>,
    ever_connected_ids: HashSet<PlayerId>,
    category_id: String,
    turn_id: u64,
    started: bool,
}

impl GameSession {
    /// Builds the session for a game that is just starting: round 1, first
    /// player in `player_order` draws `first_word`.
    pub fn new(
        room_id: impl Into<RoomId>,
        player_order: Vec<PlayerId>,
        total_rounds: u32,
        category_id: impl Into<String>,
        first_word: impl Into<String>,
    ) -> GameResult<Self> {
        if player_order.len() < MIN_PLAYERS {
            return Err(GameError::InsufficientPlayers {
                required: MIN_PLAYERS,
                actual: player_order.len(),
            });
        }
        if total_rounds == 0 {
            return Err(GameError::invalid_state("a game needs at least one round"));
        }
        let unique: HashSet<PlayerId> = player_order.iter().copied().collect();
        if unique.len() != player_order.len() {
            return Err(GameError::invalid_state("player order contains duplicates"));
        }

        let current_drawer_id = player_order[0];
        Ok(Self {
            room_id: room_id.into(),
            player_order,
            current_round: 1,
            total_rounds,
            current_turn_index: 0,
            current_drawer_id,
            word_to_draw: first_word.into(),
            phase: Phase::Drawing,
            guessed_player_ids: HashSet::new(),
            round_scores: HashMap::new(),
            total_scores: HashMap::new(),
            connected_player_ids: HashSet::new(),
            ever_connected_ids: HashSet::new(),
            category_id: category_id.into(),
            turn_id: 0,
            started: false,
        })
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn player_order(&self) -> &[PlayerId] {
        &self.player_order
    }

    pub fn player_count(&self) -> usize {
        self.player_order.len()
    }

    pub fn current_round(&self) -> u32 {
        self.current_round
    }

    pub fn total_rounds(&self) -> u32 {
        self.total_rounds
    }

    pub fn current_turn_index(&self) -> usize {
        self.current_turn_index
    }

    pub fn current_drawer_id(&self) -> PlayerId {
        self.current_drawer_id
    }

    pub fn word_to_draw(&self) -> &str {
        &self.word_to_draw
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn guessed_player_ids(&self) -> &HashSet<PlayerId> {
        &self.guessed_player_ids
    }

    pub fn round_scores(&self) -> &HashMap<PlayerId, u32> {
        &self.round_scores
    }

    pub fn total_scores(&self) -> &HashMap<PlayerId, u32> {
        &self.total_scores
    }

    pub fn connected_player_ids(&self) -> &HashSet<PlayerId> {
        &self.connected_player_ids
    }

    pub fn category_id(&self) -> &str {
        &self.category_id
    }

    pub fn turn_id(&self) -> u64 {
        self.turn_id
    }

    pub fn is_player(&self, player_id: PlayerId) -> bool {
        self.player_order.contains(&player_id)
    }

    pub fn has_guessed(&self, player_id: PlayerId) -> bool {
        self.guessed_player_ids.contains(&player_id)
    }

    pub fn is_drawer(&self, player_id: PlayerId) -> bool {
        self.current_drawer_id == player_id
    }

    /// Set once every player has been connected at the same time; stays set
    /// through later disconnects.
    pub fn has_started(&self) -> bool {
        self.started
    }

    pub fn all_connected(&self) -> bool {
        self.connected_player_ids.len() >= self.player_count()
    }

    /// The game is over once the round counter passed the configured total.
    pub fn is_finished(&self) -> bool {
        self.current_round > self.total_rounds
    }

    /// Committed total plus the in-flight points of the current round.
    pub fn combined_score(&self, player_id: PlayerId) -> u32 {
        self.total_scores.get(&player_id).copied().unwrap_or(0)
            + self.round_scores.get(&player_id).copied().unwrap_or(0)
    }

    /// Plain word for the drawer, masked for everyone else.
    pub fn word_for(&self, player_id: PlayerId) -> WordView {
        if self.is_drawer(player_id) {
            WordView::Plain(self.word_to_draw.clone())
        } else {
            WordView::Masked(masked_word(&self.word_to_draw))
        }
    }

    /// Live leaderboard, highest combined score first. Ties keep turn order.
    pub fn standings(&self, names: &HashMap<PlayerId, String>) -> Vec<PlayerStatus> {
        let mut statuses: Vec<PlayerStatus> = self
            .player_order
            .iter()
            .map(|&player_id| PlayerStatus {
                player_id,
                name: names
                    .get(&player_id)
                    .cloned()
                    .unwrap_or_else(|| format!("Player {player_id}")),
                score: self.combined_score(player_id),
                is_drawer: self.is_drawer(player_id),
                has_guessed: self.has_guessed(player_id),
            })
            .collect();
        statuses.sort_by(|a, b| b.score.cmp(&a.score));
        statuses
    }

    /// Returns true the first time a player ever connects to this game;
    /// reconnects return false.
    pub(crate) fn mark_connected(&mut self, player_id: PlayerId) -> bool {
        self.connected_player_ids.insert(player_id);
        let is_new = self.ever_connected_ids.insert(player_id);
        if self.all_connected() {
            self.started = true;
        }
        is_new
    }

    pub(crate) fn mark_disconnected(&mut self, player_id: PlayerId) -> bool {
        self.connected_player_ids.remove(&player_id)
    }

    /// Grades a chat message and credits the player when it is a first
    /// correct guess this turn.
    pub(crate) fn grade_guess(&mut self, player_id: PlayerId, text: &str) -> GuessVerdict {
        if self.phase != Phase::Drawing {
            return GuessVerdict::NotAccepting;
        }
        if !self.is_player(player_id) {
            return GuessVerdict::NotAPlayer;
        }
        if self.is_drawer(player_id) {
            let reveals_word = !self.word_to_draw.trim().is_empty()
                && text
                    .to_lowercase()
                    .contains(&self.word_to_draw.trim().to_lowercase());
            return GuessVerdict::DrawerMessage { reveals_word };
        }
        if !guess_matches(text, &self.word_to_draw) {
            return GuessVerdict::Wrong;
        }
        if self.has_guessed(player_id) {
            return GuessVerdict::AlreadyGuessed;
        }

        let points = points_for_position(self.player_count(), self.guessed_player_ids.len());
        *self.round_scores.entry(player_id).or_insert(0) += points;
        self.guessed_player_ids.insert(player_id);
        debug!(
            "Room {}: player {} guessed correctly for {} points",
            self.room_id, player_id, points
        );
        GuessVerdict::Correct { points }
    }

    /// Every non-drawer has guessed the word.
    pub(crate) fn turn_complete(&self) -> bool {
        self.guessed_player_ids.len() >= self.player_count() - 1
    }

    /// Drawing -> Ending. Returns false if the turn was already ending.
    pub(crate) fn begin_ending(&mut self) -> bool {
        if self.phase != Phase::Drawing {
            return false;
        }
        self.phase = Phase::Ending;
        true
    }

    /// Reopens a turn whose advance could not complete.
    pub(crate) fn cancel_ending(&mut self) {
        if !self.is_finished() {
            self.phase = Phase::Drawing;
        }
    }

    /// Whether the next advance wraps on the last round, so no new word is
    /// needed.
    pub fn next_advance_ends_game(&self) -> bool {
        (self.current_turn_index + 1) % self.player_count() == 0
            && self.current_round >= self.total_rounds
    }

    /// Moves the drawer role to the next player in turn order. A wrap back
    /// to index 0 closes the round: round points are committed to the totals
    /// and the round counter moves on.
    pub(crate) fn advance_turn(&mut self, next_word: String) -> TurnAdvance {
        let next_index = (self.current_turn_index + 1) % self.player_count();
        self.current_turn_index = next_index;
        self.current_drawer_id = self.player_order[next_index];
        self.word_to_draw = next_word;
        self.guessed_player_ids.clear();
        self.phase = Phase::Drawing;
        self.turn_id += 1;

        let mut advance = TurnAdvance::default();
        if next_index == 0 {
            advance.round_ended = true;
            for (player_id, points) in self.round_scores.drain() {
                *self.total_scores.entry(player_id).or_insert(0) += points;
            }
            self.current_round += 1;
            advance.game_ended = self.is_finished();
        }

        if advance.game_ended {
            self.word_to_draw.clear();
            self.phase = Phase::Ending;
        }
        advance
    }
}
