//! Local view of the game, rebuilt from server packets

use shared::{Packet, PlayerId, PlayerStatus, RoomId, WordView};
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct ClientGameState {
    pub player_id: Option<PlayerId>,
    pub room: Option<RoomId>,
    pub host: Option<PlayerId>,
    pub round: u32,
    pub total_rounds: u32,
    pub drawer: Option<PlayerId>,
    pub word: Option<WordView>,
    pub standings: Vec<PlayerStatus>,
    pub strokes_seen: usize,
    names: HashMap<PlayerId, String>,
}

impl ClientGameState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_drawing(&self) -> bool {
        self.player_id.is_some() && self.drawer == self.player_id
    }

    pub fn name_of(&self, player_id: PlayerId) -> String {
        if Some(player_id) == self.player_id {
            return "You".to_string();
        }
        self.names
            .get(&player_id)
            .cloned()
            .unwrap_or_else(|| format!("Player {player_id}"))
    }

    /// Applies a server packet and returns the lines to show the player.
    pub fn apply(&mut self, packet: Packet) -> Vec<String> {
        match packet {
            Packet::Connected { player_id } => {
                self.player_id = Some(player_id);
                vec![format!("Connected as player {player_id}. Type /help for commands.")]
            }
            Packet::RoomJoined { code, host } => {
                self.room = Some(code.clone());
                self.host = Some(host);
                if Some(host) == self.player_id {
                    vec![format!("Room {code} is open. Share the code, then /start.")]
                } else {
                    vec![format!("Joined room {code}.")]
                }
            }
            Packet::Waiting { connected, needed } => {
                vec![format!("Waiting for players ({connected}/{needed})...")]
            }
            Packet::TurnStarted {
                round,
                total_rounds,
                drawer,
                word,
            } => {
                self.round = round;
                self.total_rounds = total_rounds;
                self.drawer = Some(drawer);
                self.strokes_seen = 0;
                let line = match &word {
                    WordView::Plain(text) => {
                        format!("Round {round}/{total_rounds}: you are drawing \"{text}\"")
                    }
                    WordView::Masked(text) => format!(
                        "Round {round}/{total_rounds}: {} is drawing  {text}  ({} letters)",
                        self.name_of(drawer),
                        text.chars().filter(|c| !c.is_whitespace()).count()
                    ),
                };
                self.word = Some(word);
                vec![line]
            }
            Packet::Chat { player_id, text } => {
                vec![format!("{}: {text}", self.name_of(player_id))]
            }
            Packet::CorrectGuess { player_id, points } => {
                vec![format!(
                    "{} guessed the word! (+{points})",
                    self.name_of(player_id)
                )]
            }
            Packet::TurnEnded { word } => {
                self.word = None;
                self.drawer = None;
                vec![format!("The word was \"{word}\".")]
            }
            Packet::RoundEnded { round } => vec![format!("Round {round} is over.")],
            Packet::Leaderboard { standings } => {
                self.record_standings(standings);
                Vec::new()
            }
            Packet::GameEnded { standings } => {
                self.record_standings(standings);
                let mut lines = vec!["Game over! Final standings:".to_string()];
                lines.extend(self.leaderboard_lines());
                self.reset_room();
                lines
            }
            Packet::Strokes { stroke } => {
                self.strokes_seen += 1;
                vec![format!(
                    "~ stroke #{} ({} points)",
                    self.strokes_seen,
                    stroke.points.len()
                )]
            }
            Packet::System { text } => vec![format!("* {text}")],
            Packet::Rejected { reason } => vec![format!("! {reason}")],
            Packet::Disconnected { reason } => {
                self.reset_room();
                vec![format!("Disconnected: {reason}")]
            }
            other => vec![format!("? unexpected packet {other:?}")],
        }
    }

    pub fn leaderboard_lines(&self) -> Vec<String> {
        self.standings
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let mark = if row.is_drawer {
                    " (drawing)"
                } else if row.has_guessed {
                    " (guessed)"
                } else {
                    ""
                };
                format!("{:>2}. {:<20} {:>4}{mark}", i + 1, row.name, row.score)
            })
            .collect()
    }

    fn record_standings(&mut self, standings: Vec<PlayerStatus>) {
        for row in &standings {
            self.names.insert(row.player_id, row.name.clone());
        }
        self.standings = standings;
    }

    fn reset_room(&mut self) {
        self.room = None;
        self.host = None;
        self.drawer = None;
        self.word = None;
        self.round = 0;
        self.total_rounds = 0;
        self.strokes_seen = 0;
    }
}
