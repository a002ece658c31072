//! Types shared between the game server and its clients: identifiers, the
//! UDP packet protocol and the small value types carried inside it.

use serde::{Deserialize, Serialize};

/// Server-assigned player identifier.
pub type PlayerId = u32;

/// Short uppercase room code, e.g. `"K7QX2M"`.
pub type RoomId = String;

pub const PROTOCOL_VERSION: u32 = 1;
pub const MIN_PLAYERS: usize = 2;
pub const MASK_CHAR: char = '*';

/// Replaces every non-whitespace character with `*`, keeping whitespace
/// exactly where it was.
pub fn masked_word(word: &str) -> String {
    word.chars()
        .map(|c| if c.is_whitespace() { c } else { MASK_CHAR })
        .collect()
}

/// The secret word as one particular player is allowed to see it.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum WordView {
    Plain(String),
    Masked(String),
}

impl WordView {
    pub fn text(&self) -> &str {
        match self {
            WordView::Plain(word) | WordView::Masked(word) => word,
        }
    }

    pub fn is_plain(&self) -> bool {
        matches!(self, WordView::Plain(_))
    }
}

/// One leaderboard row.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PlayerStatus {
    pub player_id: PlayerId,
    pub name: String,
    pub score: u32,
    pub is_drawer: bool,
    pub has_guessed: bool,
}

/// A freehand line segment drawn by the current drawer.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Stroke {
    pub points: Vec<(f32, f32)>,
    pub color: u32,
    pub width: f32,
}

impl Stroke {
    /// Total polyline length, used to drop degenerate strokes.
    pub fn length(&self) -> f32 {
        self.points
            .windows(2)
            .map(|pair| {
                let (x1, y1) = pair[0];
                let (x2, y2) = pair[1];
                ((x2 - x1).powi(2) + (y2 - y1).powi(2)).sqrt()
            })
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Packet {
    // Client -> server
    Connect {
        client_version: u32,
        name: String,
        resume: Option<PlayerId>,
    },
    CreateRoom {
        rounds: u32,
        category: String,
        drawing_secs: u32,
    },
    JoinRoom {
        code: RoomId,
    },
    StartGame,
    Guess {
        text: String,
    },
    Draw {
        stroke: Stroke,
    },
    Heartbeat,
    Disconnect,

    // Server -> client
    Connected {
        player_id: PlayerId,
    },
    RoomJoined {
        code: RoomId,
        host: PlayerId,
    },
    Waiting {
        connected: usize,
        needed: usize,
    },
    TurnStarted {
        round: u32,
        total_rounds: u32,
        drawer: PlayerId,
        word: WordView,
    },
    Chat {
        player_id: PlayerId,
        text: String,
    },
    CorrectGuess {
        player_id: PlayerId,
        points: u32,
    },
    TurnEnded {
        word: String,
    },
    RoundEnded {
        round: u32,
    },
    Leaderboard {
        standings: Vec<PlayerStatus>,
    },
    GameEnded {
        standings: Vec<PlayerStatus>,
    },
    Strokes {
        stroke: Stroke,
    },
    System {
        text: String,
    },
    Rejected {
        reason: String,
    },
    Disconnected {
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_masked_word_preserves_spaces() {
        assert_eq!(masked_word("DOG CAT"), "*** ***");
        assert_eq!(masked_word("ice  cream"), "***  *****");
    }

    #[test]
    fn test_masked_word_empty() {
        assert_eq!(masked_word(""), "");
    }

    #[test]
    fn test_masked_word_keeps_length_and_whitespace_positions() {
        let word = "über\tbahn hof";
        let masked = masked_word(word);

        assert_eq!(masked.chars().count(), word.chars().count());
        for (original, hidden) in word.chars().zip(masked.chars()) {
            if original.is_whitespace() {
                assert_eq!(original, hidden);
            } else {
                assert_eq!(hidden, MASK_CHAR);
            }
        }
    }

    #[test]
    fn test_word_view_text() {
        let plain = WordView::Plain("apple".to_string());
        let masked = WordView::Masked(masked_word("apple"));

        assert_eq!(plain.text(), "apple");
        assert_eq!(masked.text(), "*****");
        assert!(plain.is_plain());
        assert!(!masked.is_plain());
    }

    #[test]
    fn test_stroke_length() {
        let stroke = Stroke {
            points: vec![(0.0, 0.0), (3.0, 4.0), (3.0, 10.0)],
            color: 0x000000,
            width: 2.0,
        };

        assert_approx_eq!(stroke.length(), 11.0, 0.0001);
        assert!(!stroke.is_empty());
    }

    #[test]
    fn test_single_point_stroke_has_zero_length() {
        let stroke = Stroke {
            points: vec![(5.0, 5.0)],
            color: 0xff0000,
            width: 4.0,
        };

        assert_approx_eq!(stroke.length(), 0.0, 0.0001);
    }

    #[test]
    fn test_packet_serialization_turn_started() {
        let packet = Packet::TurnStarted {
            round: 2,
            total_rounds: 3,
            drawer: 7,
            word: WordView::Masked("*****".to_string()),
        };

        let serialized = bincode::serialize(&packet).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();

        match deserialized {
            Packet::TurnStarted {
                round,
                total_rounds,
                drawer,
                word,
            } => {
                assert_eq!(round, 2);
                assert_eq!(total_rounds, 3);
                assert_eq!(drawer, 7);
                assert_eq!(word, WordView::Masked("*****".to_string()));
            }
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_packet_serialization_draw() {
        let packet = Packet::Draw {
            stroke: Stroke {
                points: vec![(1.5, 2.5), (10.0, 20.0)],
                color: 0x00ff00,
                width: 3.0,
            },
        };

        let serialized = bincode::serialize(&packet).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();

        match deserialized {
            Packet::Draw { stroke } => {
                assert_eq!(stroke.points.len(), 2);
                assert_approx_eq!(stroke.points[0].0, 1.5, 0.0001);
                assert_approx_eq!(stroke.width, 3.0, 0.0001);
                assert_eq!(stroke.color, 0x00ff00);
            }
            _ => panic!("Wrong packet type after deserialization"),
        }
    }
}
