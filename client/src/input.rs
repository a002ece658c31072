//! Terminal input parsing: slash commands and free-text guesses

use shared::{Packet, Stroke};
use thiserror::Error;

pub const DEFAULT_ROUNDS: u32 = 3;
pub const DEFAULT_DRAWING_SECS: u32 = 80;
pub const DEFAULT_CATEGORY: &str = "animals";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Create {
        rounds: u32,
        category: String,
        drawing_secs: u32,
    },
    Join(String),
    Start,
    Draw(Stroke),
    Say(String),
    Help,
    Quit,
}

impl Command {
    /// Packet to send for this command, if it talks to the server.
    pub fn to_packet(&self) -> Option<Packet> {
        match self {
            Command::Create {
                rounds,
                category,
                drawing_secs,
            } => Some(Packet::CreateRoom {
                rounds: *rounds,
                category: category.clone(),
                drawing_secs: *drawing_secs,
            }),
            Command::Join(code) => Some(Packet::JoinRoom { code: code.clone() }),
            Command::Start => Some(Packet::StartGame),
            Command::Draw(stroke) => Some(Packet::Draw {
                stroke: stroke.clone(),
            }),
            Command::Say(text) => Some(Packet::Guess { text: text.clone() }),
            Command::Help | Command::Quit => None,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("unknown command /{0}, try /help")]
    UnknownCommand(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("bad point {0:?}, expected x,y")]
    BadPoint(String),
}

pub const HELP: &str = "\
/create [rounds] [category] [seconds]  open a room
/join CODE                             join a room
/start                                 start the game (host only)
/draw x,y x,y ...                      draw a stroke (drawer only)
/quit                                  leave
anything else                          chat or guess";

/// Parses one line typed by the player. Blank lines yield `None`.
pub fn parse_line(line: &str) -> Result<Option<Command>, InputError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Some(Command::Say(line.to_string())));
    };

    let mut parts = rest.split_whitespace();
    let name = parts.next().unwrap_or_default().to_lowercase();
    let args: Vec<&str> = parts.collect();

    let command = match name.as_str() {
        "create" => parse_create(&args)?,
        "join" => match args.as_slice() {
            [code] => Command::Join(code.to_uppercase()),
            _ => return Err(InputError::Usage("/join CODE")),
        },
        "start" => Command::Start,
        "draw" => Command::Draw(parse_stroke(&args)?),
        "help" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(InputError::UnknownCommand(other.to_string())),
    };
    Ok(Some(command))
}

fn parse_create(args: &[&str]) -> Result<Command, InputError> {
    const USAGE: &str = "/create [rounds] [category] [seconds]";
    if args.len() > 3 {
        return Err(InputError::Usage(USAGE));
    }

    let rounds = match args.first() {
        Some(text) => text.parse().map_err(|_| InputError::Usage(USAGE))?,
        None => DEFAULT_ROUNDS,
    };
    let category = args
        .get(1)
        .map(|c| c.to_lowercase())
        .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());
    let drawing_secs = match args.get(2) {
        Some(text) => text.parse().map_err(|_| InputError::Usage(USAGE))?,
        None => DEFAULT_DRAWING_SECS,
    };

    Ok(Command::Create {
        rounds,
        category,
        drawing_secs,
    })
}

fn parse_stroke(args: &[&str]) -> Result<Stroke, InputError> {
    if args.len() < 2 {
        return Err(InputError::Usage("/draw x,y x,y ..."));
    }

    let points = args
        .iter()
        .map(|arg| {
            let (x, y) = arg
                .split_once(',')
                .ok_or_else(|| InputError::BadPoint(arg.to_string()))?;
            let x = x.parse().map_err(|_| InputError::BadPoint(arg.to_string()))?;
            let y = y.parse().map_err(|_| InputError::BadPoint(arg.to_string()))?;
            Ok((x, y))
        })
        .collect::<Result<Vec<(f32, f32)>, InputError>>()?;

    Ok(Stroke {
        points,
        color: 0x000000,
        width: 2.0,
    })
}
