//! # Sketch Terminal Client
//!
//! A line-based client for the drawing and guessing server. Everything the
//! player types is either a slash command (create, join, start, draw) or a
//! chat line that the server grades as a guess.
//!
//! ## Module Organization
//!
//! - `input`: parses typed lines into commands and packets
//! - `game`: local view state rebuilt from server packets, plus the text
//!   shown for each one
//! - `network`: UDP socket, heartbeats and the stdin/socket event loop
//!
//! The client holds no game rules. It renders whatever view the server
//! sends, so a guesser only ever sees the masked word.

pub mod game;
pub mod input;
pub mod network;
