//! Tank Arena Server - authoritative game server for a four-player tank arena
//!
//! Clients connect over TCP and speak a newline-delimited text protocol.
//! The server owns all game state: it moves tanks on command, simulates
//! bullets at a fixed tick rate, resolves hits and scores, and broadcasts
//! a full snapshot of the arena to every player each tick.

pub mod app;
pub mod config;
pub mod game;
pub mod net;
pub mod util;
