//! PUBG ranked stats Discord bot.

pub mod cache;
pub mod config;
pub mod db;
pub mod discord;
pub mod error;
pub mod leaderboard;
pub mod logging;
pub mod players;
pub mod pubg;
pub mod seasons;
pub mod session;

#[cfg(test)]
mod testing;
