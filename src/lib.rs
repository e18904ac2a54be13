pub mod checkin;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod interaction;
pub mod leaderboard;
pub mod lobby;
pub mod models;
pub mod notify;
pub mod registration;
pub mod scheduler;
pub mod sessions;
pub mod store;
pub mod teams;
pub mod utils;

#[cfg(test)]
mod testing;

pub use engine::{Engine, Settings, TextOutcome};
pub use error::{BotError, BotResult};
