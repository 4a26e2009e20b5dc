//! # Stella Telegram Bot
//!
//! A Telegram bot that collects photos of fuel prices at gas stations,
//! tags them with the user's location and links them to known fuel
//! companies and stations.

pub mod bot;
pub mod config;
pub mod db;
pub mod dialogue;
pub mod localization;
pub mod logging;
pub mod media;
pub mod report;
pub mod services;
pub mod session;

// Re-export types for easier access
pub use bot::{Controller, InboundEvent, Reply};
pub use config::BotConfig;
pub use session::{SessionDialogue, SessionStorage};
