//! Bot module for handling Telegram interactions
//!
//! This module is split into several submodules:
//! - `events`: Transport-independent inbound events and bot commands
//! - `dialogue_manager`: The conversation controller and its transition table
//! - `message_handler`: Turns Telegram messages into events and sends replies
//! - `ui_builder`: Creates replies, keyboards and company list pages

pub mod dialogue_manager;
pub mod events;
pub mod message_handler;
pub mod ui_builder;

// Re-export main handler functions for use in main.rs
pub use dialogue_manager::Controller;
pub use events::{Command, EventKind, InboundEvent};
pub use message_handler::schema;
pub use ui_builder::{Reply, ReplyKeyboard, ReplyMarkup};
