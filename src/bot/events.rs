//! Inbound events, independent of the chat transport

use teloxide::utils::command::BotCommands;

use crate::services::Location;

#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "These commands are supported:")]
pub enum Command {
    #[command(description = "show the welcome message.")]
    Start,
    #[command(description = "display this text.")]
    Help,
    #[command(description = "send us an actual photo with gas prices.")]
    SetData,
    #[command(description = "get information about gas prices.")]
    GetData,
    #[command(rename = "add_company", description = "add a fuel company missing from the list.")]
    AddCompany,
    #[command(description = "share your location.")]
    Location,
    #[command(description = "stop the current step.")]
    Cancel,
}

/// What the user sent
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    Command(Command),
    Text(String),
    Location(Location),
    /// A photo or document, identified by a transient file handle
    Document { handle: String },
    Unsupported,
}

/// A message from one user
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEvent {
    pub user_id: u64,
    pub language_code: Option<String>,
    pub kind: EventKind,
}

impl InboundEvent {
    pub fn new(user_id: u64, kind: EventKind) -> Self {
        Self {
            user_id,
            language_code: None,
            kind,
        }
    }

    pub fn with_language(mut self, language_code: impl Into<String>) -> Self {
        self.language_code = Some(language_code.into());
        self
    }

    pub fn command(user_id: u64, command: Command) -> Self {
        Self::new(user_id, EventKind::Command(command))
    }

    pub fn text(user_id: u64, text: impl Into<String>) -> Self {
        Self::new(user_id, EventKind::Text(text.into()))
    }

    pub fn location(user_id: u64, latitude: f64, longitude: f64) -> Self {
        Self::new(user_id, EventKind::Location(Location::new(latitude, longitude)))
    }

    pub fn document(user_id: u64, handle: impl Into<String>) -> Self {
        Self::new(
            user_id,
            EventKind::Document {
                handle: handle.into(),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_parsing() {
        assert_eq!(Command::parse("/setdata", "stella_bot").unwrap(), Command::SetData);
        assert_eq!(Command::parse("/add_company", "stella_bot").unwrap(), Command::AddCompany);
        assert_eq!(
            Command::parse("/cancel@stella_bot", "stella_bot").unwrap(),
            Command::Cancel
        );
        assert!(Command::parse("Shell", "stella_bot").is_err());
        assert!(Command::parse("/unknown", "stella_bot").is_err());
    }
}
