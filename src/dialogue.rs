//! Conversation state for the price submission dialogue.

use serde::{Deserialize, Serialize};

/// Label of the catch-all station option
pub const OTHER_STATION: &str = "other";

/// Maximum length of a company name, in characters
pub const MAX_COMPANY_NAME_LEN: usize = 100;

/// Maximum length of a station address, in characters
pub const MAX_STATION_ADDRESS_LEN: usize = 200;

/// Represents where a user is in the data entry flow
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum ConversationState {
    #[default]
    Idle,
    AwaitingNewCompanyName,
    AwaitingCompanyChoice {
        query: Option<String>,
        page: usize,
    },
    AwaitingLocation,
    AwaitingStationChoice {
        options: Vec<String>,
    },
    /// The user picked "other" and is typing the address of their station
    AwaitingStationAddress,
}

impl ConversationState {
    pub fn is_idle(&self) -> bool {
        matches!(self, ConversationState::Idle)
    }
}

/// Validates a company name input
pub fn validate_company_name(name: &str) -> Result<String, &'static str> {
    validate_free_text(name, MAX_COMPANY_NAME_LEN)
}

/// Validates a station address input
pub fn validate_station_address(address: &str) -> Result<String, &'static str> {
    validate_free_text(address, MAX_STATION_ADDRESS_LEN)
}

fn validate_free_text(text: &str, max_len: usize) -> Result<String, &'static str> {
    let trimmed = text.trim();

    if trimmed.is_empty() {
        return Err("empty");
    }

    if trimmed.starts_with('/') {
        return Err("command");
    }

    if trimmed.chars().count() > max_len {
        return Err("too_long");
    }

    Ok(trimmed.to_string())
}

/// Station options offered after a location share
pub fn station_options(resolved: Option<(&str, &str)>) -> Vec<String> {
    let mut options = Vec::with_capacity(2);
    if let Some((company, address)) = resolved {
        options.push(format!("{company} {address}"));
    }
    options.push(OTHER_STATION.to_string());
    options
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_company_name_validation() {
        assert!(validate_company_name("WOG").is_ok());
        assert!(validate_company_name("  Shell  ").is_ok());
        assert!(validate_company_name("ОККО").is_ok());

        assert_eq!(validate_company_name(""), Err("empty"));
        assert_eq!(validate_company_name("   "), Err("empty"));
        assert_eq!(validate_company_name("/cancel"), Err("command"));
        assert_eq!(validate_company_name(&"a".repeat(101)), Err("too_long"));
    }

    #[test]
    fn test_company_name_length_counts_chars() {
        // 100 Cyrillic letters are 200 bytes
        assert!(validate_company_name(&"б".repeat(100)).is_ok());
    }

    #[test]
    fn test_company_name_trimming() {
        assert_eq!(validate_company_name("  BRSM-Nafta ").unwrap(), "BRSM-Nafta");
    }

    #[test]
    fn test_station_address_validation() {
        assert_eq!(
            validate_station_address(" Stryiska St 45 ").as_deref(),
            Ok("Stryiska St 45")
        );
        assert!(validate_station_address(&"a".repeat(150)).is_ok());
        assert_eq!(validate_station_address(&"a".repeat(201)), Err("too_long"));
        assert_eq!(validate_station_address("/cancel"), Err("command"));
        assert_eq!(validate_station_address(""), Err("empty"));
    }

    #[test]
    fn test_station_options() {
        assert_eq!(
            station_options(Some(("Shell", "Freedom Ave 10"))),
            vec!["Shell Freedom Ave 10".to_string(), "other".to_string()]
        );
        assert_eq!(station_options(None), vec!["other".to_string()]);
    }

    #[test]
    fn test_default_state_is_idle() {
        assert!(ConversationState::default().is_idle());
    }
}
