use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use teloxide::dispatching::dialogue::Dialogue;
use teloxide::types::ChatId;

use stella::bot::ui_builder::{company_keyboard, paginate, NEXT_PAGE, PREV_PAGE};
use stella::dialogue::{station_options, validate_company_name, ConversationState};
use stella::services::Location;
use stella::session::{Session, SessionDialogue, SessionStorage};

/// Integration test for company name validation
#[tokio::test]
async fn test_company_name_dialogue_validation() -> Result<()> {
    assert_eq!(validate_company_name("  Shell ").as_deref(), Ok("Shell"));
    assert!(validate_company_name(&"a".repeat(100)).is_ok());

    assert!(validate_company_name("").is_err());
    assert!(validate_company_name("   ").is_err());
    assert!(validate_company_name("/setdata").is_err());
    assert!(validate_company_name(&"a".repeat(101)).is_err());

    Ok(())
}

/// Sessions keep their state across serialization
#[tokio::test]
async fn test_dialogue_state_serialization() -> Result<()> {
    let state = ConversationState::AwaitingStationChoice {
        options: station_options(Some(("OKKO", "Stryiska St 45"))),
    };

    let serialized = serde_json::to_string(&state)?;
    assert!(serialized.contains("OKKO Stryiska St 45"));

    let deserialized: ConversationState = serde_json::from_str(&serialized)?;
    assert_eq!(deserialized, state);

    Ok(())
}

#[tokio::test]
async fn test_session_storage_keeps_state_and_location() -> Result<()> {
    let storage = SessionStorage::new(Some(Duration::from_secs(3600)));
    let chat: SessionDialogue = Dialogue::new(Arc::clone(&storage), ChatId(7));

    let mut session = chat.get_or_default().await?;
    session.state = ConversationState::AwaitingStationAddress;
    session.company = Some("OKKO".to_string());
    session.record_location(Location::new(49.84, 24.03));
    chat.update(session).await?;

    let session = chat.get().await?.expect("stored session");
    assert_eq!(session.state, ConversationState::AwaitingStationAddress);
    assert_eq!(session.company.as_deref(), Some("OKKO"));
    assert_eq!(session.location, Some(Location::new(49.84, 24.03)));

    // Unknown chats start idle without a location
    let fresh = Dialogue::new(Arc::clone(&storage), ChatId(8))
        .get_or_default()
        .await?;
    assert_eq!(fresh, Session::default());
    assert!(fresh.state.is_idle());

    Ok(())
}

#[test]
fn test_company_keyboard_layout() {
    let companies: Vec<String> = ["BRSM", "KLO", "OKKO", "Shell", "UPG", "WOG"]
        .iter()
        .map(|name| name.to_string())
        .collect();

    let page = paginate(&companies, 1, 4);
    let keyboard = company_keyboard(&page);

    assert_eq!(
        keyboard.rows,
        vec![
            vec!["UPG".to_string(), "WOG".to_string()],
            vec![PREV_PAGE.to_string()],
            vec!["/add_company".to_string(), "/cancel".to_string()],
        ]
    );
    assert!(!page.has_next());
    assert!(!keyboard.request_location);

    let first = company_keyboard(&paginate(&companies, 0, 4));
    assert_eq!(first.rows[2], vec![NEXT_PAGE.to_string()]);
}
