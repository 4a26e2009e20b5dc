//! Message Handler module for processing incoming Telegram messages

use anyhow::Result;
use std::sync::Arc;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use tracing::{debug, error};

use crate::localization::t_lang;
use crate::services::Location;
use crate::session::{Session, SessionDialogue, SessionStorage};

use super::dialogue_manager::Controller;
use super::events::{Command, EventKind, InboundEvent};
use super::ui_builder::Reply;

/// Update handler tree: commands first, every other message after
pub fn schema() -> UpdateHandler<anyhow::Error> {
    Update::filter_message()
        .enter_dialogue::<Message, SessionStorage, Session>()
        .branch(
            dptree::entry()
                .filter_command::<Command>()
                .endpoint(command_handler),
        )
        .branch(dptree::endpoint(message_handler))
}

fn language_code(msg: &Message) -> Option<String> {
    msg.from
        .as_ref()
        .and_then(|user| user.language_code.clone())
}

/// Translate a non-command Telegram message into an event
pub fn event_kind(msg: &Message) -> EventKind {
    if let Some(text) = msg.text() {
        EventKind::Text(text.to_string())
    } else if let Some(location) = msg.location() {
        EventKind::Location(Location::new(location.latitude, location.longitude))
    } else if let Some(largest_photo) = msg.photo().and_then(|photos| photos.last()) {
        EventKind::Document {
            handle: largest_photo.file.id.0.clone(),
        }
    } else if let Some(doc) = msg.document() {
        match &doc.mime_type {
            Some(mime_type) if mime_type.to_string().starts_with("image/") => {
                EventKind::Document {
                    handle: doc.file.id.0.clone(),
                }
            }
            _ => {
                debug!(user_id = %msg.chat.id, "Received non-image document from user");
                EventKind::Unsupported
            }
        }
    } else {
        EventKind::Unsupported
    }
}

pub async fn command_handler(
    bot: Bot,
    msg: Message,
    cmd: Command,
    dialogue: SessionDialogue,
    controller: Arc<Controller>,
) -> Result<()> {
    dispatch_event(&bot, &msg, EventKind::Command(cmd), &dialogue, &controller).await
}

pub async fn message_handler(
    bot: Bot,
    msg: Message,
    dialogue: SessionDialogue,
    controller: Arc<Controller>,
) -> Result<()> {
    let kind = event_kind(&msg);
    dispatch_event(&bot, &msg, kind, &dialogue, &controller).await
}

async fn dispatch_event(
    bot: &Bot,
    msg: &Message,
    kind: EventKind,
    dialogue: &SessionDialogue,
    controller: &Controller,
) -> Result<()> {
    let Some(user) = msg.from.as_ref() else {
        debug!(chat_id = %msg.chat.id, "Ignoring message without sender");
        return Ok(());
    };

    let event = InboundEvent {
        user_id: user.id.0,
        language_code: language_code(msg),
        kind,
    };

    match controller.handle(dialogue, event).await {
        Ok(reply) => send_reply(bot, msg.chat.id, &reply).await,
        Err(e) => {
            error!(user_id = %user.id.0, error = %e, "Failed to handle message");
            let apology = t_lang(
                controller.localization(),
                "error-generic",
                user.language_code.as_deref(),
            );
            bot.send_message(msg.chat.id, apology).await?;
            Err(e)
        }
    }
}

pub async fn send_reply(bot: &Bot, chat_id: ChatId, reply: &Reply) -> Result<()> {
    let mut request = bot.send_message(chat_id, reply.text.clone());
    if let Some(markup) = &reply.markup {
        request = request.reply_markup(teloxide::types::ReplyMarkup::from(markup));
    }
    request.await?;
    Ok(())
}
