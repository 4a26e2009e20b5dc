//! Dialogue Manager module for handling dialogue state transitions
//!
//! [`Controller`] is the conversation core. It loads the chat's session from
//! the dialogue storage, runs the handler selected by the (state, event)
//! pair on a working copy and stores that copy back only after the handler
//! succeeded, so a failing collaborator leaves the conversation where it was.

use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info};

use crate::dialogue::{
    station_options, validate_company_name, validate_station_address, ConversationState,
    OTHER_STATION,
};
use crate::localization::{t_args_lang, t_lang, LocalizationManager};
use crate::services::{
    CompanyInsert, DirectoryLookup, Location, MediaRelay, Submission, SubmissionStore,
};
use crate::session::{Session, SessionDialogue};

use super::events::{Command, EventKind, InboundEvent};
use super::ui_builder::{
    add_company_keyboard, company_keyboard, location_keyboard, paginate, start_keyboard,
    station_keyboard, Reply, ReplyKeyboard, NEXT_PAGE, PREV_PAGE,
};

/// Result of one handler: the reply and the state to move to, if any
#[derive(Debug)]
struct Step {
    reply: Reply,
    next: Option<ConversationState>,
}

impl Step {
    fn stay(reply: Reply) -> Self {
        Self { reply, next: None }
    }

    fn go(reply: Reply, next: ConversationState) -> Self {
        Self {
            reply,
            next: Some(next),
        }
    }
}

/// Drives the price submission conversation
pub struct Controller {
    directory: Arc<dyn DirectoryLookup>,
    submissions: Arc<dyn SubmissionStore>,
    media: Arc<dyn MediaRelay>,
    localization: Arc<LocalizationManager>,
    page_size: usize,
}

impl Controller {
    pub fn new(
        directory: Arc<dyn DirectoryLookup>,
        submissions: Arc<dyn SubmissionStore>,
        media: Arc<dyn MediaRelay>,
        localization: Arc<LocalizationManager>,
        page_size: usize,
    ) -> Self {
        Self {
            directory,
            submissions,
            media,
            localization,
            page_size: page_size.max(1),
        }
    }

    pub fn localization(&self) -> &LocalizationManager {
        &self.localization
    }

    /// Handle one inbound event to completion and return the reply to send
    pub async fn handle(&self, dialogue: &SessionDialogue, event: InboundEvent) -> Result<Reply> {
        let user_id = event.user_id;
        let lang = event.language_code.as_deref();
        let mut session = dialogue.get_or_default().await?;
        let state = session.state.clone();

        debug!(user_id = %user_id, state = ?state, event = ?event.kind, "Handling event");

        let step = match (state, event.kind) {
            (_, EventKind::Command(Command::Cancel)) => {
                session.company = None;
                Step::go(
                    self.reply(lang, "cancelled").remove_keyboard(),
                    ConversationState::Idle,
                )
            }
            (_, EventKind::Command(Command::Start)) => {
                session.company = None;
                Step::go(
                    self.reply(lang, "welcome").with_keyboard(start_keyboard()),
                    ConversationState::Idle,
                )
            }
            (_, EventKind::Command(Command::Help)) => Step::stay(self.reply(lang, "help")),
            (_, EventKind::Command(Command::GetData)) => {
                Step::stay(self.reply(lang, "getdata-in-development"))
            }
            (_, EventKind::Command(Command::SetData)) => self.list_companies(None, 0, lang).await?,
            (_, EventKind::Command(Command::AddCompany)) => Step::go(
                self.reply(lang, "enter-company-name").remove_keyboard(),
                ConversationState::AwaitingNewCompanyName,
            ),
            (_, EventKind::Command(Command::Location)) => Step::stay(
                self.reply(lang, "location-request")
                    .with_keyboard(location_keyboard(&self.t(lang, "my-location-button"))),
            ),
            (_, EventKind::Document { handle }) => {
                self.submit_photo(user_id, &session, &handle, lang).await?
            }
            (ConversationState::AwaitingLocation, EventKind::Location(location)) => {
                self.resolve_station(user_id, &mut session, location, lang)
                    .await?
            }
            (state, EventKind::Location(location)) => {
                session.record_location(location);
                self.acknowledge_location(state, lang).await?
            }
            (ConversationState::AwaitingCompanyChoice { query, page }, EventKind::Text(text)) => {
                self.choose_company(user_id, &mut session, query, page, &text, lang)
                    .await?
            }
            (ConversationState::AwaitingNewCompanyName, EventKind::Text(text)) => {
                self.add_company(user_id, &mut session, &text, lang).await?
            }
            (ConversationState::AwaitingLocation, EventKind::Text(_)) => Step::stay(
                self.reply(lang, "location-expected")
                    .with_keyboard(self.share_location_keyboard(lang)),
            ),
            (ConversationState::AwaitingStationChoice { options }, EventKind::Text(text)) => {
                self.choose_station(user_id, &session, options, &text, lang)
            }
            (ConversationState::AwaitingStationAddress, EventKind::Text(text)) => {
                self.register_station(user_id, &session, &text, lang).await?
            }
            (ConversationState::Idle, EventKind::Text(_)) => {
                Step::stay(self.reply(lang, "text-response"))
            }
            (_, EventKind::Unsupported) => Step::stay(self.reply(lang, "unsupported-message")),
        };

        if let Some(next) = step.next {
            debug!(user_id = %user_id, next = ?next, "State transition");
            session.state = next;
        }
        dialogue.update(session).await?;

        Ok(step.reply)
    }

    fn t(&self, lang: Option<&str>, key: &str) -> String {
        t_lang(&self.localization, key, lang)
    }

    fn reply(&self, lang: Option<&str>, key: &str) -> Reply {
        Reply::text(self.t(lang, key))
    }

    fn share_location_keyboard(&self, lang: Option<&str>) -> ReplyKeyboard {
        location_keyboard(&self.t(lang, "share-location-button"))
    }

    /// Reply prefixed with `head` that asks for a location share
    fn location_prompt(&self, head: String, lang: Option<&str>) -> Reply {
        Reply::text(format!("{head}\n\n{}", self.t(lang, "share-location-prompt")))
            .with_keyboard(self.share_location_keyboard(lang))
    }

    /// Thank the user for a location and repeat what the current state still waits for
    async fn acknowledge_location(
        &self,
        state: ConversationState,
        lang: Option<&str>,
    ) -> Result<Step> {
        let thanks = self.t(lang, "location-thanks");
        let pending = match state {
            ConversationState::Idle | ConversationState::AwaitingLocation => {
                return Ok(Step::stay(Reply::text(thanks).remove_keyboard()));
            }
            ConversationState::AwaitingCompanyChoice { query, page } => {
                self.list_companies(query, page, lang).await?.reply
            }
            ConversationState::AwaitingNewCompanyName => self.reply(lang, "enter-company-name"),
            ConversationState::AwaitingStationChoice { options } => self
                .reply(lang, "choose-station")
                .with_keyboard(station_keyboard(&options)),
            ConversationState::AwaitingStationAddress => self.reply(lang, "enter-station-address"),
        };
        Ok(Step::stay(pending.prefixed(&thanks)))
    }

    async fn list_companies(
        &self,
        query: Option<String>,
        page: usize,
        lang: Option<&str>,
    ) -> Result<Step> {
        let companies = self.directory.list_companies(query.as_deref()).await?;
        Ok(self.render_companies(&companies, query, page, lang))
    }

    fn render_companies(
        &self,
        companies: &[String],
        query: Option<String>,
        page: usize,
        lang: Option<&str>,
    ) -> Step {
        if companies.is_empty() {
            let text = match &query {
                Some(query) => t_args_lang(
                    &self.localization,
                    "no-companies-match",
                    &[("query", query.as_str())],
                    lang,
                ),
                None => self.t(lang, "no-companies-found"),
            };
            return Step::go(
                Reply::text(text).with_keyboard(add_company_keyboard()),
                ConversationState::AwaitingCompanyChoice { query, page: 0 },
            );
        }

        let company_page = paginate(companies, page, self.page_size);
        let page_number = (company_page.page + 1).to_string();
        let pages = company_page.pages.to_string();
        let text = t_args_lang(
            &self.localization,
            "choose-company",
            &[("page", page_number.as_str()), ("pages", pages.as_str())],
            lang,
        );
        let keyboard = company_keyboard(&company_page);

        Step::go(
            Reply::text(text).with_keyboard(keyboard),
            ConversationState::AwaitingCompanyChoice {
                query,
                page: company_page.page,
            },
        )
    }

    async fn choose_company(
        &self,
        user_id: u64,
        session: &mut Session,
        query: Option<String>,
        page: usize,
        text: &str,
        lang: Option<&str>,
    ) -> Result<Step> {
        let text = text.trim();

        if text == NEXT_PAGE {
            return self.list_companies(query, page + 1, lang).await;
        }
        if text == PREV_PAGE {
            return self.list_companies(query, page.saturating_sub(1), lang).await;
        }
        if text.is_empty() {
            return self.list_companies(None, 0, lang).await;
        }

        let matches = self.directory.list_companies(Some(text)).await?;
        let chosen = matches
            .iter()
            .find(|name| name.to_lowercase() == text.to_lowercase());

        match chosen {
            Some(name) => {
                info!(user_id = %user_id, company = %name, "Company chosen");
                let head = t_args_lang(
                    &self.localization,
                    "company-selected",
                    &[("name", name.as_str())],
                    lang,
                );
                session.company = Some(name.clone());
                Ok(Step::go(
                    self.location_prompt(head, lang),
                    ConversationState::AwaitingLocation,
                ))
            }
            None => {
                debug!(user_id = %user_id, query = %text, matches = matches.len(), "Company search");
                Ok(self.render_companies(&matches, Some(text.to_string()), 0, lang))
            }
        }
    }

    async fn add_company(
        &self,
        user_id: u64,
        session: &mut Session,
        text: &str,
        lang: Option<&str>,
    ) -> Result<Step> {
        let name = match validate_company_name(text) {
            Ok(name) => name,
            Err(reason) => {
                let key = match reason {
                    "too_long" => "company-name-too-long",
                    "command" => "company-name-command",
                    _ => "company-name-invalid",
                };
                // Keep dialogue active, user can try again
                return Ok(Step::stay(self.reply(lang, key)));
            }
        };

        let inserted = self.directory.add_company(&name).await?;
        let company = inserted.company().name.clone();
        let key = match inserted {
            CompanyInsert::Created(_) => {
                info!(user_id = %user_id, company = %company, "Company created");
                "company-added"
            }
            CompanyInsert::Existing(_) => "company-exists",
        };
        let head = t_args_lang(&self.localization, key, &[("name", company.as_str())], lang);
        session.company = Some(company);

        Ok(Step::go(
            self.location_prompt(head, lang),
            ConversationState::AwaitingLocation,
        ))
    }

    async fn resolve_station(
        &self,
        user_id: u64,
        session: &mut Session,
        location: Location,
        lang: Option<&str>,
    ) -> Result<Step> {
        session.record_location(location);

        let options = match self.directory.resolve(location).await? {
            Some(place) => {
                let station = self
                    .directory
                    .acquire_station(&place.company, &place.address)
                    .await?;
                debug!(user_id = %user_id, station_id = station.id, "Nearest station resolved");
                station_options(Some((place.company.as_str(), station.address.as_str())))
            }
            None => {
                debug!(user_id = %user_id, "No station near the shared location");
                station_options(None)
            }
        };

        let mut text = self.t(lang, "location-thanks");
        if options.len() == 1 {
            text.push_str("\n\n");
            text.push_str(&self.t(lang, "no-station-nearby"));
        }
        text.push_str("\n\n");
        text.push_str(&self.t(lang, "choose-station"));

        let reply = Reply::text(text).with_keyboard(station_keyboard(&options));
        Ok(Step::go(
            reply,
            ConversationState::AwaitingStationChoice { options },
        ))
    }

    fn choose_station(
        &self,
        user_id: u64,
        session: &Session,
        options: Vec<String>,
        text: &str,
        lang: Option<&str>,
    ) -> Step {
        let text = text.trim();
        let Some(station) = options.iter().find(|option| option.as_str() == text) else {
            return Step::stay(
                self.reply(lang, "station-expected")
                    .with_keyboard(station_keyboard(&options)),
            );
        };

        info!(user_id = %user_id, station = %station, "Station chosen");
        if station != OTHER_STATION {
            let reply = Reply::text(t_args_lang(
                &self.localization,
                "send-photo",
                &[("station", station.as_str())],
                lang,
            ));
            return Step::go(reply.remove_keyboard(), ConversationState::Idle);
        }

        // An unlisted station can be pinned once company and location are known
        if session.company.is_some() && session.location.is_some() {
            Step::go(
                self.reply(lang, "enter-station-address").remove_keyboard(),
                ConversationState::AwaitingStationAddress,
            )
        } else {
            Step::go(
                self.reply(lang, "send-photo-any").remove_keyboard(),
                ConversationState::Idle,
            )
        }
    }

    async fn register_station(
        &self,
        user_id: u64,
        session: &Session,
        text: &str,
        lang: Option<&str>,
    ) -> Result<Step> {
        let address = match validate_station_address(text) {
            Ok(address) => address,
            Err(reason) => {
                let key = match reason {
                    "too_long" => "station-address-too-long",
                    "command" => "station-address-command",
                    _ => "station-address-invalid",
                };
                return Ok(Step::stay(self.reply(lang, key)));
            }
        };

        let (Some(company), Some(location)) = (session.company.as_deref(), session.location)
        else {
            return Ok(Step::go(
                self.reply(lang, "send-photo-any"),
                ConversationState::Idle,
            ));
        };

        let station = self
            .directory
            .register_station(company, &address, location)
            .await?;
        info!(user_id = %user_id, station_id = station.id, "Station registered");

        let label = format!("{} {}", station.company, station.address);
        let reply = Reply::text(t_args_lang(
            &self.localization,
            "station-registered",
            &[("station", label.as_str())],
            lang,
        ));
        Ok(Step::go(reply, ConversationState::Idle))
    }

    async fn submit_photo(
        &self,
        user_id: u64,
        session: &Session,
        handle: &str,
        lang: Option<&str>,
    ) -> Result<Step> {
        let Some(location) = session.location else {
            info!(user_id = %user_id, "Photo received before any location, asking for it");
            return Ok(Step::stay(
                self.reply(lang, "share-location-first")
                    .with_keyboard(self.share_location_keyboard(lang)),
            ));
        };

        let photo_ref = self.media.exchange(handle).await?;
        debug!(user_id = %user_id, photo_ref = %photo_ref, "Photo relayed");

        let confirmation = self
            .submissions
            .store(Submission {
                user_id,
                photo_ref,
                location,
                language_code: lang.map(str::to_string),
            })
            .await?;
        info!(user_id = %user_id, "Submission stored");

        Ok(Step::stay(Reply::text(confirmation)))
    }
}
