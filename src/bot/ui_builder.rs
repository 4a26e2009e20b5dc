//! UI Builder module for creating keyboards and replies

use teloxide::types::{ButtonRequest, KeyboardButton, KeyboardMarkup, KeyboardRemove};

pub const PREV_PAGE: &str = "◀️ Prev";
pub const NEXT_PAGE: &str = "Next ▶️";
pub const COMPANY_COLUMNS: usize = 2;

/// Suggested-reply keyboard attached to a reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyKeyboard {
    pub rows: Vec<Vec<String>>,
    pub one_time: bool,
    /// Buttons ask the client to send the device location
    pub request_location: bool,
    pub resize: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyMarkup {
    Keyboard(ReplyKeyboard),
    Remove,
}

/// One outbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub markup: Option<ReplyMarkup>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            markup: None,
        }
    }

    pub fn with_keyboard(mut self, keyboard: ReplyKeyboard) -> Self {
        self.markup = Some(ReplyMarkup::Keyboard(keyboard));
        self
    }

    pub fn remove_keyboard(mut self) -> Self {
        self.markup = Some(ReplyMarkup::Remove);
        self
    }

    /// Put `head` in its own paragraph before the text, keeping the markup
    pub fn prefixed(mut self, head: &str) -> Self {
        self.text = format!("{head}\n\n{}", self.text);
        self
    }

    pub fn keyboard(&self) -> Option<&ReplyKeyboard> {
        match &self.markup {
            Some(ReplyMarkup::Keyboard(keyboard)) => Some(keyboard),
            _ => None,
        }
    }

    /// Every button label of the attached keyboard, row by row
    pub fn button_labels(&self) -> Vec<String> {
        self.keyboard()
            .map(|keyboard| keyboard.rows.iter().flatten().cloned().collect())
            .unwrap_or_default()
    }
}

/// A page of the company list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanyPage<'a> {
    pub items: &'a [String],
    /// Zero-based, clamped to the last page
    pub page: usize,
    pub pages: usize,
}

impl CompanyPage<'_> {
    pub fn has_prev(&self) -> bool {
        self.page > 0
    }

    pub fn has_next(&self) -> bool {
        self.page + 1 < self.pages
    }
}

/// Slice `companies` into pages of `page_size` and return the requested one
pub fn paginate(companies: &[String], page: usize, page_size: usize) -> CompanyPage<'_> {
    let page_size = page_size.max(1);
    let pages = companies.len().div_ceil(page_size).max(1);
    let page = page.min(pages - 1);
    let start = (page * page_size).min(companies.len());
    let end = (start + page_size).min(companies.len());

    CompanyPage {
        items: &companies[start..end],
        page,
        pages,
    }
}

/// Keyboard for one page of companies, with navigation and escape buttons
pub fn company_keyboard(page: &CompanyPage<'_>) -> ReplyKeyboard {
    let mut rows: Vec<Vec<String>> = page
        .items
        .chunks(COMPANY_COLUMNS)
        .map(|chunk| chunk.to_vec())
        .collect();

    let mut navigation = Vec::new();
    if page.has_prev() {
        navigation.push(PREV_PAGE.to_string());
    }
    if page.has_next() {
        navigation.push(NEXT_PAGE.to_string());
    }
    if !navigation.is_empty() {
        rows.push(navigation);
    }

    rows.push(vec!["/add_company".to_string(), "/cancel".to_string()]);

    ReplyKeyboard {
        rows,
        one_time: true,
        request_location: false,
        resize: true,
    }
}

/// Keyboard offered when the company search is empty
pub fn add_company_keyboard() -> ReplyKeyboard {
    ReplyKeyboard {
        rows: vec![vec!["/add_company".to_string(), "/cancel".to_string()]],
        one_time: true,
        request_location: false,
        resize: true,
    }
}

/// Single button sharing the device location
pub fn location_keyboard(label: &str) -> ReplyKeyboard {
    ReplyKeyboard {
        rows: vec![vec![label.to_string()]],
        one_time: true,
        request_location: true,
        resize: true,
    }
}

/// One station option per row
pub fn station_keyboard(options: &[String]) -> ReplyKeyboard {
    ReplyKeyboard {
        rows: options.iter().map(|option| vec![option.clone()]).collect(),
        one_time: true,
        request_location: false,
        resize: false,
    }
}

pub fn start_keyboard() -> ReplyKeyboard {
    ReplyKeyboard {
        rows: vec![vec!["/setdata".to_string(), "/getdata".to_string()]],
        one_time: true,
        request_location: false,
        resize: false,
    }
}

impl From<&ReplyKeyboard> for KeyboardMarkup {
    fn from(keyboard: &ReplyKeyboard) -> Self {
        let rows = keyboard.rows.iter().map(|row| {
            row.iter()
                .map(|label| {
                    let button = KeyboardButton::new(label.clone());
                    if keyboard.request_location {
                        button.request(ButtonRequest::Location)
                    } else {
                        button
                    }
                })
                .collect::<Vec<_>>()
        });

        let mut markup = KeyboardMarkup::new(rows);
        if keyboard.one_time {
            markup = markup.one_time_keyboard();
        }
        if keyboard.resize {
            markup = markup.resize_keyboard();
        }
        markup
    }
}

impl From<&ReplyMarkup> for teloxide::types::ReplyMarkup {
    fn from(markup: &ReplyMarkup) -> Self {
        match markup {
            ReplyMarkup::Keyboard(keyboard) => {
                teloxide::types::ReplyMarkup::Keyboard(KeyboardMarkup::from(keyboard))
            }
            ReplyMarkup::Remove => {
                teloxide::types::ReplyMarkup::KeyboardRemove(KeyboardRemove::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(count: usize) -> Vec<String> {
        (1..=count).map(|i| format!("Company {i}")).collect()
    }

    #[test]
    fn test_paginate_middle_page() {
        let companies = names(20);
        let page = paginate(&companies, 1, 8);

        assert_eq!(page.pages, 3);
        assert_eq!(page.items.len(), 8);
        assert_eq!(page.items[0], "Company 9");
        assert!(page.has_prev());
        assert!(page.has_next());
    }

    #[test]
    fn test_paginate_clamps_past_last_page() {
        let companies = names(10);
        let page = paginate(&companies, 7, 8);

        assert_eq!(page.page, 1);
        assert_eq!(page.items, &companies[8..]);
        assert!(!page.has_next());
    }

    #[test]
    fn test_paginate_empty_and_single() {
        let empty: Vec<String> = Vec::new();
        let page = paginate(&empty, 0, 8);
        assert_eq!(page.pages, 1);
        assert!(page.items.is_empty());

        let one = names(1);
        let page = paginate(&one, 0, 8);
        assert_eq!(page.items.len(), 1);
        assert!(!page.has_prev() && !page.has_next());
    }

    #[test]
    fn test_company_keyboard_layout() {
        let companies = names(5);
        let page = paginate(&companies, 0, 4);
        let keyboard = company_keyboard(&page);

        assert_eq!(
            keyboard.rows,
            vec![
                vec!["Company 1".to_string(), "Company 2".to_string()],
                vec!["Company 3".to_string(), "Company 4".to_string()],
                vec![NEXT_PAGE.to_string()],
                vec!["/add_company".to_string(), "/cancel".to_string()],
            ]
        );
        assert!(keyboard.one_time);
        assert!(!keyboard.request_location);
    }

    #[test]
    fn test_location_keyboard_requests_location() {
        let keyboard = location_keyboard("Send location");
        assert!(keyboard.request_location);
        assert_eq!(keyboard.rows, vec![vec!["Send location".to_string()]]);
    }

    #[test]
    fn test_button_labels() {
        let options = vec!["Shell Freedom Ave 10".to_string(), "other".to_string()];
        let reply = Reply::text("Pick one").with_keyboard(station_keyboard(&options));
        assert_eq!(reply.button_labels(), options);

        assert!(Reply::text("bye").remove_keyboard().button_labels().is_empty());
    }

    #[test]
    fn test_prefixed_keeps_keyboard() {
        let reply = Reply::text("Pick one")
            .with_keyboard(start_keyboard())
            .prefixed("Thanks!");

        assert_eq!(reply.text, "Thanks!\n\nPick one");
        assert_eq!(reply.keyboard(), Some(&start_keyboard()));
    }
}
