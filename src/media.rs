//! # Media Relay Module
//!
//! Exchanges Telegram file ids, which are only meaningful to the bot API,
//! for durable photo references: either a token-free Telegram file
//! reference or a copy kept in a local archive directory.
//!
//! The bot file URL embeds the bot token, so it is only ever used to
//! download and never stored or logged.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};
use teloxide::prelude::*;
use teloxide::types::FileId;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::services::MediaRelay;

/// Download URL of a file on the Telegram servers
pub fn telegram_file_url(token: &str, file_path: &str) -> String {
    format!("https://api.telegram.org/file/bot{token}/{file_path}")
}

/// Stored reference of a file kept on the Telegram servers
///
/// The unique id is stable across bots, the file id lets this bot fetch
/// the file again through `getFile`.
pub fn telegram_file_reference(file_unique_id: &str, file_id: &str) -> String {
    format!("tg-file:{file_unique_id}/{file_id}")
}

/// Archive file name for a Telegram file path, prefixed with the file's unique id
pub fn archive_file_name(file_unique_id: &str, file_path: &str) -> String {
    let basename = Path::new(file_path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "photo".to_string());
    format!("{file_unique_id}_{basename}")
}

/// Leaves the photo on the Telegram servers and stores a reference to it
#[derive(Clone)]
pub struct TelegramFileRelay {
    bot: Bot,
}

impl TelegramFileRelay {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl MediaRelay for TelegramFileRelay {
    async fn exchange(&self, handle: &str) -> Result<String> {
        let file = self
            .bot
            .get_file(FileId(handle.to_string()))
            .await
            .context("Failed to look up Telegram file")?;
        Ok(telegram_file_reference(&file.unique_id.0, &file.id.0))
    }
}

/// Downloads each photo into a local directory and references the stored copy
#[derive(Clone)]
pub struct ArchiveRelay {
    bot: Bot,
    dir: PathBuf,
}

impl ArchiveRelay {
    /// Create the relay, making sure the archive directory exists
    pub fn new(bot: Bot, dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create archive directory {}", dir.display()))?;
        Ok(Self { bot, dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Write `bytes` to `dir/name` atomically and return the final path
pub fn store_in_archive(dir: &Path, name: &str, bytes: &[u8]) -> Result<PathBuf> {
    let target = dir.join(name);
    let mut temp_file = NamedTempFile::new_in(dir).context("Failed to create temporary file")?;
    temp_file
        .as_file_mut()
        .write_all(bytes)
        .context("Failed to write photo")?;
    temp_file
        .persist(&target)
        .with_context(|| format!("Failed to move photo to {}", target.display()))?;
    Ok(target)
}

#[async_trait]
impl MediaRelay for ArchiveRelay {
    async fn exchange(&self, handle: &str) -> Result<String> {
        let file = self
            .bot
            .get_file(FileId(handle.to_string()))
            .await
            .context("Failed to look up Telegram file")?;
        let url = telegram_file_url(self.bot.token(), &file.path);

        // reqwest errors carry the request URL, which holds the token
        let response = reqwest::get(&url)
            .await
            .and_then(|response| response.error_for_status())
            .map_err(reqwest::Error::without_url)
            .context("Failed to download photo")?;
        let bytes = response
            .bytes()
            .await
            .map_err(reqwest::Error::without_url)
            .context("Failed to read photo body")?;
        debug!(size = bytes.len(), "Photo downloaded");

        let name = archive_file_name(&file.unique_id.0, &file.path);
        let dir = self.dir.clone();
        let target = tokio::task::spawn_blocking(move || store_in_archive(&dir, &name, &bytes))
            .await
            .context("Archive task panicked")??;

        info!(path = %target.display(), "Photo archived");
        Ok(target.to_string_lossy().into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_telegram_file_url() {
        assert_eq!(
            telegram_file_url("123:abc", "photos/file_7.jpg"),
            "https://api.telegram.org/file/bot123:abc/photos/file_7.jpg"
        );
    }

    #[test]
    fn test_telegram_file_reference_has_no_token() {
        let reference = telegram_file_reference("AQADx", "BQACAgIAAxkBAAIB");
        assert_eq!(reference, "tg-file:AQADx/BQACAgIAAxkBAAIB");
        assert!(!reference.contains("api.telegram.org"));
        assert!(!reference.contains("123:abc"));
    }

    #[tokio::test]
    async fn test_download_errors_hide_token() {
        // Nothing listens on port 9, the request fails before any response
        let url = "http://127.0.0.1:9/file/bot123:abc/photos/file_7.jpg";
        let err = reqwest::get(url)
            .await
            .map_err(reqwest::Error::without_url)
            .context("Failed to download photo")
            .unwrap_err();

        assert!(!format!("{err:#}").contains("123:abc"));
    }

    #[test]
    fn test_archive_file_name() {
        assert_eq!(
            archive_file_name("AQADx", "photos/file_7.jpg"),
            "AQADx_file_7.jpg"
        );
        assert_eq!(archive_file_name("AQADx", ""), "AQADx_photo");
    }

    #[test]
    fn test_store_in_archive() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let target = store_in_archive(dir.path(), "AQADx_file_7.jpg", b"jpeg bytes")?;

        assert_eq!(target, dir.path().join("AQADx_file_7.jpg"));
        assert_eq!(std::fs::read(&target)?, b"jpeg bytes");
        // only the final file remains
        assert_eq!(std::fs::read_dir(dir.path())?.count(), 1);
        Ok(())
    }
}
