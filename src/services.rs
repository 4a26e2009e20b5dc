//! # Collaborator Services
//!
//! Contracts of the external collaborators the conversation relies on:
//! the company/station directory, the submission store and the media relay.
//! Postgres-backed implementations live in [`crate::db`], Telegram-backed
//! relays in [`crate::media`].

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A point shared by the user
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// A fuel company record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Company {
    pub id: i32,
    pub name: String,
}

/// Outcome of adding a company by name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompanyInsert {
    Created(Company),
    Existing(Company),
}

impl CompanyInsert {
    pub fn company(&self) -> &Company {
        match self {
            CompanyInsert::Created(company) | CompanyInsert::Existing(company) => company,
        }
    }
}

/// Company and address of the station nearest to a location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPlace {
    pub company: String,
    pub address: String,
}

/// A gas station belonging to a company
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Station {
    pub id: i32,
    pub company: String,
    pub address: String,
}

/// A photo of fuel prices tagged with the location it was taken at
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub user_id: u64,
    pub photo_ref: String,
    pub location: Location,
    /// Language of the confirmation shown to the user
    pub language_code: Option<String>,
}

/// Company and station directory
#[async_trait]
pub trait DirectoryLookup: Send + Sync {
    /// Company names, optionally filtered by a case-insensitive substring, sorted by name
    async fn list_companies(&self, query: Option<&str>) -> Result<Vec<String>>;

    async fn add_company(&self, name: &str) -> Result<CompanyInsert>;

    /// Nearest known station, `None` when nothing is close enough
    async fn resolve(&self, location: Location) -> Result<Option<ResolvedPlace>>;

    /// Find the station of `company` at `address`, creating it when missing
    async fn acquire_station(&self, company: &str, address: &str) -> Result<Station>;

    /// Pin a station of `company` at `address` to `location` so later shares nearby resolve to it
    async fn register_station(
        &self,
        company: &str,
        address: &str,
        location: Location,
    ) -> Result<Station>;
}

/// Persistent store of photo submissions
#[async_trait]
pub trait SubmissionStore: Send + Sync {
    /// Store a submission and return a confirmation to show the user
    async fn store(&self, submission: Submission) -> Result<String>;
}

/// Turns transient chat file handles into durable references
#[async_trait]
pub trait MediaRelay: Send + Sync {
    async fn exchange(&self, handle: &str) -> Result<String>;
}
