//! # Database Module
//!
//! Postgres-backed directory of fuel companies and stations, and the store
//! of photo submissions.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::sync::Arc;
use tracing::{debug, info};

use crate::localization::{t_args_lang, LocalizationManager};

use crate::services::{
    Company, CompanyInsert, DirectoryLookup, Location, ResolvedPlace, Station, Submission,
    SubmissionStore,
};

/// Mean Earth radius used for haversine distances
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A stored submission, as read back for reporting
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct SubmissionRow {
    pub id: i64,
    pub telegram_id: i64,
    pub photo_ref: String,
    /// Latitude in millionths of a degree
    pub latitude_micro: i64,
    /// Longitude in millionths of a degree
    pub longitude_micro: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct StationRecord {
    id: i32,
    address: String,
}

#[derive(Debug, sqlx::FromRow)]
struct NearestStation {
    company: String,
    address: String,
    distance_m: f64,
}

/// Connect to Postgres
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
        .context("Failed to connect to database")?;
    Ok(pool)
}

/// Initialize the database schema
pub async fn init_database_schema(pool: &PgPool) -> Result<()> {
    info!("Initializing database schema...");

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS companies (
            id SERIAL PRIMARY KEY,
            name VARCHAR(100) NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create companies table")?;

    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS companies_name_lower_idx ON companies (LOWER(name))",
    )
    .execute(pool)
    .await
    .context("Failed to create companies name index")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS stations (
            id SERIAL PRIMARY KEY,
            company_id INTEGER NOT NULL REFERENCES companies(id) ON DELETE CASCADE,
            address TEXT NOT NULL,
            latitude NUMERIC(9, 6),
            longitude NUMERIC(9, 6),
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            UNIQUE (company_id, address)
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create stations table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS submissions (
            id BIGSERIAL PRIMARY KEY,
            telegram_id BIGINT NOT NULL,
            photo_ref TEXT NOT NULL,
            latitude NUMERIC(9, 6) NOT NULL,
            longitude NUMERIC(9, 6) NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create submissions table")?;

    info!("Database schema initialized successfully");
    Ok(())
}

/// Escape `%`, `_` and `\` so `text` matches literally inside a LIKE pattern
pub fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Company names, optionally filtered by a case-insensitive substring
pub async fn list_company_names(pool: &PgPool, query: Option<&str>) -> Result<Vec<String>> {
    let pattern = query.map(|q| format!("%{}%", escape_like(q.trim())));

    let names: Vec<String> = sqlx::query_scalar(
        "SELECT name FROM companies
         WHERE $1::TEXT IS NULL OR name ILIKE $1
         ORDER BY LOWER(name)",
    )
    .bind(pattern)
    .fetch_all(pool)
    .await
    .context("Failed to list companies")?;

    debug!(count = names.len(), "Listed companies");
    Ok(names)
}

/// Insert a company unless one with the same name (ignoring case) exists
pub async fn add_company(pool: &PgPool, name: &str) -> Result<CompanyInsert> {
    let inserted: Option<(i32, String)> = sqlx::query_as(
        "INSERT INTO companies (name) VALUES ($1)
         ON CONFLICT ((LOWER(name))) DO NOTHING
         RETURNING id, name",
    )
    .bind(name)
    .fetch_optional(pool)
    .await
    .context("Failed to insert company")?;

    if let Some((id, name)) = inserted {
        info!(company_id = id, company = %name, "Company created");
        return Ok(CompanyInsert::Created(Company { id, name }));
    }

    let (id, name): (i32, String) =
        sqlx::query_as("SELECT id, name FROM companies WHERE LOWER(name) = LOWER($1)")
            .bind(name)
            .fetch_one(pool)
            .await
            .context("Failed to read existing company")?;

    Ok(CompanyInsert::Existing(Company { id, name }))
}

/// Nearest station with known coordinates within `radius_m` of `location`
pub async fn nearest_station(
    pool: &PgPool,
    location: Location,
    radius_m: f64,
) -> Result<Option<ResolvedPlace>> {
    let nearest: Option<NearestStation> = sqlx::query_as(
        "SELECT company, address, distance_m FROM (
            SELECT c.name AS company, s.address,
                2 * $3::FLOAT8 * ASIN(SQRT(
                    POWER(SIN(RADIANS(s.latitude::FLOAT8 - $1::FLOAT8) / 2), 2)
                    + COS(RADIANS($1::FLOAT8)) * COS(RADIANS(s.latitude::FLOAT8))
                    * POWER(SIN(RADIANS(s.longitude::FLOAT8 - $2::FLOAT8) / 2), 2)
                )) AS distance_m
            FROM stations s
            JOIN companies c ON c.id = s.company_id
            WHERE s.latitude IS NOT NULL AND s.longitude IS NOT NULL
        ) candidates
        WHERE distance_m <= $4::FLOAT8
        ORDER BY distance_m
        LIMIT 1",
    )
    .bind(location.latitude)
    .bind(location.longitude)
    .bind(EARTH_RADIUS_M)
    .bind(radius_m)
    .fetch_optional(pool)
    .await
    .context("Failed to look up nearest station")?;

    Ok(nearest.map(|station| {
        debug!(
            company = %station.company,
            distance_m = station.distance_m,
            "Nearest station found"
        );
        ResolvedPlace {
            company: station.company,
            address: station.address,
        }
    }))
}

/// Find the station of a company at an address, creating both when missing
pub async fn acquire_gas_station(pool: &PgPool, company: &str, address: &str) -> Result<Station> {
    let company_record = add_company(pool, company).await?;
    let company = company_record.company();

    let record: StationRecord = sqlx::query_as(
        "WITH inserted AS (
            INSERT INTO stations (company_id, address) VALUES ($1, $2)
            ON CONFLICT (company_id, address) DO NOTHING
            RETURNING id, address
        )
        SELECT id, address FROM inserted
        UNION ALL
        SELECT id, address FROM stations WHERE company_id = $1 AND address = $2
        LIMIT 1",
    )
    .bind(company.id)
    .bind(address)
    .fetch_one(pool)
    .await
    .context("Failed to acquire gas station")?;

    Ok(Station {
        id: record.id,
        company: company.name.clone(),
        address: record.address,
    })
}

/// Register a station with coordinates so it can be resolved from locations
pub async fn register_station_location(
    pool: &PgPool,
    company: &str,
    address: &str,
    location: Location,
) -> Result<Station> {
    let station = acquire_gas_station(pool, company, address).await?;
    sqlx::query("UPDATE stations SET latitude = $2, longitude = $3 WHERE id = $1")
        .bind(station.id)
        .bind(location.latitude)
        .bind(location.longitude)
        .execute(pool)
        .await
        .context("Failed to update station location")?;
    Ok(station)
}

/// Store a photo submission, returning its id
pub async fn create_submission(pool: &PgPool, submission: &Submission) -> Result<i64> {
    let telegram_id =
        i64::try_from(submission.user_id).context("Telegram user id does not fit BIGINT")?;

    let id: i64 = sqlx::query_scalar(
        "INSERT INTO submissions (telegram_id, photo_ref, latitude, longitude)
         VALUES ($1, $2, $3, $4)
         RETURNING id",
    )
    .bind(telegram_id)
    .bind(&submission.photo_ref)
    .bind(submission.location.latitude)
    .bind(submission.location.longitude)
    .fetch_one(pool)
    .await
    .context("Failed to insert submission")?;

    info!(submission_id = id, telegram_id, "Submission created");
    Ok(id)
}

/// Most recent submissions, newest first
pub async fn recent_submissions(pool: &PgPool, limit: i64) -> Result<Vec<SubmissionRow>> {
    let rows = sqlx::query_as::<_, SubmissionRow>(
        "SELECT id, telegram_id, photo_ref,
            ROUND(latitude * 1000000)::BIGINT AS latitude_micro,
            ROUND(longitude * 1000000)::BIGINT AS longitude_micro,
            created_at
         FROM submissions
         ORDER BY created_at DESC, id DESC
         LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("Failed to read submissions")?;
    Ok(rows)
}

/// [`DirectoryLookup`] over the Postgres tables
#[derive(Clone)]
pub struct PgDirectory {
    pool: PgPool,
    search_radius_m: f64,
}

impl PgDirectory {
    pub fn new(pool: PgPool, search_radius_m: f64) -> Self {
        Self {
            pool,
            search_radius_m,
        }
    }
}

#[async_trait]
impl DirectoryLookup for PgDirectory {
    async fn list_companies(&self, query: Option<&str>) -> Result<Vec<String>> {
        list_company_names(&self.pool, query).await
    }

    async fn add_company(&self, name: &str) -> Result<CompanyInsert> {
        add_company(&self.pool, name).await
    }

    async fn resolve(&self, location: Location) -> Result<Option<ResolvedPlace>> {
        nearest_station(&self.pool, location, self.search_radius_m).await
    }

    async fn acquire_station(&self, company: &str, address: &str) -> Result<Station> {
        acquire_gas_station(&self.pool, company, address).await
    }

    async fn register_station(
        &self,
        company: &str,
        address: &str,
        location: Location,
    ) -> Result<Station> {
        register_station_location(&self.pool, company, address, location).await
    }
}

/// [`SubmissionStore`] over the Postgres `submissions` table
#[derive(Clone)]
pub struct PgSubmissionStore {
    pool: PgPool,
    localization: Arc<LocalizationManager>,
}

impl PgSubmissionStore {
    pub fn new(pool: PgPool, localization: Arc<LocalizationManager>) -> Self {
        Self { pool, localization }
    }
}

#[async_trait]
impl SubmissionStore for PgSubmissionStore {
    async fn store(&self, submission: Submission) -> Result<String> {
        let id = create_submission(&self.pool, &submission).await?.to_string();
        let latitude = format!("{:.5}", submission.location.latitude);
        let longitude = format!("{:.5}", submission.location.longitude);
        Ok(t_args_lang(
            &self.localization,
            "submission-stored",
            &[
                ("id", id.as_str()),
                ("latitude", latitude.as_str()),
                ("longitude", longitude.as_str()),
            ],
            submission.language_code.as_deref(),
        ))
    }
}
