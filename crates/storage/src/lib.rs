use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use shared::domain::{ClaimStatus, UserId};

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

/// Durable per-user row tracking referral and verification progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub user_id: UserId,
    pub handle: Option<String>,
    pub referral_code: String,
    pub signed_up: bool,
    pub claim_submitted: bool,
    pub platform_identity: Option<String>,
    pub status: ClaimStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    /// Returns the existing record, or creates one with the given referral
    /// code and default flags. An existing row is never rewritten, so the
    /// referral code recorded at creation survives later reconfiguration.
    pub async fn get_or_create_user(
        &self,
        user_id: UserId,
        handle: Option<&str>,
        referral_code: &str,
    ) -> Result<UserRecord> {
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO users (telegram_id, handle, referral_code, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(telegram_id) DO NOTHING",
        )
        .bind(user_id.0)
        .bind(handle)
        .bind(referral_code)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let row = sqlx::query(USER_COLUMNS_QUERY)
            .bind(user_id.0)
            .fetch_one(&self.pool)
            .await?;
        record_from_row(&row)
    }

    pub async fn get_user(&self, user_id: UserId) -> Result<Option<UserRecord>> {
        let row = sqlx::query(USER_COLUMNS_QUERY)
            .bind(user_id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(record_from_row).transpose()
    }

    pub async fn mark_signed_up(&self, user_id: UserId) -> Result<()> {
        sqlx::query("UPDATE users SET signed_up = 1, updated_at = ? WHERE telegram_id = ?")
            .bind(Utc::now())
            .bind(user_id.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Records the claimed platform identity and flags the claim as
    /// submitted. A resubmission overwrites the previous identity but
    /// deliberately leaves `status` untouched; an already-Verified user who
    /// submits a new identity stays Verified until an admin re-reviews.
    pub async fn save_submission(&self, user_id: UserId, platform_identity: &str) -> Result<()> {
        sqlx::query(
            "UPDATE users
             SET platform_identity = ?, claim_submitted = 1, updated_at = ?
             WHERE telegram_id = ?",
        )
        .bind(platform_identity)
        .bind(Utc::now())
        .bind(user_id.0)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Returns false when no record exists for `user_id`, signalling an
    /// unknown user to the caller; the store is left unchanged in that case.
    pub async fn set_status(&self, user_id: UserId, status: ClaimStatus) -> Result<bool> {
        let updated = sqlx::query("UPDATE users SET status = ?, updated_at = ? WHERE telegram_id = ?")
            .bind(status.as_str())
            .bind(Utc::now())
            .bind(user_id.0)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(updated > 0)
    }

    pub async fn list_all(&self) -> Result<Vec<UserRecord>> {
        let rows = sqlx::query(
            "SELECT telegram_id, handle, referral_code, signed_up, claim_submitted,
                    platform_identity, status, created_at, updated_at
             FROM users
             ORDER BY telegram_id ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(record_from_row).collect()
    }

    pub async fn list_user_ids(&self) -> Result<Vec<UserId>> {
        let rows = sqlx::query("SELECT telegram_id FROM users ORDER BY telegram_id ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|r| UserId(r.get::<i64, _>(0))).collect())
    }

    pub async fn count_users(&self) -> Result<i64> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(total)
    }

    pub async fn count_by_status(&self) -> Result<Vec<(ClaimStatus, i64)>> {
        let rows = sqlx::query("SELECT status, COUNT(*) FROM users GROUP BY status")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|r| {
                let status = r
                    .get::<String, _>(0)
                    .parse::<ClaimStatus>()
                    .unwrap_or_default();
                (status, r.get::<i64, _>(1))
            })
            .collect())
    }
}

const USER_COLUMNS_QUERY: &str =
    "SELECT telegram_id, handle, referral_code, signed_up, claim_submitted,
            platform_identity, status, created_at, updated_at
     FROM users
     WHERE telegram_id = ?";

fn record_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<UserRecord> {
    Ok(UserRecord {
        user_id: UserId(row.get::<i64, _>(0)),
        handle: row.get::<Option<String>, _>(1),
        referral_code: row.get::<String, _>(2),
        signed_up: row.get::<bool, _>(3),
        claim_submitted: row.get::<bool, _>(4),
        platform_identity: row.get::<Option<String>, _>(5),
        // Unknown status text decodes as Pending rather than failing reads.
        status: row
            .get::<String, _>(6)
            .parse::<ClaimStatus>()
            .unwrap_or_default(),
        created_at: row.get::<DateTime<Utc>, _>(7),
        updated_at: row.get::<DateTime<Utc>, _>(8),
    })
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
