//! Database operations for Latercast
//!
//! A single `Database` handle wraps the connection pool and is cloned into
//! every component that needs it; nothing else in the crate opens its own
//! connection.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use std::path::Path;

use crate::error::{Result, StoreError};
use crate::types::{Credential, Draft, DraftStatus, Platform, PrivacyStatus};

/// Owner-editable draft fields, written in one statement the way the
/// authoring surface submits them.
#[derive(Debug, Clone)]
pub struct DraftUpdate {
    pub title: String,
    pub description: String,
    pub keywords: Vec<String>,
    pub category: String,
    pub privacy_status: PrivacyStatus,
    pub platform: Platform,
    pub scheduled_time: DateTime<Utc>,
    pub media_url: String,
}

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database connection
    pub async fn new(db_path: &str) -> Result<Self> {
        // Expand path and create parent directories
        let expanded_path = shellexpand::tilde(db_path).to_string();
        let path = Path::new(&expanded_path);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(StoreError::IoError)?;
        }

        // Use forward slashes for SQLite URL (works on both Windows and Unix)
        // and mode=rwc so the database file is created if it doesn't exist
        let db_url = format!("sqlite://{}?mode=rwc", expanded_path.replace('\\', "/"));

        let pool = SqlitePool::connect(&db_url)
            .await
            .map_err(StoreError::SqlxError)?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(StoreError::MigrationError)?;

        Ok(Self { pool })
    }

    /// Open an in-memory database with migrations applied (tests)
    pub async fn open_in_memory() -> Result<Self> {
        // A single connection keeps every query on the same in-memory
        // database; a pool of them would each see an empty one
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(StoreError::SqlxError)?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(StoreError::MigrationError)?;

        Ok(Self { pool })
    }

    // ========================================================================
    // Draft operations
    // ========================================================================

    /// Create a new draft record
    pub async fn create_draft(&self, draft: &Draft) -> Result<()> {
        let keywords = serde_json::to_string(&draft.keywords)
            .map_err(|e| StoreError::CorruptRecord(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO drafts (
                draft_id, owner_uid, title, description, keywords, category,
                privacy_status, media_url, platform, scheduled_time, status,
                created_at, updated_at, processed_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&draft.draft_id)
        .bind(&draft.owner_uid)
        .bind(&draft.title)
        .bind(&draft.description)
        .bind(keywords)
        .bind(&draft.category)
        .bind(draft.privacy_status.as_str())
        .bind(&draft.media_url)
        .bind(draft.platform.as_str())
        .bind(draft.scheduled_time.timestamp())
        .bind(draft.status.as_str())
        .bind(draft.created_at.timestamp())
        .bind(draft.updated_at.timestamp())
        .bind(draft.processed_at.map(|t| t.timestamp()))
        .execute(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        Ok(())
    }

    /// Get a draft by owner and id
    pub async fn get_draft(&self, owner_uid: &str, draft_id: &str) -> Result<Option<Draft>> {
        let row = sqlx::query(
            r#"
            SELECT draft_id, owner_uid, title, description, keywords, category,
                   privacy_status, media_url, platform, scheduled_time, status,
                   created_at, updated_at, processed_at
            FROM drafts WHERE owner_uid = ? AND draft_id = ?
            "#,
        )
        .bind(owner_uid)
        .bind(draft_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        row.map(row_to_draft).transpose()
    }

    /// List all drafts belonging to one owner, newest first
    pub async fn list_drafts(&self, owner_uid: &str) -> Result<Vec<Draft>> {
        let rows = sqlx::query(
            r#"
            SELECT draft_id, owner_uid, title, description, keywords, category,
                   privacy_status, media_url, platform, scheduled_time, status,
                   created_at, updated_at, processed_at
            FROM drafts WHERE owner_uid = ?
            ORDER BY created_at DESC
            "#,
        )
        .bind(owner_uid)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        rows.into_iter().map(row_to_draft).collect()
    }

    /// Collection-wide candidate page for the scheduler scan, capped as a
    /// backpressure measure against unbounded growth.
    pub async fn scan_page(&self, limit: u32) -> Result<Vec<Draft>> {
        let rows = sqlx::query(
            r#"
            SELECT draft_id, owner_uid, title, description, keywords, category,
                   privacy_status, media_url, platform, scheduled_time, status,
                   created_at, updated_at, processed_at
            FROM drafts
            ORDER BY scheduled_time ASC
            LIMIT ?
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        rows.into_iter().map(row_to_draft).collect()
    }

    /// Update the owner-editable fields of a draft.
    ///
    /// Only legal while the draft is still in `draft` status; returns false
    /// if no row matched (missing, foreign owner, or already claimed).
    pub async fn update_draft_content(
        &self,
        owner_uid: &str,
        draft_id: &str,
        update: &DraftUpdate,
    ) -> Result<bool> {
        let keywords = serde_json::to_string(&update.keywords)
            .map_err(|e| StoreError::CorruptRecord(e.to_string()))?;

        let result = sqlx::query(
            r#"
            UPDATE drafts SET
                title = ?, description = ?, keywords = ?, category = ?,
                privacy_status = ?, platform = ?, scheduled_time = ?,
                media_url = ?, updated_at = ?
            WHERE owner_uid = ? AND draft_id = ? AND status = 'draft'
            "#,
        )
        .bind(&update.title)
        .bind(&update.description)
        .bind(keywords)
        .bind(&update.category)
        .bind(update.privacy_status.as_str())
        .bind(update.platform.as_str())
        .bind(update.scheduled_time.timestamp())
        .bind(&update.media_url)
        .bind(Utc::now().timestamp())
        .bind(owner_uid)
        .bind(draft_id)
        .execute(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete a draft record; returns whether a row was removed
    pub async fn delete_draft(&self, owner_uid: &str, draft_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM drafts WHERE owner_uid = ? AND draft_id = ?")
            .bind(owner_uid)
            .bind(draft_id)
            .execute(&self.pool)
            .await
            .map_err(StoreError::SqlxError)?;

        Ok(result.rows_affected() > 0)
    }

    /// Claim a due draft for publishing: compare-and-swap `draft -> pending`.
    ///
    /// The conditional WHERE means only one concurrent claimant can win; the
    /// losing claimant sees false and must skip the record. The write is
    /// durably visible before the caller starts the upload.
    pub async fn claim_draft(&self, draft_id: &str, now: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE drafts SET status = 'pending', updated_at = ?
            WHERE draft_id = ? AND status = 'draft'
            "#,
        )
        .bind(now.timestamp())
        .bind(draft_id)
        .execute(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        Ok(result.rows_affected() > 0)
    }

    /// Roll a claimed draft back to `draft`, leaving `scheduled_time`
    /// untouched so the next tick retries it.
    pub async fn rollback_draft(&self, draft_id: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE drafts SET status = 'draft', updated_at = ?
            WHERE draft_id = ? AND status = 'pending'
            "#,
        )
        .bind(Utc::now().timestamp())
        .bind(draft_id)
        .execute(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        Ok(())
    }

    /// Move a claimed draft to the terminal `failed` state
    pub async fn mark_draft_failed(&self, draft_id: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE drafts SET status = 'failed', updated_at = ?
            WHERE draft_id = ? AND status = 'pending'
            "#,
        )
        .bind(Utc::now().timestamp())
        .bind(draft_id)
        .execute(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        Ok(())
    }

    /// Finalize a successfully published draft: record `published` +
    /// `processed_at`, then delete the row. The terminal state observed by
    /// readers is "absent from the store".
    pub async fn finish_draft(&self, draft_id: &str, processed_at: DateTime<Utc>) -> Result<bool> {
        let mut tx = self.pool.begin().await.map_err(StoreError::SqlxError)?;

        let updated = sqlx::query(
            r#"
            UPDATE drafts SET status = 'published', processed_at = ?, updated_at = ?
            WHERE draft_id = ? AND status = 'pending'
            "#,
        )
        .bind(processed_at.timestamp())
        .bind(processed_at.timestamp())
        .bind(draft_id)
        .execute(&mut *tx)
        .await
        .map_err(StoreError::SqlxError)?;

        if updated.rows_affected() == 0 {
            tx.rollback().await.map_err(StoreError::SqlxError)?;
            return Ok(false);
        }

        sqlx::query("DELETE FROM drafts WHERE draft_id = ?")
            .bind(draft_id)
            .execute(&mut *tx)
            .await
            .map_err(StoreError::SqlxError)?;

        tx.commit().await.map_err(StoreError::SqlxError)?;
        Ok(true)
    }

    /// Roll back `pending` rows that have not been touched since `cutoff`.
    ///
    /// A pending claim with no progress for that long means a publisher
    /// crashed mid-upload; returning the row to `draft` makes it eligible
    /// again instead of leaving it stuck until an operator intervenes.
    pub async fn reclaim_stale_pending(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE drafts SET status = 'draft', updated_at = ?
            WHERE status = 'pending' AND updated_at < ?
            "#,
        )
        .bind(Utc::now().timestamp())
        .bind(cutoff.timestamp())
        .execute(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        Ok(result.rows_affected())
    }

    // ========================================================================
    // Credential operations
    // ========================================================================

    /// Get the stored credential for an (owner, platform) pair
    pub async fn get_credential(
        &self,
        owner_uid: &str,
        platform: Platform,
    ) -> Result<Option<Credential>> {
        let row = sqlx::query(
            r#"
            SELECT owner_uid, platform, access_token, refresh_token,
                   expires_at, scopes, updated_at
            FROM credentials WHERE owner_uid = ? AND platform = ?
            "#,
        )
        .bind(owner_uid)
        .bind(platform.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        row.map(row_to_credential).transpose()
    }

    /// Store a credential, fully replacing any prior row for the same
    /// (owner, platform) pair. Other platforms' rows are untouched.
    pub async fn upsert_credential(&self, credential: &Credential) -> Result<()> {
        let scopes = serde_json::to_string(&credential.scopes)
            .map_err(|e| StoreError::CorruptRecord(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO credentials (owner_uid, platform, access_token, refresh_token,
                                     expires_at, scopes, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (owner_uid, platform) DO UPDATE SET
                access_token = excluded.access_token,
                refresh_token = excluded.refresh_token,
                expires_at = excluded.expires_at,
                scopes = excluded.scopes,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&credential.owner_uid)
        .bind(credential.platform.as_str())
        .bind(&credential.access_token)
        .bind(&credential.refresh_token)
        .bind(credential.expires_at.timestamp())
        .bind(scopes)
        .bind(credential.updated_at.timestamp())
        .execute(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        Ok(())
    }

    /// Delete a stored credential
    pub async fn delete_credential(&self, owner_uid: &str, platform: Platform) -> Result<()> {
        sqlx::query("DELETE FROM credentials WHERE owner_uid = ? AND platform = ?")
            .bind(owner_uid)
            .bind(platform.as_str())
            .execute(&self.pool)
            .await
            .map_err(StoreError::SqlxError)?;

        Ok(())
    }

    /// Count stored credentials for one owner (all platforms)
    pub async fn count_credentials(&self, owner_uid: &str) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM credentials WHERE owner_uid = ?")
            .bind(owner_uid)
            .fetch_one(&self.pool)
            .await
            .map_err(StoreError::SqlxError)?;

        Ok(row.get("n"))
    }
}

fn parse_timestamp(secs: i64, field: &str) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| StoreError::CorruptRecord(format!("bad timestamp in {}: {}", field, secs)).into())
}

fn row_to_draft(row: sqlx::sqlite::SqliteRow) -> Result<Draft> {
    let status_str: String = row.get("status");
    let status = DraftStatus::parse(&status_str)
        .ok_or_else(|| StoreError::CorruptRecord(format!("unknown status: {}", status_str)))?;

    let platform_str: String = row.get("platform");
    let platform = Platform::parse(&platform_str)
        .ok_or_else(|| StoreError::CorruptRecord(format!("unknown platform: {}", platform_str)))?;

    let privacy_str: String = row.get("privacy_status");
    let privacy_status = PrivacyStatus::parse(&privacy_str)
        .ok_or_else(|| StoreError::CorruptRecord(format!("unknown privacy status: {}", privacy_str)))?;

    let keywords: Vec<String> = serde_json::from_str(row.get::<String, _>("keywords").as_str())
        .map_err(|e| StoreError::CorruptRecord(format!("bad keywords: {}", e)))?;

    Ok(Draft {
        draft_id: row.get("draft_id"),
        owner_uid: row.get("owner_uid"),
        title: row.get("title"),
        description: row.get("description"),
        keywords,
        category: row.get("category"),
        privacy_status,
        media_url: row.get("media_url"),
        platform,
        scheduled_time: parse_timestamp(row.get("scheduled_time"), "scheduled_time")?,
        status,
        created_at: parse_timestamp(row.get("created_at"), "created_at")?,
        updated_at: parse_timestamp(row.get("updated_at"), "updated_at")?,
        processed_at: row
            .get::<Option<i64>, _>("processed_at")
            .map(|t| parse_timestamp(t, "processed_at"))
            .transpose()?,
    })
}

fn row_to_credential(row: sqlx::sqlite::SqliteRow) -> Result<Credential> {
    let platform_str: String = row.get("platform");
    let platform = Platform::parse(&platform_str)
        .ok_or_else(|| StoreError::CorruptRecord(format!("unknown platform: {}", platform_str)))?;

    let scopes: Vec<String> = serde_json::from_str(row.get::<String, _>("scopes").as_str())
        .map_err(|e| StoreError::CorruptRecord(format!("bad scopes: {}", e)))?;

    Ok(Credential {
        owner_uid: row.get("owner_uid"),
        platform,
        access_token: row.get("access_token"),
        refresh_token: row.get("refresh_token"),
        expires_at: parse_timestamp(row.get("expires_at"), "expires_at")?,
        scopes,
        updated_at: parse_timestamp(row.get("updated_at"), "updated_at")?,
    })
}
