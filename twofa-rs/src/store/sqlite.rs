//! SQLite-backed credential store

use chrono::Utc;
use sqlx::SqlitePool;

use crate::backup;
use crate::error::{Result, TwoFactorError};

use super::types::{SecurityRecordUpdate, TwoFactorMethod, UserSecurityRecord};

/// Retries for the conditional backup-code update before giving up.
const CONSUME_RETRIES: usize = 3;

/// Credential store persisting [`UserSecurityRecord`]s to SQLite.
///
/// All mutations are last-writer-wins except backup-code consumption,
/// which is a conditional update so a code can never be consumed twice.
#[derive(Clone)]
pub struct SqliteCredentialStore {
    db: SqlitePool,
}

impl SqliteCredentialStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Initialize database tables.
    pub async fn init_db(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS user_security (
                user_id TEXT PRIMARY KEY,
                two_factor_enabled INTEGER NOT NULL DEFAULT 0,
                method TEXT NOT NULL DEFAULT 'none',
                totp_secret TEXT,
                backup_codes TEXT,
                phone_number TEXT,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// Connectivity probe for the health endpoint.
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.db).await?;
        Ok(())
    }

    /// Load the security record for a user.
    pub async fn load(&self, user_id: &str) -> Result<Option<UserSecurityRecord>> {
        let row = sqlx::query_as::<
            _,
            (
                String,
                i32,
                String,
                Option<String>,
                Option<String>,
                Option<String>,
                String,
            ),
        >(
            "SELECT user_id, two_factor_enabled, method, totp_secret, backup_codes, phone_number, updated_at
             FROM user_security WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;

        row.map(|(user_id, enabled, method, secret, codes, phone, updated_at)| {
            let method = TwoFactorMethod::parse(&method)
                .ok_or_else(|| TwoFactorError::Storage(format!("unknown method '{}'", method)))?;
            let backup_codes = match codes {
                Some(json) => serde_json::from_str(&json)?,
                None => Vec::new(),
            };

            Ok(UserSecurityRecord {
                user_id,
                two_factor_enabled: enabled != 0,
                method,
                totp_secret: secret,
                backup_codes,
                phone_number: phone,
                updated_at: chrono::DateTime::parse_from_rfc3339(&updated_at)
                    .map(|d| d.with_timezone(&Utc))
                    .unwrap_or_else(|_| Utc::now()),
            })
        })
        .transpose()
    }

    /// Apply a partial update to a user's record, creating it first if the
    /// user has no 2FA history. Unspecified fields keep their stored value.
    pub async fn save(
        &self,
        user_id: &str,
        update: SecurityRecordUpdate,
    ) -> Result<UserSecurityRecord> {
        let current = self
            .load(user_id)
            .await?
            .unwrap_or_else(|| UserSecurityRecord::new(user_id));
        let merged = current.apply(update);

        let codes_json = if merged.backup_codes.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&merged.backup_codes)?)
        };

        sqlx::query(
            r#"
            INSERT INTO user_security
                (user_id, two_factor_enabled, method, totp_secret, backup_codes, phone_number, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                two_factor_enabled = excluded.two_factor_enabled,
                method = excluded.method,
                totp_secret = excluded.totp_secret,
                backup_codes = excluded.backup_codes,
                phone_number = excluded.phone_number,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&merged.user_id)
        .bind(merged.two_factor_enabled as i32)
        .bind(merged.method.as_str())
        .bind(&merged.totp_secret)
        .bind(&codes_json)
        .bind(&merged.phone_number)
        .bind(merged.updated_at.to_rfc3339())
        .execute(&self.db)
        .await?;

        Ok(merged)
    }

    /// Atomically consume one backup code.
    ///
    /// The update is conditional on the stored code list being unchanged
    /// since it was read, so two concurrent submissions of the same code
    /// cannot both succeed. Returns the number of codes remaining after
    /// consumption, or `None` when the code is not present.
    pub async fn consume_backup_code(&self, user_id: &str, code: &str) -> Result<Option<usize>> {
        for _ in 0..CONSUME_RETRIES {
            let record = match self.load(user_id).await? {
                Some(record) => record,
                None => return Ok(None),
            };

            let remaining = match backup::remove_code(&record.backup_codes, code) {
                Some(remaining) => remaining,
                None => return Ok(None),
            };

            let previous = serde_json::to_string(&record.backup_codes)?;
            let next = if remaining.is_empty() {
                None
            } else {
                Some(serde_json::to_string(&remaining)?)
            };

            let result = sqlx::query(
                "UPDATE user_security SET backup_codes = ?, updated_at = ?
                 WHERE user_id = ? AND backup_codes = ?",
            )
            .bind(&next)
            .bind(Utc::now().to_rfc3339())
            .bind(user_id)
            .bind(&previous)
            .execute(&self.db)
            .await?;

            if result.rows_affected() == 1 {
                return Ok(Some(remaining.len()));
            }
            // Lost the race against a concurrent writer; re-read and retry.
        }

        Err(TwoFactorError::Storage(format!(
            "backup code consumption for user '{}' kept losing the conditional update",
            user_id
        )))
    }
}
