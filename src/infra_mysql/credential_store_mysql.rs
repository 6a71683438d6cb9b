use super::util::{is_dup_key, unavailable};
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlPool, Row};
use uuid::Uuid;

/// `refresh_credential` table, see `schema/mysql.sql`. Each mutation is a
/// single-statement update, so row-level atomicity comes from MySQL itself.
pub struct MySqlCredentialStore {
    pool: MySqlPool,
}

impl MySqlCredentialStore {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlCredentialStore { pool }
    }

    fn row_to_record(row: MySqlRow) -> Result<RefreshCredentialRecord, StoreError> {
        let id_bytes: Vec<u8> = row.try_get("id").map_err(unavailable)?;
        let id = Uuid::from_slice(&id_bytes).map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let subject: i64 = row.try_get("user_id").map_err(unavailable)?;
        let digest: String = row.try_get("token_digest").map_err(unavailable)?;
        let previous_digest: Option<String> =
            row.try_get("previous_digest").map_err(unavailable)?;
        let expires_at: DateTime<Utc> = row.try_get("expires_at").map_err(unavailable)?;
        let revoked_at: Option<DateTime<Utc>> = row.try_get("revoked_at").map_err(unavailable)?;
        let created_at: DateTime<Utc> = row.try_get("created_at").map_err(unavailable)?;

        Ok(RefreshCredentialRecord {
            id,
            subject: UserId(subject),
            digest: TokenDigest::from_hex(digest),
            previous_digest: previous_digest.map(TokenDigest::from_hex),
            expires_at,
            revoked_at,
            created_at,
        })
    }
}

#[async_trait::async_trait]
impl CredentialStore for MySqlCredentialStore {
    async fn create(&self, record: NewRefreshCredential) -> Result<Uuid, StoreError> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
INSERT INTO refresh_credential (id, user_id, token_digest, previous_digest, expires_at, created_at)
VALUES (?, ?, ?, ?, ?, ?)
"#,
        )
        .bind(id.as_bytes() as &[u8])
        .bind(record.subject.0)
        .bind(record.digest.as_str())
        .bind(record.previous_digest.as_ref().map(TokenDigest::as_str))
        .bind(record.expires_at)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_dup_key(&e) {
                StoreError::Conflict
            } else {
                unavailable(e)
            }
        })?;

        Ok(id)
    }

    async fn find_by_digest(
        &self,
        digest: &TokenDigest,
    ) -> Result<Option<RefreshCredentialRecord>, StoreError> {
        let row_opt: Option<MySqlRow> = sqlx::query(
            r#"
SELECT id, user_id, token_digest, previous_digest, expires_at, revoked_at, created_at
FROM refresh_credential
WHERE token_digest = ?
"#,
        )
        .bind(digest.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;

        row_opt.map(Self::row_to_record).transpose()
    }

    async fn set_revoked(
        &self,
        digest: &TokenDigest,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
UPDATE refresh_credential
SET revoked_at = ?
WHERE token_digest = ? AND revoked_at IS NULL
"#,
        )
        .bind(at)
        .bind(digest.as_str())
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok(result.rows_affected() == 1)
    }

    async fn set_revoked_for_subject(
        &self,
        subject: UserId,
        at: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
UPDATE refresh_credential
SET revoked_at = ?
WHERE user_id = ? AND revoked_at IS NULL AND expires_at > ?
"#,
        )
        .bind(at)
        .bind(subject.0)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok(result.rows_affected())
    }

    async fn delete_expired_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM refresh_credential WHERE expires_at < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;

        Ok(result.rows_affected())
    }
}
