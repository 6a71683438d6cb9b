use crate::domain_model::*;
use chrono::{DateTime, Utc};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("duplicate credential digest")]
    Conflict,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Durable persistence for refresh-credential records, keyed by digest.
/// Implementations never mutate records on their own initiative.
#[async_trait::async_trait]
pub trait CredentialStore: Send + Sync {
    async fn create(&self, record: NewRefreshCredential) -> Result<uuid::Uuid, StoreError>;

    async fn find_by_digest(
        &self,
        digest: &TokenDigest,
    ) -> Result<Option<RefreshCredentialRecord>, StoreError>;

    /// Sets `revoked_at` if it is still null. Returns whether a record changed;
    /// revoking an already-revoked or unknown digest is a successful no-op.
    async fn set_revoked(&self, digest: &TokenDigest, at: DateTime<Utc>)
    -> Result<bool, StoreError>;

    /// Revokes every active record of the subject, leaving expired ones
    /// untouched. Returns the count.
    async fn set_revoked_for_subject(
        &self,
        subject: UserId,
        at: DateTime<Utc>,
    ) -> Result<u64, StoreError>;

    /// Physically deletes records with `expires_at < cutoff`. Returns the count.
    async fn delete_expired_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError>;
}
