use crate::domain_model::{TokenDigest, UserId};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialState {
    Active,
    Revoked,
    Expired,
}

/// Durable trust anchor for one issued refresh token.
#[derive(Debug, Clone)]
pub struct RefreshCredentialRecord {
    pub id: uuid::Uuid,
    pub subject: UserId,
    pub digest: TokenDigest,
    pub previous_digest: Option<TokenDigest>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl RefreshCredentialRecord {
    /// Revocation wins over expiry: once revoked, a record stays `Revoked`.
    pub fn state_at(&self, now: DateTime<Utc>) -> CredentialState {
        if self.revoked_at.is_some() {
            CredentialState::Revoked
        } else if self.expires_at <= now {
            CredentialState::Expired
        } else {
            CredentialState::Active
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewRefreshCredential {
    pub subject: UserId,
    pub digest: TokenDigest,
    pub previous_digest: Option<TokenDigest>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}
