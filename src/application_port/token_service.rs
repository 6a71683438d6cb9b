use crate::application_port::CodecError;
use crate::domain_model::*;
use crate::domain_port::{CacheError, StoreError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,
    #[error("invalid token signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("token revoked")]
    Revoked,
    #[error("invalid refresh token")]
    InvalidRefreshToken,
    #[error("unknown refresh token")]
    UnknownRefreshToken,
    #[error("refresh token revoked")]
    RefreshTokenRevoked,
    #[error("refresh token expired")]
    RefreshTokenExpired,
    #[error("subject is no longer allowed to authenticate")]
    SubjectUnavailable,
    #[error("credential store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("revocation cache unavailable: {0}")]
    CacheUnavailable(String),
    #[error("token issuance failed: {0}")]
    IssuanceFailed(String),
    #[error("logout incomplete (denylisted: {denylisted}): {reason}")]
    LogoutPartialFailure { denylisted: bool, reason: String },
    #[error("operation cancelled")]
    Cancelled,
    #[error("signing failed: {0}")]
    Signing(String),
}

impl TokenError {
    /// Failures caused by the presented credential itself. Retrying these can
    /// never succeed; everything else is an infrastructure outcome.
    pub fn is_credential_failure(&self) -> bool {
        matches!(
            self,
            TokenError::Malformed
                | TokenError::InvalidSignature
                | TokenError::Expired
                | TokenError::Revoked
                | TokenError::InvalidRefreshToken
                | TokenError::UnknownRefreshToken
                | TokenError::RefreshTokenRevoked
                | TokenError::RefreshTokenExpired
                | TokenError::SubjectUnavailable
        )
    }

    pub fn is_infrastructure_failure(&self) -> bool {
        matches!(
            self,
            TokenError::StoreUnavailable(_)
                | TokenError::CacheUnavailable(_)
                | TokenError::IssuanceFailed(_)
                | TokenError::LogoutPartialFailure { .. }
        )
    }
}

impl From<CodecError> for TokenError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Malformed => TokenError::Malformed,
            CodecError::InvalidSignature => TokenError::InvalidSignature,
            CodecError::Expired => TokenError::Expired,
            CodecError::Signing(e) => TokenError::Signing(e),
        }
    }
}

impl From<StoreError> for TokenError {
    fn from(err: StoreError) -> Self {
        TokenError::StoreUnavailable(err.to_string())
    }
}

impl From<CacheError> for TokenError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::Unavailable(e) => TokenError::CacheUnavailable(e),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RefreshedAccess {
    pub access_token: AccessToken,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LogoutOutcome {
    /// The access token was written to the denylist.
    pub denylisted: bool,
    /// A stored refresh record moved to `Revoked` during this call.
    pub revoked: bool,
}

/// Token lifecycle manager: issuance, verification, refresh, and revocation.
///
/// Every operation races its store and cache calls against `cancel`; a
/// cancelled call yields [`TokenError::Cancelled`].
#[async_trait::async_trait]
pub trait TokenService: Send + Sync {
    async fn issue_token_pair(
        &self,
        subject: UserId,
        role: Role,
        cancel: &CancellationToken,
    ) -> Result<TokenPair, TokenError>;

    async fn verify_access(
        &self,
        access_token: &str,
        cancel: &CancellationToken,
    ) -> Result<AccessClaims, TokenError>;

    /// Non-rotating: the presented refresh token stays valid afterwards.
    async fn refresh_access_token(
        &self,
        refresh_token: &str,
        cancel: &CancellationToken,
    ) -> Result<RefreshedAccess, TokenError>;

    /// One-time-use variant: revokes the presented token and issues a new pair.
    /// Presenting an already-revoked token revokes every session of the subject.
    async fn rotate_refresh_token(
        &self,
        refresh_token: &str,
        cancel: &CancellationToken,
    ) -> Result<TokenPair, TokenError>;

    async fn logout(
        &self,
        access_token: &str,
        refresh_token: &str,
        cancel: &CancellationToken,
    ) -> Result<LogoutOutcome, TokenError>;

    async fn revoke_all_for_subject(
        &self,
        subject: UserId,
        cancel: &CancellationToken,
    ) -> Result<u64, TokenError>;

    async fn purge_expired(&self, cancel: &CancellationToken) -> Result<u64, TokenError>;
}
