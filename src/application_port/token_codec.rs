use crate::domain_model::*;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("malformed token")]
    Malformed,
    #[error("invalid token signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("signing failed: {0}")]
    Signing(String),
}

/// Signs and validates self-contained credentials. Access and refresh tokens are
/// signed with independent secrets, so neither verifies as the other.
pub trait TokenCodec: Send + Sync {
    fn issue_access(
        &self,
        subject: UserId,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<(AccessToken, AccessClaims), CodecError>;

    fn issue_refresh(
        &self,
        subject: UserId,
        now: DateTime<Utc>,
    ) -> Result<(RefreshToken, RefreshClaims), CodecError>;

    /// Checks signature and structure only; an expired token still yields claims.
    fn inspect_access(&self, token: &str) -> Result<AccessClaims, CodecError>;

    /// Checks signature and structure only; an expired token still yields claims.
    fn inspect_refresh(&self, token: &str) -> Result<RefreshClaims, CodecError>;

    fn verify_access(&self, token: &str, now: DateTime<Utc>) -> Result<AccessClaims, CodecError> {
        let claims = self.inspect_access(token)?;
        if claims.expires_at <= now {
            return Err(CodecError::Expired);
        }
        Ok(claims)
    }

    fn verify_refresh(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<RefreshClaims, CodecError> {
        let claims = self.inspect_refresh(token)?;
        if claims.expires_at <= now {
            return Err(CodecError::Expired);
        }
        Ok(claims)
    }
}
