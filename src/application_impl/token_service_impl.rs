use crate::application_impl::TokenConfig;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use crate::logger::SECURITY_TARGET;
use chrono::{DateTime, Utc};
use futures_util::TryFutureExt;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const DENYLIST_SENTINEL: &str = "revoked";

/// Races a store or cache call against the caller's cancellation signal.
async fn guarded<T, E, F>(cancel: &CancellationToken, fut: F) -> Result<T, TokenError>
where
    F: Future<Output = Result<T, E>>,
    E: Into<TokenError>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(TokenError::Cancelled),
        res = fut => res.map_err(Into::into),
    }
}

/// The lifecycle manager. Holds no credential state of its own; the store and
/// the cache are authoritative on every call.
pub struct RealTokenService {
    codec: Arc<dyn TokenCodec>,
    store: Arc<dyn CredentialStore>,
    cache: Arc<dyn RevocationCache>,
    users: Arc<dyn UserRepo>,
    clock: Arc<dyn Clock>,
    purge_grace: chrono::Duration,
}

impl RealTokenService {
    pub fn new(
        cfg: &TokenConfig,
        codec: Arc<dyn TokenCodec>,
        store: Arc<dyn CredentialStore>,
        cache: Arc<dyn RevocationCache>,
        users: Arc<dyn UserRepo>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        RealTokenService {
            codec,
            store,
            cache,
            users,
            clock,
            purge_grace: chrono::Duration::from_std(cfg.purge_grace)
                .unwrap_or(chrono::Duration::days(1)),
        }
    }

    async fn issue_pair(
        &self,
        subject: UserId,
        role: Role,
        previous_digest: Option<TokenDigest>,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<TokenPair, TokenError> {
        let (access_token, access_claims) = self.codec.issue_access(subject, role, now)?;
        let (refresh_token, refresh_claims) = self.codec.issue_refresh(subject, now)?;

        let record = NewRefreshCredential {
            subject,
            digest: TokenDigest::of(refresh_token.as_str()),
            previous_digest,
            expires_at: refresh_claims.expires_at,
            created_at: now,
        };

        if cancel.is_cancelled() {
            return Err(TokenError::Cancelled);
        }
        // last await point: once the record is written the pair is returned
        let credential_id = guarded(
            cancel,
            self.store
                .create(record)
                .map_err(|e| TokenError::IssuanceFailed(e.to_string())),
        )
        .await?;
        debug!(%subject, %credential_id, "issued token pair");

        Ok(TokenPair {
            access_token,
            refresh_token,
            access_token_expires_at: access_claims.expires_at,
            refresh_token_expires_at: refresh_claims.expires_at,
        })
    }

    /// Signature check, digest lookup, and subject match.
    async fn load_refresh_record(
        &self,
        refresh_token: &str,
        cancel: &CancellationToken,
    ) -> Result<(RefreshCredentialRecord, RefreshClaims), TokenError> {
        let claims = self
            .codec
            .inspect_refresh(refresh_token)
            .map_err(|_| TokenError::InvalidRefreshToken)?;

        let digest = TokenDigest::of(refresh_token);
        let record = match guarded(cancel, self.store.find_by_digest(&digest)).await? {
            Some(record) => record,
            None => {
                warn!(target: SECURITY_TARGET, subject = %claims.subject, "validly signed refresh token has no stored record");
                return Err(TokenError::UnknownRefreshToken);
            }
        };

        if record.subject != claims.subject {
            warn!(target: SECURITY_TARGET, claimed = %claims.subject, stored = %record.subject, "refresh token subject mismatch");
            return Err(TokenError::UnknownRefreshToken);
        }

        Ok((record, claims))
    }

    fn ensure_active(
        record: &RefreshCredentialRecord,
        claims: &RefreshClaims,
        now: DateTime<Utc>,
    ) -> Result<(), TokenError> {
        match record.state_at(now) {
            CredentialState::Revoked => Err(TokenError::RefreshTokenRevoked),
            CredentialState::Expired => Err(TokenError::RefreshTokenExpired),
            CredentialState::Active if claims.expires_at <= now => {
                Err(TokenError::RefreshTokenExpired)
            }
            CredentialState::Active => Ok(()),
        }
    }

    /// Role comes from the authoritative user record, not from the old token.
    async fn current_role(
        &self,
        subject: UserId,
        cancel: &CancellationToken,
    ) -> Result<Role, TokenError> {
        let user = guarded(cancel, self.users.find_by_id(subject))
            .await?
            .filter(UserRecord::may_authenticate)
            .ok_or(TokenError::SubjectUnavailable)?;
        Ok(user.role)
    }

    /// Writes the denylist entry for the access half of a logout. Returns whether
    /// an entry was written; unverifiable or already-expired tokens are skipped.
    async fn denylist_access(
        &self,
        access_token: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, CacheError> {
        let claims = match self.codec.inspect_access(access_token) {
            Ok(claims) => claims,
            Err(e) => {
                debug!(error = %e, "access token not denylisted, it does not verify");
                return Ok(false);
            }
        };
        let ttl = match (claims.expires_at - now).to_std() {
            Ok(ttl) if !ttl.is_zero() => ttl,
            _ => return Ok(false),
        };
        self.cache
            .set_with_ttl(
                TokenDigest::of(access_token).as_str(),
                DENYLIST_SENTINEL,
                ttl,
            )
            .await?;
        Ok(true)
    }
}

#[async_trait::async_trait]
impl TokenService for RealTokenService {
    async fn issue_token_pair(
        &self,
        subject: UserId,
        role: Role,
        cancel: &CancellationToken,
    ) -> Result<TokenPair, TokenError> {
        let now = self.clock.now();
        self.issue_pair(subject, role, None, now, cancel).await
    }

    async fn verify_access(
        &self,
        access_token: &str,
        cancel: &CancellationToken,
    ) -> Result<AccessClaims, TokenError> {
        let key = TokenDigest::of(access_token);
        // cache errors fail closed
        if guarded(cancel, self.cache.exists(key.as_str())).await? {
            return Err(TokenError::Revoked);
        }
        let claims = self.codec.verify_access(access_token, self.clock.now())?;
        Ok(claims)
    }

    async fn refresh_access_token(
        &self,
        refresh_token: &str,
        cancel: &CancellationToken,
    ) -> Result<RefreshedAccess, TokenError> {
        let (record, claims) = self.load_refresh_record(refresh_token, cancel).await?;
        let now = self.clock.now();
        if let Err(e) = Self::ensure_active(&record, &claims, now) {
            if e == TokenError::RefreshTokenRevoked {
                warn!(target: SECURITY_TARGET, subject = %record.subject, credential_id = %record.id, "revoked refresh token presented");
            }
            return Err(e);
        }

        let role = self.current_role(record.subject, cancel).await?;
        let (access_token, access_claims) = self.codec.issue_access(record.subject, role, now)?;
        debug!(subject = %record.subject, credential_id = %record.id, "refreshed access token");

        Ok(RefreshedAccess {
            access_token,
            expires_at: access_claims.expires_at,
        })
    }

    async fn rotate_refresh_token(
        &self,
        refresh_token: &str,
        cancel: &CancellationToken,
    ) -> Result<TokenPair, TokenError> {
        let (record, claims) = self.load_refresh_record(refresh_token, cancel).await?;
        let now = self.clock.now();
        match Self::ensure_active(&record, &claims, now) {
            Err(TokenError::RefreshTokenRevoked) => {
                warn!(target: SECURITY_TARGET, subject = %record.subject, credential_id = %record.id, "revoked refresh token replayed for rotation, revoking all sessions");
                let revoked = guarded(
                    cancel,
                    self.store.set_revoked_for_subject(record.subject, now),
                )
                .await?;
                info!(subject = %record.subject, revoked, "sessions revoked after refresh token reuse");
                return Err(TokenError::RefreshTokenRevoked);
            }
            other => other?,
        }

        let role = self.current_role(record.subject, cancel).await?;

        // only the caller that flips the record from Active may rotate it
        let consumed = guarded(cancel, self.store.set_revoked(&record.digest, now)).await?;
        if !consumed {
            warn!(target: SECURITY_TARGET, subject = %record.subject, credential_id = %record.id, "refresh token consumed concurrently");
            return Err(TokenError::RefreshTokenRevoked);
        }

        self.issue_pair(record.subject, role, Some(record.digest), now, cancel)
            .await
    }

    async fn logout(
        &self,
        access_token: &str,
        refresh_token: &str,
        cancel: &CancellationToken,
    ) -> Result<LogoutOutcome, TokenError> {
        let now = self.clock.now();
        let refresh_digest = TokenDigest::of(refresh_token);

        // neither write waits on the other
        let (denylisted, revoked) = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TokenError::Cancelled),
            pair = futures_util::future::join(
                self.denylist_access(access_token, now),
                self.store.set_revoked(&refresh_digest, now),
            ) => pair,
        };

        let denylisted = denylisted.unwrap_or_else(|e| {
            warn!(error = %e, "logout could not denylist access token, it stays valid until expiry");
            false
        });

        match revoked {
            Ok(revoked) => {
                info!(denylisted, revoked, "logout");
                Ok(LogoutOutcome {
                    denylisted,
                    revoked,
                })
            }
            Err(e) => {
                warn!(error = %e, denylisted, "logout could not revoke refresh token");
                Err(TokenError::LogoutPartialFailure {
                    denylisted,
                    reason: e.to_string(),
                })
            }
        }
    }

    async fn revoke_all_for_subject(
        &self,
        subject: UserId,
        cancel: &CancellationToken,
    ) -> Result<u64, TokenError> {
        let now = self.clock.now();
        let revoked = guarded(cancel, self.store.set_revoked_for_subject(subject, now)).await?;
        info!(%subject, revoked, "revoked all refresh tokens for subject");
        Ok(revoked)
    }

    async fn purge_expired(&self, cancel: &CancellationToken) -> Result<u64, TokenError> {
        let cutoff = self.clock.now() - self.purge_grace;
        let purged = guarded(cancel, self.store.delete_expired_before(cutoff)).await?;
        info!(%cutoff, purged, "purged expired refresh credentials");
        Ok(purged)
    }
}
