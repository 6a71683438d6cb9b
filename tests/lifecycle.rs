mod common;

use common::*;
use latchkey::application_impl::*;
use latchkey::application_port::*;
use latchkey::domain_model::*;
use latchkey::domain_port::*;
use std::future::Future;
use tokio_util::sync::CancellationToken;

fn tamper_signature(token: &str) -> String {
    let (head, sig) = token.rsplit_once('.').unwrap();
    let mut sig: Vec<char> = sig.chars().collect();
    let mid = sig.len() / 2;
    sig[mid] = if sig[mid] == 'A' { 'B' } else { 'A' };
    format!("{}.{}", head, sig.into_iter().collect::<String>())
}

/// Drives `call` until it is parked on a backend, then cancels it.
async fn cancel_in_flight<T>(
    cancel: &CancellationToken,
    call: impl Future<Output = Result<T, TokenError>>,
) -> Result<T, TokenError> {
    let (res, ()) = tokio::join!(call, async {
        tokio::task::yield_now().await;
        cancel.cancel();
    });
    res
}

#[tokio::test]
async fn issued_pair_verifies_with_subject_and_role() {
    let fx = Fixture::new();
    let cancel = CancellationToken::new();

    let pair = fx
        .service
        .issue_token_pair(UserId(42), Role::User, &cancel)
        .await
        .unwrap();
    assert_ne!(pair.access_token.as_str(), pair.refresh_token.as_str());
    assert!(pair.access_token_expires_at < pair.refresh_token_expires_at);

    let claims = fx
        .service
        .verify_access(pair.access_token.as_str(), &cancel)
        .await
        .unwrap();
    assert_eq!(claims.subject, UserId(42));
    assert_eq!(claims.role, Role::User);
    assert_eq!(claims.expires_at, pair.access_token_expires_at);

    let records = fx.store.inner.records_for(UserId(42));
    assert_eq!(records.len(), 1);
    // only the digest is stored
    assert_eq!(records[0].digest, TokenDigest::of(pair.refresh_token.as_str()));
    assert_ne!(records[0].digest.as_str(), pair.refresh_token.as_str());
}

#[tokio::test]
async fn access_token_expires_and_never_comes_back() {
    let fx = Fixture::new();
    let cancel = CancellationToken::new();
    let pair = fx
        .service
        .issue_token_pair(UserId(42), Role::User, &cancel)
        .await
        .unwrap();

    fx.advance_secs(ACCESS_TTL_SECS as i64 - 1);
    assert!(
        fx.service
            .verify_access(pair.access_token.as_str(), &cancel)
            .await
            .is_ok()
    );

    fx.advance_secs(1);
    assert_eq!(
        fx.service
            .verify_access(pair.access_token.as_str(), &cancel)
            .await,
        Err(TokenError::Expired)
    );

    // a later refresh issues a new token, the old one stays dead
    let refreshed = fx
        .service
        .refresh_access_token(pair.refresh_token.as_str(), &cancel)
        .await
        .unwrap();
    assert_ne!(refreshed.access_token, pair.access_token);
    assert_eq!(
        fx.service
            .verify_access(pair.access_token.as_str(), &cancel)
            .await,
        Err(TokenError::Expired)
    );
    assert!(
        fx.service
            .verify_access(refreshed.access_token.as_str(), &cancel)
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn refresh_is_repeatable_and_keeps_the_refresh_token() {
    let fx = Fixture::new();
    let cancel = CancellationToken::new();
    let pair = fx
        .service
        .issue_token_pair(UserId(42), Role::User, &cancel)
        .await
        .unwrap();

    let first = fx
        .service
        .refresh_access_token(pair.refresh_token.as_str(), &cancel)
        .await
        .unwrap();
    let second = fx
        .service
        .refresh_access_token(pair.refresh_token.as_str(), &cancel)
        .await
        .unwrap();

    assert_ne!(first.access_token, second.access_token);
    assert_eq!(fx.store.inner.len(), 1);
    let record = fx
        .store
        .find_by_digest(&TokenDigest::of(pair.refresh_token.as_str()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.revoked_at, None);
}

#[tokio::test]
async fn concurrent_refreshes_both_succeed() {
    let fx = Fixture::new();
    let cancel = CancellationToken::new();
    let pair = fx
        .service
        .issue_token_pair(UserId(42), Role::User, &cancel)
        .await
        .unwrap();

    let (a, b) = tokio::join!(
        fx.service
            .refresh_access_token(pair.refresh_token.as_str(), &cancel),
        fx.service
            .refresh_access_token(pair.refresh_token.as_str(), &cancel),
    );
    assert!(a.is_ok());
    assert!(b.is_ok());
}

#[tokio::test]
async fn refresh_token_expiry_is_enforced() {
    let fx = Fixture::new();
    let cancel = CancellationToken::new();
    let pair = fx
        .service
        .issue_token_pair(UserId(42), Role::User, &cancel)
        .await
        .unwrap();

    fx.advance_secs(REFRESH_TTL_SECS as i64);
    assert_eq!(
        fx.service
            .refresh_access_token(pair.refresh_token.as_str(), &cancel)
            .await
            .unwrap_err(),
        TokenError::RefreshTokenExpired
    );
}

#[tokio::test]
async fn logout_denylists_access_and_revokes_refresh() {
    let fx = Fixture::new();
    let cancel = CancellationToken::new();
    let pair = fx
        .service
        .issue_token_pair(UserId(42), Role::User, &cancel)
        .await
        .unwrap();

    let outcome = fx
        .service
        .logout(
            pair.access_token.as_str(),
            pair.refresh_token.as_str(),
            &cancel,
        )
        .await
        .unwrap();
    assert_eq!(
        outcome,
        LogoutOutcome {
            denylisted: true,
            revoked: true
        }
    );

    assert_eq!(
        fx.service
            .verify_access(pair.access_token.as_str(), &cancel)
            .await,
        Err(TokenError::Revoked)
    );
    assert_eq!(
        fx.service
            .refresh_access_token(pair.refresh_token.as_str(), &cancel)
            .await
            .unwrap_err(),
        TokenError::RefreshTokenRevoked
    );

    // once the denylist entry lapses the token is still dead by expiry
    fx.advance_secs(ACCESS_TTL_SECS as i64);
    assert_eq!(
        fx.service
            .verify_access(pair.access_token.as_str(), &cancel)
            .await,
        Err(TokenError::Expired)
    );
}

#[tokio::test]
async fn second_logout_is_harmless() {
    let fx = Fixture::new();
    let cancel = CancellationToken::new();
    let pair = fx
        .service
        .issue_token_pair(UserId(42), Role::User, &cancel)
        .await
        .unwrap();

    fx.service
        .logout(
            pair.access_token.as_str(),
            pair.refresh_token.as_str(),
            &cancel,
        )
        .await
        .unwrap();
    let again = fx
        .service
        .logout(
            pair.access_token.as_str(),
            pair.refresh_token.as_str(),
            &cancel,
        )
        .await
        .unwrap();
    assert!(!again.revoked);
}

#[tokio::test]
async fn logout_with_expired_access_token_still_revokes_refresh() {
    let fx = Fixture::new();
    let cancel = CancellationToken::new();
    let pair = fx
        .service
        .issue_token_pair(UserId(42), Role::User, &cancel)
        .await
        .unwrap();

    fx.advance_secs(ACCESS_TTL_SECS as i64 + 10);
    let outcome = fx
        .service
        .logout(
            pair.access_token.as_str(),
            pair.refresh_token.as_str(),
            &cancel,
        )
        .await
        .unwrap();
    assert!(!outcome.denylisted);
    assert!(outcome.revoked);
}

#[tokio::test]
async fn revoke_all_only_touches_one_subject() {
    let fx = Fixture::new();
    let cancel = CancellationToken::new();

    let mut mine = Vec::new();
    for _ in 0..3 {
        mine.push(
            fx.service
                .issue_token_pair(UserId(42), Role::User, &cancel)
                .await
                .unwrap(),
        );
    }
    let other = fx
        .service
        .issue_token_pair(UserId(7), Role::User, &cancel)
        .await
        .unwrap();

    let revoked = fx
        .service
        .revoke_all_for_subject(UserId(42), &cancel)
        .await
        .unwrap();
    assert_eq!(revoked, 3);

    for pair in &mine {
        assert_eq!(
            fx.service
                .refresh_access_token(pair.refresh_token.as_str(), &cancel)
                .await
                .unwrap_err(),
            TokenError::RefreshTokenRevoked
        );
    }
    assert!(
        fx.service
            .refresh_access_token(other.refresh_token.as_str(), &cancel)
            .await
            .is_ok()
    );

    // already revoked records are not counted twice
    assert_eq!(
        fx.service
            .revoke_all_for_subject(UserId(42), &cancel)
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn revoke_all_leaves_expired_records_expired() {
    let fx = Fixture::new();
    let cancel = CancellationToken::new();
    let pair = fx
        .service
        .issue_token_pair(UserId(42), Role::User, &cancel)
        .await
        .unwrap();

    fx.advance_secs(REFRESH_TTL_SECS as i64 + 1);
    assert_eq!(
        fx.service
            .revoke_all_for_subject(UserId(42), &cancel)
            .await
            .unwrap(),
        0
    );
    assert_eq!(
        fx.service
            .refresh_access_token(pair.refresh_token.as_str(), &cancel)
            .await
            .unwrap_err(),
        TokenError::RefreshTokenExpired
    );
    let record = fx
        .store
        .find_by_digest(&TokenDigest::of(pair.refresh_token.as_str()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.revoked_at, None);
}

#[tokio::test]
async fn tampered_or_foreign_tokens_fail_signature_checks() {
    let fx = Fixture::new();
    let cancel = CancellationToken::new();
    let pair = fx
        .service
        .issue_token_pair(UserId(42), Role::User, &cancel)
        .await
        .unwrap();

    assert_eq!(
        fx.service
            .verify_access(&tamper_signature(pair.access_token.as_str()), &cancel)
            .await,
        Err(TokenError::InvalidSignature)
    );

    // a refresh token is not an access token
    assert_eq!(
        fx.service
            .verify_access(pair.refresh_token.as_str(), &cancel)
            .await,
        Err(TokenError::InvalidSignature)
    );

    assert_eq!(
        fx.service
            .refresh_access_token(&tamper_signature(pair.refresh_token.as_str()), &cancel)
            .await
            .unwrap_err(),
        TokenError::InvalidRefreshToken
    );

    assert_eq!(
        fx.service.verify_access("not.a.jwt", &cancel).await,
        Err(TokenError::Malformed)
    );
}

#[tokio::test]
async fn validly_signed_refresh_token_without_record_is_unknown() {
    let fx = Fixture::new();
    let cancel = CancellationToken::new();

    let (stray, _) = fx.codec.issue_refresh(UserId(42), fx.clock.now()).unwrap();
    assert_eq!(
        fx.service
            .refresh_access_token(stray.as_str(), &cancel)
            .await
            .unwrap_err(),
        TokenError::UnknownRefreshToken
    );
}

#[tokio::test]
async fn refresh_picks_up_the_current_role() {
    let fx = Fixture::new();
    let cancel = CancellationToken::new();
    let pair = fx
        .service
        .issue_token_pair(UserId(42), Role::User, &cancel)
        .await
        .unwrap();

    fx.users.upsert(user(42, Role::Admin));
    let refreshed = fx
        .service
        .refresh_access_token(pair.refresh_token.as_str(), &cancel)
        .await
        .unwrap();
    let claims = fx
        .service
        .verify_access(refreshed.access_token.as_str(), &cancel)
        .await
        .unwrap();
    assert_eq!(claims.role, Role::Admin);
}

#[tokio::test]
async fn banned_subject_cannot_refresh() {
    let fx = Fixture::new();
    let cancel = CancellationToken::new();
    let pair = fx
        .service
        .issue_token_pair(UserId(42), Role::User, &cancel)
        .await
        .unwrap();

    fx.users.upsert(UserRecord {
        is_banned: true,
        ..user(42, Role::User)
    });
    assert_eq!(
        fx.service
            .refresh_access_token(pair.refresh_token.as_str(), &cancel)
            .await
            .unwrap_err(),
        TokenError::SubjectUnavailable
    );
}

#[tokio::test]
async fn rotation_consumes_the_old_token() {
    let fx = Fixture::new();
    let cancel = CancellationToken::new();
    let pair = fx
        .service
        .issue_token_pair(UserId(42), Role::User, &cancel)
        .await
        .unwrap();

    let rotated = fx
        .service
        .rotate_refresh_token(pair.refresh_token.as_str(), &cancel)
        .await
        .unwrap();
    assert_ne!(rotated.refresh_token, pair.refresh_token);

    let new_record = fx
        .store
        .find_by_digest(&TokenDigest::of(rotated.refresh_token.as_str()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        new_record.previous_digest,
        Some(TokenDigest::of(pair.refresh_token.as_str()))
    );

    assert_eq!(
        fx.service
            .refresh_access_token(pair.refresh_token.as_str(), &cancel)
            .await
            .unwrap_err(),
        TokenError::RefreshTokenRevoked
    );
    assert!(
        fx.service
            .refresh_access_token(rotated.refresh_token.as_str(), &cancel)
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn replaying_a_rotated_token_revokes_every_session() {
    let fx = Fixture::new();
    let cancel = CancellationToken::new();
    let pair = fx
        .service
        .issue_token_pair(UserId(42), Role::User, &cancel)
        .await
        .unwrap();
    let rotated = fx
        .service
        .rotate_refresh_token(pair.refresh_token.as_str(), &cancel)
        .await
        .unwrap();

    assert_eq!(
        fx.service
            .rotate_refresh_token(pair.refresh_token.as_str(), &cancel)
            .await
            .unwrap_err(),
        TokenError::RefreshTokenRevoked
    );
    assert_eq!(
        fx.service
            .refresh_access_token(rotated.refresh_token.as_str(), &cancel)
            .await
            .unwrap_err(),
        TokenError::RefreshTokenRevoked
    );
}

#[tokio::test]
async fn verification_fails_closed_when_cache_is_down() {
    let fx = Fixture::new();
    let cancel = CancellationToken::new();
    let pair = fx
        .service
        .issue_token_pair(UserId(42), Role::User, &cancel)
        .await
        .unwrap();

    fx.cache.set_down(true);
    let err = fx
        .service
        .verify_access(pair.access_token.as_str(), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, TokenError::CacheUnavailable(_)));
    assert!(err.is_infrastructure_failure());
}

#[tokio::test]
async fn logout_survives_a_cache_outage() {
    let fx = Fixture::new();
    let cancel = CancellationToken::new();
    let pair = fx
        .service
        .issue_token_pair(UserId(42), Role::User, &cancel)
        .await
        .unwrap();

    fx.cache.set_down(true);
    let outcome = fx
        .service
        .logout(
            pair.access_token.as_str(),
            pair.refresh_token.as_str(),
            &cancel,
        )
        .await
        .unwrap();
    assert_eq!(
        outcome,
        LogoutOutcome {
            denylisted: false,
            revoked: true
        }
    );
    assert_eq!(
        fx.service
            .refresh_access_token(pair.refresh_token.as_str(), &cancel)
            .await
            .unwrap_err(),
        TokenError::RefreshTokenRevoked
    );
}

#[tokio::test]
async fn logout_reports_a_store_outage() {
    let fx = Fixture::new();
    let cancel = CancellationToken::new();
    let pair = fx
        .service
        .issue_token_pair(UserId(42), Role::User, &cancel)
        .await
        .unwrap();

    fx.store.set_writes_down(true);
    let err = fx
        .service
        .logout(
            pair.access_token.as_str(),
            pair.refresh_token.as_str(),
            &cancel,
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TokenError::LogoutPartialFailure {
            denylisted: true,
            ..
        }
    ));

    // the access half took effect regardless
    assert_eq!(
        fx.service
            .verify_access(pair.access_token.as_str(), &cancel)
            .await,
        Err(TokenError::Revoked)
    );
}

#[tokio::test]
async fn failed_store_write_means_no_pair() {
    let fx = Fixture::new();
    let cancel = CancellationToken::new();

    fx.store.set_writes_down(true);
    let err = fx
        .service
        .issue_token_pair(UserId(42), Role::User, &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, TokenError::IssuanceFailed(_)));
    assert!(fx.store.inner.is_empty());
}

#[tokio::test]
async fn cancelled_issue_writes_nothing() {
    let fx = Fixture::new();
    let cancel = CancellationToken::new();
    cancel.cancel();

    assert_eq!(
        fx.service
            .issue_token_pair(UserId(42), Role::User, &cancel)
            .await
            .unwrap_err(),
        TokenError::Cancelled
    );
    assert!(fx.store.inner.is_empty());
}

#[tokio::test]
async fn purge_removes_only_long_expired_records() {
    let fx = Fixture::new();
    let cancel = CancellationToken::new();
    fx.service
        .issue_token_pair(UserId(42), Role::User, &cancel)
        .await
        .unwrap();

    // expired, but still inside the grace window
    fx.advance_secs(REFRESH_TTL_SECS as i64 + 60);
    let late = fx
        .service
        .issue_token_pair(UserId(7), Role::User, &cancel)
        .await
        .unwrap();
    assert_eq!(fx.service.purge_expired(&cancel).await.unwrap(), 0);

    fx.advance_secs(24 * 60 * 60);
    assert_eq!(fx.service.purge_expired(&cancel).await.unwrap(), 1);
    assert_eq!(fx.store.inner.len(), 1);
    assert!(
        fx.service
            .refresh_access_token(late.refresh_token.as_str(), &cancel)
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn purged_token_is_unknown_not_resurrected() {
    let fx = Fixture::new();
    let cancel = CancellationToken::new();
    let pair = fx
        .service
        .issue_token_pair(UserId(42), Role::User, &cancel)
        .await
        .unwrap();

    fx.advance_secs(REFRESH_TTL_SECS as i64 + 2 * 24 * 60 * 60);
    fx.service.purge_expired(&cancel).await.unwrap();

    let err = fx
        .service
        .refresh_access_token(pair.refresh_token.as_str(), &cancel)
        .await
        .unwrap_err();
    assert!(err.is_credential_failure());
}

#[tokio::test]
async fn codec_built_from_config_rejects_other_codecs_tokens() {
    let fx = Fixture::new();
    let cancel = CancellationToken::new();
    let mut cfg = test_config();
    cfg.access_secret = b"a-completely-different-access-secret".to_vec();
    let foreign = JwtHs256Codec::new(&cfg).unwrap();

    let (token, _) = foreign
        .issue_access(UserId(42), Role::Admin, fx.clock.now())
        .unwrap();
    assert_eq!(
        fx.service.verify_access(token.as_str(), &cancel).await,
        Err(TokenError::InvalidSignature)
    );
}

#[tokio::test]
async fn cancelling_a_stalled_issue_writes_nothing() {
    let fx = Fixture::new();
    let cancel = CancellationToken::new();
    fx.store.set_stalled(true);

    let res = cancel_in_flight(
        &cancel,
        fx.service.issue_token_pair(UserId(42), Role::User, &cancel),
    )
    .await;
    assert_eq!(res.unwrap_err(), TokenError::Cancelled);
    assert!(fx.store.inner.is_empty());
}

#[tokio::test]
async fn cancelling_a_stalled_verify_does_not_authenticate() {
    let fx = Fixture::new();
    let pair = fx
        .service
        .issue_token_pair(UserId(42), Role::User, &CancellationToken::new())
        .await
        .unwrap();

    fx.cache.set_stalled(true);
    let cancel = CancellationToken::new();
    let res = cancel_in_flight(
        &cancel,
        fx.service.verify_access(pair.access_token.as_str(), &cancel),
    )
    .await;
    assert_eq!(res, Err(TokenError::Cancelled));
}

#[tokio::test]
async fn cancelling_stalled_refresh_and_rotate_leaves_the_record_active() {
    let fx = Fixture::new();
    let pair = fx
        .service
        .issue_token_pair(UserId(42), Role::User, &CancellationToken::new())
        .await
        .unwrap();

    fx.store.set_stalled(true);
    let cancel = CancellationToken::new();
    let refreshed = cancel_in_flight(
        &cancel,
        fx.service
            .refresh_access_token(pair.refresh_token.as_str(), &cancel),
    )
    .await;
    assert_eq!(refreshed.unwrap_err(), TokenError::Cancelled);

    let cancel = CancellationToken::new();
    let rotated = cancel_in_flight(
        &cancel,
        fx.service
            .rotate_refresh_token(pair.refresh_token.as_str(), &cancel),
    )
    .await;
    assert_eq!(rotated.unwrap_err(), TokenError::Cancelled);

    fx.store.set_stalled(false);
    assert_eq!(fx.store.inner.len(), 1);
    assert!(
        fx.service
            .refresh_access_token(pair.refresh_token.as_str(), &CancellationToken::new())
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn cancelling_stalled_logout_and_revoke_all_revokes_nothing() {
    let fx = Fixture::new();
    let pair = fx
        .service
        .issue_token_pair(UserId(42), Role::User, &CancellationToken::new())
        .await
        .unwrap();

    fx.store.set_stalled(true);
    let cancel = CancellationToken::new();
    let logout = cancel_in_flight(
        &cancel,
        fx.service.logout(
            pair.access_token.as_str(),
            pair.refresh_token.as_str(),
            &cancel,
        ),
    )
    .await;
    assert_eq!(logout.unwrap_err(), TokenError::Cancelled);

    let cancel = CancellationToken::new();
    let revoke_all = cancel_in_flight(
        &cancel,
        fx.service.revoke_all_for_subject(UserId(42), &cancel),
    )
    .await;
    assert_eq!(revoke_all.unwrap_err(), TokenError::Cancelled);

    let cancel = CancellationToken::new();
    let purge = cancel_in_flight(&cancel, fx.service.purge_expired(&cancel)).await;
    assert_eq!(purge.unwrap_err(), TokenError::Cancelled);

    fx.store.set_stalled(false);
    let record = fx
        .store
        .find_by_digest(&TokenDigest::of(pair.refresh_token.as_str()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.revoked_at, None);
}
