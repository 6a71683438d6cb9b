/// Walks one subject through the whole token lifecycle on the in-memory
/// backends, with a manual clock so expiry can be shown without waiting.
use chrono::Utc;
use latchkey::application_impl::*;
use latchkey::application_port::*;
use latchkey::domain_model::*;
use latchkey::domain_port::*;
use latchkey::infra_memory::*;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::new("lifecycle_demo=debug,latchkey=debug");

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();

    // region initialization

    let cfg = TokenConfig {
        access_ttl: Duration::from_secs(15 * 60),
        refresh_ttl: Duration::from_secs(7 * 24 * 60 * 60),
        access_secret: b"demo-access-secret-0123456789abcdef".to_vec(),
        refresh_secret: b"demo-refresh-secret-0123456789abcdef".to_vec(),
        purge_grace: Duration::from_secs(24 * 60 * 60),
    };

    let clock = Arc::new(ManualClock::new(Utc::now()));
    let store = Arc::new(MemoryCredentialStore::new());
    let users = Arc::new(MemoryUserRepo::new());
    users.upsert(UserRecord {
        user_id: UserId(42),
        email: "user@example.com".to_string(),
        password_hash: String::new(),
        role: Role::User,
        is_active: true,
        is_banned: false,
    });

    let token_service: Arc<dyn TokenService> = Arc::new(RealTokenService::new(
        &cfg,
        Arc::new(JwtHs256Codec::new(&cfg)?),
        store.clone(),
        Arc::new(MemoryRevocationCache::new(clock.clone())),
        users.clone(),
        clock.clone(),
    ));
    let cancel = CancellationToken::new();

    // endregion

    // region issue and verify

    let pair = token_service
        .issue_token_pair(UserId(42), Role::User, &cancel)
        .await?;
    println!(
        "issued pair: access expires {}, refresh expires {}",
        pair.access_token_expires_at, pair.refresh_token_expires_at
    );

    let claims = token_service
        .verify_access(pair.access_token.as_str(), &cancel)
        .await?;
    println!("verified: subject={} role={}", claims.subject, claims.role);

    // endregion

    // region expiry and refresh

    clock.advance(chrono::Duration::minutes(16));
    match token_service
        .verify_access(pair.access_token.as_str(), &cancel)
        .await
    {
        Err(e) => println!("after 16 minutes: {}", e),
        Ok(_) => println!("after 16 minutes: still valid?"),
    }

    let refreshed = token_service
        .refresh_access_token(pair.refresh_token.as_str(), &cancel)
        .await?;
    println!("refreshed, new access expires {}", refreshed.expires_at);

    // endregion

    // region logout

    let outcome = token_service
        .logout(
            refreshed.access_token.as_str(),
            pair.refresh_token.as_str(),
            &cancel,
        )
        .await?;
    println!("logout: {:?}", outcome);

    match token_service
        .verify_access(refreshed.access_token.as_str(), &cancel)
        .await
    {
        Err(e) => println!("access after logout: {}", e),
        Ok(_) => println!("access after logout: still valid?"),
    }
    match token_service
        .refresh_access_token(pair.refresh_token.as_str(), &cancel)
        .await
    {
        Err(e) => println!("refresh after logout: {}", e),
        Ok(_) => println!("refresh after logout: still valid?"),
    }

    // endregion

    // region purge

    clock.advance(chrono::Duration::days(9));
    let purged = token_service.purge_expired(&cancel).await?;
    println!("purged {} records, {} left", purged, store.len());

    // endregion

    Ok(())
}
