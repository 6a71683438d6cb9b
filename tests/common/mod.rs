#![allow(dead_code)]

use chrono::{DateTime, Utc};
use latchkey::application_impl::*;
use latchkey::application_port::*;
use latchkey::domain_model::*;
use latchkey::domain_port::*;
use latchkey::infra_memory::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

pub const ACCESS_TTL_SECS: u64 = 15 * 60;
pub const REFRESH_TTL_SECS: u64 = 7 * 24 * 60 * 60;

pub fn test_config() -> TokenConfig {
    TokenConfig {
        access_ttl: Duration::from_secs(ACCESS_TTL_SECS),
        refresh_ttl: Duration::from_secs(REFRESH_TTL_SECS),
        access_secret: b"test-access-secret-0123456789abcdef".to_vec(),
        refresh_secret: b"test-refresh-secret-0123456789abcdef".to_vec(),
        purge_grace: Duration::from_secs(24 * 60 * 60),
    }
}

pub fn user(id: i64, role: Role) -> UserRecord {
    UserRecord {
        user_id: UserId(id),
        email: format!("user{}@example.com", id),
        password_hash: String::new(),
        role,
        is_active: true,
        is_banned: false,
    }
}

/// Cache that can be switched into failing mode mid-test.
pub struct FlakyCache {
    inner: MemoryRevocationCache,
    pub down: AtomicBool,
    pub stalled: AtomicBool,
}

impl FlakyCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: MemoryRevocationCache::new(clock),
            down: AtomicBool::new(false),
            stalled: AtomicBool::new(false),
        }
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    /// Every later call hangs until the caller gives up on it.
    pub fn set_stalled(&self, stalled: bool) {
        self.stalled.store(stalled, Ordering::SeqCst);
    }

    async fn check(&self) -> Result<(), CacheError> {
        if self.stalled.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.down.load(Ordering::SeqCst) {
            return Err(CacheError::Unavailable("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl RevocationCache for FlakyCache {
    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        self.check().await?;
        self.inner.exists(key).await
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        self.check().await?;
        self.inner.set_with_ttl(key, value, ttl).await
    }
}

/// Store whose writes can be switched off; reads keep working.
pub struct FlakyStore {
    pub inner: MemoryCredentialStore,
    pub writes_down: AtomicBool,
    pub stalled: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryCredentialStore::new(),
            writes_down: AtomicBool::new(false),
            stalled: AtomicBool::new(false),
        }
    }

    /// Every later call, reads included, hangs until the caller gives up on it.
    pub fn set_stalled(&self, stalled: bool) {
        self.stalled.store(stalled, Ordering::SeqCst);
    }

    async fn stall(&self) {
        if self.stalled.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
    }

    pub fn set_writes_down(&self, down: bool) {
        self.writes_down.store(down, Ordering::SeqCst);
    }

    async fn check(&self) -> Result<(), StoreError> {
        self.stall().await;
        if self.writes_down.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("database is gone".to_string()));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl CredentialStore for FlakyStore {
    async fn create(&self, record: NewRefreshCredential) -> Result<uuid::Uuid, StoreError> {
        self.check().await?;
        self.inner.create(record).await
    }

    async fn find_by_digest(
        &self,
        digest: &TokenDigest,
    ) -> Result<Option<RefreshCredentialRecord>, StoreError> {
        self.stall().await;
        self.inner.find_by_digest(digest).await
    }

    async fn set_revoked(&self, digest: &TokenDigest, at: DateTime<Utc>) -> Result<bool, StoreError> {
        self.check().await?;
        self.inner.set_revoked(digest, at).await
    }

    async fn set_revoked_for_subject(
        &self,
        subject: UserId,
        at: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        self.check().await?;
        self.inner.set_revoked_for_subject(subject, at).await
    }

    async fn delete_expired_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        self.check().await?;
        self.inner.delete_expired_before(cutoff).await
    }
}

pub struct Fixture {
    pub clock: Arc<ManualClock>,
    pub store: Arc<FlakyStore>,
    pub cache: Arc<FlakyCache>,
    pub users: Arc<MemoryUserRepo>,
    pub codec: Arc<JwtHs256Codec>,
    pub service: Arc<dyn TokenService>,
}

impl Fixture {
    pub fn new() -> Self {
        let cfg = test_config();
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let store = Arc::new(FlakyStore::new());
        let cache = Arc::new(FlakyCache::new(clock.clone()));
        let users = Arc::new(MemoryUserRepo::new());
        users.upsert(user(42, Role::User));
        users.upsert(user(7, Role::User));
        users.upsert(user(1, Role::Admin));
        let codec = Arc::new(JwtHs256Codec::new(&cfg).unwrap());
        let service: Arc<dyn TokenService> = Arc::new(RealTokenService::new(
            &cfg,
            codec.clone(),
            store.clone(),
            cache.clone(),
            users.clone(),
            clock.clone(),
        ));
        Self {
            clock,
            store,
            cache,
            users,
            codec,
            service,
        }
    }

    pub fn advance_secs(&self, secs: i64) {
        self.clock.advance(chrono::Duration::seconds(secs));
    }
}
