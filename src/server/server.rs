use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use crate::infra_memory::*;
use crate::infra_mysql::*;
use crate::infra_redis::*;
use crate::logger::*;
use crate::server::PurgeWorker;
use crate::settings::Settings;
use nanoid::nanoid;
use sqlx::{MySql, Pool};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct Server {
    pub auth_service: Arc<dyn AuthService>,
    pub token_service: Arc<dyn TokenService>,
    instance_id: String,
    purge_handle: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
    pool: Option<Pool<MySql>>,
}

impl Server {
    pub async fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        let token_cfg = TokenConfig {
            access_ttl: settings.token.access_ttl(),
            refresh_ttl: settings.token.refresh_ttl(),
            access_secret: settings.token.access_secret.clone().into_bytes(),
            refresh_secret: settings.token.refresh_secret.clone().into_bytes(),
            purge_grace: settings.token.purge_grace(),
        };
        debug!(?token_cfg);

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let credential_hasher: Arc<dyn CredentialHasher> = Arc::new(Argon2PasswordHasher);

        let mut pool = None;
        let (credential_store, user_repo): (Arc<dyn CredentialStore>, Arc<dyn UserRepo>) =
            match settings.store.backend.as_str() {
                "memory" => {
                    let users = Arc::new(MemoryUserRepo::new());
                    for seed in &settings.store.seed_users {
                        users.upsert(UserRecord {
                            user_id: UserId(seed.user_id),
                            email: seed.email.clone(),
                            password_hash: credential_hasher.hash_password(&seed.password).await?,
                            role: seed.role.parse()?,
                            is_active: true,
                            is_banned: false,
                        });
                    }
                    (Arc::new(MemoryCredentialStore::new()), users)
                }
                "mysql" => {
                    let dsn = settings
                        .store
                        .mysql_dsn
                        .as_deref()
                        .ok_or_else(|| anyhow::anyhow!("store.mysql_dsn is required"))?;
                    let mysql = Pool::<MySql>::connect(dsn).await?;
                    pool = Some(mysql.clone());
                    (
                        Arc::new(MySqlCredentialStore::new(mysql.clone())),
                        Arc::new(MySqlUserRepo::new(mysql)),
                    )
                }
                other => return Err(anyhow::anyhow!("Unknown store backend: {}", other)),
            };

        let revocation_cache: Arc<dyn RevocationCache> = match settings.cache.backend.as_str() {
            "memory" => Arc::new(MemoryRevocationCache::new(clock.clone())),
            "redis" => {
                let dsn = settings
                    .cache
                    .redis_dsn
                    .as_deref()
                    .ok_or_else(|| anyhow::anyhow!("cache.redis_dsn is required"))?;
                let redis_client = redis::Client::open(dsn)?;
                let redis_manager = redis_client.get_connection_manager().await?;
                Arc::new(RedisRevocationCache::new(
                    redis_manager,
                    settings.cache.prefix.clone(),
                ))
            }
            other => return Err(anyhow::anyhow!("Unknown cache backend: {}", other)),
        };

        let token_codec: Arc<dyn TokenCodec> = Arc::new(JwtHs256Codec::new(&token_cfg)?);
        let token_service: Arc<dyn TokenService> = Arc::new(RealTokenService::new(
            &token_cfg,
            token_codec,
            credential_store,
            revocation_cache,
            user_repo.clone(),
            clock,
        ));
        let auth_service: Arc<dyn AuthService> = Arc::new(RealAuthService::new(
            user_repo,
            credential_hasher,
            token_service.clone(),
        ));

        let mut server = Self::from_services(
            auth_service,
            token_service,
            settings.token.purge_interval(),
        );
        server.pool = pool;
        Ok(server)
    }

    /// Wires already-built services and starts the purge worker. `try_new`
    /// ends here; tests call it directly with in-memory services.
    pub fn from_services(
        auth_service: Arc<dyn AuthService>,
        token_service: Arc<dyn TokenService>,
        purge_interval: Duration,
    ) -> Self {
        let alphabet: [char; 16] = [
            '1', '2', '3', '4', '5', '6', '7', '8', '9', '0', 'a', 'b', 'c', 'd', 'e', 'f',
        ];
        let instance_id = nanoid!(10, &alphabet);

        let cancel = CancellationToken::new();
        let purge_worker = PurgeWorker::new(token_service.clone(), purge_interval, cancel.clone());
        let purge_handle = tokio::spawn(async move { purge_worker.run().await });

        info!(%instance_id, "server started");

        Self {
            auth_service,
            token_service,
            instance_id,
            purge_handle: Mutex::new(Some(purge_handle)),
            cancel,
            pool: None,
        }
    }

    /// Per-request cancellation, tripped by server shutdown.
    pub fn request_cancel(&self) -> CancellationToken {
        self.cancel.child_token()
    }

    pub async fn shutdown(&self) {
        info!(instance_id = %self.instance_id, "server shutting down...");

        self.cancel.cancel();

        let handle = match self.purge_handle.lock() {
            Ok(mut lock) => lock.take(),
            Err(_) => None,
        };
        if let Some(handle) = handle {
            let r = handle.await;
            info!("purge worker stopped: {:?}", r);
        }

        if let Some(pool) = &self.pool {
            pool.close().await;
        }
    }
}
