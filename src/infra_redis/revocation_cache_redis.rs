use crate::domain_port::*;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::time::Duration;

pub struct RedisRevocationCache {
    conn: ConnectionManager,
    prefix: String,
}

impl RedisRevocationCache {
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>) -> Self {
        RedisRevocationCache {
            conn,
            prefix: prefix.into(),
        }
    }

    fn key(&self, key: &str) -> String {
        format!("{}:{}", self.prefix, key)
    }

    /// PSETEX takes whole milliseconds; round up so the entry never expires
    /// before the token it denies.
    fn ttl_millis(ttl: Duration) -> u64 {
        let millis = ttl.as_millis();
        let millis = if Duration::from_millis(millis as u64) < ttl {
            millis + 1
        } else {
            millis
        };
        millis.clamp(1, u64::MAX as u128) as u64
    }
}

#[async_trait::async_trait]
impl RevocationCache for RedisRevocationCache {
    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        let key = self.key(key);
        let mut conn = self.conn.clone();
        let found: bool = conn
            .exists(&key)
            .await
            .map_err(|e| CacheError::Unavailable(e.to_string()))?;
        Ok(found)
    }

    async fn set_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let key = self.key(key);
        let mut conn = self.conn.clone();
        let _: () = conn
            .pset_ex(&key, value, Self::ttl_millis(ttl))
            .await
            .map_err(|e| CacheError::Unavailable(e.to_string()))?;
        Ok(())
    }
}
