use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache unavailable: {0}")]
    Unavailable(String),
}

/// Key-existence store with per-key TTL, used as the access-token denylist.
#[async_trait::async_trait]
pub trait RevocationCache: Send + Sync {
    async fn exists(&self, key: &str) -> Result<bool, CacheError>;

    /// The entry must stay visible for the whole `ttl` and disappear after it.
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration)
    -> Result<(), CacheError>;
}
