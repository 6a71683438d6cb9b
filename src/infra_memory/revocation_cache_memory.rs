use crate::domain_port::*;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

/// Denylist with per-key deadlines measured on the injected [`Clock`], so tests
/// can move time forward without sleeping. Expired keys are dropped lazily.
pub struct MemoryRevocationCache {
    entries: DashMap<String, (String, DateTime<Utc>)>,
    clock: Arc<dyn Clock>,
}

impl MemoryRevocationCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        MemoryRevocationCache {
            entries: DashMap::new(),
            clock,
        }
    }

    pub fn len(&self) -> usize {
        let now = self.clock.now();
        self.entries.retain(|_, (_, deadline)| *deadline > now);
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait::async_trait]
impl RevocationCache for MemoryRevocationCache {
    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        let now = self.clock.now();
        let live = match self.entries.get(key) {
            Some(entry) => entry.1 > now,
            None => return Ok(false),
        };
        if !live {
            self.entries.remove_if(key, |_, (_, deadline)| *deadline <= now);
        }
        Ok(live)
    }

    async fn set_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let ttl =
            chrono::Duration::from_std(ttl).map_err(|e| CacheError::Unavailable(e.to_string()))?;
        let deadline = self.clock.now() + ttl;
        self.entries
            .insert(key.to_string(), (value.to_string(), deadline));
        Ok(())
    }
}
