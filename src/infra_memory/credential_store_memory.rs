use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

/// Process-local credential store keyed by digest. Each record update happens
/// under the shard lock, which stands in for a single-row transaction.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    records: DashMap<TokenDigest, RefreshCredentialRecord>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records_for(&self, subject: UserId) -> Vec<RefreshCredentialRecord> {
        self.records
            .iter()
            .filter(|r| r.subject == subject)
            .map(|r| r.value().clone())
            .collect()
    }
}

#[async_trait::async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn create(&self, record: NewRefreshCredential) -> Result<uuid::Uuid, StoreError> {
        match self.records.entry(record.digest.clone()) {
            Entry::Occupied(_) => Err(StoreError::Conflict),
            Entry::Vacant(slot) => {
                let id = uuid::Uuid::new_v4();
                slot.insert(RefreshCredentialRecord {
                    id,
                    subject: record.subject,
                    digest: record.digest,
                    previous_digest: record.previous_digest,
                    expires_at: record.expires_at,
                    revoked_at: None,
                    created_at: record.created_at,
                });
                Ok(id)
            }
        }
    }

    async fn find_by_digest(
        &self,
        digest: &TokenDigest,
    ) -> Result<Option<RefreshCredentialRecord>, StoreError> {
        Ok(self.records.get(digest).map(|r| r.value().clone()))
    }

    async fn set_revoked(
        &self,
        digest: &TokenDigest,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        match self.records.get_mut(digest) {
            Some(mut record) if record.revoked_at.is_none() => {
                record.revoked_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_revoked_for_subject(
        &self,
        subject: UserId,
        at: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let mut count = 0;
        for mut record in self.records.iter_mut() {
            if record.subject == subject && record.revoked_at.is_none() && record.expires_at > at {
                record.revoked_at = Some(at);
                count += 1;
            }
        }
        Ok(count)
    }

    async fn delete_expired_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let before = self.records.len();
        self.records.retain(|_, record| record.expires_at >= cutoff);
        Ok((before - self.records.len()) as u64)
    }
}
