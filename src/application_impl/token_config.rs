use std::fmt;
use std::time::Duration;

/// Everything the lifecycle manager needs, passed in explicitly at construction.
/// Validating the secrets is the deploying system's job.
#[derive(Clone)]
pub struct TokenConfig {
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub access_secret: Vec<u8>,
    pub refresh_secret: Vec<u8>,
    /// How long an expired refresh record is kept before the purge may delete it.
    pub purge_grace: Duration,
}

impl fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenConfig")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .field("access_secret", &"[REDACTED]")
            .field("refresh_secret", &"[REDACTED]")
            .field("purge_grace", &self.purge_grace)
            .finish()
    }
}
