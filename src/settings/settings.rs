use anyhow::{Result, anyhow, bail};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub cache: Cache,
    pub http: Http,
    pub log: Log,
    pub store: Store,
    pub token: Token,
}

#[derive(Debug, Deserialize)]
pub struct Cache {
    pub backend: String, // "memory" or "redis"
    pub redis_dsn: Option<String>,
    pub prefix: String,
}

#[derive(Debug, Deserialize)]
pub struct Http {
    pub address: String,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Log {
    pub filter: String,
}

#[derive(Debug, Deserialize)]
pub struct Store {
    pub backend: String, // "memory" or "mysql"
    pub mysql_dsn: Option<String>,
    /// Accounts created at startup; only the memory backend honors them.
    #[serde(default)]
    pub seed_users: Vec<SeedUser>,
}

#[derive(Deserialize)]
pub struct SeedUser {
    pub user_id: i64,
    pub email: String,
    pub password: String,
    pub role: String,
}

impl fmt::Debug for SeedUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeedUser")
            .field("user_id", &self.user_id)
            .field("email", &self.email)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
pub struct Token {
    pub access_ttl_secs: u64,
    pub refresh_ttl_secs: u64,
    pub access_secret: String,
    pub refresh_secret: String,
    #[serde(default = "default_purge_grace_secs")]
    pub purge_grace_secs: u64,
    #[serde(default = "default_purge_interval_secs")]
    pub purge_interval_secs: u64,
}

fn default_purge_grace_secs() -> u64 {
    24 * 60 * 60
}

fn default_purge_interval_secs() -> u64 {
    60 * 60
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("access_ttl_secs", &self.access_ttl_secs)
            .field("refresh_ttl_secs", &self.refresh_ttl_secs)
            .field("access_secret", &"[REDACTED]")
            .field("refresh_secret", &"[REDACTED]")
            .field("purge_grace_secs", &self.purge_grace_secs)
            .field("purge_interval_secs", &self.purge_interval_secs)
            .finish()
    }
}

/// Placeholder secrets that must never reach a running deployment.
const KNOWN_PLACEHOLDER_SECRETS: &[&str] = &[
    "changeme",
    "secret",
    "default_access_secret",
    "default_refresh_secret",
    "my-dev-secret-key",
];

const MIN_SECRET_LEN: usize = 32;

impl Token {
    pub fn access_ttl(&self) -> Duration {
        Duration::from_secs(self.access_ttl_secs)
    }

    pub fn refresh_ttl(&self) -> Duration {
        Duration::from_secs(self.refresh_ttl_secs)
    }

    pub fn purge_grace(&self) -> Duration {
        Duration::from_secs(self.purge_grace_secs)
    }

    pub fn purge_interval(&self) -> Duration {
        Duration::from_secs(self.purge_interval_secs)
    }

    /// Misconfigured secrets or lifetimes are fatal at startup.
    pub fn validate(&self) -> Result<()> {
        for (name, secret) in [
            ("token.access_secret", &self.access_secret),
            ("token.refresh_secret", &self.refresh_secret),
        ] {
            if secret.trim().is_empty() {
                bail!("{name} is empty");
            }
            if KNOWN_PLACEHOLDER_SECRETS.contains(&secret.as_str()) {
                bail!("{name} is a placeholder value");
            }
            if secret.len() < MIN_SECRET_LEN {
                bail!("{name} must be at least {MIN_SECRET_LEN} bytes");
            }
        }
        if self.access_secret == self.refresh_secret {
            bail!("token.access_secret and token.refresh_secret must differ");
        }
        if self.access_ttl_secs == 0 || self.refresh_ttl_secs == 0 {
            bail!("token lifetimes must be positive");
        }
        if self.access_ttl_secs >= self.refresh_ttl_secs {
            bail!("token.access_ttl_secs must be shorter than token.refresh_ttl_secs");
        }
        if self.purge_interval_secs == 0 {
            bail!("token.purge_interval_secs must be positive");
        }
        Ok(())
    }
}

#[cfg(debug_assertions)]
const SETTINGS_PATH: &str = "settings/dev.toml";
#[cfg(not(debug_assertions))]
const SETTINGS_PATH: &str = "settings/release.toml";

/// Loads the settings file, then lets `LATCHKEY__SECTION__KEY` environment
/// variables override it (secrets normally arrive this way).
pub fn parse_settings(path: Option<&str>) -> Result<Settings> {
    let path = path.unwrap_or(SETTINGS_PATH);

    let settings: Settings = Config::builder()
        .add_source(File::with_name(path))
        .add_source(
            Environment::with_prefix("LATCHKEY")
                .prefix_separator("__")
                .separator("__"),
        )
        .build()
        .map_err(|e| anyhow!(e))?
        .try_deserialize()
        .map_err(|e| anyhow!(e))?;

    settings.token.validate()?;

    Ok(settings)
}
