use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::Duration;

const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

/// Server settings, read from `GIFTLIST_*` environment variables.
#[derive(Debug)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub session_secret: String,
    pub session_length: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| get(key).filter(|v| !v.trim().is_empty());

        let host = var("GIFTLIST_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = var("GIFTLIST_PORT")
            .unwrap_or_else(|| "3000".into())
            .parse()
            .context("GIFTLIST_PORT must be a port number")?;
        let db_path: PathBuf = var("GIFTLIST_DB_PATH")
            .unwrap_or_else(|| "giftlist.db".into())
            .into();

        let hours: u32 = var("GIFTLIST_SESSION_HOURS")
            .unwrap_or_else(|| "24".into())
            .parse()
            .context("GIFTLIST_SESSION_HOURS must be a whole number of hours")?;
        if hours == 0 {
            bail!("GIFTLIST_SESSION_HOURS must be at least 1");
        }

        let session_secret = match var("GIFTLIST_SESSION_SECRET_FILE") {
            Some(path) => giftlist_crypto::secret::load_secret(Path::new(&path))?,
            None => var("GIFTLIST_SESSION_SECRET")
                .map(|s| s.trim().to_string())
                .context("GIFTLIST_SESSION_SECRET_FILE or GIFTLIST_SESSION_SECRET must be set")?,
        };
        if PLACEHOLDER_SECRETS.contains(&session_secret.as_str()) {
            bail!("session secret is still a placeholder");
        }

        Ok(Self {
            host,
            port,
            db_path,
            session_secret,
            session_length: Duration::hours(hours.into()),
        })
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid bind address {}:{}", self.host, self.port))
    }
}
