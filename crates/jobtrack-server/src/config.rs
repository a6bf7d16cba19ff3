use std::path::PathBuf;

use anyhow::{Context, Result, bail};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

/// Sentinel accepted for `JOBTRACK_DB_PATH` to run against a throw-away database.
pub const IN_MEMORY: &str = ":memory:";

#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub db_path: String,
    pub host: String,
    pub port: u16,
    pub media_dir: PathBuf,
    pub public_url: String,
    pub max_upload_bytes: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let jwt_secret = get("JOBTRACK_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("JOBTRACK_JWT_SECRET is unset or still a placeholder");
        }

        let port: u16 = var("JOBTRACK_PORT", "3000")
            .parse()
            .context("JOBTRACK_PORT must be a port number")?;
        let max_upload_mb: usize = var("JOBTRACK_MAX_UPLOAD_MB", "10")
            .parse()
            .context("JOBTRACK_MAX_UPLOAD_MB must be a whole number")?;

        Ok(Self {
            jwt_secret,
            db_path: var("JOBTRACK_DB_PATH", "jobtrack.db"),
            host: var("JOBTRACK_HOST", "0.0.0.0"),
            port,
            media_dir: var("JOBTRACK_MEDIA_DIR", "./media").into(),
            public_url: var("JOBTRACK_PUBLIC_URL", "http://localhost:3000"),
            max_upload_bytes: max_upload_mb * 1024 * 1024,
        })
    }

    pub fn open_database(&self) -> Result<jobtrack_db::Database> {
        if self.db_path == IN_MEMORY {
            jobtrack_db::Database::open_in_memory()
        } else {
            jobtrack_db::Database::open(&PathBuf::from(&self.db_path))
        }
    }
}
