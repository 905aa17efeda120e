use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

// Service configuration sourced from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub upload_dir: PathBuf,
    pub workers: usize,
    pub progress_ttl: Duration,
    pub webhook_timeout: Duration,
    pub batch_size: usize,
    pub progress_every: u64,
    /// `None` disables SSE keep-alive comments.
    pub stream_keepalive: Option<Duration>,
    pub max_upload_bytes: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8000)),
            upload_dir: PathBuf::from("./media"),
            workers: default_workers(),
            progress_ttl: Duration::from_secs(3600),
            webhook_timeout: Duration::from_secs(5),
            batch_size: 5000,
            progress_every: 1000,
            stream_keepalive: Some(Duration::from_secs(15)),
            max_upload_bytes: 512 * 1024 * 1024,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let keepalive_secs: u64 = env_or("CATALOG_STREAM_KEEPALIVE_SECS", 15)?;
        let max_upload_mb: usize = env_or("CATALOG_MAX_UPLOAD_MB", 512)?;
        Ok(Self {
            bind_addr: env_or("CATALOG_BIND", defaults.bind_addr)?,
            upload_dir: std::env::var("CATALOG_UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_dir),
            workers: env_or::<usize>("CATALOG_WORKERS", defaults.workers)?.max(1),
            progress_ttl: Duration::from_secs(env_or("CATALOG_PROGRESS_TTL_SECS", 3600)?),
            webhook_timeout: Duration::from_secs(env_or("CATALOG_WEBHOOK_TIMEOUT_SECS", 5)?),
            batch_size: env_or::<usize>("CATALOG_BATCH_SIZE", defaults.batch_size)?.max(1),
            progress_every: env_or::<u64>("CATALOG_PROGRESS_EVERY", defaults.progress_every)?
                .max(1),
            stream_keepalive: (keepalive_secs > 0).then(|| Duration::from_secs(keepalive_secs)),
            max_upload_bytes: max_upload_mb.saturating_mul(1024 * 1024),
        })
    }
}

fn env_or<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("parse {name}: {raw:?}")),
        Err(_) => Ok(default),
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
