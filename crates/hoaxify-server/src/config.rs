use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::TimeDelta;

use hoaxify_lifecycle::LifecycleConfig;

/// Server settings read from `HOAXIFY_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub upload_dir: PathBuf,
    pub lifecycle: LifecycleConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = LifecycleConfig::default();

        let ttl_hours: i64 = parse(&var, "HOAXIFY_SESSION_TTL_HOURS", defaults.session_ttl.num_hours())?;
        let grace_hours: i64 =
            parse(&var, "HOAXIFY_ATTACHMENT_GRACE_HOURS", defaults.attachment_grace.num_hours())?;
        let token_sweep: u64 =
            parse(&var, "HOAXIFY_TOKEN_SWEEP_SECS", defaults.token_sweep_interval.as_secs())?;
        let attachment_sweep: u64 = parse(
            &var,
            "HOAXIFY_ATTACHMENT_SWEEP_SECS",
            defaults.attachment_sweep_interval.as_secs(),
        )?;

        if ttl_hours <= 0 || grace_hours <= 0 {
            anyhow::bail!("session TTL and attachment grace must be positive");
        }
        if token_sweep == 0 || attachment_sweep == 0 {
            anyhow::bail!("sweep intervals must be non-zero");
        }

        Ok(Self {
            host: var("HOAXIFY_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse(&var, "HOAXIFY_PORT", 3000)?,
            db_path: var("HOAXIFY_DB_PATH").unwrap_or_else(|| "hoaxify.db".into()).into(),
            upload_dir: var("HOAXIFY_UPLOAD_DIR").unwrap_or_else(|| "./uploads".into()).into(),
            lifecycle: LifecycleConfig {
                session_ttl: TimeDelta::hours(ttl_hours),
                token_sweep_interval: Duration::from_secs(token_sweep),
                attachment_grace: TimeDelta::hours(grace_hours),
                attachment_sweep_interval: Duration::from_secs(attachment_sweep),
            },
        })
    }
}

fn parse<T>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value: {raw:?}")),
        None => Ok(default),
    }
}
