use anyhow::{Result, anyhow};
use config::{Config, File};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub log: Log,
    pub rpc: Rpc,
    pub relationship: Relationship,
}

#[derive(Debug, Deserialize)]
pub struct Log {
    pub filter: String,
}

#[derive(Debug, Deserialize)]
pub struct Rpc {
    pub backend: String, // "fake" or "tcp"
    pub endpoint: String,
    pub default_deadline_ms: u64,
    pub close_timeout_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct Relationship {
    /// Pending requests never expire when unset.
    #[serde(default)]
    pub pending_ttl_secs: Option<u64>,
    pub notification_buffer: usize,
}

#[cfg(debug_assertions)]
const SETTINGS_PATH: &str = "settings/dev.toml";
#[cfg(not(debug_assertions))]
const SETTINGS_PATH: &str = "settings/release.toml";

pub fn parse_settings(path: Option<&str>) -> Result<Settings> {
    let path = path.unwrap_or(SETTINGS_PATH);

    let settings: Settings = Config::builder()
        .add_source(File::with_name(path))
        .build()
        .map_err(|e| anyhow!(e))?
        .try_deserialize()
        .map_err(|e| anyhow!(e))?;

    Ok(settings)
}
