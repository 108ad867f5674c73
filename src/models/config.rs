//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Catalog source endpoints and HTTP settings
    #[serde(default)]
    pub source: SourceConfig,

    /// Request pacing and retry policy
    #[serde(default)]
    pub pacing: PacingConfig,

    /// Backup storage and crawl cadence
    #[serde(default)]
    pub service: ServiceConfig,

    /// Read API settings
    #[serde(default)]
    pub server: ServerConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.source.user_agent.trim().is_empty() {
            return Err(AppError::validation("source.user_agent is empty"));
        }
        if self.source.timeout_secs == 0 {
            return Err(AppError::validation("source.timeout_secs must be > 0"));
        }
        url::Url::parse(&self.source.base_url)?;
        if self.source.namespaces.is_empty() {
            return Err(AppError::validation("No namespaces defined"));
        }
        if self
            .source
            .namespaces
            .iter()
            .any(|ns| ns.trim().is_empty() || ns.as_str() == "V")
        {
            return Err(AppError::validation(
                "source.namespaces contains an empty or reserved name",
            ));
        }
        for (name, range) in [
            ("pacing.namespace_delay", &self.pacing.namespace_delay),
            ("pacing.entry_delay", &self.pacing.entry_delay),
            ("pacing.remaining_delay", &self.pacing.remaining_delay),
        ] {
            if range.min_ms > range.max_ms {
                return Err(AppError::validation(format!("{name}: min_ms > max_ms")));
            }
        }
        if self.pacing.backoff_base_ms > self.pacing.backoff_max_ms {
            return Err(AppError::validation(
                "pacing.backoff_base_ms must not exceed pacing.backoff_max_ms",
            ));
        }
        Ok(())
    }
}

/// Catalog source settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Scheme and host of the catalog site
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// Path prefix of namespace index requests
    #[serde(default = "defaults::namespace_path")]
    pub namespace_path: String,

    /// Path prefix of entry detail requests
    #[serde(default = "defaults::entry_path")]
    pub entry_path: String,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// The fixed namespace list, crawled in this order
    #[serde(default = "defaults::namespaces")]
    pub namespaces: Vec<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            namespace_path: defaults::namespace_path(),
            entry_path: defaults::entry_path(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            namespaces: defaults::namespaces(),
        }
    }
}

/// Inclusive millisecond range a random delay is drawn from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DelayRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayRange {
    pub const fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    /// A range that always yields zero.
    pub const fn zero() -> Self {
        Self::new(0, 0)
    }
}

/// Request pacing and retry policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacingConfig {
    /// Wait before each namespace fetch except the first
    #[serde(default = "defaults::namespace_delay")]
    pub namespace_delay: DelayRange,

    /// Per-entry delay, multiplied by the entry position
    #[serde(default = "defaults::entry_delay")]
    pub entry_delay: DelayRange,

    /// Per-entry delay of the second pass, multiplied by position
    #[serde(default = "defaults::remaining_delay")]
    pub remaining_delay: DelayRange,

    /// First retry delay; doubles on every attempt
    #[serde(default = "defaults::backoff_base")]
    pub backoff_base_ms: u64,

    /// Maximum cumulative retry wait before giving up
    #[serde(default = "defaults::backoff_max")]
    pub backoff_max_ms: u64,

    /// Maximum retry attempts per request
    #[serde(default = "defaults::max_retries")]
    pub max_retries: u32,
}

impl PacingConfig {
    /// Pacing without waits; used for tests and one-off local runs.
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            namespace_delay: DelayRange::zero(),
            entry_delay: DelayRange::zero(),
            remaining_delay: DelayRange::zero(),
            backoff_base_ms: 0,
            backoff_max_ms: 0,
            max_retries,
        }
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            namespace_delay: defaults::namespace_delay(),
            entry_delay: defaults::entry_delay(),
            remaining_delay: defaults::remaining_delay(),
            backoff_base_ms: defaults::backoff_base(),
            backoff_max_ms: defaults::backoff_max(),
            max_retries: defaults::max_retries(),
        }
    }
}

/// Backup storage and crawl cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Root directory of backup records
    #[serde(default = "defaults::storage_dir")]
    pub storage_dir: PathBuf,

    /// Pause between the end of one crawl and the start of the next
    #[serde(default = "defaults::cooldown")]
    pub cooldown_secs: u64,
}

impl ServiceConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            storage_dir: defaults::storage_dir(),
            cooldown_secs: defaults::cooldown(),
        }
    }
}

/// Read API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the HTTP server binds to (host:port)
    #[serde(default = "defaults::bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: defaults::bind(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    use super::DelayRange;

    // Source defaults
    pub fn base_url() -> String {
        "http://www.dev-c.com".into()
    }
    pub fn namespace_path() -> String {
        "/nativedb/ns/".into()
    }
    pub fn entry_path() -> String {
        "/nativedb/func/info/".into()
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; catalog-archive/0.1)".into()
    }
    pub fn timeout() -> u64 {
        10
    }
    pub fn namespaces() -> Vec<String> {
        [
            "PLAYER",
            "ENTITY",
            "PED",
            "VEHICLE",
            "OBJECT",
            "AI",
            "GAMEPLAY",
            "AUDIO",
            "CUTSCENE",
            "INTERIOR",
            "CAM",
            "WEAPON",
            "ITEMSET",
            "STREAMING",
            "SCRIPT",
            "UI",
            "GRAPHICS",
            "STATS",
            "BRAIN",
            "MOBILE",
            "APP",
            "TIME",
            "PATHFIND",
            "CONTROLS",
            "DATAFILE",
            "FIRE",
            "DECISIONEVENT",
            "ZONE",
            "ROPE",
            "WATER",
            "WORLDPROBE",
            "NETWORK",
            "NETWORKCASH",
            "DLC1",
            "DLC2",
            "SYSTEM",
            "DECORATOR",
            "SOCIALCLUB",
            "UNK",
            "UNK1",
            "UNK2",
            "UNK3",
        ]
        .into_iter()
        .map(String::from)
        .collect()
    }

    // Pacing defaults
    pub fn namespace_delay() -> DelayRange {
        DelayRange::new(1_000, 30_000)
    }
    pub fn entry_delay() -> DelayRange {
        DelayRange::new(1_000, 30_000)
    }
    pub fn remaining_delay() -> DelayRange {
        DelayRange::new(5_000, 60_000)
    }
    pub fn backoff_base() -> u64 {
        1_000
    }
    pub fn backoff_max() -> u64 {
        20 * 60 * 1_000
    }
    pub fn max_retries() -> u32 {
        16
    }

    // Service defaults
    pub fn storage_dir() -> PathBuf {
        PathBuf::from("db")
    }
    pub fn cooldown() -> u64 {
        60
    }

    // Server defaults
    pub fn bind() -> String {
        "127.0.0.1:5000".into()
    }
}
