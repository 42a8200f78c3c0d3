//! Configuration for the Local Intercept module.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};

/// Environment variable prefix for overrides, e.g. `LOCAL_INTERCEPT_SCAN_INTERVAL=25ms`.
pub const ENV_PREFIX: &str = "LOCAL_INTERCEPT_";

/// Directory name, under the user's home, watched by default.
pub const DEFAULT_DIR_NAME: &str = "barrier";

/// Configuration for the Local Intercept module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct LocalInterceptConfig {
    /// Directory holding provider announcement files.
    /// Default: `~/barrier`
    pub announce_dir: PathBuf,

    /// Interval between announcement directory scans.
    /// Default: `10ms`
    #[serde(with = "humantime_serde")]
    pub scan_interval: Duration,

    /// Create `announce_dir` on start when it does not exist.
    pub create_dir: bool,

    /// Address local invokers bind to. Detected when unset.
    pub local_host: Option<String>,

    /// Delay between background retries of failback calls.
    /// Default: `5s`
    #[serde(with = "humantime_serde")]
    pub failback_retry_interval: Duration,

    /// Background retries per failback call before it is dropped.
    pub failback_max_retries: u32,
}

impl Default for LocalInterceptConfig {
    fn default() -> Self {
        Self {
            announce_dir: default_announce_dir(),
            scan_interval: Duration::from_millis(10),
            create_dir: true,
            local_host: None,
            failback_retry_interval: Duration::from_secs(5),
            failback_max_retries: 3,
        }
    }
}

fn default_announce_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DEFAULT_DIR_NAME)
}

impl LocalInterceptConfig {
    /// Load configuration from defaults, an optional YAML file and the environment.
    ///
    /// Later sources override earlier ones. The YAML file may hold the fields
    /// at the top level.
    ///
    /// # Errors
    /// Returns an error if a source cannot be parsed or the result is invalid.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        let cfg: Self = figment
            .merge(Env::prefixed(ENV_PREFIX))
            .extract()
            .context("invalid local-intercept configuration")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check invariants serde cannot express.
    ///
    /// # Errors
    /// Returns an error if an interval is zero.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.scan_interval.is_zero() {
            anyhow::bail!("scan_interval must be greater than zero");
        }
        if self.failback_retry_interval.is_zero() {
            anyhow::bail!("failback_retry_interval must be greater than zero");
        }
        Ok(())
    }
}
