//! Configuration types for media-dl

use crate::environment::EnvironmentKind;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::Path, path::PathBuf, time::Duration};
use utoipa::ToSchema;

/// Environment variable naming a JSON config file
pub const CONFIG_PATH_ENV: &str = "MEDIA_DL_CONFIG";

/// Environment variable overriding `download.output_dir`
pub const OUTPUT_DIR_ENV: &str = "MEDIA_DL_OUTPUT_DIR";

/// Environment variable overriding the API port
pub const PORT_ENV: &str = "PORT";

/// Download job settings (output directory, concurrency, resolution)
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct DownloadConfig {
    /// Shared output directory for produced files (default: "./public/downloads")
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Give each job its own scratch directory and promote the result (default: true)
    ///
    /// When disabled, the external tool writes straight into `output_dir` and the
    /// recency tiers of the resolver may pick up files from concurrent jobs.
    #[serde(default = "default_true")]
    pub isolate_jobs: bool,

    /// Maximum number of external processes running at once (default: 3)
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,

    /// Maximum number of jobs waiting for a free slot (default: 32)
    #[serde(default = "default_max_queued_jobs")]
    pub max_queued_jobs: usize,

    /// Output resolution settings
    #[serde(default)]
    pub resolver: ResolverConfig,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            isolate_jobs: true,
            max_concurrent_jobs: default_max_concurrent_jobs(),
            max_queued_jobs: default_max_queued_jobs(),
            resolver: ResolverConfig::default(),
        }
    }
}

/// Output resolver configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ResolverConfig {
    /// Trailing window for the recency tier, in seconds (default: 60)
    #[serde(default = "default_recency_window", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub recency_window: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            recency_window: default_recency_window(),
        }
    }
}

/// External tool paths
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ToolsConfig {
    /// Path to the yt-dlp executable (auto-detected if None)
    #[serde(default)]
    pub ytdlp_path: Option<PathBuf>,

    /// Python interpreter used for `python -m yt_dlp` invocations (auto-detected if None)
    #[serde(default)]
    pub python_path: Option<PathBuf>,

    /// Whether to search PATH for external binaries if explicit paths not set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,

    /// Extra arguments appended to every invocation
    #[serde(default)]
    pub extra_args: Vec<String>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ytdlp_path: None,
            python_path: None,
            search_path: true,
            extra_args: Vec::new(),
        }
    }
}

/// Artifact expiry configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct LifecycleConfig {
    /// Files older than this are deleted by the sweep, in seconds (default: 24h)
    #[serde(default = "default_max_age", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub max_age: Duration,

    /// Time between sweeps, in seconds (default: 6h)
    #[serde(default = "default_sweep_interval", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub sweep_interval: Duration,

    /// Run one sweep immediately when the sweeper starts (default: true)
    #[serde(default = "default_true")]
    pub sweep_on_startup: bool,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            max_age: default_max_age(),
            sweep_interval: default_sweep_interval(),
            sweep_on_startup: true,
        }
    }
}

/// Main configuration for MediaDownloader
///
/// Every field has a default, so `Config::default()` runs out of the box against a
/// `yt-dlp` binary on PATH.
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct Config {
    /// Download job settings
    #[serde(default)]
    pub download: DownloadConfig,

    /// External tool paths
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Force an invocation strategy instead of detecting the host environment
    #[serde(default)]
    pub environment: Option<EnvironmentKind>,

    /// Artifact expiry
    #[serde(default)]
    pub lifecycle: LifecycleConfig,

    /// API settings
    #[serde(default)]
    pub server: ServerIntegrationConfig,
}

impl Config {
    /// Shared output directory
    pub fn output_dir(&self) -> &PathBuf {
        &self.download.output_dir
    }

    /// Read a JSON configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("failed to read {}: {}", path.display(), e),
            key: None,
        })?;
        let config: Config = serde_json::from_str(&raw).map_err(|e| Error::Config {
            message: format!("failed to parse {}: {}", path.display(), e),
            key: None,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Build a configuration from process environment variables
    ///
    /// Starts from the file named by `MEDIA_DL_CONFIG` (or defaults), then applies
    /// `MEDIA_DL_OUTPUT_DIR` and `PORT`.
    pub fn from_env() -> Result<Self> {
        let mut config = match std::env::var_os(CONFIG_PATH_ENV) {
            Some(path) => Self::load(Path::new(&path))?,
            None => Self::default(),
        };
        config.apply_overrides(
            std::env::var(OUTPUT_DIR_ENV).ok().as_deref(),
            std::env::var(PORT_ENV).ok().as_deref(),
        )?;
        config.validate()?;
        Ok(config)
    }

    fn apply_overrides(&mut self, output_dir: Option<&str>, port: Option<&str>) -> Result<()> {
        if let Some(dir) = output_dir.filter(|d| !d.is_empty()) {
            self.download.output_dir = PathBuf::from(dir);
        }
        if let Some(port) = port {
            let port: u16 = port.parse().map_err(|_| Error::Config {
                message: format!("invalid port {port:?}"),
                key: Some(PORT_ENV.to_string()),
            })?;
            self.server.api.bind_address.set_port(port);
        }
        Ok(())
    }

    /// Reject settings the downloader cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.download.max_concurrent_jobs == 0 {
            return Err(Error::Config {
                message: "must be at least 1".to_string(),
                key: Some("download.max_concurrent_jobs".to_string()),
            });
        }
        if self.lifecycle.sweep_interval.is_zero() {
            return Err(Error::Config {
                message: "must be greater than zero".to_string(),
                key: Some("lifecycle.sweep_interval".to_string()),
            });
        }
        let prefix = self.server.api.public_prefix.trim_matches('/');
        if prefix.is_empty() {
            return Err(Error::Config {
                message: "must name a path segment".to_string(),
                key: Some("server.api.public_prefix".to_string()),
            });
        }
        Ok(())
    }
}

/// API and external server integration configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct ServerIntegrationConfig {
    /// REST API configuration
    #[serde(default)]
    pub api: ApiConfig,
}

/// REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiConfig {
    /// Address to bind to (default: 127.0.0.1:4001)
    #[serde(default = "default_bind_address")]
    #[schema(value_type = String)]
    pub bind_address: SocketAddr,

    /// URL prefix under which produced files are served (default: "/downloads")
    #[serde(default = "default_public_prefix")]
    pub public_prefix: String,

    /// Serve the output directory under `public_prefix` (default: true)
    #[serde(default = "default_true")]
    pub serve_files: bool,

    /// Enable CORS for browser access (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Enable Swagger UI at /swagger-ui (default: true)
    #[serde(default = "default_true")]
    pub swagger_ui: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            public_prefix: default_public_prefix(),
            serve_files: true,
            cors_enabled: true,
            cors_origins: default_cors_origins(),
            swagger_ui: true,
        }
    }
}

impl ApiConfig {
    /// Public prefix normalized to a single leading slash and no trailing slash
    pub fn normalized_prefix(&self) -> String {
        format!("/{}", self.public_prefix.trim_matches('/'))
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./public/downloads")
}

fn default_max_concurrent_jobs() -> usize {
    3
}

fn default_max_queued_jobs() -> usize {
    32
}

fn default_recency_window() -> Duration {
    Duration::from_secs(60)
}

fn default_max_age() -> Duration {
    Duration::from_secs(24 * 60 * 60)
}

fn default_sweep_interval() -> Duration {
    Duration::from_secs(6 * 60 * 60)
}

fn default_true() -> bool {
    true
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 4001))
}

fn default_public_prefix() -> String {
    "/downloads".to_string()
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
