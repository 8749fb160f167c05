//! Configuration types for media-dl

use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::PathBuf, time::Duration};
use utoipa::ToSchema;

/// Output location and naming configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct DownloadConfig {
    /// Download directory (default: "./downloads")
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// What to do when two jobs would write the same output name
    #[serde(default)]
    pub file_collision: FileCollisionAction,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            file_collision: FileCollisionAction::default(),
        }
    }
}

/// Output name collision handling strategy
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FileCollisionAction {
    /// Suffix the output stem with the job id when it is taken (default)
    #[default]
    Rename,
    /// Reuse the stem and let the backend overwrite
    Overwrite,
    /// Fail the job when the stem is taken
    Skip,
}

/// Extraction backend (yt-dlp) configuration
///
/// The reliability options are passed on every invocation; the orchestrator itself
/// imposes no per-job timeout.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct BackendConfig {
    /// Path to the yt-dlp executable (auto-detected if None)
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub binary_path: Option<PathBuf>,

    /// Whether to search PATH for the backend binary if no explicit path is set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,

    /// Socket timeout passed to the backend (default: 30 seconds)
    #[serde(default = "default_socket_timeout", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub socket_timeout: Duration,

    /// Overall retry count (default: 10)
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Per-fragment retry count (default: 10)
    #[serde(default = "default_retries")]
    pub fragment_retries: u32,

    /// User-agent sent by the backend
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Referer sent by the backend (None = origin of the source URL)
    #[serde(default)]
    pub referer: Option<String>,

    /// Container used when merging video+audio (default: "mp4")
    #[serde(default = "default_merge_output_format")]
    pub merge_output_format: String,

    /// Audio format for audio-only extraction (default: "mp3")
    #[serde(default = "default_audio_format")]
    pub audio_format: String,

    /// Extra arguments appended verbatim to every invocation
    #[serde(default)]
    pub extra_args: Vec<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            binary_path: None,
            search_path: true,
            socket_timeout: default_socket_timeout(),
            retries: default_retries(),
            fragment_retries: default_retries(),
            user_agent: default_user_agent(),
            referer: None,
            merge_output_format: default_merge_output_format(),
            audio_format: default_audio_format(),
            extra_args: vec![],
        }
    }
}

/// How jobs left DOWNLOADING by a crash are handled on the next startup
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StaleJobPolicy {
    /// Mark them FAILED so the user can retry them (default)
    #[default]
    MarkFailed,
    /// Reset them to QUEUED and relaunch them
    Requeue,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct PersistenceConfig {
    /// Database path (default: "./media-dl.db")
    #[serde(default = "default_database_path")]
    #[schema(value_type = String)]
    pub database_path: PathBuf,

    /// Startup handling of interrupted jobs
    #[serde(default)]
    pub stale_job_policy: StaleJobPolicy,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            stale_job_policy: StaleJobPolicy::default(),
        }
    }
}

/// Notification configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct NotificationConfig {
    /// Webhook configurations
    #[serde(default)]
    pub webhooks: Vec<WebhookConfig>,

    /// Forward per-tick progress notifications to webhooks (default: false)
    #[serde(default)]
    pub notify_progress: bool,
}

/// Webhook configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct WebhookConfig {
    /// URL to POST to
    pub url: String,

    /// Events that trigger this webhook
    pub events: Vec<WebhookEvent>,

    /// Optional authentication header value
    #[serde(default)]
    pub auth_header: Option<String>,

    /// Timeout for webhook requests (default: 30 seconds)
    #[serde(default = "default_webhook_timeout", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub timeout: Duration,
}

/// Webhook trigger event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum WebhookEvent {
    /// Triggered when a job's execution task starts
    OnStarted,
    /// Triggered on progress ticks (only with `notify_progress`)
    OnProgress,
    /// Triggered when a job completes successfully
    OnComplete,
    /// Triggered when a job fails
    OnFailed,
    /// Triggered when a job is cancelled
    OnCancelled,
}

/// Metadata probe cache configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ProbeConfig {
    /// Maximum number of cached probe results (default: 64)
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// How long a probe result stays valid (default: 10 minutes)
    #[serde(default = "default_cache_ttl", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub cache_ttl: Duration,

    /// Interval between expiry sweeps (default: 60 seconds)
    #[serde(default = "default_sweep_interval", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub sweep_interval: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            cache_capacity: default_cache_capacity(),
            cache_ttl: default_cache_ttl(),
            sweep_interval: default_sweep_interval(),
        }
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
    /// Address to bind to (default: 127.0.0.1:6790)
    #[serde(default = "default_bind_address")]
    #[schema(value_type = String)]
    pub bind_address: SocketAddr,

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
            cors_enabled: true,
            cors_origins: default_cors_origins(),
            swagger_ui: true,
        }
    }
}

/// Main configuration for MediaDownloader
///
/// Every section has defaults, so `Config::default()` is a working local setup
/// (downloads into `./downloads`, database in `./media-dl.db`, yt-dlp from PATH).
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct Config {
    /// Output location and naming
    #[serde(default)]
    pub download: DownloadConfig,

    /// Extraction backend settings
    #[serde(default)]
    pub backend: BackendConfig,

    /// Data storage
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Notification settings
    #[serde(default)]
    pub notifications: NotificationConfig,

    /// Metadata probe cache
    #[serde(default)]
    pub probe: ProbeConfig,

    /// API and external server integration
    #[serde(default)]
    pub server: ServerIntegrationConfig,
}

impl Config {
    /// Download directory
    pub fn download_dir(&self) -> &PathBuf {
        &self.download.download_dir
    }
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./media-dl.db")
}

fn default_true() -> bool {
    true
}

fn default_socket_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_retries() -> u32 {
    10
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36".to_string()
}

fn default_merge_output_format() -> String {
    "mp4".to_string()
}

fn default_audio_format() -> String {
    "mp3".to_string()
}

fn default_webhook_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_cache_capacity() -> usize {
    64
}

fn default_cache_ttl() -> Duration {
    Duration::from_secs(600)
}

fn default_sweep_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 6790))
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
