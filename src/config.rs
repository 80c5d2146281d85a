//! WolfShare Configuration
//!
//! This module provides configuration structures for a WolfShare node
//! and the directory service it uses for discovery.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main WolfShare configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WolfShareConfig {
    /// Node-specific configuration
    pub node: NodeConfig,

    /// Directory service configuration
    #[serde(default)]
    pub directory: DirectoryConfig,

    /// Election configuration
    #[serde(default)]
    pub election: ElectionConfig,

    /// Tracker liveness monitoring
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Node-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Unique node identifier
    pub id: String,

    /// Address to bind for peer communication
    pub bind_address: String,

    /// Advertised address for other nodes to connect
    #[serde(default)]
    pub advertise_address: Option<String>,

    /// Directory holding the files this node shares
    #[serde(default)]
    pub shared_dir: Option<PathBuf>,

    /// Timeout for registrations, lookups and file transfers in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

/// Directory service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Directory server address (host:port)
    #[serde(default = "default_directory_address")]
    pub address: String,

    /// Timeout for a single directory call in milliseconds
    #[serde(default = "default_directory_timeout_ms")]
    pub call_timeout_ms: u64,
}

/// Election configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectionConfig {
    /// Per-peer vote request timeout in milliseconds
    #[serde(default = "default_vote_timeout_ms")]
    pub vote_timeout_ms: u64,

    /// Maximum number of peers contacted concurrently
    #[serde(default = "default_max_parallel_requests")]
    pub max_parallel_requests: usize,

    /// How long an "election started" notice from a peer suppresses
    /// our own elections, in milliseconds
    #[serde(default = "default_notice_ttl_ms")]
    pub notice_ttl_ms: u64,
}

/// Tracker liveness monitoring configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    /// Timeout for a single liveness probe in milliseconds
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    /// Minimum pause between successful probes
    #[serde(default = "default_interval_min_ms")]
    pub interval_min_ms: u64,

    /// Maximum pause between successful probes
    #[serde(default = "default_interval_max_ms")]
    pub interval_max_ms: u64,

    /// Minimum startup delay before the first probe
    #[serde(default = "default_startup_jitter_min_ms")]
    pub startup_jitter_min_ms: u64,

    /// Maximum startup delay before the first probe
    #[serde(default = "default_startup_jitter_max_ms")]
    pub startup_jitter_max_ms: u64,

    /// Wait before electing when no tracker is advertised
    #[serde(default = "default_absent_wait_ms")]
    pub absent_wait_ms: u64,

    /// Backoff after an unexpected monitor error
    #[serde(default = "default_error_backoff_ms")]
    pub error_backoff_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions
fn default_request_timeout_ms() -> u64 {
    5000
}

fn default_directory_address() -> String {
    "127.0.0.1:9090".to_string()
}

fn default_directory_timeout_ms() -> u64 {
    1000
}

fn default_vote_timeout_ms() -> u64 {
    600
}

fn default_max_parallel_requests() -> usize {
    32
}

fn default_notice_ttl_ms() -> u64 {
    3000
}

fn default_probe_timeout_ms() -> u64 {
    400
}

fn default_interval_min_ms() -> u64 {
    200
}

fn default_interval_max_ms() -> u64 {
    400
}

fn default_startup_jitter_min_ms() -> u64 {
    500
}

fn default_startup_jitter_max_ms() -> u64 {
    2000
}

fn default_absent_wait_ms() -> u64 {
    1500
}

fn default_error_backoff_ms() -> u64 {
    1000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            address: default_directory_address(),
            call_timeout_ms: default_directory_timeout_ms(),
        }
    }
}

impl Default for ElectionConfig {
    fn default() -> Self {
        Self {
            vote_timeout_ms: default_vote_timeout_ms(),
            max_parallel_requests: default_max_parallel_requests(),
            notice_ttl_ms: default_notice_ttl_ms(),
        }
    }
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            probe_timeout_ms: default_probe_timeout_ms(),
            interval_min_ms: default_interval_min_ms(),
            interval_max_ms: default_interval_max_ms(),
            startup_jitter_min_ms: default_startup_jitter_min_ms(),
            startup_jitter_max_ms: default_startup_jitter_max_ms(),
            absent_wait_ms: default_absent_wait_ms(),
            error_backoff_ms: default_error_backoff_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl ElectionConfig {
    /// Get the vote request timeout as Duration
    pub fn vote_timeout(&self) -> Duration {
        Duration::from_millis(self.vote_timeout_ms)
    }

    /// Get the election notice lifetime as Duration
    pub fn notice_ttl(&self) -> Duration {
        Duration::from_millis(self.notice_ttl_ms)
    }
}

impl HeartbeatConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn absent_wait(&self) -> Duration {
        Duration::from_millis(self.absent_wait_ms)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }
}

impl DirectoryConfig {
    /// Get the directory call timeout as Duration
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }
}

impl WolfShareConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load configuration from a TOML string
    pub fn from_str(content: &str) -> crate::Result<Self> {
        let config: WolfShareConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.node.id.is_empty() {
            return Err(crate::Error::Config("node.id cannot be empty".into()));
        }

        // Directory names are dot-separated
        if self.node.id.contains('.') {
            return Err(crate::Error::Config("node.id cannot contain '.'".into()));
        }

        if self.node.bind_address.is_empty() {
            return Err(crate::Error::Config("node.bind_address cannot be empty".into()));
        }

        if self.node.request_timeout_ms == 0 {
            return Err(crate::Error::Config("node.request_timeout_ms must be positive".into()));
        }

        if self.directory.address.is_empty() {
            return Err(crate::Error::Config("directory.address cannot be empty".into()));
        }

        if self.election.vote_timeout_ms == 0 || self.election.max_parallel_requests == 0 {
            return Err(crate::Error::Config(
                "election.vote_timeout_ms and election.max_parallel_requests must be positive".into(),
            ));
        }

        let hb = &self.heartbeat;
        if hb.probe_timeout_ms == 0 {
            return Err(crate::Error::Config("heartbeat.probe_timeout_ms must be positive".into()));
        }
        if hb.interval_min_ms > hb.interval_max_ms {
            return Err(crate::Error::Config(
                "heartbeat.interval_min_ms cannot exceed heartbeat.interval_max_ms".into(),
            ));
        }
        if hb.startup_jitter_min_ms > hb.startup_jitter_max_ms {
            return Err(crate::Error::Config(
                "heartbeat.startup_jitter_min_ms cannot exceed heartbeat.startup_jitter_max_ms".into(),
            ));
        }

        Ok(())
    }

    /// Get the advertised address (or bind address if not set)
    pub fn advertise_address(&self) -> &str {
        self.node
            .advertise_address
            .as_deref()
            .unwrap_or(&self.node.bind_address)
    }

    /// Get the request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.node.request_timeout_ms)
    }

    /// Get the shared files directory
    pub fn shared_dir(&self) -> PathBuf {
        self.node
            .shared_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("shared").join(&self.node.id))
    }
}
