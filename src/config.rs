//! Configuration
//!
//! One TOML document with a section per component. Every field has a default,
//! so an empty (or absent) file yields a runnable setup; CLI flags override
//! individual values after loading.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub coordinator: CoordinatorConfig,
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub pool: PoolConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Corpus size. When absent the coordinator asks the datastore.
    #[serde(default)]
    pub total_data_size: Option<usize>,
    #[serde(default = "default_search_timeout_ms")]
    pub search_timeout_ms: u64,
    #[serde(default = "default_notify_timeout_ms")]
    pub notify_timeout_ms: u64,
    #[serde(default = "default_health_check_interval_ms")]
    pub health_check_interval_ms: u64,
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    #[serde(default = "default_history_size")]
    pub history_size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum LauncherKind {
    Process,
    InProcess,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleConfig {
    #[serde(default = "default_max_units")]
    pub max_units: usize,
    #[serde(default = "default_base_port")]
    pub base_port: u16,
    #[serde(default = "default_unit_host")]
    pub unit_host: String,
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    #[serde(default = "default_grace_period_ms")]
    pub grace_period_ms: u64,
    #[serde(default = "default_launcher")]
    pub launcher: LauncherKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_search_results_secs")]
    pub search_results_secs: u64,
    #[serde(default = "default_node_status_secs")]
    pub node_status_secs: u64,
    #[serde(default = "default_system_stats_secs")]
    pub system_stats_secs: u64,
    #[serde(default = "default_hot_queries_secs")]
    pub hot_queries_secs: u64,
    #[serde(default = "default_max_key_len")]
    pub max_key_len: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    #[serde(default = "default_init_timeout_ms")]
    pub init_timeout_ms: u64,
    #[serde(default = "default_pool_search_timeout_ms")]
    pub search_timeout_ms: u64,
    #[serde(default = "default_true")]
    pub use_fallback: bool,
}

fn default_bind() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_search_timeout_ms() -> u64 {
    8_000
}

fn default_notify_timeout_ms() -> u64 {
    5_000
}

fn default_health_check_interval_ms() -> u64 {
    10_000
}

fn default_limit() -> usize {
    25
}

fn default_history_size() -> usize {
    50
}

fn default_max_units() -> usize {
    10
}

fn default_base_port() -> u16 {
    4001
}

fn default_unit_host() -> String {
    "127.0.0.1".to_string()
}

fn default_settle_delay_ms() -> u64 {
    1_000
}

fn default_grace_period_ms() -> u64 {
    5_000
}

fn default_launcher() -> LauncherKind {
    LauncherKind::Process
}

fn default_true() -> bool {
    true
}

fn default_search_results_secs() -> u64 {
    300
}

fn default_node_status_secs() -> u64 {
    30
}

fn default_system_stats_secs() -> u64 {
    60
}

fn default_hot_queries_secs() -> u64 {
    1_800
}

fn default_max_key_len() -> usize {
    200
}

fn default_worker_count() -> usize {
    4
}

fn default_init_timeout_ms() -> u64 {
    15_000
}

fn default_pool_search_timeout_ms() -> u64 {
    5_000
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            total_data_size: None,
            search_timeout_ms: default_search_timeout_ms(),
            notify_timeout_ms: default_notify_timeout_ms(),
            health_check_interval_ms: default_health_check_interval_ms(),
            default_limit: default_limit(),
            history_size: default_history_size(),
        }
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            max_units: default_max_units(),
            base_port: default_base_port(),
            unit_host: default_unit_host(),
            settle_delay_ms: default_settle_delay_ms(),
            grace_period_ms: default_grace_period_ms(),
            launcher: default_launcher(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            search_results_secs: default_search_results_secs(),
            node_status_secs: default_node_status_secs(),
            system_stats_secs: default_system_stats_secs(),
            hot_queries_secs: default_hot_queries_secs(),
            max_key_len: default_max_key_len(),
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            init_timeout_ms: default_init_timeout_ms(),
            search_timeout_ms: default_pool_search_timeout_ms(),
            use_fallback: true,
        }
    }
}

impl CoordinatorConfig {
    pub fn search_timeout(&self) -> Duration {
        Duration::from_millis(self.search_timeout_ms)
    }

    pub fn notify_timeout(&self) -> Duration {
        Duration::from_millis(self.notify_timeout_ms)
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_millis(self.health_check_interval_ms)
    }
}

impl LifecycleConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }
}

impl PoolConfig {
    pub fn init_timeout(&self) -> Duration {
        Duration::from_millis(self.init_timeout_ms)
    }

    pub fn search_timeout(&self) -> Duration {
        Duration::from_millis(self.search_timeout_ms)
    }
}

impl Config {
    /// Loads configuration from a TOML file, or defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}
