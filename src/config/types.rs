use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Skill-Harvester
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    #[serde(rename = "rate-limit", default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub scraper: ScraperConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(rename = "profession", default)]
    pub professions: Vec<ProfessionEntry>,
}

/// Upstream vacancy API and token endpoint configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the vacancy API; vacancies live under `{base-url}/vacancies`
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Client-credentials token endpoint
    #[serde(rename = "token-url")]
    pub token_url: String,

    #[serde(rename = "client-id")]
    pub client_id: String,

    #[serde(rename = "client-secret", default)]
    pub client_secret: String,

    /// User agent sent with every upstream request
    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// Optional pre-issued access token, used until the API rejects it
    #[serde(rename = "access-token", default)]
    pub access_token: Option<String>,

    /// Upstream region code restricting the search
    #[serde(default = "default_area")]
    pub area: String,

    /// Results requested per listing page
    #[serde(rename = "page-size", default = "default_page_size")]
    pub page_size: u32,
}

/// Token-bucket rate limiter configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Bucket capacity (maximum burst)
    #[serde(default = "default_rate")]
    pub capacity: u32,

    /// Units added to the bucket per second
    #[serde(rename = "refill-per-second", default = "default_rate")]
    pub refill_per_second: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            capacity: default_rate(),
            refill_per_second: default_rate(),
        }
    }
}

/// Retry and backoff configuration for upstream requests
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(rename = "max-attempts", default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(rename = "initial-delay-ms", default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(rename = "max-delay-ms", default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Budget for all attempts of a single request, measured from the first attempt
    #[serde(rename = "max-total-time-ms", default = "default_max_total_time_ms")]
    pub max_total_time_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            multiplier: default_multiplier(),
            max_total_time_ms: default_max_total_time_ms(),
        }
    }
}

/// Scrape run behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ScraperConfig {
    /// Hard ceiling on a single profession's harvest
    #[serde(rename = "profession-timeout-secs", default = "default_profession_timeout")]
    pub profession_timeout_secs: u64,

    /// Hard ceiling on a whole run
    #[serde(rename = "run-timeout-secs", default = "default_run_timeout")]
    pub run_timeout_secs: u64,

    /// Minimum interval between two access token acquisitions
    #[serde(rename = "token-min-refresh-secs", default = "default_token_refresh")]
    pub token_min_refresh_secs: u64,

    /// Number of professions processed in parallel
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,
}

impl ScraperConfig {
    pub fn profession_timeout(&self) -> Duration {
        Duration::from_secs(self.profession_timeout_secs)
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }

    pub fn token_min_refresh(&self) -> Duration {
        Duration::from_secs(self.token_min_refresh_secs)
    }
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            profession_timeout_secs: default_profession_timeout(),
            run_timeout_secs: default_run_timeout(),
            token_min_refresh_secs: default_token_refresh(),
            concurrency: default_concurrency(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// Profession detail cache configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(rename = "expiry-secs", default = "default_cache_expiry")]
    pub expiry_secs: u64,

    #[serde(rename = "write-timeout-secs", default = "default_cache_write_timeout")]
    pub write_timeout_secs: u64,

    #[serde(rename = "queue-capacity", default = "default_cache_queue")]
    pub queue_capacity: usize,
}

impl CacheConfig {
    pub fn expiry(&self) -> Duration {
        Duration::from_secs(self.expiry_secs)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            expiry_secs: default_cache_expiry(),
            write_timeout_secs: default_cache_write_timeout(),
            queue_capacity: default_cache_queue(),
        }
    }
}

/// A profession seeded into storage at startup
#[derive(Debug, Clone, Deserialize)]
pub struct ProfessionEntry {
    /// Display name, unique across professions
    pub name: String,

    /// Upstream search query
    pub query: String,

    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_area() -> String {
    "113".to_string()
}

fn default_page_size() -> u32 {
    100
}

fn default_rate() -> u32 {
    5
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    250
}

fn default_max_delay_ms() -> u64 {
    15_000
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_max_total_time_ms() -> u64 {
    45_000
}

fn default_profession_timeout() -> u64 {
    8 * 60
}

fn default_run_timeout() -> u64 {
    120 * 60
}

fn default_token_refresh() -> u64 {
    5 * 60
}

fn default_concurrency() -> u32 {
    1
}

fn default_cache_expiry() -> u64 {
    24 * 60 * 60
}

fn default_cache_write_timeout() -> u64 {
    10
}

fn default_cache_queue() -> usize {
    64
}

fn default_active() -> bool {
    true
}
