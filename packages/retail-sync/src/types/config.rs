use anyhow::{bail, Context, Result};
use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone};
use dotenvy::dotenv;
use proxy_client::{ProxyConfig, SessionToken};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::pipeline::pagination::RetryPolicy;

/// What to do when a batch references rows that were never loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReferencePolicy {
    /// Fail the load; the run rolls back
    #[default]
    Enforce,
    /// Log and keep loading
    Warn,
}

impl FromStr for ReferencePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "enforce" => Ok(Self::Enforce),
            "warn" => Ok(Self::Warn),
            other => bail!("unknown reference policy: {} (expected enforce or warn)", other),
        }
    }
}

/// Pagination and windowing settings.
#[derive(Debug, Clone)]
pub struct ExtractionConfig {
    pub page_size: u64,
    /// Pause between pages of one cursor
    pub page_delay: Duration,
    /// Pause between month windows
    pub window_delay: Duration,
    /// First day covered by time-partitioned search
    pub search_start: NaiveDate,
    /// Tenant's fixed UTC offset; month windows align to it
    pub utc_offset: FixedOffset,
    pub retry: RetryPolicy,
}

impl ExtractionConfig {
    /// Midnight of `search_start` in the tenant's offset.
    pub fn search_start_at(&self) -> Option<DateTime<FixedOffset>> {
        let midnight = self.search_start.and_hms_opt(0, 0, 0)?;
        self.utc_offset.from_local_datetime(&midnight).single()
    }

    /// Same settings with every pause removed.
    pub fn without_delays(mut self) -> Self {
        self.page_delay = Duration::ZERO;
        self.window_delay = Duration::ZERO;
        self.retry.base_delay = Duration::ZERO;
        self
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            page_size: 1000,
            page_delay: Duration::from_millis(200),
            window_delay: Duration::from_millis(100),
            search_start: DEFAULT_SEARCH_START,
            utc_offset: DEFAULT_UTC_OFFSET,
            retry: RetryPolicy::default(),
        }
    }
}

const DEFAULT_SEARCH_START: NaiveDate = match NaiveDate::from_ymd_opt(2017, 1, 1) {
    Some(date) => date,
    None => panic!("invalid default search start"),
};

const DEFAULT_UTC_OFFSET: FixedOffset = match FixedOffset::east_opt(7200) {
    Some(offset) => offset,
    None => panic!("invalid default UTC offset"),
};

/// Target store settings.
#[derive(Debug, Clone)]
pub struct LoadConfig {
    /// Rows per multi-row INSERT
    pub chunk_size: usize,
    /// Target schema; `None` uses the connection's search path
    pub schema: Option<String>,
    pub reference_policy: ReferencePolicy,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            schema: None,
            reference_policy: ReferencePolicy::Enforce,
        }
    }
}

/// The single configuration value handed to the orchestrator.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub tenant_id: String,
    pub proxy_url: Option<String>,
    pub session_token: Option<SessionToken>,
    /// `timezone` query parameter: UTC offset in seconds
    pub timezone: String,
    pub request_timeout: Duration,
    pub extraction: ExtractionConfig,
    pub load: LoadConfig,
    pub database_url: Option<String>,
    pub output_dir: PathBuf,
}

impl SyncConfig {
    /// Defaults for one tenant, without gateway or database settings.
    pub fn for_tenant(tenant_id: impl Into<String>) -> Self {
        let extraction = ExtractionConfig::default();
        Self {
            tenant_id: tenant_id.into(),
            proxy_url: None,
            session_token: None,
            timezone: extraction.utc_offset.local_minus_utc().to_string(),
            request_timeout: Duration::from_secs(60),
            extraction,
            load: LoadConfig::default(),
            database_url: None,
            output_dir: PathBuf::from("./extracted_data"),
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let timezone_secs: i32 = env::var("RETAIL_TIMEZONE")
            .unwrap_or_else(|_| "7200".to_string())
            .parse()
            .context("RETAIL_TIMEZONE must be a UTC offset in seconds")?;
        let utc_offset = FixedOffset::east_opt(timezone_secs)
            .context("RETAIL_TIMEZONE is out of range")?;

        let extraction = ExtractionConfig {
            page_size: env::var("PAGE_SIZE")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()
                .context("PAGE_SIZE must be a valid number")?,
            page_delay: Duration::from_millis(
                env::var("PAGE_DELAY_MS")
                    .unwrap_or_else(|_| "200".to_string())
                    .parse()
                    .context("PAGE_DELAY_MS must be a valid number")?,
            ),
            window_delay: Duration::from_millis(
                env::var("WINDOW_DELAY_MS")
                    .unwrap_or_else(|_| "100".to_string())
                    .parse()
                    .context("WINDOW_DELAY_MS must be a valid number")?,
            ),
            search_start: env::var("SEARCH_START")
                .unwrap_or_else(|_| "2017-01-01".to_string())
                .parse()
                .context("SEARCH_START must be a YYYY-MM-DD date")?,
            utc_offset,
            retry: RetryPolicy {
                max_retries: env::var("MAX_RETRIES")
                    .unwrap_or_else(|_| "0".to_string())
                    .parse()
                    .context("MAX_RETRIES must be a valid number")?,
                base_delay: Duration::from_millis(
                    env::var("RETRY_BACKOFF_MS")
                        .unwrap_or_else(|_| "500".to_string())
                        .parse()
                        .context("RETRY_BACKOFF_MS must be a valid number")?,
                ),
            },
        };
        if extraction.page_size == 0 {
            bail!("PAGE_SIZE must be greater than zero");
        }

        let load = LoadConfig {
            chunk_size: env::var("LOAD_CHUNK_SIZE")
                .unwrap_or_else(|_| "500".to_string())
                .parse()
                .context("LOAD_CHUNK_SIZE must be a valid number")?,
            schema: env::var("DATABASE_SCHEMA")
                .ok()
                .filter(|s| !s.is_empty() && s != "public"),
            reference_policy: env::var("REFERENCE_POLICY")
                .unwrap_or_else(|_| "enforce".to_string())
                .parse()?,
        };
        if load.chunk_size == 0 {
            bail!("LOAD_CHUNK_SIZE must be greater than zero");
        }

        Ok(Self {
            tenant_id: env::var("RETAIL_TENANT_ID").context("RETAIL_TENANT_ID must be set")?,
            proxy_url: env::var("RETAIL_PROXY_URL").ok(),
            session_token: env::var("RETAIL_SESSION_TOKEN").ok().map(SessionToken::from),
            timezone: timezone_secs.to_string(),
            request_timeout: Duration::from_secs(
                env::var("REQUEST_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "60".to_string())
                    .parse()
                    .context("REQUEST_TIMEOUT_SECS must be a valid number")?,
            ),
            extraction,
            load,
            database_url: env::var("DATABASE_URL").ok(),
            output_dir: env::var("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./extracted_data")),
        })
    }

    /// Gateway settings. Only extraction needs them.
    pub fn proxy(&self) -> Result<ProxyConfig> {
        Ok(ProxyConfig {
            base_url: self
                .proxy_url
                .clone()
                .context("RETAIL_PROXY_URL must be set")?,
            timezone: self.timezone.clone(),
            session: self
                .session_token
                .clone()
                .context("RETAIL_SESSION_TOKEN must be set")?,
            timeout: self.request_timeout,
        })
    }
}
