use std::time::Duration;

use crate::error::ConfigError;

/// Solapi production endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.solapi.com";

/// Pipeline settings.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatcherConfig {
    /// Simulate every batch instead of calling the gateway.
    pub dry_run: bool,

    /// Pause between consecutive batches.
    pub batch_delay: Duration,

    /// Upper bound on recipients per gateway call.
    pub max_batch_size: usize,

    /// Optional token bucket `(batches per second, burst)` used instead of
    /// the fixed delay.
    pub rate_limit: Option<(u32, u32)>,
}

impl Default for DispatcherConfig {
    /// Defaults:
    /// - dry_run: true
    /// - batch_delay: 100 ms
    /// - max_batch_size: 1000
    fn default() -> Self {
        Self {
            dry_run: true,
            batch_delay: Duration::from_millis(100),
            max_batch_size: 1_000,
            rate_limit: None,
        }
    }
}

impl DispatcherConfig {
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_batch_delay(mut self, delay: Duration) -> Self {
        self.batch_delay = delay;
        self
    }

    pub fn with_max_batch_size(mut self, size: usize) -> Self {
        self.max_batch_size = size;
        self
    }

    /// Pace batches with a token bucket instead of a fixed delay.
    pub fn with_rate_limit(mut self, max_rps: u32, burst: u32) -> Self {
        self.rate_limit = Some((max_rps, burst));
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_batch_size == 0 {
            return Err(ConfigError::Invalid {
                key: "SMS_BATCH_SIZE",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Gateway endpoint and credentials.
#[derive(Clone, PartialEq)]
pub struct GatewayConfig {
    pub base_url: String,
    pub api_key: String,
    pub api_secret: String,
    /// Registered sender number.
    pub sender: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .field("sender", &self.sender)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl GatewayConfig {
    pub fn new(
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
        sender: impl Into<String>,
    ) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            sender: sender.into(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Live sending needs every credential.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::Missing("SOLAPI_BASE_URL"));
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ConfigError::Invalid {
                key: "SOLAPI_BASE_URL",
                reason: format!("not an http(s) URL: {}", self.base_url),
            });
        }
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::Missing("SOLAPI_API_KEY"));
        }
        if self.api_secret.trim().is_empty() {
            return Err(ConfigError::Missing("SOLAPI_API_SECRET"));
        }
        if self.sender.trim().is_empty() {
            return Err(ConfigError::Missing("SOLAPI_SENDER"));
        }
        Ok(())
    }
}

/// Everything the dispatcher needs, loaded from the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct SmsConfig {
    pub dispatcher: DispatcherConfig,
    pub gateway: GatewayConfig,
}

impl SmsConfig {
    /// Load from environment variables (and `.env` if present).
    ///
    /// Credentials are only required when `SMS_DRY_RUN=false`.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let defaults = DispatcherConfig::default();
        let rate_limit = match env_parse::<u32>("SMS_RATE_LIMIT_RPS")? {
            Some(rps) => Some((rps, env_parse::<u32>("SMS_RATE_LIMIT_BURST")?.unwrap_or(rps))),
            None => None,
        };

        let dispatcher = DispatcherConfig {
            dry_run: env_parse::<bool>("SMS_DRY_RUN")?.unwrap_or(defaults.dry_run),
            batch_delay: env_parse::<u64>("SMS_DELAY_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.batch_delay),
            max_batch_size: env_parse::<usize>("SMS_BATCH_SIZE")?
                .unwrap_or(defaults.max_batch_size),
            rate_limit,
        };
        dispatcher.validate()?;

        let gateway = GatewayConfig {
            base_url: env_var("SOLAPI_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_key: env_var("SOLAPI_API_KEY").unwrap_or_default(),
            api_secret: env_var("SOLAPI_API_SECRET").unwrap_or_default(),
            sender: env_var("SOLAPI_SENDER").unwrap_or_default(),
            timeout: Duration::from_secs(env_parse::<u64>("SOLAPI_TIMEOUT_SECS")?.unwrap_or(10)),
        };
        if !dispatcher.dry_run {
            gateway.validate()?;
        }

        Ok(Self { dispatcher, gateway })
    }
}

fn env_var(key: &'static str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T>(key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    env_var(key)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
                key,
                reason: e.to_string(),
            })
        })
        .transpose()
}
