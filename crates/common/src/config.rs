use std::collections::BTreeMap;
use std::str::FromStr;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

/// What the rate limiter answers when its store cannot be reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    #[default]
    Open,
    Closed,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(FailurePolicy::Open),
            "closed" => Ok(FailurePolicy::Closed),
            other => Err(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitRule {
    pub max_requests: u64,
    pub window_ms: i64,
}

impl LimitRule {
    pub const fn new(max_requests: u64, window_ms: i64) -> Self {
        Self {
            max_requests,
            window_ms,
        }
    }
}

pub const DEFAULT_WINDOW_MS: i64 = 60_000;
pub const FALLBACK_LIMIT_TYPE: &str = "api";

/// Per limit-type rules. Unknown limit types use the `api` rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimits {
    rules: BTreeMap<String, LimitRule>,
}

impl Default for RateLimits {
    fn default() -> Self {
        let mut rules = BTreeMap::new();
        rules.insert("login".to_string(), LimitRule::new(5, DEFAULT_WINDOW_MS));
        rules.insert("api".to_string(), LimitRule::new(100, DEFAULT_WINDOW_MS));
        rules.insert("notify".to_string(), LimitRule::new(20, DEFAULT_WINDOW_MS));
        rules.insert("wechatbot".to_string(), LimitRule::new(20, DEFAULT_WINDOW_MS));
        rules.insert("email".to_string(), LimitRule::new(20, DEFAULT_WINDOW_MS));
        Self { rules }
    }
}

impl RateLimits {
    pub fn empty() -> Self {
        Self {
            rules: BTreeMap::new(),
        }
    }

    pub fn with_rule(mut self, limit_type: &str, rule: LimitRule) -> Self {
        self.rules.insert(limit_type.to_string(), rule);
        self
    }

    pub fn rule(&self, limit_type: &str) -> LimitRule {
        self.rules
            .get(limit_type)
            .or_else(|| self.rules.get(FALLBACK_LIMIT_TYPE))
            .copied()
            .unwrap_or(LimitRule::new(100, DEFAULT_WINDOW_MS))
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub redis_url: String,
    pub subwatch_env: String,
    pub api_bind: String,
    pub admin_token: Option<String>,
    pub rate_limits: RateLimits,
    pub rate_limit_policy: FailurePolicy,
    pub failure_log_max: usize,
    pub failure_log_default_limit: usize,
    pub config_ttl_ms: i64,
    pub http_timeout_secs: u64,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds settings from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let redis_url = lookup("SUBWATCH_REDIS_URL")
            .or_else(|| lookup("REDIS_URL"))
            .ok_or(ConfigError::Missing("SUBWATCH_REDIS_URL"))?;
        let subwatch_env = lookup("SUBWATCH_ENV").unwrap_or_else(|| "dev".to_string());
        let api_bind = lookup("SUBWATCH_API_BIND").unwrap_or_else(|| "0.0.0.0:3000".to_string());
        let admin_token = lookup("SUBWATCH_ADMIN_TOKEN").filter(|t| !t.trim().is_empty());

        let window_ms = parsed(&lookup, "SUBWATCH_RATE_LIMIT_WINDOW_MS", DEFAULT_WINDOW_MS)?;
        if window_ms <= 0 {
            return Err(ConfigError::Invalid {
                name: "SUBWATCH_RATE_LIMIT_WINDOW_MS",
                value: window_ms.to_string(),
            });
        }
        let mut rate_limits = RateLimits::empty();
        for (limit_type, var, default) in [
            ("login", "SUBWATCH_RATE_LIMIT_LOGIN", 5),
            ("api", "SUBWATCH_RATE_LIMIT_API", 100),
            ("notify", "SUBWATCH_RATE_LIMIT_NOTIFY", 20),
            ("wechatbot", "SUBWATCH_RATE_LIMIT_WECHATBOT", 20),
            ("email", "SUBWATCH_RATE_LIMIT_EMAIL", 20),
        ] {
            let max_requests = parsed(&lookup, var, default)?;
            rate_limits = rate_limits.with_rule(limit_type, LimitRule::new(max_requests, window_ms));
        }

        let rate_limit_policy = match lookup("SUBWATCH_RATE_LIMIT_POLICY") {
            Some(raw) => raw.parse().map_err(|value| ConfigError::Invalid {
                name: "SUBWATCH_RATE_LIMIT_POLICY",
                value,
            })?,
            None => FailurePolicy::Open,
        };

        Ok(Self {
            redis_url,
            subwatch_env,
            api_bind,
            admin_token,
            rate_limits,
            rate_limit_policy,
            failure_log_max: parsed(&lookup, "SUBWATCH_FAILURE_LOG_MAX", 100)?,
            failure_log_default_limit: parsed(&lookup, "SUBWATCH_FAILURE_LOG_DEFAULT_LIMIT", 50)?,
            config_ttl_ms: parsed(&lookup, "SUBWATCH_CONFIG_TTL_MS", 60_000)?,
            http_timeout_secs: parsed(&lookup, "SUBWATCH_HTTP_TIMEOUT_SECS", 30)?,
        })
    }
}

fn parsed<T, F>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid { name, value: raw }),
        None => Ok(default),
    }
}
