use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::keys::ttl;

/// 运行环境
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "test" => Ok(Environment::Test),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(format!("unknown environment: {other}")),
        }
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub redis_url: String,
    pub key_prefix: String,
    pub environment: Environment,
    pub connect_timeout_ms: u64,
    pub command_timeout_ms: u64,
    pub max_retries: usize,
    pub session_ttl_secs: u64,
    pub refresh_token_ttl_secs: u64,
    pub login_attempt_window_secs: u64,
    pub max_login_attempts: i64,
    pub profile_ttl_secs: u64,
    pub rate_limit_window_secs: u64,
    pub rate_limit_requests: u32,
    pub health_latency_threshold_ms: u64,
    pub maintenance_interval_secs: u64,
    pub scan_batch_size: usize,
    pub server_host: String,
    pub server_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            redis_url: "memory://".to_string(),
            key_prefix: "taskhub:".to_string(),
            environment: Environment::Development,
            connect_timeout_ms: 5_000,
            command_timeout_ms: 2_000,
            max_retries: 5,
            session_ttl_secs: ttl::SESSION,
            refresh_token_ttl_secs: ttl::REFRESH_TOKEN,
            login_attempt_window_secs: ttl::LOGIN_ATTEMPT_WINDOW,
            max_login_attempts: 5,
            profile_ttl_secs: ttl::USER_PROFILE,
            rate_limit_window_secs: ttl::API_RATE_LIMIT_WINDOW,
            rate_limit_requests: 100,
            health_latency_threshold_ms: 100,
            maintenance_interval_secs: 300,
            scan_batch_size: 100,
            server_host: "0.0.0.0".to_string(),
            server_port: 3000,
        }
    }
}

fn parsed_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

/// 时长配置支持 `30m` / `2h` / `7d` / 纯秒数
fn duration_secs_or(name: &str, default: u64) -> u64 {
    let Ok(raw) = env::var(name) else {
        return default;
    };
    let raw = raw.trim();
    let (digits, unit) = match raw.char_indices().last() {
        Some((idx, c)) if c.is_ascii_alphabetic() => (&raw[..idx], c),
        _ => (raw, 's'),
    };
    let multiplier = match unit {
        's' => 1,
        'm' => 60,
        'h' => 3600,
        'd' => 86_400,
        _ => return default,
    };
    digits
        .parse::<u64>()
        .map(|n| n.saturating_mul(multiplier))
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        dotenv::dotenv().ok();

        let defaults = Config::default();
        let environment = env::var("APP_ENV")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.environment);

        // 配置的默认 TTL 一律夹到 7 天上限
        Ok(Config {
            redis_url: env::var("REDIS_URL")?,
            key_prefix: env::var("CACHE_KEY_PREFIX").unwrap_or(defaults.key_prefix),
            environment,
            connect_timeout_ms: parsed_or("CACHE_CONNECT_TIMEOUT_MS", defaults.connect_timeout_ms),
            command_timeout_ms: parsed_or("CACHE_COMMAND_TIMEOUT_MS", defaults.command_timeout_ms),
            max_retries: parsed_or("CACHE_MAX_RETRIES", defaults.max_retries),
            session_ttl_secs: ttl::clamp(duration_secs_or("SESSION_TTL", defaults.session_ttl_secs)),
            refresh_token_ttl_secs: ttl::clamp(duration_secs_or(
                "REFRESH_TOKEN_TTL",
                defaults.refresh_token_ttl_secs,
            )),
            login_attempt_window_secs: duration_secs_or(
                "LOGIN_ATTEMPT_WINDOW",
                defaults.login_attempt_window_secs,
            )
            .clamp(1, ttl::MAX_WINDOW),
            max_login_attempts: parsed_or("MAX_LOGIN_ATTEMPTS", defaults.max_login_attempts),
            profile_ttl_secs: ttl::clamp(duration_secs_or(
                "PROFILE_CACHE_TTL",
                defaults.profile_ttl_secs,
            )),
            rate_limit_window_secs: duration_secs_or(
                "RATE_LIMIT_WINDOW",
                defaults.rate_limit_window_secs,
            )
            .clamp(1, ttl::MAX_WINDOW),
            rate_limit_requests: parsed_or("RATE_LIMIT_REQUESTS", defaults.rate_limit_requests),
            health_latency_threshold_ms: parsed_or(
                "HEALTH_LATENCY_THRESHOLD_MS",
                defaults.health_latency_threshold_ms,
            ),
            maintenance_interval_secs: duration_secs_or(
                "MAINTENANCE_INTERVAL",
                defaults.maintenance_interval_secs,
            )
            .max(1),
            scan_batch_size: parsed_or("CACHE_SCAN_BATCH", defaults.scan_batch_size).max(1),
            server_host: env::var("SERVER_HOST").unwrap_or(defaults.server_host),
            server_port: parsed_or("SERVER_PORT", defaults.server_port),
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    pub fn maintenance_interval(&self) -> Duration {
        Duration::from_secs(self.maintenance_interval_secs)
    }

    pub fn health_latency_threshold(&self) -> Duration {
        Duration::from_millis(self.health_latency_threshold_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_parses_aliases() {
        assert_eq!("prod".parse::<Environment>(), Ok(Environment::Production));
        assert_eq!("Development".parse::<Environment>(), Ok(Environment::Development));
        assert!("staging".parse::<Environment>().is_err());
    }

    #[test]
    fn defaults_match_namespace_ttls() {
        let config = Config::default();
        assert_eq!(config.session_ttl_secs, 30 * 60);
        assert_eq!(config.refresh_token_ttl_secs, 7 * 24 * 3600);
        assert_eq!(config.login_attempt_window_secs, 15 * 60);
        assert!(!config.is_production());
    }
}
