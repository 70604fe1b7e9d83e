//! Server configuration from environment variables

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    /// TCP port to listen on
    pub port: u16,
    /// How long a disconnected player keeps their seat
    pub grace_period: Duration,
    /// Countdown between the ready barrier opening and the guess phase
    pub go_delay: Duration,
    /// Guess time used when neither the question nor the request sets one
    pub default_time_limit_secs: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3001,
            grace_period: Duration::from_secs(20),
            go_delay: Duration::from_millis(1000),
            default_time_limit_secs: 30,
        }
    }
}

/// Parse an env var, warning and falling back to `default` on garbage
fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!("Ignoring invalid {}={:?}, using default", name, raw);
                default
            }
        },
        Err(_) => default,
    }
}

impl Config {
    /// Load config from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let config = Self {
            port: env_or("PORT", defaults.port),
            grace_period: Duration::from_secs(env_or(
                "GRACE_PERIOD_SECS",
                defaults.grace_period.as_secs(),
            )),
            go_delay: Duration::from_millis(env_or(
                "GO_DELAY_MS",
                defaults.go_delay.as_millis() as u64,
            )),
            default_time_limit_secs: env_or(
                "DEFAULT_TIME_LIMIT_SECS",
                defaults.default_time_limit_secs,
            ),
        };

        tracing::info!(
            "Config: port={}, grace={:?}, go_delay={:?}, default_time_limit={}s",
            config.port,
            config.grace_period,
            config.go_delay,
            config.default_time_limit_secs
        );
        config
    }

    pub fn go_delay_ms(&self) -> u64 {
        self.go_delay.as_millis() as u64
    }
}
