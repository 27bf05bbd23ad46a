//! Server configuration from environment.

use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_path: String,
    pub weather_base_url: String,
    pub weather_api_key: String,
    pub llm_base_url: String,
    pub llm_api_key: String,
    pub llm_model: String,
    pub notify_url: Option<String>,
    /// How far ahead the monitor looks for SCHEDULED bookings, in hours.
    pub lookahead_hours: i64,
    pub monitor_interval_secs: u64,
    pub worker_poll_secs: u64,
    pub queue_visibility_secs: i64,
    pub queue_max_attempts: i64,
    pub max_candidates: usize,
    pub min_confidence: f64,
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            server_port: env_parse("FLIGHTWX_PORT", 3000),
            database_path: env::var("FLIGHTWX_DB_PATH")
                .unwrap_or_else(|_| "data/flightwx.db".to_string()),
            weather_base_url: env::var("WEATHER_BASE_URL")
                .unwrap_or_else(|_| "https://api.openweathermap.org".to_string()),
            weather_api_key: env::var("WEATHER_API_KEY").unwrap_or_default(),
            llm_base_url: env::var("LLM_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com".to_string()),
            llm_api_key: env::var("LLM_API_KEY").unwrap_or_default(),
            llm_model: env::var("LLM_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            notify_url: env::var("NOTIFY_URL").ok().filter(|s| !s.is_empty()),
            lookahead_hours: env_parse("LOOKAHEAD_HOURS", 48),
            monitor_interval_secs: env_parse("MONITOR_INTERVAL_SECS", 3600),
            worker_poll_secs: env_parse("WORKER_POLL_SECS", 5),
            queue_visibility_secs: env_parse("QUEUE_VISIBILITY_SECS", 60),
            queue_max_attempts: env_parse("QUEUE_MAX_ATTEMPTS", 5),
            max_candidates: env_parse("MAX_CANDIDATES", 5),
            min_confidence: env_parse("MIN_CONFIDENCE", 0.3),
        }
    }
}
