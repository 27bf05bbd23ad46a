//! Weather provider HTTP client.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;

use flightwx_core::models::{Waypoint, WeatherObservation};

use crate::cache::{CacheKey, ObservationCache};
use crate::ratelimit::TokenBucket;
use crate::units;

#[derive(Debug, Error)]
pub enum WeatherError {
    /// Local token bucket exhausted; fail fast, caller decides on retry.
    #[error("weather request rate limited locally")]
    RateLimited,
    /// Provider rejected our credentials. Never retried.
    #[error("weather provider rejected credentials")]
    InvalidCredentials,
    /// Provider-side quota exhausted (HTTP 429).
    #[error("weather provider quota exceeded")]
    QuotaExceeded,
    #[error("weather provider returned status {status}")]
    Provider { status: u16 },
    #[error("weather provider payload malformed: {0}")]
    MalformedPayload(String),
    #[error("weather transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl WeatherError {
    /// Whether a caller may reasonably retry this failure later.
    pub fn is_retryable(&self) -> bool {
        match self {
            WeatherError::RateLimited | WeatherError::QuotaExceeded => true,
            WeatherError::Transport(_) => true,
            WeatherError::Provider { status } => *status >= 500,
            WeatherError::InvalidCredentials | WeatherError::MalformedPayload(_) => false,
        }
    }
}

/// Anything that can produce a canonical observation for a point in space
/// and time. The HTTP client implements this; tests substitute stubs.
#[async_trait]
pub trait ObservationSource: Send + Sync {
    async fn observe(
        &self,
        lat: f64,
        lon: f64,
        at: DateTime<Utc>,
    ) -> Result<WeatherObservation, WeatherError>;

    /// Fetch observations for an ordered waypoint list.
    ///
    /// One waypoint failing fails the whole route: a partially-observed
    /// route must never be evaluated as safe.
    async fn observe_route(
        &self,
        waypoints: &[Waypoint],
    ) -> Result<Vec<(Waypoint, WeatherObservation)>, WeatherError> {
        let mut samples = Vec::with_capacity(waypoints.len());
        for wp in waypoints {
            let obs = self.observe(wp.lat, wp.lon, wp.time).await?;
            samples.push((wp.clone(), obs));
        }
        Ok(samples)
    }
}

#[derive(Debug, Clone)]
pub struct WeatherConfig {
    pub base_url: String,
    pub api_key: String,
    pub request_timeout: Duration,
    pub cache_ttl: Duration,
    pub cache_max_entries: usize,
    pub bucket_capacity: u32,
    pub refill_per_sec: f64,
    /// Pause between consecutive network fetches in a batch so a route
    /// evaluation does not burst the limiter.
    pub batch_pause: Duration,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openweathermap.org".to_string(),
            api_key: String::new(),
            request_timeout: Duration::from_secs(10),
            cache_ttl: Duration::from_secs(600),
            cache_max_entries: 512,
            bucket_capacity: 30,
            refill_per_sec: 1.0,
            batch_pause: Duration::from_millis(250),
        }
    }
}

/// HTTP client for point weather observations, with an in-memory cache and
/// a token-bucket rate limiter. Constructed once per process and shared by
/// reference; never a global.
pub struct WeatherClient {
    client: Client,
    base_url: String,
    api_key: String,
    cache: ObservationCache,
    limiter: TokenBucket,
    batch_pause: Duration,
}

// ===== Provider wire types (raw units, never stored) =====

#[derive(Debug, Deserialize)]
struct RawObservation {
    /// Visibility in meters.
    visibility: Option<f64>,
    wind: Option<RawWind>,
    clouds: Option<RawClouds>,
    #[serde(default)]
    weather: Vec<RawCondition>,
}

#[derive(Debug, Deserialize)]
struct RawWind {
    /// m/s
    speed: f64,
    /// m/s
    gust: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawClouds {
    /// Coverage percent 0-100.
    all: f64,
}

#[derive(Debug, Deserialize)]
struct RawCondition {
    main: String,
}

/// Map a provider condition name to the METAR-style code the minimums
/// tables are written in. Unknown conditions pass through uppercased.
fn condition_code(main: &str) -> String {
    match main.to_ascii_lowercase().as_str() {
        "thunderstorm" => "TS".to_string(),
        "snow" => "SN".to_string(),
        "fog" | "mist" => "FG".to_string(),
        "freezing rain" | "freezing drizzle" => "FZRA".to_string(),
        "hail" => "GR".to_string(),
        "rain" => "RA".to_string(),
        "drizzle" => "DZ".to_string(),
        other => other.to_uppercase(),
    }
}

fn normalize(raw: RawObservation) -> Result<WeatherObservation, WeatherError> {
    let visibility_m = raw
        .visibility
        .ok_or_else(|| WeatherError::MalformedPayload("missing visibility".to_string()))?;
    let wind = raw
        .wind
        .ok_or_else(|| WeatherError::MalformedPayload("missing wind".to_string()))?;
    let cover_pct = raw.clouds.map(|c| c.all).unwrap_or(0.0);

    if !visibility_m.is_finite() || visibility_m < 0.0 {
        return Err(WeatherError::MalformedPayload(format!(
            "visibility {visibility_m} out of range"
        )));
    }

    Ok(WeatherObservation {
        visibility_mi: units::meters_to_statute_miles(visibility_m),
        ceiling_ft: units::cloud_cover_to_ceiling_ft(cover_pct),
        wind_kt: units::mps_to_knots(wind.speed),
        wind_gust_kt: wind.gust.map(units::mps_to_knots),
        phenomena: raw.weather.iter().map(|c| condition_code(&c.main)).collect(),
    })
}

impl WeatherClient {
    pub fn new(config: WeatherConfig) -> Result<Self, WeatherError> {
        // A client without the timeout would hang evaluations on a stuck
        // provider; a failed builder is a startup error, not a default.
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self {
            client,
            base_url: config.base_url,
            api_key: config.api_key,
            cache: ObservationCache::new(config.cache_ttl, config.cache_max_entries),
            limiter: TokenBucket::new(config.bucket_capacity, config.refill_per_sec),
            batch_pause: config.batch_pause,
        })
    }

    /// Fetch one observation, serving from cache when possible.
    /// Returns the observation and whether the network was hit.
    async fn observe_inner(
        &self,
        lat: f64,
        lon: f64,
        at: DateTime<Utc>,
    ) -> Result<(WeatherObservation, bool), WeatherError> {
        let key = CacheKey::quantize(lat, lon, at);
        if let Some(cached) = self.cache.get(&key) {
            tracing::debug!(lat, lon, "weather cache hit");
            return Ok((cached, false));
        }

        if !self.limiter.try_acquire() {
            return Err(WeatherError::RateLimited);
        }

        let url = format!("{}/data/2.5/weather", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("lat", lat.to_string()),
                ("lon", lon.to_string()),
                ("dt", at.timestamp().to_string()),
                ("appid", self.api_key.clone()),
            ])
            .send()
            .await?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(WeatherError::InvalidCredentials)
            }
            StatusCode::TOO_MANY_REQUESTS => return Err(WeatherError::QuotaExceeded),
            status if !status.is_success() => {
                return Err(WeatherError::Provider {
                    status: status.as_u16(),
                })
            }
            _ => {}
        }

        let raw: RawObservation = response
            .json()
            .await
            .map_err(|e| WeatherError::MalformedPayload(e.to_string()))?;
        let observation = normalize(raw)?;

        self.cache.insert(key, observation.clone());
        Ok((observation, true))
    }
}

#[async_trait]
impl ObservationSource for WeatherClient {
    async fn observe(
        &self,
        lat: f64,
        lon: f64,
        at: DateTime<Utc>,
    ) -> Result<WeatherObservation, WeatherError> {
        let (observation, _) = self.observe_inner(lat, lon, at).await?;
        Ok(observation)
    }

    async fn observe_route(
        &self,
        waypoints: &[Waypoint],
    ) -> Result<Vec<(Waypoint, WeatherObservation)>, WeatherError> {
        let mut samples = Vec::with_capacity(waypoints.len());
        for (i, wp) in waypoints.iter().enumerate() {
            let (obs, hit_network) = self.observe_inner(wp.lat, wp.lon, wp.time).await?;
            samples.push((wp.clone(), obs));
            if hit_network && i + 1 < waypoints.len() {
                tokio::time::sleep(self.batch_pause).await;
            }
        }
        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_builds_with_default_config() {
        assert!(WeatherClient::new(WeatherConfig::default()).is_ok());
    }

    #[test]
    fn normalize_converts_units() {
        let raw = RawObservation {
            visibility: Some(8_046.72), // 5 sm
            wind: Some(RawWind {
                speed: 5.144, // ~10 kt
                gust: Some(10.29),
            }),
            clouds: Some(RawClouds { all: 75.0 }),
            weather: vec![RawCondition {
                main: "Thunderstorm".to_string(),
            }],
        };

        let obs = normalize(raw).unwrap();
        assert!((obs.visibility_mi - 5.0).abs() < 0.01);
        assert!((obs.wind_kt - 10.0).abs() < 0.1);
        assert!((obs.wind_gust_kt.unwrap() - 20.0).abs() < 0.1);
        assert_eq!(obs.ceiling_ft, 2_000.0);
        assert_eq!(obs.phenomena, vec!["TS".to_string()]);
    }

    #[test]
    fn normalize_rejects_missing_fields() {
        let raw = RawObservation {
            visibility: None,
            wind: None,
            clouds: None,
            weather: Vec::new(),
        };
        assert!(matches!(
            normalize(raw),
            Err(WeatherError::MalformedPayload(_))
        ));
    }

    #[test]
    fn condition_codes_map_known_names() {
        assert_eq!(condition_code("Fog"), "FG");
        assert_eq!(condition_code("Mist"), "FG");
        assert_eq!(condition_code("Snow"), "SN");
        assert_eq!(condition_code("Squall"), "SQUALL");
    }

    #[test]
    fn retryability_classification() {
        assert!(WeatherError::RateLimited.is_retryable());
        assert!(WeatherError::QuotaExceeded.is_retryable());
        assert!(WeatherError::Provider { status: 503 }.is_retryable());
        assert!(!WeatherError::Provider { status: 404 }.is_retryable());
        assert!(!WeatherError::InvalidCredentials.is_retryable());
        assert!(!WeatherError::MalformedPayload("x".to_string()).is_retryable());
    }
}
