//! Weather data client: provider HTTP access, unit normalization, caching,
//! and rate limiting.

pub mod cache;
pub mod client;
pub mod ratelimit;
pub mod units;

pub use cache::{CacheKey, ObservationCache};
pub use client::{ObservationSource, WeatherClient, WeatherConfig, WeatherError};
pub use ratelimit::TokenBucket;
