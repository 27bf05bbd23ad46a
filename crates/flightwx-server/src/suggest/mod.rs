//! Alternative-time suggestion sources.
//!
//! The generative source is a replaceable black box behind
//! [`SuggestionSource`]; when it fails, the worker falls back to the
//! deterministic heuristic in [`fallback`].

pub mod fallback;
pub mod llm;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use flightwx_core::models::{CertificationTier, InstructorAvailability};

/// Everything a suggestion source needs to know about the conflict.
#[derive(Debug, Clone)]
pub struct SuggestionContext {
    pub booking_id: String,
    pub tier: CertificationTier,
    pub original_start: DateTime<Utc>,
    pub duration_min: i64,
    pub violation_summary: String,
    pub availability: InstructorAvailability,
}

/// One proposed alternative time with a justification.
#[derive(Debug, Clone, PartialEq)]
pub struct Suggestion {
    pub proposed_time: DateTime<Utc>,
    pub reasoning: String,
    /// In [0, 1]; clamped at the boundary.
    pub confidence: f64,
}

#[derive(Debug, Error)]
pub enum SuggestError {
    #[error("suggestion provider error: {0}")]
    Provider(String),
    #[error("suggestion output unparseable: {0}")]
    Malformed(String),
    #[error("suggestion transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

#[async_trait]
pub trait SuggestionSource: Send + Sync {
    /// Produce up to `max` candidate times for the conflicted booking.
    async fn suggest(
        &self,
        context: &SuggestionContext,
        max: usize,
    ) -> Result<Vec<Suggestion>, SuggestError>;
}
