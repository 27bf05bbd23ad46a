//! Outbound notification publishing.
//!
//! Fire-and-forget: a failed publish is logged and dropped, never allowed
//! to roll back the database work that preceded it.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;

/// Event published after a conflict message has been fully processed.
#[derive(Debug, Clone, Serialize)]
pub struct RescheduleEvent {
    pub booking_id: String,
    pub student_id: String,
    pub instructor_id: String,
    pub candidate_count: usize,
    pub original_start: DateTime<Utc>,
    pub published_at: DateTime<Utc>,
}

pub struct NotificationPublisher {
    client: Client,
    url: Option<String>,
}

impl NotificationPublisher {
    pub fn new(url: Option<String>) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(5)).build()?;
        Ok(Self { client, url })
    }

    /// Publish the event; best-effort only.
    pub async fn publish(&self, event: &RescheduleEvent) {
        let Some(url) = self.url.as_deref() else {
            tracing::debug!(booking_id = %event.booking_id, "no notification channel configured");
            return;
        };

        match self.client.post(url).json(event).send().await {
            Ok(response) if response.status().is_success() => {
                tracing::debug!(booking_id = %event.booking_id, "reschedule event published");
            }
            Ok(response) => {
                tracing::warn!(
                    booking_id = %event.booking_id,
                    status = %response.status(),
                    "notification channel rejected event"
                );
            }
            Err(e) => {
                tracing::warn!(booking_id = %event.booking_id, "notification publish failed: {e}");
            }
        }
    }
}
