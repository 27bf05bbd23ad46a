//! Generative suggestion source backed by a chat-completions API.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{SuggestError, Suggestion, SuggestionContext, SuggestionSource};

pub struct LlmSuggester {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

// ===== Wire types =====

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f64,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

/// Expected shape of the model's answer. Anything else is rejected and the
/// caller falls back to the heuristic — untrusted input is validated
/// against this schema, never partially trusted.
#[derive(Debug, Deserialize)]
struct SuggestionPayload {
    suggestions: Vec<RawSuggestion>,
}

#[derive(Debug, Deserialize)]
struct RawSuggestion {
    #[serde(rename = "dateTime")]
    date_time: String,
    reasoning: String,
    confidence: f64,
}

impl LlmSuggester {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, SuggestError> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    fn build_prompt(context: &SuggestionContext, max: usize) -> String {
        let windows: Vec<String> = context
            .availability
            .weekly
            .iter()
            .map(|w| {
                format!(
                    "weekday {} from {:02}:{:02} to {:02}:{:02}",
                    w.weekday,
                    w.start_min / 60,
                    w.start_min % 60,
                    w.end_min / 60,
                    w.end_min % 60
                )
            })
            .collect();

        format!(
            "A flight lesson was put on weather hold.\n\
             Original start: {}\n\
             Duration: {} minutes\n\
             Student certification: {}\n\
             Weather problems: {}\n\
             Instructor weekly availability (0 = Monday): {}\n\
             Propose up to {} alternative start times within the next 14 days.\n\
             Respond with a JSON object only: {{\"suggestions\": [{{\"dateTime\": \
             \"ISO-8601 UTC\", \"reasoning\": \"...\", \"confidence\": 0.0-1.0}}]}}",
            context.original_start.to_rfc3339(),
            context.duration_min,
            context.tier.as_str(),
            context.violation_summary,
            windows.join("; "),
            max
        )
    }

    fn parse_content(content: &str, max: usize) -> Result<Vec<Suggestion>, SuggestError> {
        let json = extract_json_object(content)
            .ok_or_else(|| SuggestError::Malformed("no JSON object in output".to_string()))?;
        let payload: SuggestionPayload = serde_json::from_str(json)
            .map_err(|e| SuggestError::Malformed(e.to_string()))?;

        let mut suggestions = Vec::new();
        for raw in payload.suggestions.into_iter().take(max) {
            let Ok(proposed_time) = DateTime::parse_from_rfc3339(&raw.date_time) else {
                tracing::warn!(date_time = %raw.date_time, "skipping suggestion with bad timestamp");
                continue;
            };
            suggestions.push(Suggestion {
                proposed_time: proposed_time.with_timezone(&Utc),
                reasoning: raw.reasoning,
                confidence: raw.confidence.clamp(0.0, 1.0),
            });
        }

        if suggestions.is_empty() {
            return Err(SuggestError::Malformed(
                "no usable suggestions in output".to_string(),
            ));
        }
        Ok(suggestions)
    }
}

#[async_trait]
impl SuggestionSource for LlmSuggester {
    async fn suggest(
        &self,
        context: &SuggestionContext,
        max: usize,
    ) -> Result<Vec<Suggestion>, SuggestError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: "You schedule flight-training lessons around weather. \
                              Answer with JSON only."
                        .to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: Self::build_prompt(context, max),
                },
            ],
            temperature: 0.4,
        };

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SuggestError::Provider(format!(
                "status {}",
                response.status()
            )));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| SuggestError::Malformed(e.to_string()))?;
        let content = chat
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| SuggestError::Malformed("empty choices".to_string()))?;

        Self::parse_content(content, max)
    }
}

/// Extract the first balanced JSON object from free-form model output.
///
/// Models wrap answers in prose or code fences; this scans for the first
/// `{` and returns the substring up to its matching close brace, tracking
/// string literals so braces inside them don't count.
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggester_builds() {
        assert!(LlmSuggester::new("http://localhost:8080", "key", "model").is_ok());
    }

    #[test]
    fn extracts_bare_object() {
        let text = r#"{"suggestions": []}"#;
        assert_eq!(extract_json_object(text), Some(text));
    }

    #[test]
    fn extracts_from_code_fence_and_prose() {
        let text = "Here are my suggestions:\n```json\n{\"suggestions\": [{\"dateTime\": \"2025-06-04T15:00:00Z\", \"reasoning\": \"calm morning\", \"confidence\": 0.8}]}\n```\nLet me know!";
        let json = extract_json_object(text).unwrap();
        assert!(json.starts_with('{') && json.ends_with('}'));
        assert!(serde_json::from_str::<serde_json::Value>(json).is_ok());
    }

    #[test]
    fn braces_inside_strings_do_not_confuse_the_scanner() {
        let text = r#"note {"a": "value with } brace", "b": 1} trailing"#;
        let json = extract_json_object(text).unwrap();
        assert_eq!(json, r#"{"a": "value with } brace", "b": 1}"#);
    }

    #[test]
    fn parse_content_validates_schema() {
        let good = r#"{"suggestions": [{"dateTime": "2025-06-04T15:00:00Z", "reasoning": "ok", "confidence": 1.7}]}"#;
        let parsed = LlmSuggester::parse_content(good, 5).unwrap();
        assert_eq!(parsed.len(), 1);
        // Out-of-range confidence clamps rather than failing.
        assert_eq!(parsed[0].confidence, 1.0);

        let wrong_shape = r#"{"options": []}"#;
        assert!(matches!(
            LlmSuggester::parse_content(wrong_shape, 5),
            Err(SuggestError::Malformed(_))
        ));

        let bad_times = r#"{"suggestions": [{"dateTime": "tomorrow", "reasoning": "x", "confidence": 0.5}]}"#;
        assert!(matches!(
            LlmSuggester::parse_content(bad_times, 5),
            Err(SuggestError::Malformed(_))
        ));
    }

    #[test]
    fn parse_content_caps_at_max() {
        let many = r#"{"suggestions": [
            {"dateTime": "2025-06-04T15:00:00Z", "reasoning": "a", "confidence": 0.9},
            {"dateTime": "2025-06-05T15:00:00Z", "reasoning": "b", "confidence": 0.8},
            {"dateTime": "2025-06-06T15:00:00Z", "reasoning": "c", "confidence": 0.7}
        ]}"#;
        let parsed = LlmSuggester::parse_content(many, 2).unwrap();
        assert_eq!(parsed.len(), 2);
    }
}
