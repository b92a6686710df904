// src/core/services/classifier.rs

use color_eyre::eyre::Result;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info, warn};

const DEFAULT_ENDPOINT: &str = "https://api.groq.com/openai/v1/chat/completions";
const DEFAULT_MODEL: &str = "openai/gpt-oss-120b";

/// Instructions for the content-safety classifier. The model answers with a
/// strict JSON object matching the response schema below.
const SYSTEM_PROMPT: &str = "You are an expert cybersecurity analyst, content safety moderator, \
and digital curator. Analyze the extracted text content of a website, detect brand \
impersonation, evaluate safety, summarize, and recommend alternatives. Answer in English, \
as a strictly valid JSON object.\n\n\
1. SCORING RUBRIC (severity scale 0-4):\n\
- 0 (Safe): benign, family-friendly content.\n\
- 1 (Low risk): educational, medical, or news context.\n\
- 2 (Moderate risk): strong language, mild innuendo, fictional conflict.\n\
- 3 (High risk): explicit sexual descriptions, graphic violence, hate speech.\n\
- 4 (Severe): illegal acts, terrorism, scams, promotion of self-harm, phishing.\n\n\
2. CATEGORIES: sexual, violence, hate, self_harm.\n\n\
3. SUMMARIZE in 1-2 sentences and suggest 2-3 safer, reputable alternatives \
(empty list when severity is 4).\n\n\
4. Extract 5 relevant keywords.\n\n\
5. BRAND IMPERSONATION: if the text impersonates a specific organization, name it and \
score severity 4; if the site legitimately is the brand or no impersonation exists, \
return \"N/A\".\n\n\
Output JSON only, matching the provided schema exactly.";

/// Severity scores (0-4) per analyzed category.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct CategoryScores {
    #[serde(default)]
    pub sexual: f64,
    #[serde(default)]
    pub violence: f64,
    #[serde(default)]
    pub hate: f64,
    #[serde(default)]
    pub self_harm: f64,
}

/// A safer alternative suggested by the classifier.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Alternative {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub reason: String,
}

/// Structured classifier verdict. Every field defaults so a partially
/// conforming model answer still deserializes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContentClassification {
    #[serde(default)]
    pub scores: CategoryScores,
    #[serde(default)]
    pub content_summary: String,
    #[serde(default)]
    pub content_keywords: Vec<String>,
    #[serde(default)]
    pub impersonated_brand: String,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub alternative_recommendations: Vec<Alternative>,
}

/// Outcome of one classification request across all configured keys.
#[derive(Debug)]
pub enum ClassifyOutcome {
    Classified(ContentClassification),
    /// Every key was refused with a rate-limit/quota signal. Treated as
    /// no-data by the caller, never as an error.
    RateLimited,
    Unavailable(String),
}

// Chat-completion response envelope.
#[derive(Debug, Deserialize)]
struct ChatEnvelope {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: String,
}

struct RequestFailure {
    rate_limited: bool,
    message: String,
}

/// Client for the chat-completion classifier endpoint.
///
/// Several API keys may be configured (comma-separated); a key refused with a
/// rate-limit or quota signal rotates to the next one.
pub struct ClassifierClient {
    http: reqwest::Client,
    keys: Vec<String>,
    model: String,
    endpoint: String,
}

impl ClassifierClient {
    /// Builds the client from `TRUSTSCAN_AI_API_KEY` (comma-separated keys),
    /// `TRUSTSCAN_AI_MODEL`, and `TRUSTSCAN_AI_URL`.
    pub fn from_env(timeout: Duration) -> Result<Self> {
        let keys: Vec<String> = std::env::var("TRUSTSCAN_AI_API_KEY")
            .unwrap_or_default()
            .split(',')
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();
        if keys.is_empty() {
            warn!("TRUSTSCAN_AI_API_KEY not configured; AI analysis will be unavailable.");
        } else {
            debug!(count = keys.len(), "Loaded classifier API key(s).");
        }

        let model =
            std::env::var("TRUSTSCAN_AI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let endpoint =
            std::env::var("TRUSTSCAN_AI_URL").unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string());
        let http = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            keys,
            model,
            endpoint,
        })
    }

    /// Classifies the page text, rotating through the configured keys until
    /// one answers.
    pub async fn classify(&self, url: &str, text: &str) -> ClassifyOutcome {
        if self.keys.is_empty() {
            return ClassifyOutcome::Unavailable("AI API key not configured".to_string());
        }

        let mut last_failure = RequestFailure {
            rate_limited: false,
            message: "no attempt made".to_string(),
        };
        for (index, key) in self.keys.iter().enumerate() {
            debug!(
                key_index = index + 1,
                total = self.keys.len(),
                "Sending classification request."
            );
            match self.request(key, url, text).await {
                Ok(classification) => {
                    info!(key_index = index + 1, "Classifier answered.");
                    return ClassifyOutcome::Classified(classification);
                }
                Err(failure) => {
                    warn!(
                        key_index = index + 1,
                        rate_limited = failure.rate_limited,
                        error = %failure.message,
                        "Classification attempt failed, rotating key."
                    );
                    last_failure = failure;
                }
            }
        }

        if last_failure.rate_limited {
            ClassifyOutcome::RateLimited
        } else {
            ClassifyOutcome::Unavailable(last_failure.message)
        }
    }

    async fn request(
        &self,
        key: &str,
        url: &str,
        text: &str,
    ) -> std::result::Result<ContentClassification, RequestFailure> {
        let user_prompt = format!(
            "Analyze the following website (check whether it is \
phishing/malware/scam/impersonation or not):\n\nURL: {url}\n\nWEBSITE TEXT CONTENT:\n\"{text}\""
        );
        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": user_prompt},
            ],
            "temperature": 0.2,
            "max_completion_tokens": 2048,
            "top_p": 1,
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": "content_safety_report",
                    "schema": response_schema(),
                },
            },
        });

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(key)
            .json(&body)
            .send()
            .await
            .map_err(|e| RequestFailure {
                rate_limited: false,
                message: format!("request failed: {e}"),
            })?;

        let status = response.status();
        let payload = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(RequestFailure {
                rate_limited: is_rate_limit_signal(status.as_u16(), &payload),
                message: format!("API error (status {status})"),
            });
        }

        let envelope: ChatEnvelope =
            serde_json::from_str(&payload).map_err(|e| RequestFailure {
                rate_limited: false,
                message: format!("unexpected response envelope: {e}"),
            })?;
        let content = envelope
            .choices
            .first()
            .map(|choice| choice.message.content.trim().to_string())
            .unwrap_or_default();

        serde_json::from_str::<ContentClassification>(&content).map_err(|e| RequestFailure {
            rate_limited: false,
            message: format!("classifier returned invalid JSON: {e}"),
        })
    }
}

/// Whether a refusal is a rate-limit/quota condition rather than an error.
fn is_rate_limit_signal(status: u16, body: &str) -> bool {
    if status == 429 {
        return true;
    }
    let lower = body.to_lowercase();
    ["rate limit", "rate_limit", "quota", "too many requests"]
        .iter()
        .any(|signal| lower.contains(signal))
}

/// JSON schema the classifier must answer with.
fn response_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "content_summary": {"type": "string"},
            "content_keywords": {"type": "array", "items": {"type": "string"}},
            "impersonated_brand": {"type": "string"},
            "scores": {
                "type": "object",
                "properties": {
                    "sexual": {"type": "integer"},
                    "violence": {"type": "integer"},
                    "hate": {"type": "integer"},
                    "self_harm": {"type": "integer"},
                },
                "required": ["sexual", "violence", "hate", "self_harm"],
                "additionalProperties": false,
            },
            "reasoning": {"type": "string"},
            "alternative_recommendations": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "name": {"type": "string"},
                        "url": {"type": "string"},
                        "reason": {"type": "string"},
                    },
                    "required": ["name", "url"],
                    "additionalProperties": true,
                },
            },
        },
        "required": [
            "scores",
            "content_keywords",
            "impersonated_brand",
            "content_summary",
            "reasoning",
            "alternative_recommendations",
        ],
        "additionalProperties": false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_parses_a_full_answer() {
        let content = r#"{
            "scores": {"sexual": 0, "violence": 1, "hate": 0, "self_harm": 0},
            "content_summary": "A cooking blog with recipes.",
            "content_keywords": ["cooking", "recipes", "food", "kitchen", "baking"],
            "impersonated_brand": "N/A",
            "reasoning": "Benign culinary content.",
            "alternative_recommendations": [
                {"name": "BBC Food", "url": "https://www.bbc.co.uk/food"}
            ]
        }"#;
        let parsed: ContentClassification = serde_json::from_str(content).unwrap();
        assert_eq!(parsed.scores.violence, 1.0);
        assert_eq!(parsed.impersonated_brand, "N/A");
        assert_eq!(parsed.alternative_recommendations.len(), 1);
    }

    #[test]
    fn partial_answers_fill_defaults() {
        let parsed: ContentClassification =
            serde_json::from_str(r#"{"content_summary": "short"}"#).unwrap();
        assert_eq!(parsed.scores.sexual, 0.0);
        assert!(parsed.content_keywords.is_empty());
        assert_eq!(parsed.impersonated_brand, "");
    }

    #[test]
    fn envelope_extracts_the_message_content() {
        let payload = r#"{"choices": [{"message": {"content": "{\"scores\":{}}"}}]}"#;
        let envelope: ChatEnvelope = serde_json::from_str(payload).unwrap();
        assert_eq!(envelope.choices[0].message.content, "{\"scores\":{}}");
    }

    #[test]
    fn rate_limit_signals_are_recognized() {
        assert!(is_rate_limit_signal(429, ""));
        assert!(is_rate_limit_signal(400, "Daily quota exceeded for key"));
        assert!(is_rate_limit_signal(503, "Too Many Requests"));
        assert!(!is_rate_limit_signal(500, "internal server error"));
    }
}
