//! Gemini generateContent judge

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{check_status, context_block, require, transport};
use crate::analysis::snapshot::RawSnapshot;
use crate::config::SettingsHandle;
use crate::domain::ai::{Decision, DecisionHistoryEntry};
use crate::ports::ai_judge::{parse_reply, AiJudge, JudgeError};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f64,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

fn reply_text(response: GenerateResponse) -> Result<String, JudgeError> {
    response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|c| c.parts.into_iter().next())
        .and_then(|p| p.text)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| JudgeError::InvalidDecision("Gemini returned empty response".to_string()))
}

fn generate_url(endpoint: &str, model: &str) -> String {
    format!("{}/models/{}:generateContent", endpoint.trim_end_matches('/'), model)
}

pub struct GeminiJudge {
    http: Client,
    settings: Arc<SettingsHandle>,
    model: String,
}

impl GeminiJudge {
    pub fn new(settings: Arc<SettingsHandle>) -> Result<Self, JudgeError> {
        let config = settings.current();
        let http = Client::builder()
            .timeout(Duration::from_secs(config.ai.gemini.timeout_secs))
            .build()
            .map_err(transport)?;

        Ok(Self {
            http,
            model: config.ai.gemini.model.clone(),
            settings,
        })
    }
}

#[async_trait]
impl AiJudge for GeminiJudge {
    fn model(&self) -> &str {
        &self.model
    }

    async fn judge(&self, snapshot: &RawSnapshot, history: &[DecisionHistoryEntry]) -> Result<Decision, JudgeError> {
        let config = self.settings.current();
        let section = &config.ai.gemini;

        let api_key = require(section.get_api_key(), "GEMINI_API_KEY")?;
        let prompt = require(Some(section.prompt.clone()), "ai.gemini.prompt")?;

        let full_prompt = format!("{}\n\n{}", prompt.trim(), context_block(snapshot, history)?);
        let request = GenerateRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part { text: Some(full_prompt) }],
            }],
            generation_config: GenerationConfig {
                temperature: section.temperature,
                max_output_tokens: section.max_output_tokens,
            },
        };

        let response = self
            .http
            .post(generate_url(&section.endpoint, &self.model))
            .header("x-goog-api-key", api_key)
            .json(&request)
            .send()
            .await
            .map_err(transport)?;

        let body: GenerateResponse = check_status(response).await?.json().await.map_err(transport)?;
        let text = reply_text(body)?;
        debug!("[AI] {} replied {:?}", self.model, text);

        parse_reply(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_generate_url() {
        assert_eq!(
            generate_url("https://generativelanguage.googleapis.com/v1beta/", "gemini-2.0-flash"),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent"
        );
    }

    #[test]
    fn test_request_layout() {
        let request = GenerateRequest {
            contents: vec![Content { role: Some("user".to_string()), parts: vec![Part { text: Some("p".to_string()) }] }],
            generation_config: GenerationConfig { temperature: 0.2, max_output_tokens: 20 },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 20);
        assert_eq!(json["contents"][0]["parts"][0]["text"], "p");
    }

    #[test]
    fn test_reply_extraction() {
        let body: GenerateResponse = serde_json::from_str(
            r#"{"candidates": [{"content": {"role": "model", "parts": [{"text": "NO_TRADE\n"}]}, "finishReason": "STOP"}]}"#,
        )
        .unwrap();
        assert_eq!(parse_reply(&reply_text(body).unwrap()), Ok(Decision::NoTrade));

        let blocked: GenerateResponse = serde_json::from_str(r#"{"candidates": [{"finishReason": "SAFETY"}]}"#).unwrap();
        assert!(reply_text(blocked).is_err());
    }

    #[tokio::test]
    async fn test_missing_prompt_is_configuration_error() {
        let mut config = Config::default();
        config.ai.gemini.api_key = Some("g-test".to_string());
        let judge = GeminiJudge::new(Arc::new(SettingsHandle::fixed(config))).unwrap();

        let result = judge.judge(&crate::analysis::snapshot::sample_snapshot(), &[]).await;
        assert!(matches!(result, Err(JudgeError::MissingConfiguration(_))));
    }
}
