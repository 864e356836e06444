//! OpenAI chat-completions judge

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

const SYSTEM_MESSAGE: &str = "You are conservative, rule-based, and deterministic.";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f64,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

fn build_messages(prompt: &str, context: String) -> Vec<ChatMessage> {
    vec![
        ChatMessage { role: "system", content: SYSTEM_MESSAGE.to_string() },
        ChatMessage { role: "user", content: prompt.to_string() },
        ChatMessage { role: "user", content: context },
    ]
}

fn reply_text(response: ChatResponse) -> Result<String, JudgeError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| JudgeError::InvalidDecision("empty completion".to_string()))
}

pub struct OpenAiJudge {
    http: Client,
    settings: Arc<SettingsHandle>,
    model: String,
}

impl OpenAiJudge {
    pub fn new(settings: Arc<SettingsHandle>) -> Result<Self, JudgeError> {
        let config = settings.current();
        let http = Client::builder()
            .timeout(Duration::from_secs(config.ai.openai.timeout_secs))
            .build()
            .map_err(transport)?;

        Ok(Self {
            http,
            model: config.ai.openai.model.clone(),
            settings,
        })
    }
}

#[async_trait]
impl AiJudge for OpenAiJudge {
    fn model(&self) -> &str {
        &self.model
    }

    async fn judge(&self, snapshot: &RawSnapshot, history: &[DecisionHistoryEntry]) -> Result<Decision, JudgeError> {
        let config = self.settings.current();
        let section = &config.ai.openai;

        let api_key = require(section.get_api_key(), "OPENAI_API_KEY")?;
        let prompt = require(Some(section.prompt.clone()), "ai.openai.prompt")?;

        let request = ChatRequest {
            model: &self.model,
            temperature: section.temperature,
            messages: build_messages(&prompt, context_block(snapshot, history)?),
        };

        let response = self
            .http
            .post(&section.endpoint)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(transport)?;

        let body: ChatResponse = check_status(response).await?.json().await.map_err(transport)?;
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
    fn test_request_layout() {
        let request = ChatRequest {
            model: "gpt-4o-mini",
            temperature: 0.2,
            messages: build_messages("Decide.", "SNAPSHOT:\n{}\n\nPREVIOUS DECISIONS:\n[]".to_string()),
        };
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][0]["content"], SYSTEM_MESSAGE);
        assert_eq!(json["messages"][1]["content"], "Decide.");
        assert!(json["messages"][2]["content"].as_str().unwrap().starts_with("SNAPSHOT:"));
    }

    #[test]
    fn test_reply_extraction() {
        let body: ChatResponse =
            serde_json::from_str(r#"{"choices": [{"index": 0, "message": {"role": "assistant", "content": " buy\n"}}]}"#)
                .unwrap();
        assert_eq!(parse_reply(&reply_text(body).unwrap()), Ok(Decision::Buy));

        let empty: ChatResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(matches!(reply_text(empty), Err(JudgeError::InvalidDecision(_))));
    }

    #[tokio::test]
    async fn test_missing_prompt_is_configuration_error() {
        let mut config = Config::default();
        config.ai.openai.api_key = Some("sk-test".to_string());
        let judge = OpenAiJudge::new(Arc::new(SettingsHandle::fixed(config))).unwrap();
        assert_eq!(judge.model(), "gpt-4o-mini");

        let snapshot = crate::analysis::snapshot::sample_snapshot();
        let result = judge.judge(&snapshot, &[]).await;
        assert!(matches!(result, Err(JudgeError::MissingConfiguration(_))));
    }
}
