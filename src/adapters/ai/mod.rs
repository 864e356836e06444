//! AI judge adapters
//!
//! HTTP clients for the two judges. Provider settings (prompt, temperature,
//! key) are read from the live `SettingsHandle` on every call; the model name
//! is fixed when the judge is built so stored decisions stay attributable.

pub mod gemini;
pub mod openai;

pub use gemini::GeminiJudge;
pub use openai::OpenAiJudge;

use reqwest::{Response, StatusCode};

use crate::analysis::snapshot::RawSnapshot;
use crate::domain::ai::DecisionHistoryEntry;
use crate::ports::ai_judge::JudgeError;

/// Map a non-success response onto the judge error taxonomy
pub(crate) async fn check_status(response: Response) -> Result<Response, JudgeError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match status {
        StatusCode::TOO_MANY_REQUESTS => Err(JudgeError::RateLimited),
        StatusCode::UNAUTHORIZED => Err(JudgeError::InvalidApiKey),
        _ => {
            let body = response.text().await.unwrap_or_default();
            Err(JudgeError::Api { status: status.as_u16(), body })
        }
    }
}

pub(crate) fn transport(err: reqwest::Error) -> JudgeError {
    JudgeError::Transport(err.to_string())
}

/// Snapshot and history block appended after the prompt
pub(crate) fn context_block(snapshot: &RawSnapshot, history: &[DecisionHistoryEntry]) -> Result<String, JudgeError> {
    let snapshot_json = snapshot.to_json().map_err(|e| JudgeError::Transport(e.to_string()))?;
    let history_json = serde_json::to_string(history).map_err(|e| JudgeError::Transport(e.to_string()))?;
    Ok(format!("SNAPSHOT:\n{}\n\nPREVIOUS DECISIONS:\n{}", snapshot_json, history_json))
}

pub(crate) fn require(value: Option<String>, name: &str) -> Result<String, JudgeError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| JudgeError::MissingConfiguration(name.to_string()))
}
