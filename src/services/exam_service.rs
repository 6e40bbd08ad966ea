/// Exam question prediction through an OpenAI-compatible chat-completion API.
use std::path::{Path, PathBuf};

use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::config::AiConfig;
use crate::error::{AppError, AppResult};
use crate::models::prediction::{parse_analysis, PredictReq, PredictResponse};

pub const MAX_PAPER_CHARS: usize = 12_000;
const SYSTEM_PROMPT: &str =
    "You are an expert exam analyst. Analyse past exam papers and predict the most likely questions.";

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<ErrorDetail>,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

pub struct ExamAnalyst {
    http: Client,
    config: AiConfig,
}

impl ExamAnalyst {
    pub fn new(config: AiConfig) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }

    pub async fn predict(&self, req: PredictReq) -> AppResult<PredictResponse> {
        let subject = req.subject.trim().to_uppercase();
        if subject.is_empty() {
            return Err(AppError::field("subject", "Please select a subject"));
        }
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| AppError::Upstream("AI API key not configured".into()))?;

        let content = match req.content {
            Some(text) if !text.trim().is_empty() => text,
            _ => load_paper(Path::new(&self.config.papers_dir), &subject).await?,
        };
        let full_name = req.subject_name.unwrap_or_else(|| subject.clone());
        let prompt = user_prompt(&full_name, &truncate_paper(&content));

        tracing::info!(subject = %subject, model = %self.config.model, "requesting exam analysis");
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let resp = self
            .http
            .post(url)
            .bearer_auth(api_key)
            .json(&json!({
                "model": self.config.model,
                "temperature": 0.3,
                "max_tokens": 2000,
                "messages": [
                    { "role": "system", "content": SYSTEM_PROMPT },
                    { "role": "user", "content": prompt },
                ],
            }))
            .send()
            .await
            .map_err(|e| AppError::Upstream(e.to_string()))?;

        let status = resp.status();
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| AppError::Upstream(e.to_string()))?;
        if !status.is_success() {
            let msg = serde_json::from_slice::<ErrorBody>(&bytes)
                .ok()
                .and_then(|b| b.error)
                .map(|e| e.message)
                .unwrap_or_else(|| "AI API error".into());
            tracing::warn!(%status, error = %msg, "exam analysis failed");
            return Err(AppError::Upstream(msg));
        }

        let body: ChatResponse = serde_json::from_slice(&bytes)
            .map_err(|e| AppError::Upstream(format!("Malformed AI response: {e}")))?;
        let raw = body
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| AppError::Upstream("AI response had no choices".into()))?;

        Ok(PredictResponse {
            questions: parse_analysis(&raw, &subject),
            subject,
            raw_analysis: raw,
        })
    }
}

pub fn user_prompt(full_name: &str, content: &str) -> String {
    format!(
        "Past papers for {full_name}:\n\n{content}\n\nPredict top 8 likely questions with probability."
    )
}

pub fn truncate_paper(content: &str) -> String {
    if content.chars().count() > MAX_PAPER_CHARS {
        let head: String = content.chars().take(MAX_PAPER_CHARS).collect();
        format!("{head}\n[truncated]")
    } else {
        content.to_string()
    }
}

fn paper_path(dir: &Path, subject: &str) -> AppResult<PathBuf> {
    // Subject ids are used as file names, keep them to plain identifiers.
    if !subject
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(AppError::field("subject", "Invalid subject"));
    }
    Ok(dir.join(format!("{subject}.txt")))
}

async fn load_paper(dir: &Path, subject: &str) -> AppResult<String> {
    let path = paper_path(dir, subject)?;
    tokio::fs::read_to_string(&path).await.map_err(|e| {
        tracing::warn!(path = %path.display(), error = %e, "past papers missing");
        AppError::NotFound("Past papers")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_papers_are_truncated_with_marker() {
        let paper = "a".repeat(MAX_PAPER_CHARS + 5);
        let out = truncate_paper(&paper);
        assert!(out.ends_with("\n[truncated]"));
        assert_eq!(out.chars().count(), MAX_PAPER_CHARS + "\n[truncated]".len());
        assert_eq!(truncate_paper("short"), "short");
    }

    #[test]
    fn subject_must_be_a_plain_identifier() {
        let dir = Path::new("papers");
        assert_eq!(paper_path(dir, "DBMS").unwrap(), dir.join("DBMS.txt"));
        assert!(paper_path(dir, "../etc/passwd").is_err());
    }

    #[tokio::test]
    async fn missing_api_key_is_reported() {
        let analyst = ExamAnalyst::new(AiConfig::default());
        let err = analyst
            .predict(PredictReq {
                subject: "dbms".into(),
                subject_name: None,
                content: Some("SQL".into()),
            })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "AI API key not configured");
    }
}
