//! Remote summarization through an OpenAI-compatible chat-completion API.
//!
//! This module provides the interface the summarizer uses to ask a language
//! model for a translated title and a one-paragraph summary.
//!
//! # Architecture
//!
//! - [`SummaryClient`]: Core trait; one async method, so tests can substitute a fake
//! - [`ChatClient`]: `POST {base_url}/chat/completions` implementation over `reqwest`
//! - [`parse_summary_content`]: Tolerant parsing of the model's reply
//!
//! Failures are returned as [`RemoteSummaryError`]; the caller decides to
//! fall back, so nothing here retries.

use crate::summary::local::SentenceBand;
use crate::utils::truncate_for_log;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, instrument, warn};

/// Default system instruction. `{language}`, `{min_sentences}` and
/// `{max_sentences}` are substituted before sending.
pub const DEFAULT_PROMPT_TEMPLATE: &str = "You are a news editor. Translate the article title into {language} and summarize the article in {language}. \
The summary must be a single paragraph of {min_sentences} to {max_sentences} complete sentences. \
Do not use line breaks, bullet points or numbered lists. \
Respond with only a JSON object of the form {\"titleKo\": \"translated title\", \"summary\": \"paragraph\"}.";

#[derive(Debug, Error)]
pub enum RemoteSummaryError {
    #[error("request timed out")]
    Timeout,
    #[error("request failed: {0}")]
    Http(reqwest::Error),
    #[error("api returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("response has no choices")]
    EmptyResponse,
    #[error("malformed summary: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for RemoteSummaryError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            RemoteSummaryError::Timeout
        } else {
            RemoteSummaryError::Http(e)
        }
    }
}

/// What the summarizer sends to a [`SummaryClient`].
#[derive(Debug, Clone, Copy)]
pub struct SummaryRequest<'a> {
    pub title: &'a str,
    /// Cleaned and already truncated body text.
    pub text: &'a str,
    pub band: SentenceBand,
}

/// A translated title and summary exactly as the model produced them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSummary {
    pub translated_title: String,
    pub summary: String,
}

/// Trait for remote summarization backends.
///
/// Implementors turn a title and body into a [`RemoteSummary`].
pub trait SummaryClient {
    async fn summarize(
        &self,
        request: &SummaryRequest<'_>,
    ) -> Result<RemoteSummary, RemoteSummaryError>;
}

/// Connection and prompt settings for [`ChatClient`].
#[derive(Debug, Clone)]
pub struct ChatClientConfig {
    /// API root, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    /// Language the title and summary are written in.
    pub language: String,
    pub prompt_template: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl ChatClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: api_key.into(),
            model: "gpt-4o-mini".to_string(),
            language: "Korean".to_string(),
            prompt_template: DEFAULT_PROMPT_TEMPLATE.to_string(),
            temperature: 0.3,
            max_tokens: 1200,
            timeout: Duration::from_secs(60),
        }
    }

    /// The system instruction with placeholders filled in.
    pub fn render_prompt(&self, band: SentenceBand) -> String {
        self.prompt_template
            .replace("{language}", &self.language)
            .replace("{min_sentences}", &band.min.to_string())
            .replace("{max_sentences}", &band.max.to_string())
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
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

/// [`SummaryClient`] for OpenAI-compatible chat-completion endpoints.
#[derive(Debug, Clone)]
pub struct ChatClient {
    client: Client,
    config: ChatClientConfig,
}

impl ChatClient {
    pub fn new(config: ChatClientConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }
}

impl SummaryClient for ChatClient {
    #[instrument(level = "info", skip_all, fields(model = %self.config.model))]
    async fn summarize(
        &self,
        request: &SummaryRequest<'_>,
    ) -> Result<RemoteSummary, RemoteSummaryError> {
        let t0 = Instant::now();
        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: self.config.render_prompt(request.band),
                },
                ChatMessage {
                    role: "user",
                    content: format!("Title: {}\n\nArticle:\n{}", request.title, request.text),
                },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let resp = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %truncate_for_log(&text, 300), "API call failed");
            return Err(RemoteSummaryError::Status {
                status: status.as_u16(),
                body: truncate_for_log(&text, 300),
            });
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| RemoteSummaryError::Malformed(e.to_string()))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(RemoteSummaryError::EmptyResponse)?;

        debug!(
            elapsed_ms = t0.elapsed().as_millis() as u64,
            response_preview = %truncate_for_log(&content, 200),
            "API call returned"
        );
        parse_summary_content(&content)
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SummaryField {
    Text(String),
    Lines(Vec<String>),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryJson {
    title_ko: Option<String>,
    translated_title: Option<String>,
    /// Some models echo the original title next to the translation.
    title: Option<String>,
    summary: Option<SummaryField>,
}

impl SummaryJson {
    /// `titleKo`, then `translatedTitle`, then `title`; blanks are skipped.
    fn pick_title(&self) -> String {
        [&self.title_ko, &self.translated_title, &self.title]
            .into_iter()
            .flatten()
            .map(|t| t.trim())
            .find(|t| !t.is_empty())
            .unwrap_or_default()
            .to_string()
    }
}

/// The substring from the first `{` to the last `}`, if any.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Parse the model's reply into a [`RemoteSummary`].
///
/// Strict JSON is tried first; otherwise the first brace-delimited substring
/// (which also covers fenced code blocks and chatty preambles). A list-valued
/// `summary` is joined into one paragraph. An empty summary is malformed.
pub fn parse_summary_content(content: &str) -> Result<RemoteSummary, RemoteSummaryError> {
    let parsed = serde_json::from_str::<SummaryJson>(content.trim()).or_else(|first| {
        let inner = extract_json_object(content)
            .ok_or_else(|| RemoteSummaryError::Malformed(first.to_string()))?;
        serde_json::from_str::<SummaryJson>(inner)
            .map_err(|e| RemoteSummaryError::Malformed(e.to_string()))
    })?;

    let translated_title = parsed.pick_title();
    let summary = match parsed.summary {
        Some(SummaryField::Text(s)) => s,
        Some(SummaryField::Lines(lines)) => lines.join(" "),
        None => String::new(),
    };
    if summary.trim().is_empty() {
        return Err(RemoteSummaryError::Malformed("empty summary".to_string()));
    }

    Ok(RemoteSummary {
        translated_title,
        summary: summary.trim().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const BAND: SentenceBand = SentenceBand::new(8, 12);

    #[test]
    fn test_render_prompt() {
        let config = ChatClientConfig::new("key");
        let prompt = config.render_prompt(BAND);
        assert!(prompt.contains("into Korean"));
        assert!(prompt.contains("8 to 12 complete sentences"));
        assert!(prompt.contains("{\"titleKo\""));
        assert!(!prompt.contains("{language}"));
    }

    #[test]
    fn test_parse_strict_json() {
        let parsed = parse_summary_content(r#"{"titleKo": "금리 인상", "summary": "중앙은행이 금리를 올렸다."}"#).unwrap();
        assert_eq!(parsed.translated_title, "금리 인상");
        assert_eq!(parsed.summary, "중앙은행이 금리를 올렸다.");
    }

    #[test]
    fn test_parse_embedded_object() {
        let content = "Sure! Here is the result:\n```json\n{\"titleKo\": \"제목\", \"summary\": \"요약입니다.\"}\n```\nLet me know.";
        let parsed = parse_summary_content(content).unwrap();
        assert_eq!(parsed.translated_title, "제목");
        assert_eq!(parsed.summary, "요약입니다.");
    }

    #[test]
    fn test_parse_aliases_and_lines() {
        let parsed = parse_summary_content(r#"{"translatedTitle": "T", "summary": ["One.", "Two."]}"#).unwrap();
        assert_eq!(parsed.translated_title, "T");
        assert_eq!(parsed.summary, "One. Two.");
    }

    #[test]
    fn test_parse_reply_echoing_original_title() {
        let parsed = parse_summary_content(
            r#"{"title": "Rates rise", "titleKo": "금리 인상", "summary": "중앙은행이 금리를 올렸다."}"#,
        )
        .unwrap();
        assert_eq!(parsed.translated_title, "금리 인상");
        assert_eq!(parsed.summary, "중앙은행이 금리를 올렸다.");

        let parsed = parse_summary_content(
            r#"{"title": "Rates rise", "translatedTitle": " ", "summary": "Body."}"#,
        )
        .unwrap();
        assert_eq!(parsed.translated_title, "Rates rise");
    }

    #[test]
    fn test_parse_rejects_garbage_and_empty() {
        assert!(matches!(
            parse_summary_content("I cannot help with that."),
            Err(RemoteSummaryError::Malformed(_))
        ));
        assert!(matches!(
            parse_summary_content(r#"{"titleKo": "T", "summary": "  "}"#),
            Err(RemoteSummaryError::Malformed(_))
        ));
        assert!(matches!(
            parse_summary_content(r#"{"titleKo": "T"}"#),
            Err(RemoteSummaryError::Malformed(_))
        ));
    }

    #[test]
    fn test_extract_json_object() {
        assert_eq!(extract_json_object("x {\"a\": {\"b\": 1}} y"), Some("{\"a\": {\"b\": 1}}"));
        assert_eq!(extract_json_object("} nothing {"), None);
        assert_eq!(extract_json_object("none"), None);
    }

    fn client_for(server: &mockito::ServerGuard) -> ChatClient {
        let mut config = ChatClientConfig::new("test-key");
        config.base_url = server.url();
        config.timeout = Duration::from_secs(5);
        ChatClient::new(config).unwrap()
    }

    #[tokio::test]
    async fn test_chat_client_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer test-key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "choices": [{
                        "message": {
                            "role": "assistant",
                            "content": "{\"titleKo\": \"화성 탐사\", \"summary\": \"탐사선이 착륙했다.\"}"
                        },
                        "finish_reason": "stop"
                    }]
                }"#,
            )
            .create_async()
            .await;

        let client = client_for(&server);
        let request = SummaryRequest {
            title: "Mars lander",
            text: "The lander touched down.",
            band: BAND,
        };
        let summary = client.summarize(&request).await.unwrap();

        assert_eq!(summary.translated_title, "화성 탐사");
        assert_eq!(summary.summary, "탐사선이 착륙했다.");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_chat_client_status_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(401)
            .with_body("invalid api key")
            .create_async()
            .await;

        let client = client_for(&server);
        let request = SummaryRequest {
            title: "T",
            text: "Body.",
            band: BAND,
        };
        let err = client.summarize(&request).await.unwrap_err();
        assert!(matches!(err, RemoteSummaryError::Status { status: 401, .. }));
    }

    #[tokio::test]
    async fn test_chat_client_no_choices() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices": []}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let request = SummaryRequest {
            title: "T",
            text: "Body.",
            band: BAND,
        };
        let err = client.summarize(&request).await.unwrap_err();
        assert!(matches!(err, RemoteSummaryError::EmptyResponse));
    }
}
