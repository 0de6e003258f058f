//! OpenAI-compatible chat-completions client used as the [`Summarizer`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::Summarizer;
use crate::error::SummaryError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const SYSTEM_PROMPT: &str = "You summarize news and blog entries. \
Reply with two or three plain sentences covering the main point of the entry. \
No preamble, no markdown, no opinions.";

/// Connection details for the summary service.
#[derive(Debug, Clone)]
pub struct SummarizerSettings {
    /// Base URL, e.g. `https://api.openai.com/v1`.
    pub api_base: String,
    pub api_key: String,
    pub model: String,
    pub max_output_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct OpenAiSummarizer {
    client: Client,
    endpoint: String,
    settings: SummarizerSettings,
}

impl OpenAiSummarizer {
    pub fn new(settings: SummarizerSettings) -> Result<Self, SummaryError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        let endpoint = format!("{}/chat/completions", settings.api_base.trim_end_matches('/'));
        Ok(Self {
            client,
            endpoint,
            settings,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn user_prompt(title: &str, body: &str) -> String {
    format!("Title: {title}\n\n{body}")
}

fn build_request<'a>(settings: &'a SummarizerSettings, prompt: &'a str) -> ChatRequest<'a> {
    ChatRequest {
        model: &settings.model,
        messages: [
            ChatMessage {
                role: "system",
                content: SYSTEM_PROMPT,
            },
            ChatMessage {
                role: "user",
                content: prompt,
            },
        ],
        max_tokens: settings.max_output_tokens,
        temperature: 0.3,
    }
}

/// First non-blank choice, trimmed.
fn extract_text(response: ChatResponse) -> Result<String, SummaryError> {
    response
        .choices
        .into_iter()
        .filter_map(|c| c.message.content)
        .map(|text| text.trim().to_string())
        .find(|text| !text.is_empty())
        .ok_or(SummaryError::EmptyResponse)
}

#[async_trait]
impl Summarizer for OpenAiSummarizer {
    async fn summarize(&self, title: &str, body: &str) -> Result<String, SummaryError> {
        let prompt = user_prompt(title, body);
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.settings.api_key)
            .json(&build_request(&self.settings, &prompt))
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let body = response.text().await.unwrap_or_default();
            return Err(SummaryError::RateLimited(body));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SummaryError::Status { status, body });
        }

        let parsed: ChatResponse = response.json().await?;
        let text = extract_text(parsed)?;
        debug!(chars = text.len(), "summary received");
        Ok(text)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> SummarizerSettings {
        SummarizerSettings {
            api_base: "https://api.example.com/v1/".into(),
            api_key: "sk-test".into(),
            model: "small-model".into(),
            max_output_tokens: 200,
        }
    }

    #[test]
    fn endpoint_joins_base_without_double_slash() {
        let summarizer = OpenAiSummarizer::new(settings()).unwrap();
        assert_eq!(summarizer.endpoint(), "https://api.example.com/v1/chat/completions");
    }

    #[test]
    fn request_body_has_system_and_user_messages() {
        let settings = settings();
        let prompt = user_prompt("Headline", "Body text");
        let json = serde_json::to_value(build_request(&settings, &prompt)).unwrap();

        assert_eq!(json["model"], "small-model");
        assert_eq!(json["max_tokens"], 200);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["messages"][1]["content"], "Title: Headline\n\nBody text");
    }

    #[test]
    fn extract_text_trims_first_choice() {
        let response: ChatResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"  A summary.\n"}}]}"#,
        )
        .unwrap();
        assert_eq!(extract_text(response).unwrap(), "A summary.");
    }

    #[test]
    fn extract_text_rejects_blank_output() {
        let blank: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":"   "}}]}"#).unwrap();
        assert!(matches!(extract_text(blank), Err(SummaryError::EmptyResponse)));

        let none: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(matches!(extract_text(none), Err(SummaryError::EmptyResponse)));
    }
}
