//! reqwest-based [`Analyzer`](crate::Analyzer) for the Anthropic Messages API.

use std::time::Instant;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ProviderConfig;
use crate::observability::record_provider_request;
use crate::{AnalysisError, Analyzer};

pub const ANTHROPIC_VERSION: &str = "2023-06-01";

const SYSTEM_PROMPT: &str =
    "You are a helpful AI assistant that analyzes daily transcripts and provides structured insights.";

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: [Message<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

#[derive(Clone, Debug)]
pub struct AnthropicAnalyzer {
    base_url: String,
    api_key: SecretString,
    model: String,
    max_tokens: u32,
    temperature: f32,
    client: reqwest::Client,
}

impl AnthropicAnalyzer {
    pub fn new(config: &ProviderConfig) -> Result<Self, AnalysisError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            client,
        })
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.base_url)
    }

    async fn request(&self, prompt: &str) -> Result<String, AnalysisError> {
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            system: SYSTEM_PROMPT,
            messages: [Message {
                role: "user",
                content: prompt,
            }],
        };
        let resp = self
            .client
            .post(self.messages_url())
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let body_snippet: String = text.chars().take(256).collect();
            return Err(AnalysisError::from_status(status.as_u16(), body_snippet));
        }

        let text = resp.text().await?;
        let reply: MessagesResponse = serde_json::from_str(&text).map_err(|e| {
            let body_snippet: String = text.chars().take(256).collect();
            AnalysisError::InvalidReply(format!("{e} - body: {body_snippet}"))
        })?;
        if reply.stop_reason.as_deref() == Some("refusal") {
            return Err(AnalysisError::SafetyBlocked);
        }
        let joined: String = reply
            .content
            .into_iter()
            .filter(|block| block.block_type == "text")
            .filter_map(|block| block.text)
            .collect();
        if joined.trim().is_empty() {
            return Err(AnalysisError::EmptyResponse);
        }
        Ok(joined)
    }
}

fn outcome_tag(result: &Result<String, AnalysisError>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(AnalysisError::Http(_)) => "transport",
        Err(AnalysisError::Auth(_)) => "auth",
        Err(AnalysisError::RateLimited(_)) => "rate_limited",
        Err(AnalysisError::Server { .. }) => "server",
        Err(AnalysisError::SafetyBlocked) => "refusal",
        Err(AnalysisError::EmptyResponse) => "empty",
        Err(AnalysisError::InvalidReply(_)) => "invalid",
        Err(_) => "status",
    }
}

#[async_trait]
impl Analyzer for AnthropicAnalyzer {
    async fn analyze(&self, prompt: &str) -> Result<String, AnalysisError> {
        let started = Instant::now();
        let result = self.request(prompt).await;
        debug!(
            model = %self.model,
            elapsed_ms = started.elapsed().as_millis() as u64,
            outcome = outcome_tag(&result),
            "anthropic request finished"
        );
        record_provider_request(outcome_tag(&result));
        result
    }
}
