// Claude backend with tool-enabled library search
//
// Talks to Anthropic's messages API. Instead of enumerating the library
// into one giant prompt, the model is handed search tools and queries the
// library incrementally; the final answer addresses real library indices.

use std::time::Duration;

use log::{debug, info};
use reqwest::{header, Client};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::ai::error::GenerateError;
use crate::ai::tool_loop::{
    initial_request_message, run_tool_loop, ModelStep, ToolDialog,
};
use crate::ai::tools::{anthropic_tool_definitions, ToolCall, ToolOutcome};
use crate::ai::StreamSink;
use crate::library::Track;
use crate::search::LibrarySearch;

const CLAUDE_API_URL: &str = "https://api.anthropic.com/v1/messages";
const CLAUDE_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 4096;

/// Model presets for easy selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaudeModel {
    /// Haiku, fastest and cheapest.
    Fast,
    /// Sonnet 3.5, good balance of speed and quality.
    Balanced,
    /// Sonnet 4.5, highest quality.
    Best,
}

impl ClaudeModel {
    pub fn model_id(self) -> &'static str {
        match self {
            ClaudeModel::Fast => "claude-3-5-haiku-20241022",
            ClaudeModel::Balanced => "claude-3-5-sonnet-20240620",
            ClaudeModel::Best => "claude-sonnet-4-5-20250929",
        }
    }

    /// Parse a preset name; unrecognized values fall back to Fast.
    pub fn parse_preset(preset: &str) -> Self {
        match preset.to_lowercase().as_str() {
            "balanced" | "sonnet" => ClaudeModel::Balanced,
            "best" | "opus" => ClaudeModel::Best,
            _ => ClaudeModel::Fast,
        }
    }
}

/// Response envelope for one messages-API turn.
#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<Value>,
    #[serde(default)]
    stop_reason: Option<String>,
}

pub struct ClaudeBackend {
    api_key: String,
    model: String,
    client: Client,
}

impl ClaudeBackend {
    pub fn new(api_key: String, model: ClaudeModel) -> Self {
        Self::with_model(api_key, model.model_id().to_string())
    }

    /// Use a full model id instead of a preset.
    pub fn with_model(api_key: String, model: String) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            // Tool turns carry the whole conversation; give them room.
            .timeout(Duration::from_secs(90))
            .build()
            .expect("Failed to create HTTP client");
        Self {
            api_key,
            model,
            client,
        }
    }

    pub fn name(&self) -> String {
        format!("Claude API ({})", self.model)
    }

    pub fn validate(&self) -> Result<(), GenerateError> {
        if self.api_key.is_empty() {
            return Err(GenerateError::MissingCredential("ANTHROPIC_API_KEY"));
        }
        Ok(())
    }

    pub async fn generate(
        &self,
        user_request: &str,
        library: &[Track],
        sink: Option<&mut dyn StreamSink>,
        verbose: bool,
    ) -> Result<Vec<usize>, GenerateError> {
        if library.is_empty() {
            return Err(GenerateError::EmptyLibrary);
        }
        self.validate()?;

        info!("Claude backend: generating playlist for prompt: '{user_request}'");
        info!("using tool-enabled search across {} tracks", library.len());

        let search = LibrarySearch::new(library);
        let mut dialog = ClaudeDialog {
            client: &self.client,
            api_key: &self.api_key,
            model: &self.model,
            verbose,
            messages: vec![json!({
                "role": "user",
                "content": initial_request_message(user_request, library.len()),
            })],
        };

        let playlist = run_tool_loop(&mut dialog, &search, sink).await?;
        info!("generated playlist with {} tracks", playlist.len());
        Ok(playlist)
    }
}

struct ClaudeDialog<'a> {
    client: &'a Client,
    api_key: &'a str,
    model: &'a str,
    verbose: bool,
    messages: Vec<Value>,
}

impl ToolDialog for ClaudeDialog<'_> {
    async fn step(&mut self) -> Result<ModelStep, GenerateError> {
        let request_body = json!({
            "model": self.model,
            "max_tokens": MAX_TOKENS,
            "messages": self.messages,
            "tools": anthropic_tool_definitions(),
        });

        let response = self
            .client
            .post(CLAUDE_API_URL)
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-api-key", self.api_key)
            .header("anthropic-version", CLAUDE_VERSION)
            .json(&request_body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(GenerateError::Http { status, body });
        }

        let body = response.text().await?;
        if self.verbose {
            debug!("Claude response: {body}");
        }
        let envelope: MessagesResponse = serde_json::from_str(&body)
            .map_err(|e| GenerateError::MalformedEnvelope(e.to_string()))?;

        // Keep the assistant content verbatim so tool_use ids survive the
        // round trip.
        self.messages.push(json!({
            "role": "assistant",
            "content": envelope.content.clone(),
        }));

        classify_turn(&envelope)
    }

    fn record_tool_outcomes(&mut self, outcomes: &[ToolOutcome]) {
        let results: Vec<Value> = outcomes
            .iter()
            .map(|outcome| {
                json!({
                    "type": "tool_result",
                    "tool_use_id": outcome.id,
                    "content": outcome.payload.to_string(),
                })
            })
            .collect();
        self.messages.push(json!({
            "role": "user",
            "content": results,
        }));
    }
}

fn classify_turn(envelope: &MessagesResponse) -> Result<ModelStep, GenerateError> {
    match envelope.stop_reason.as_deref() {
        Some("tool_use") => {
            let calls: Vec<ToolCall> = envelope
                .content
                .iter()
                .filter(|block| block["type"] == "tool_use")
                .map(|block| ToolCall {
                    id: block["id"].as_str().unwrap_or_default().to_string(),
                    name: block["name"].as_str().unwrap_or_default().to_string(),
                    // Arguments arrive as a native JSON object on this wire.
                    arguments: Ok(block["input"].clone()),
                })
                .collect();
            if calls.is_empty() {
                return Err(GenerateError::MalformedEnvelope(
                    "stop_reason tool_use without tool_use blocks".to_string(),
                ));
            }
            Ok(ModelStep::ToolCalls(calls))
        }
        Some("end_turn") => {
            let text = envelope
                .content
                .iter()
                .find(|block| block["type"] == "text")
                .and_then(|block| block["text"].as_str())
                .ok_or_else(|| {
                    GenerateError::MalformedEnvelope("end_turn without text block".to_string())
                })?;
            Ok(ModelStep::Final(text.to_string()))
        }
        other => Err(GenerateError::MalformedEnvelope(format!(
            "unexpected stop_reason: {}",
            other.unwrap_or("<missing>")
        ))),
    }
}
