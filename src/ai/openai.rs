// OpenAI backend with tool-enabled library search
//
// Same conversation protocol as the Claude backend, different wire
// schema: tools are declared as "function" entries, tool results travel
// as role "tool" messages, and function arguments arrive as a JSON
// string that must itself be parsed (double-encoded). A call whose
// arguments string fails to parse is recorded as malformed; the rest of
// the turn still executes.

use std::time::Duration;

use log::{debug, info};
use reqwest::{header, Client};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::ai::error::GenerateError;
use crate::ai::tool_loop::{
    initial_request_message, run_tool_loop, ModelStep, ToolDialog,
};
use crate::ai::tools::{openai_tool_definitions, ToolCall, ToolOutcome};
use crate::ai::StreamSink;
use crate::library::Track;
use crate::search::LibrarySearch;

pub(crate) const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Model presets for easy selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenAiModel {
    /// GPT-4o Mini, fastest and cheapest.
    Fast,
    /// GPT-4o, good balance of speed and quality.
    Balanced,
    /// GPT-4, highest quality.
    Best,
}

impl OpenAiModel {
    pub fn model_id(self) -> &'static str {
        match self {
            OpenAiModel::Fast => "gpt-4o-mini",
            OpenAiModel::Balanced => "gpt-4o",
            OpenAiModel::Best => "gpt-4",
        }
    }

    /// Parse a preset name; unrecognized values fall back to Fast.
    pub fn parse_preset(preset: &str) -> Self {
        match preset.to_lowercase().as_str() {
            "balanced" | "gpt-4o" => OpenAiModel::Balanced,
            "best" | "gpt-4" => OpenAiModel::Best,
            _ => OpenAiModel::Fast,
        }
    }
}

/// Response envelope for one chat-completions turn.
#[derive(Debug, Deserialize)]
pub(crate) struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatChoice {
    pub message: Value,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

pub struct OpenAiBackend {
    api_key: String,
    model: String,
    client: Client,
}

impl OpenAiBackend {
    pub fn new(api_key: String, model: OpenAiModel) -> Self {
        Self::with_model(api_key, model.model_id().to_string())
    }

    /// Use a full model id instead of a preset.
    pub fn with_model(api_key: String, model: String) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
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
        format!("ChatGPT API ({})", self.model)
    }

    pub fn validate(&self) -> Result<(), GenerateError> {
        if self.api_key.is_empty() {
            return Err(GenerateError::MissingCredential("OPENAI_API_KEY"));
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

        info!("ChatGPT backend: generating playlist for prompt: '{user_request}'");
        info!("using tool-enabled search across {} tracks", library.len());

        let search = LibrarySearch::new(library);
        let mut dialog = OpenAiDialog {
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

struct OpenAiDialog<'a> {
    client: &'a Client,
    api_key: &'a str,
    model: &'a str,
    verbose: bool,
    messages: Vec<Value>,
}

impl ToolDialog for OpenAiDialog<'_> {
    async fn step(&mut self) -> Result<ModelStep, GenerateError> {
        let request_body = json!({
            "model": self.model,
            "messages": self.messages,
            "tools": openai_tool_definitions(),
            "tool_choice": "auto",
            "temperature": 0.7,
        });

        let response = self
            .client
            .post(OPENAI_API_URL)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
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
            debug!("OpenAI response: {body}");
        }
        let envelope: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| GenerateError::MalformedEnvelope(e.to_string()))?;
        let choice = envelope.choices.into_iter().next().ok_or_else(|| {
            GenerateError::MalformedEnvelope("no choices in API response".to_string())
        })?;

        // The assistant message goes back verbatim so tool_call ids
        // survive the round trip.
        self.messages.push(choice.message.clone());

        classify_turn(&choice)
    }

    fn record_tool_outcomes(&mut self, outcomes: &[ToolOutcome]) {
        for outcome in outcomes {
            self.messages.push(json!({
                "role": "tool",
                "tool_call_id": outcome.id,
                "content": outcome.payload.to_string(),
            }));
        }
    }
}

fn classify_turn(choice: &ChatChoice) -> Result<ModelStep, GenerateError> {
    match choice.finish_reason.as_deref() {
        Some("tool_calls") => {
            let Some(wire_calls) = choice.message["tool_calls"].as_array() else {
                return Err(GenerateError::MalformedEnvelope(
                    "finish_reason tool_calls without tool_calls array".to_string(),
                ));
            };
            let calls: Vec<ToolCall> = wire_calls
                .iter()
                .map(|call| {
                    let function = &call["function"];
                    // Double-encoded: the arguments field is a JSON string,
                    // not a native object.
                    let arguments = match function["arguments"].as_str() {
                        Some(raw) => {
                            serde_json::from_str::<Value>(raw).map_err(|e| e.to_string())
                        }
                        None => Err("arguments field is not a string".to_string()),
                    };
                    ToolCall {
                        id: call["id"].as_str().unwrap_or_default().to_string(),
                        name: function["name"].as_str().unwrap_or_default().to_string(),
                        arguments,
                    }
                })
                .collect();
            if calls.is_empty() {
                return Err(GenerateError::MalformedEnvelope(
                    "empty tool_calls array".to_string(),
                ));
            }
            Ok(ModelStep::ToolCalls(calls))
        }
        Some("stop") => {
            let text = choice.message["content"].as_str().ok_or_else(|| {
                GenerateError::MalformedEnvelope("stop without message content".to_string())
            })?;
            Ok(ModelStep::Final(text.to_string()))
        }
        other => Err(GenerateError::MalformedEnvelope(format!(
            "unexpected finish_reason: {}",
            other.unwrap_or("<missing>")
        ))),
    }
}
