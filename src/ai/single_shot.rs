// Single-shot prompt backend
//
// The whole (possibly sampled) library is rendered into one prompt and
// answered in a single chat completion; no tools, no conversation. This
// is the only variant with an outer retry: transport and HTTP failures
// get one more attempt after a fixed delay, everything else fails fast.

use std::time::Duration;

use log::{debug, info, warn};
use reqwest::{header, Client};
use serde_json::json;

use crate::ai::error::GenerateError;
use crate::ai::openai::{ChatResponse, OpenAiModel, OPENAI_API_URL};
use crate::ai::prompt::{build_prompt, parse_row_numbers, PromptConfig};
use crate::ai::StreamSink;
use crate::library::Track;

/// Two attempts total: the original call plus one retry.
const MAX_ATTEMPTS: u32 = 2;
const RETRY_DELAY: Duration = Duration::from_secs(2);

/// The remote model handles large contexts, so enumerate generously.
const MAX_TRACKS_IN_PROMPT: usize = 2000;

pub struct SingleShotBackend {
    api_key: String,
    model: String,
    client: Client,
}

impl SingleShotBackend {
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
        format!("Single-shot prompt ({})", self.model)
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
        mut sink: Option<&mut dyn StreamSink>,
        verbose: bool,
    ) -> Result<Vec<usize>, GenerateError> {
        if library.is_empty() {
            return Err(GenerateError::EmptyLibrary);
        }
        self.validate()?;

        info!("single-shot backend: generating playlist for prompt: '{user_request}'");
        info!("library size: {} tracks", library.len());

        let config = PromptConfig {
            max_tracks_in_prompt: MAX_TRACKS_IN_PROMPT,
            ..PromptConfig::default()
        };
        let (prompt, sampled_indices) = build_prompt(user_request, library, &config);
        debug!("prompt built with {} tracks", sampled_indices.len());
        if verbose {
            debug!("prompt:\n{prompt}");
        }

        let mut attempt = 1;
        let content = loop {
            match self.complete_once(&prompt).await {
                Ok(content) => break content,
                Err(e) if e.is_retryable() && attempt < MAX_ATTEMPTS => {
                    warn!("attempt {attempt}/{MAX_ATTEMPTS} failed, retrying: {e}");
                    tokio::time::sleep(RETRY_DELAY).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        };

        debug!("model response: {content}");
        if let Some(sink) = sink.as_deref_mut() {
            sink.push(&content, true);
        }

        let playlist = parse_row_numbers(&content, &sampled_indices)?;
        info!("generated playlist with {} tracks", playlist.len());
        Ok(playlist)
    }

    async fn complete_once(&self, prompt: &str) -> Result<String, GenerateError> {
        let request_body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": 0.7,
            "max_tokens": 1024,
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
        let envelope: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| GenerateError::MalformedEnvelope(e.to_string()))?;
        let choice = envelope.choices.into_iter().next().ok_or_else(|| {
            GenerateError::MalformedEnvelope("no choices in API response".to_string())
        })?;
        let content = choice.message["content"].as_str().unwrap_or_default();
        if content.trim().is_empty() {
            return Err(GenerateError::MalformedEnvelope(
                "empty message content".to_string(),
            ));
        }
        Ok(content.to_string())
    }
}
