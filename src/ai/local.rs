// Local model backend
//
// Runs generation against an in-process inference runtime instead of a
// remote API. The runtime itself (llama.cpp bindings, an ONNX session,
// a test double) is a collaborator behind two small traits; this module
// owns prompt sizing, the sampling loop, token streaming and the model
// lifecycle. Local context windows are tight, so the prompt enumerates
// far fewer tracks than the remote backends.

use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::ai::error::GenerateError;
use crate::ai::prompt::{build_prompt, parse_row_numbers, PromptConfig};
use crate::ai::sampler::SamplerChain;
use crate::ai::StreamSink;
use crate::library::Track;

/// Tuning for the local model and its sampling loop.
#[derive(Debug, Clone)]
pub struct LocalConfig {
    pub context_size: usize,
    pub threads: usize,
    pub temperature: f32,
    pub top_k: usize,
    pub top_p: f32,
    /// Upper bound on generated tokens per call.
    pub max_tokens: usize,
    /// Conservative by default; local context windows are small.
    pub max_tracks_in_prompt: usize,
    /// Fixed sampling seed for reproducible runs; None draws from entropy.
    pub seed: Option<u64>,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            context_size: 2048,
            threads: 4,
            temperature: 0.7,
            top_k: 40,
            top_p: 0.95,
            max_tokens: 1024,
            max_tracks_in_prompt: 50,
            seed: None,
        }
    }
}

/// A loaded model ready to decode tokens. One session serves one
/// generate() call at a time; the `&mut` receivers make concurrent use
/// of a single backend instance a compile error.
pub trait InferenceSession {
    fn tokenize(&self, text: &str) -> Result<Vec<u32>, String>;

    /// Feed a batch of tokens through the model, updating its state so
    /// `last_logits` reflects the final token of the batch.
    fn decode(&mut self, tokens: &[u32]) -> Result<(), String>;

    /// Next-token logits over the vocabulary, one entry per token id.
    fn last_logits(&self) -> Vec<f32>;

    fn token_text(&self, token: u32) -> String;

    fn is_end_of_generation(&self, token: u32) -> bool;

    fn context_size(&self) -> usize;
}

/// Loads model files into sessions. Implemented by the embedding
/// application over its inference library of choice.
pub trait ModelRuntime {
    fn load(
        &self,
        model_path: &Path,
        config: &LocalConfig,
    ) -> Result<Box<dyn InferenceSession>, String>;
}

pub struct LocalBackend {
    model_path: PathBuf,
    config: LocalConfig,
    runtime: Box<dyn ModelRuntime>,
    session: Option<Box<dyn InferenceSession>>,
}

impl LocalBackend {
    pub fn new(model_path: impl Into<PathBuf>, runtime: Box<dyn ModelRuntime>) -> Self {
        Self {
            model_path: model_path.into(),
            config: LocalConfig::default(),
            runtime,
            session: None,
        }
    }

    pub fn set_config(&mut self, config: LocalConfig) {
        self.config = config;
    }

    pub fn name(&self) -> String {
        format!("Local model ({})", self.model_path.display())
    }

    pub fn validate(&self) -> Result<(), GenerateError> {
        if !self.model_path.exists() {
            return Err(GenerateError::ModelLoad(format!(
                "model file not found: {}",
                self.model_path.display()
            )));
        }
        if !self.model_path.is_file() {
            return Err(GenerateError::ModelLoad(format!(
                "model path is not a file: {}",
                self.model_path.display()
            )));
        }
        Ok(())
    }

    /// Load the model and create the inference session if that has not
    /// happened yet. Calling this twice is a no-op, not an error.
    pub fn ensure_initialized(&mut self) -> Result<(), GenerateError> {
        if self.session.is_some() {
            debug!("model already initialized");
            return Ok(());
        }
        info!("loading local model from {}", self.model_path.display());
        let session = self
            .runtime
            .load(&self.model_path, &self.config)
            .map_err(GenerateError::ModelLoad)?;
        self.session = Some(session);
        info!("local model initialized");
        Ok(())
    }

    /// Tear down the model and its context. The next generate() call
    /// re-initializes from scratch.
    pub fn cleanup(&mut self) {
        if self.session.take().is_some() {
            debug!("released local inference session");
        }
    }

    pub async fn generate(
        &mut self,
        user_request: &str,
        library: &[Track],
        mut sink: Option<&mut dyn StreamSink>,
        verbose: bool,
    ) -> Result<Vec<usize>, GenerateError> {
        if library.is_empty() {
            return Err(GenerateError::EmptyLibrary);
        }
        self.validate()?;

        let config = PromptConfig {
            max_tracks_in_prompt: self.config.max_tracks_in_prompt,
            ..PromptConfig::default()
        };
        let (prompt, sampled_indices) = build_prompt(user_request, library, &config);

        info!("local backend: generating playlist for prompt: '{user_request}'");
        debug!(
            "sampled {} tracks from {} total",
            sampled_indices.len(),
            library.len()
        );
        if verbose {
            debug!("prompt:\n{prompt}");
        }

        self.ensure_initialized()?;

        let response_text = self.generate_text(&prompt, sink.as_deref_mut())?;
        if response_text.is_empty() {
            warn!("model produced no output before end of generation");
            return Err(GenerateError::NoParseableArray);
        }
        debug!("local model response:\n{response_text}");

        let playlist = parse_row_numbers(&response_text, &sampled_indices)?;
        info!("generated playlist with {} tracks", playlist.len());
        Ok(playlist)
    }

    fn generate_text(
        &mut self,
        prompt: &str,
        mut sink: Option<&mut (dyn StreamSink + '_)>,
    ) -> Result<String, GenerateError> {
        // ensure_initialized ran just before; treat absence as a fault.
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| GenerateError::ModelLoad("session not initialized".to_string()))?;

        let prompt_tokens = session
            .tokenize(prompt)
            .map_err(GenerateError::ModelLoad)?;
        debug!("tokenized prompt into {} tokens", prompt_tokens.len());

        let context_size = session.context_size();
        if prompt_tokens.len() >= context_size {
            return Err(GenerateError::PromptTooLarge {
                tokens: prompt_tokens.len(),
                limit: context_size,
            });
        }

        session
            .decode(&prompt_tokens)
            .map_err(GenerateError::ModelLoad)?;

        let chain = SamplerChain {
            top_k: self.config.top_k,
            top_p: self.config.top_p,
            temperature: self.config.temperature,
        };
        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut generated = String::new();
        let mut position = prompt_tokens.len();

        for n in 0..self.config.max_tokens {
            let logits = session.last_logits();
            let token = chain.sample(&logits, &mut rng) as u32;

            if session.is_end_of_generation(token) {
                debug!("end of generation after {n} tokens");
                break;
            }

            let piece = session.token_text(token);
            generated.push_str(&piece);
            if let Some(sink) = sink.as_deref_mut() {
                sink.push(&piece, false);
            }

            if position >= context_size {
                warn!("reached context limit mid-generation");
                break;
            }

            if let Err(e) = session.decode(&[token]) {
                warn!("decode failed mid-generation: {e}");
                break;
            }
            position += 1;
        }

        if let Some(sink) = sink.as_deref_mut() {
            sink.push(&generated, true);
        }
        Ok(generated)
    }
}

impl Drop for LocalBackend {
    fn drop(&mut self) {
        self.cleanup();
    }
}
