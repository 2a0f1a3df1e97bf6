// AI playlist generation
//
// This module provides:
// - A closed set of generation backends behind one interface
// - Prompt construction and response-to-index translation
// - The multi-turn tool-call protocol for function-calling models
// - Secure credential storage via OS keychain

pub mod claude;
pub mod credentials;
pub mod error;
pub mod keyword;
pub mod local;
pub mod openai;
pub mod prompt;
pub mod sampler;
pub mod single_shot;
mod tool_loop;
mod tools;

// Re-export commonly used types
pub use claude::{ClaudeBackend, ClaudeModel};
pub use credentials::{CredentialManager, Provider};
pub use error::GenerateError;
pub use keyword::KeywordBackend;
pub use local::{InferenceSession, LocalBackend, LocalConfig, ModelRuntime};
pub use openai::{OpenAiBackend, OpenAiModel};
pub use prompt::PromptConfig;
pub use single_shot::SingleShotBackend;

use crate::library::Track;

/// Receives generation output as it becomes available. `is_final` is
/// false for incremental chunks and true exactly once, carrying the
/// complete response text. Callbacks run synchronously on the calling
/// task; there is no buffering behind this.
pub trait StreamSink {
    fn push(&mut self, chunk: &str, is_final: bool);
}

impl<F: FnMut(&str, bool)> StreamSink for F {
    fn push(&mut self, chunk: &str, is_final: bool) {
        self(chunk, is_final)
    }
}

/// The available generation backends as one tagged set. Callers pick a
/// variant from configuration and drive it through the shared interface;
/// `generate` returns ordered indices into the supplied library.
pub enum Generator {
    SingleShot(SingleShotBackend),
    ClaudeTools(ClaudeBackend),
    OpenAiTools(OpenAiBackend),
    Local(LocalBackend),
    Keyword(KeywordBackend),
}

impl Generator {
    /// Backend name for display and logging.
    pub fn name(&self) -> String {
        match self {
            Generator::SingleShot(b) => b.name(),
            Generator::ClaudeTools(b) => b.name(),
            Generator::OpenAiTools(b) => b.name(),
            Generator::Local(b) => b.name(),
            Generator::Keyword(b) => b.name(),
        }
    }

    /// Check the backend is ready to run (credentials present, model
    /// file in place) without performing any generation.
    pub fn validate(&self) -> Result<(), GenerateError> {
        match self {
            Generator::SingleShot(b) => b.validate(),
            Generator::ClaudeTools(b) => b.validate(),
            Generator::OpenAiTools(b) => b.validate(),
            Generator::Local(b) => b.validate(),
            Generator::Keyword(b) => b.validate(),
        }
    }

    /// Generate an ordered track selection for `user_request`.
    ///
    /// Blocks (awaits) until the backend finishes or fails; there is no
    /// cancellation below this interface. `verbose` surfaces diagnostic
    /// detail and never changes the result.
    pub async fn generate(
        &mut self,
        user_request: &str,
        library: &[Track],
        sink: Option<&mut dyn StreamSink>,
        verbose: bool,
    ) -> Result<Vec<usize>, GenerateError> {
        match self {
            Generator::SingleShot(b) => b.generate(user_request, library, sink, verbose).await,
            Generator::ClaudeTools(b) => b.generate(user_request, library, sink, verbose).await,
            Generator::OpenAiTools(b) => b.generate(user_request, library, sink, verbose).await,
            Generator::Local(b) => b.generate(user_request, library, sink, verbose).await,
            Generator::Keyword(b) => b.generate(user_request, library, sink, verbose).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::testing::track;

    #[test]
    fn names_identify_the_variant() {
        let keyword = Generator::Keyword(KeywordBackend::new());
        assert_eq!(keyword.name(), "Keyword Matching");

        let claude = Generator::ClaudeTools(ClaudeBackend::new(
            "sk-ant-x".to_string(),
            ClaudeModel::Fast,
        ));
        assert!(claude.name().contains("claude-3-5-haiku"));
    }

    #[test]
    fn keyword_variant_always_validates() {
        let generator = Generator::Keyword(KeywordBackend::new());
        assert!(generator.validate().is_ok());
    }

    #[tokio::test]
    async fn dispatch_reaches_the_wrapped_backend() {
        let library = vec![
            track(Some("Bowie"), Some("Heroes"), None, None, Some(1977)),
            track(Some("Beatles"), Some("Let It Be"), None, None, Some(1970)),
        ];
        let mut generator = Generator::Keyword(KeywordBackend::new());
        let playlist = generator
            .generate("classic bowie", &library, None, false)
            .await
            .unwrap();
        assert_eq!(playlist[0], 0);
    }
}
