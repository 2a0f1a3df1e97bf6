// Failure taxonomy for playlist generation
//
// Every backend recovers its own faults and returns one of these values
// instead of panicking or leaking transport errors. The messages name the
// stage that failed so a caller can tell "fix your API key" apart from
// "try a different prompt".

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("library contains no tracks")]
    EmptyLibrary,

    #[error("no usable keywords in the request")]
    EmptyKeywordSet,

    #[error("no tracks matched the request keywords")]
    NoKeywordMatches,

    /// The named credential (environment variable) is not configured.
    #[error("{0} not set; configure an API key first")]
    MissingCredential(&'static str),

    #[error("network failure: {0}")]
    Transport(String),

    #[error("API returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("malformed response envelope: {0}")]
    MalformedEnvelope(String),

    #[error("no JSON array found in the model output")]
    NoParseableArray,

    #[error("model output contained no valid track selections")]
    EmptyFinalSelection,

    #[error("tool conversation did not finish within {0} turns")]
    TurnBudgetExceeded(usize),

    #[error("prompt needs {tokens} tokens but the context holds only {limit}")]
    PromptTooLarge { tokens: usize, limit: usize },

    #[error("model failure: {0}")]
    ModelLoad(String),
}

impl From<reqwest::Error> for GenerateError {
    fn from(err: reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            "request timed out".to_string()
        } else if err.is_connect() {
            format!("unable to reach the API: {err}")
        } else {
            err.to_string()
        };
        GenerateError::Transport(message)
    }
}

impl GenerateError {
    /// Whether the single-shot backend may retry after this failure.
    /// Only transport and HTTP-status failures are retryable; everything
    /// else would fail the same way again.
    pub(crate) fn is_retryable(&self) -> bool {
        matches!(
            self,
            GenerateError::Transport(_) | GenerateError::Http { .. }
        )
    }
}
