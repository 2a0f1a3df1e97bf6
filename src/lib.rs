// vibelist - AI playlist curation engine
//
// Turns a natural-language listening request plus a track library into an
// ordered selection of tracks. Callers bring their own library (scanner,
// tag reader, cloud listing) and their own presentation layer; this crate
// owns the generation backends, the library search tools exposed to
// function-calling models, and the response-to-index translation.

// Modules
pub mod ai;
pub mod library;
pub mod search;

pub use ai::{
    ClaudeBackend, ClaudeModel, CredentialManager, GenerateError, Generator, KeywordBackend,
    LocalBackend, LocalConfig, OpenAiBackend, OpenAiModel, PromptConfig, Provider,
    SingleShotBackend, StreamSink,
};
pub use library::Track;
pub use search::{LibrarySearch, SearchResult};
