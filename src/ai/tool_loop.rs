// Multi-turn tool conversation protocol
//
// Drives a bounded conversation with a function-calling model: each turn
// either requests tool invocations (dispatched against the search engine,
// results fed back) or delivers the final answer. The wire schema lives
// behind the ToolDialog trait so the Anthropic and OpenAI flavors share
// this loop unchanged.
//
// Unlike the single-shot path there is no sampled-subset remapping here:
// tools hand the model real library indices on demand, so the final
// answer addresses the original library directly with 0-based indices.

use log::{debug, info};

use crate::ai::error::GenerateError;
use crate::ai::prompt::parse_absolute_indices;
use crate::ai::tools::{dispatch_tool_call, ToolCall, ToolOutcome};
use crate::ai::StreamSink;
use crate::search::LibrarySearch;

/// Hard cap on conversation turns. A remote model can oscillate between
/// tool calls forever on an ambiguous request; this bound turns that into
/// a clean failure instead of an infinite loop.
pub(crate) const MAX_TOOL_TURNS: usize = 10;

/// What one model turn asked for.
pub(crate) enum ModelStep {
    /// The model wants these tools executed before continuing.
    ToolCalls(Vec<ToolCall>),
    /// The model produced its final text answer.
    Final(String),
}

/// One provider-specific conversation. Implementations own the message
/// history for the duration of a single generate() call and drop it
/// afterwards.
pub(crate) trait ToolDialog {
    /// Send the accumulated history plus tool declarations, append the
    /// assistant reply to the history, and classify it. Transport and
    /// HTTP failures abort the whole loop; there is no mid-loop retry.
    async fn step(&mut self) -> Result<ModelStep, GenerateError>;

    /// Append tool results to the history, matched to their call ids.
    fn record_tool_outcomes(&mut self, outcomes: &[ToolOutcome]);
}

/// The opening user message for a tool conversation.
pub(crate) fn initial_request_message(user_request: &str, library_size: usize) -> String {
    format!(
        "You are a music playlist curator with access to search tools for a music library \
         of {library_size} tracks.\n\n\
         User's request: \"{user_request}\"\n\n\
         Use the provided search tools to find tracks that match the user's request. \
         You can search by artist, genre, album, title, or year range. \
         Start by using get_library_overview to understand what's available, \
         then use specific searches to find matching tracks.\n\n\
         Once you've found suitable tracks, respond with a JSON array of track indices \
         (0-based) that best match the request. Select 10-50 tracks that fit the description.\n\
         Example final response: [42, 156, 892, 1043, ...]"
    )
}

/// Run the conversation to completion within the turn budget.
pub(crate) async fn run_tool_loop<D: ToolDialog>(
    dialog: &mut D,
    search: &LibrarySearch<'_>,
    mut sink: Option<&mut dyn StreamSink>,
) -> Result<Vec<usize>, GenerateError> {
    for turn in 0..MAX_TOOL_TURNS {
        debug!("tool conversation turn {}/{}", turn + 1, MAX_TOOL_TURNS);

        match dialog.step().await? {
            ModelStep::ToolCalls(calls) => {
                info!("model requested {} tool call(s)", calls.len());
                let outcomes: Vec<ToolOutcome> = calls
                    .iter()
                    .map(|call| dispatch_tool_call(call, search))
                    .collect();
                dialog.record_tool_outcomes(&outcomes);
            }
            ModelStep::Final(text) => {
                debug!("final model answer: {text}");
                if let Some(sink) = sink.as_deref_mut() {
                    sink.push(&text, true);
                }
                return parse_absolute_indices(&text, search.library_len());
            }
        }
    }

    Err(GenerateError::TurnBudgetExceeded(MAX_TOOL_TURNS))
}
