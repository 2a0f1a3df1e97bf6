// Library query tools exposed to function-calling models
//
// One catalogue of six tools, rendered into each provider's declaration
// format, plus the dispatcher that maps a parsed tool call onto the
// search engine. A malformed call produces an error payload for that
// call only; the rest of the turn proceeds.

use log::{debug, warn};
use serde_json::{json, Value};

use crate::search::{LibrarySearch, SearchResult};

/// Cap applied when a tool call does not specify `max_results`.
pub(crate) const DEFAULT_TOOL_RESULTS: usize = 100;

/// How many unique artists/genres the overview tool samples.
const OVERVIEW_SAMPLE: usize = 20;

/// One tool invocation requested by a model turn. `arguments` holds the
/// decoded argument object, or the decode error when the provider sent
/// something unparseable (OpenAI transmits arguments as a JSON-encoded
/// string that must itself be parsed).
#[derive(Debug, Clone)]
pub(crate) struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Result<Value, String>,
}

/// The outcome of one dispatched tool call, ready to be echoed back to
/// the provider against its call id.
#[derive(Debug, Clone)]
pub(crate) struct ToolOutcome {
    pub id: String,
    pub payload: Value,
}

struct ToolSpec {
    name: &'static str,
    description: &'static str,
    parameters: Value,
}

fn catalogue() -> Vec<ToolSpec> {
    fn search_params(field: &str, description: &str) -> Value {
        json!({
            "type": "object",
            "properties": {
                field: {
                    "type": "string",
                    "description": description
                },
                "max_results": {
                    "type": "number",
                    "description": "Maximum number of results to return (default: 100)",
                    "default": 100
                }
            },
            "required": [field]
        })
    }

    vec![
        ToolSpec {
            name: "search_by_artist",
            description: "Search the music library for tracks by a specific artist. \
                          Use this to find all songs by an artist or band.",
            parameters: search_params(
                "artist_name",
                "The name of the artist or band to search for (partial matches supported)",
            ),
        },
        ToolSpec {
            name: "search_by_genre",
            description: "Search the music library for tracks in a specific genre. \
                          Use this to find songs by musical style.",
            parameters: search_params(
                "genre",
                "The genre to search for (e.g., 'rock', 'jazz', 'classical')",
            ),
        },
        ToolSpec {
            name: "search_by_album",
            description: "Search the music library for tracks from a specific album.",
            parameters: search_params(
                "album_name",
                "The name of the album to search for (partial matches supported)",
            ),
        },
        ToolSpec {
            name: "search_by_title",
            description: "Search the music library for tracks by song title or keywords in the title.",
            parameters: search_params(
                "title",
                "The song title or keywords to search for (partial matches supported)",
            ),
        },
        ToolSpec {
            name: "search_by_year_range",
            description: "Search the music library for tracks released within a specific year range.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "start_year": {
                        "type": "number",
                        "description": "The starting year (inclusive)"
                    },
                    "end_year": {
                        "type": "number",
                        "description": "The ending year (inclusive)"
                    },
                    "max_results": {
                        "type": "number",
                        "description": "Maximum number of results to return (default: 100)",
                        "default": 100
                    }
                },
                "required": ["start_year", "end_year"]
            }),
        },
        ToolSpec {
            name: "get_library_overview",
            description: "Get an overview of the music library including total tracks, unique \
                          artists, genres, and albums. Use this first to understand what's available.",
            parameters: json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
        },
    ]
}

/// Tool declarations in the Anthropic messages schema.
pub(crate) fn anthropic_tool_definitions() -> Value {
    Value::Array(
        catalogue()
            .into_iter()
            .map(|tool| {
                json!({
                    "name": tool.name,
                    "description": tool.description,
                    "input_schema": tool.parameters,
                })
            })
            .collect(),
    )
}

/// Tool declarations in the OpenAI chat-completions schema.
pub(crate) fn openai_tool_definitions() -> Value {
    Value::Array(
        catalogue()
            .into_iter()
            .map(|tool| {
                json!({
                    "type": "function",
                    "function": {
                        "name": tool.name,
                        "description": tool.description,
                        "parameters": tool.parameters,
                    },
                })
            })
            .collect(),
    )
}

/// Execute one tool call against the search engine. Never fails: unknown
/// tools and bad arguments come back as `{"error": ...}` payloads so the
/// model can correct itself on the next turn.
pub(crate) fn dispatch_tool_call(call: &ToolCall, search: &LibrarySearch<'_>) -> ToolOutcome {
    let payload = match &call.arguments {
        Ok(args) => run_tool(&call.name, args, search),
        Err(reason) => {
            warn!("skipping tool call {} ({}): {reason}", call.name, call.id);
            json!({ "error": format!("invalid tool arguments: {reason}") })
        }
    };
    ToolOutcome {
        id: call.id.clone(),
        payload,
    }
}

fn run_tool(name: &str, args: &Value, search: &LibrarySearch<'_>) -> Value {
    debug!("executing tool {name} with input {args}");

    let max_results = args
        .get("max_results")
        .and_then(Value::as_u64)
        .map(|v| v as usize)
        .unwrap_or(DEFAULT_TOOL_RESULTS);

    match name {
        "search_by_artist" => match required_str(args, "artist_name") {
            Ok(query) => search_result_payload(search.search_by_artist(query, max_results)),
            Err(e) => e,
        },
        "search_by_genre" => match required_str(args, "genre") {
            Ok(query) => search_result_payload(search.search_by_genre(query, max_results)),
            Err(e) => e,
        },
        "search_by_album" => match required_str(args, "album_name") {
            Ok(query) => search_result_payload(search.search_by_album(query, max_results)),
            Err(e) => e,
        },
        "search_by_title" => match required_str(args, "title") {
            Ok(query) => search_result_payload(search.search_by_title(query, max_results)),
            Err(e) => e,
        },
        "search_by_year_range" => {
            let start = args.get("start_year").and_then(Value::as_i64);
            let end = args.get("end_year").and_then(Value::as_i64);
            match (start, end) {
                (Some(start), Some(end)) => search_result_payload(search.search_by_year_range(
                    start as i32,
                    end as i32,
                    max_results,
                )),
                _ => json!({ "error": "start_year and end_year are required" }),
            }
        }
        "get_library_overview" => {
            let artists = search.unique_artists();
            let genres = search.unique_genres();
            let albums = search.unique_albums();
            json!({
                "total_tracks": search.library_len(),
                "unique_artists": artists.len(),
                "unique_genres": genres.len(),
                "unique_albums": albums.len(),
                "sample_artists": artists.iter().take(OVERVIEW_SAMPLE).collect::<Vec<_>>(),
                "sample_genres": genres.iter().take(OVERVIEW_SAMPLE).collect::<Vec<_>>(),
            })
        }
        other => json!({ "error": format!("Unknown tool: {other}") }),
    }
}

fn required_str<'a>(args: &'a Value, field: &str) -> Result<&'a str, Value> {
    args.get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| json!({ "error": format!("{field} is required") }))
}

fn search_result_payload(result: SearchResult) -> Value {
    json!({
        "found": result.indices.len(),
        "total_matches": result.total_matches,
        "indices": result.indices,
    })
}
