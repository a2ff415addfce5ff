//! Tool catalog and typed tool arguments.
//!
//! The model sees each tool as a name, a description and a JSON Schema for
//! its arguments. Raw argument maps are validated once, here, into a
//! [`ToolInvocation`]; handlers only ever see typed arguments.

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

use lifelens_core::{MediaCountFilter, TimeOfDay, ToolArguments, ToolCall, ToolDeclaration};

use crate::analyze::SearchType;

/// Names of the tools in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolName {
    TemporalFilter,
    SemanticSearch,
    AnalyzeText,
    GetMediaDetails,
    CountMedia,
}

impl ToolName {
    pub const ALL: [ToolName; 5] = [
        ToolName::TemporalFilter,
        ToolName::SemanticSearch,
        ToolName::AnalyzeText,
        ToolName::GetMediaDetails,
        ToolName::CountMedia,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::TemporalFilter => "temporal_filter",
            ToolName::SemanticSearch => "semantic_search",
            ToolName::AnalyzeText => "analyze_text",
            ToolName::GetMediaDetails => "get_media_details",
            ToolName::CountMedia => "count_media",
        }
    }

    /// Payload returned when a call cannot produce results.
    pub fn empty_payload(&self) -> Value {
        match self {
            ToolName::CountMedia => json!({"count": 0, "media_type": MediaCountFilter::All.as_str()}),
            _ => json!({"results": []}),
        }
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolName {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ToolName::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ToolError::UnknownTool(s.to_string()))
    }
}

/// Why a tool call could not be turned into an invocation.
#[derive(Debug, Error, PartialEq)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: ToolName, reason: String },
}

// =============================================================================
// TYPED ARGUMENTS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TemporalFilterArgs {
    pub relative_time: String,
    #[serde(default)]
    pub time_range: Option<TimeOfDay>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SemanticSearchArgs {
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AnalyzeTextArgs {
    pub search_type: SearchType,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MediaDetailsArgs {
    pub media_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct CountMediaArgs {
    #[serde(default)]
    pub media_type: Option<MediaCountFilter>,
}

/// A validated tool call.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolInvocation {
    TemporalFilter(TemporalFilterArgs),
    SemanticSearch(SemanticSearchArgs),
    AnalyzeText(AnalyzeTextArgs),
    GetMediaDetails(MediaDetailsArgs),
    CountMedia(CountMediaArgs),
}

impl ToolInvocation {
    /// Validate a raw call against the catalog schema.
    pub fn parse(call: &ToolCall) -> Result<Self, ToolError> {
        let tool: ToolName = call.name.parse()?;
        let args = &call.arguments;

        let invocation = match tool {
            ToolName::TemporalFilter => ToolInvocation::TemporalFilter(decode(tool, args)?),
            ToolName::SemanticSearch => {
                let parsed: SemanticSearchArgs = decode(tool, args)?;
                if parsed.query.trim().is_empty() {
                    return Err(ToolError::InvalidArguments {
                        tool,
                        reason: "query must not be empty".to_string(),
                    });
                }
                ToolInvocation::SemanticSearch(parsed)
            }
            ToolName::AnalyzeText => ToolInvocation::AnalyzeText(decode(tool, args)?),
            ToolName::GetMediaDetails => ToolInvocation::GetMediaDetails(decode(tool, args)?),
            ToolName::CountMedia => ToolInvocation::CountMedia(decode(tool, args)?),
        };
        Ok(invocation)
    }

    pub fn tool(&self) -> ToolName {
        match self {
            ToolInvocation::TemporalFilter(_) => ToolName::TemporalFilter,
            ToolInvocation::SemanticSearch(_) => ToolName::SemanticSearch,
            ToolInvocation::AnalyzeText(_) => ToolName::AnalyzeText,
            ToolInvocation::GetMediaDetails(_) => ToolName::GetMediaDetails,
            ToolInvocation::CountMedia(_) => ToolName::CountMedia,
        }
    }
}

fn decode<T: DeserializeOwned>(tool: ToolName, args: &ToolArguments) -> Result<T, ToolError> {
    serde_json::from_value(Value::Object(args.clone())).map_err(|e| ToolError::InvalidArguments {
        tool,
        reason: e.to_string(),
    })
}

// =============================================================================
// CATALOG
// =============================================================================

static CATALOG: Lazy<Vec<ToolDeclaration>> = Lazy::new(|| {
    vec![
        ToolDeclaration {
            name: ToolName::TemporalFilter.as_str(),
            description: "List media captured in a time period. Use when the question mentions \
                dates, times or relative periods such as '2 hours ago', 'yesterday', 'last week' \
                or 'this month'. Results include media_id values for follow-up calls.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "relative_time": {
                        "type": "string",
                        "description": "Relative time expression, e.g. '30 seconds ago', \
                            '3 days ago', '1 month ago', 'today', 'yesterday', 'last week', \
                            'this week', 'last month', 'this month', 'last year', 'this year'"
                    },
                    "time_range": {
                        "type": "string",
                        "description": "Optional part of the day to narrow to",
                        "enum": ["morning", "afternoon", "evening", "night"]
                    }
                },
                "required": ["relative_time"]
            }),
        },
        ToolDeclaration {
            name: ToolName::SemanticSearch.as_str(),
            description: "Search media content by meaning and keywords. Use for questions \
                about what media contains.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "What to look for"
                    }
                },
                "required": ["query"]
            }),
        },
        ToolDeclaration {
            name: ToolName::AnalyzeText.as_str(),
            description: "Scan text extracted from recent media for names, phone numbers, \
                addresses or dates.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "search_type": {
                        "type": "string",
                        "description": "Kind of information to find",
                        "enum": ["names", "phone_numbers", "addresses", "dates", "general"]
                    }
                },
                "required": ["search_type"]
            }),
        },
        ToolDeclaration {
            name: ToolName::GetMediaDetails.as_str(),
            description: "Get full details of specific media items, including complete \
                extracted text and captions. Pass the exact media_id values returned by \
                other tools.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "media_ids": {
                        "type": "array",
                        "description": "media_id values (UUIDs) from previous results",
                        "items": {"type": "string"}
                    }
                },
                "required": ["media_ids"]
            }),
        },
        ToolDeclaration {
            name: ToolName::CountMedia.as_str(),
            description: "Count the user's media items, optionally by type. Use when asked \
                how many files or media items they have.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "media_type": {
                        "type": "string",
                        "description": "Optional media type filter",
                        "enum": ["image", "audio", "document", "all"]
                    }
                }
            }),
        },
    ]
});

/// Declarations for every tool, in catalog order.
pub fn catalog() -> &'static [ToolDeclaration] {
    &CATALOG
}
