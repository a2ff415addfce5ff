//! Routes validated tool calls to their handlers.
//!
//! Every handler reads through owner-scoped repository methods, so no
//! argument can reach another owner's media. Failures never escape
//! [`ToolDispatcher::dispatch`]: invalid arguments and store outages yield the
//! tool's empty payload, anything else yields no result at all.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, error, instrument, warn};
use uuid::Uuid;

use lifelens_core::defaults::{
    ANALYZE_MAX_RESULTS, ANALYZE_SCAN_LIMIT, SNIPPET_LENGTH, TEMPORAL_RESULT_LIMIT,
};
use lifelens_core::text::preview;
use lifelens_core::{
    parse_relative_time, Clock, MediaCountFilter, MediaRepository, MediaType, Result,
    SystemClock, ToolCall, ToolDeclaration, ToolResult,
};
use lifelens_search::HybridSearch;

use crate::analyze::{find_items, SearchType};
use crate::tools::{
    catalog, AnalyzeTextArgs, CountMediaArgs, MediaDetailsArgs, SemanticSearchArgs,
    TemporalFilterArgs, ToolError, ToolInvocation,
};

#[derive(Debug, Serialize)]
struct TemporalRow {
    media_id: Uuid,
    file_name: String,
    file_type: MediaType,
    created_at: DateTime<Utc>,
    caption: Option<String>,
    ocr_text_preview: Option<String>,
}

#[derive(Debug, Serialize)]
struct AnalyzeRow {
    media_id: Uuid,
    file_name: String,
    created_at: DateTime<Utc>,
    search_type: SearchType,
    found_items: Vec<String>,
}

/// Executes tool calls for one owner at a time.
#[derive(Clone)]
pub struct ToolDispatcher {
    media: Arc<dyn MediaRepository>,
    search: Arc<dyn HybridSearch>,
    clock: Arc<dyn Clock>,
}

impl ToolDispatcher {
    pub fn new(media: Arc<dyn MediaRepository>, search: Arc<dyn HybridSearch>) -> Self {
        Self {
            media,
            search,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the time source used to resolve relative expressions.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Tools offered to the model.
    pub fn catalog(&self) -> Vec<ToolDeclaration> {
        catalog().to_vec()
    }

    /// Run one call. `None` means the call produced no result and should be
    /// left out of the model context.
    #[instrument(
        skip(self, call),
        fields(subsystem = "agent", component = "dispatcher", op = "dispatch", tool = %call.name)
    )]
    pub async fn dispatch(&self, owner_id: Uuid, call: &ToolCall) -> Option<ToolResult> {
        let start = Instant::now();

        let invocation = match ToolInvocation::parse(call) {
            Ok(invocation) => invocation,
            Err(ToolError::UnknownTool(name)) => {
                warn!(tool = %name, "Model requested an unknown tool");
                return None;
            }
            Err(e @ ToolError::InvalidArguments { tool, .. }) => {
                warn!(error = %e, "Tool arguments failed validation");
                return Some(result_for(call, tool.empty_payload()));
            }
        };
        let tool = invocation.tool();

        let payload = match self.execute(owner_id, invocation).await {
            Ok(payload) => payload,
            Err(e) if e.is_data_access() => {
                error!(error = %e, "Store unavailable during tool call");
                tool.empty_payload()
            }
            Err(e) => {
                warn!(error = %e, "Tool call failed");
                return None;
            }
        };

        debug!(
            duration_ms = start.elapsed().as_millis() as u64,
            "Tool call complete"
        );
        Some(result_for(call, payload))
    }

    async fn execute(&self, owner_id: Uuid, invocation: ToolInvocation) -> Result<Value> {
        match invocation {
            ToolInvocation::TemporalFilter(args) => self.temporal_filter(owner_id, args).await,
            ToolInvocation::SemanticSearch(args) => self.semantic_search(owner_id, args).await,
            ToolInvocation::AnalyzeText(args) => self.analyze_text(owner_id, args).await,
            ToolInvocation::GetMediaDetails(args) => self.media_details(owner_id, args).await,
            ToolInvocation::CountMedia(args) => self.count_media(owner_id, args).await,
        }
    }

    async fn temporal_filter(&self, owner_id: Uuid, args: TemporalFilterArgs) -> Result<Value> {
        let mut range = parse_relative_time(&args.relative_time, self.clock.now());
        if let Some(bucket) = args.time_range {
            range = bucket.narrow(range);
        }
        debug!(start = %range.start, end = %range.end, "Resolved time range");

        let media = self
            .media
            .list_in_range(owner_id, range, TEMPORAL_RESULT_LIMIT)
            .await?;
        let rows: Vec<TemporalRow> = media
            .into_iter()
            .map(|m| TemporalRow {
                ocr_text_preview: m.ocr_text.as_deref().map(|t| preview(t, SNIPPET_LENGTH)),
                media_id: m.media_id,
                file_name: m.file_name,
                file_type: m.file_type,
                created_at: m.created_at,
                caption: m.caption,
            })
            .collect();

        debug!(result_count = rows.len(), "temporal_filter");
        Ok(json!({ "results": rows }))
    }

    async fn semantic_search(&self, owner_id: Uuid, args: SemanticSearchArgs) -> Result<Value> {
        let results = self.search.search(owner_id, &args.query).await?;
        debug!(result_count = results.len(), "semantic_search");
        Ok(json!({ "results": results }))
    }

    async fn analyze_text(&self, owner_id: Uuid, args: AnalyzeTextArgs) -> Result<Value> {
        let media = self
            .media
            .recent_with_text(owner_id, ANALYZE_SCAN_LIMIT)
            .await?;

        let rows: Vec<AnalyzeRow> = media
            .into_iter()
            .filter_map(|m| {
                let found_items = find_items(args.search_type, m.ocr_text.as_deref()?);
                if found_items.is_empty() {
                    return None;
                }
                Some(AnalyzeRow {
                    media_id: m.media_id,
                    file_name: m.file_name,
                    created_at: m.created_at,
                    search_type: args.search_type,
                    found_items,
                })
            })
            .take(ANALYZE_MAX_RESULTS)
            .collect();

        debug!(result_count = rows.len(), "analyze_text");
        Ok(json!({ "results": rows }))
    }

    async fn media_details(&self, owner_id: Uuid, args: MediaDetailsArgs) -> Result<Value> {
        let ids: Vec<Uuid> = args
            .media_ids
            .iter()
            .filter_map(|raw| match Uuid::parse_str(raw.trim()) {
                Ok(id) => Some(id),
                Err(_) => {
                    warn!(media_id = %raw, "Skipping invalid media id");
                    None
                }
            })
            .collect();
        if ids.is_empty() {
            return Ok(json!({ "results": [] }));
        }

        let details = self.media.get_details(owner_id, &ids).await?;
        if details.len() < ids.len() {
            debug!(
                requested = ids.len(),
                found = details.len(),
                "Some media ids were not found for this owner"
            );
        }
        Ok(json!({ "results": details }))
    }

    async fn count_media(&self, owner_id: Uuid, args: CountMediaArgs) -> Result<Value> {
        let filter = args.media_type.unwrap_or(MediaCountFilter::All);
        let count = self.media.count(owner_id, filter.media_type()).await?;
        Ok(json!({ "count": count, "media_type": filter.as_str() }))
    }
}

fn result_for(call: &ToolCall, payload: Value) -> ToolResult {
    ToolResult {
        call_id: call.id.clone(),
        name: call.name.clone(),
        payload,
    }
}
