use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};
use webnav_browser::{ToolContext, ToolRegistry, PAGE_CHANGE_MARKER};
use webnav_core::{Result, ToolCallRequest};

/// Returned in place of every call that follows a page-changing call in the same batch.
pub const SKIP_MESSAGE: &str = "VERY IMPORTANT: This function could not be executed since previous function resulted in a Webpage change. You must get all_fields DOM and repeat the function if needed.";

/// Anything that can run a named tool call. [`BrowserTools`] is the production
/// implementation; tests use recording spies.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute_tool(&self, name: &str, arguments: Value) -> Result<Value>;
}

/// The browser tool registry bound to the executor it drives.
pub struct BrowserTools {
    registry: ToolRegistry,
    ctx: ToolContext,
}

impl BrowserTools {
    pub fn new(registry: ToolRegistry, ctx: ToolContext) -> Self {
        Self { registry, ctx }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }
}

#[async_trait]
impl ToolExecutor for BrowserTools {
    async fn execute_tool(&self, name: &str, arguments: Value) -> Result<Value> {
        self.registry.execute(name, self.ctx.clone(), arguments).await
    }
}

/// Response to one requested tool call, in the shape a chat completion API expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResponse {
    pub tool_call_id: String,
    pub name: String,
    pub content: String,
    /// The call was never executed because an earlier call changed the page.
    #[serde(default)]
    pub skipped: bool,
}

impl ToolCallResponse {
    fn executed(call: &ToolCallRequest, content: String) -> Self {
        Self {
            tool_call_id: call.id.clone(),
            name: call.name.clone(),
            content,
            skipped: false,
        }
    }

    fn skipped(call: &ToolCallRequest) -> Self {
        Self {
            tool_call_id: call.id.clone(),
            name: call.name.clone(),
            content: SKIP_MESSAGE.to_string(),
            skipped: true,
        }
    }
}

/// Whether a tool response reports that the page changed under the action.
pub fn indicates_page_change(content: &str) -> bool {
    content.to_lowercase().contains(&PAGE_CHANGE_MARKER.to_lowercase())
}

/// Runs one turn's tool calls strictly one after another.
///
/// After a call whose response reports a page change, the remaining calls of
/// the batch are answered with [`SKIP_MESSAGE`] instead of being executed:
/// their selectors were taken from a tree that no longer describes the page.
#[derive(Debug, Default, Clone, Copy)]
pub struct SequentialToolDispatcher;

impl SequentialToolDispatcher {
    pub fn new() -> Self {
        Self
    }

    /// Returns exactly one response per call, in request order. Tool failures
    /// are reported as `Error: ...` content; structural failures abort the turn.
    pub async fn dispatch_turn(
        &self,
        tools: &dyn ToolExecutor,
        calls: &[ToolCallRequest],
    ) -> Result<Vec<ToolCallResponse>> {
        let mut responses = Vec::with_capacity(calls.len());
        let mut skip = false;

        for call in calls {
            if skip {
                debug!(tool = %call.name, call_id = %call.id, "Skipping tool call after page change");
                responses.push(ToolCallResponse::skipped(call));
                continue;
            }

            let content = match tools.execute_tool(&call.name, call.arguments.clone()).await {
                Ok(value) => render(value),
                Err(e) if e.is_structural() => {
                    warn!(tool = %call.name, error = %e, "Aborting turn");
                    return Err(e);
                }
                Err(e) => {
                    warn!(tool = %call.name, error = %e, "Tool call failed");
                    format!("Error: {}", e)
                }
            };

            if indicates_page_change(&content) {
                info!(tool = %call.name, "Page changed, remaining calls of this turn are skipped");
                skip = true;
            }
            responses.push(ToolCallResponse::executed(call, content));
        }

        Ok(responses)
    }
}

fn render(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
