use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};
use webnav_core::{Error, Result};

use super::dom::GetDomTool;
use super::element::{
    BulkEnterTextTool, ClickTool, EnterTextAndClickTool, EnterTextTool, HoverTool, PressKeyCombinationTool,
};
use super::navigation::{GetUrlTool, OpenUrlTool, WaitTool};
use super::{safe_truncate, Tool, ToolContext};

pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::new();

        // Page content
        registry.register(Arc::new(GetDomTool));

        // Element interaction
        registry.register(Arc::new(ClickTool));
        registry.register(Arc::new(EnterTextTool));
        registry.register(Arc::new(BulkEnterTextTool));
        registry.register(Arc::new(PressKeyCombinationTool));
        registry.register(Arc::new(EnterTextAndClickTool));
        registry.register(Arc::new(HoverTool));

        // Navigation
        registry.register(Arc::new(OpenUrlTool));
        registry.register(Arc::new(GetUrlTool));
        registry.register(Arc::new(WaitTool));

        registry
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let schema = tool.schema();
        debug!(name = schema.name, "Registering tool");
        self.tools.insert(schema.name.to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    /// OpenAI-style function schemas, sorted by name.
    pub fn get_tool_schemas(&self) -> Vec<Value> {
        let mut names = self.tool_names();
        names.sort();
        names
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| {
                let schema = tool.schema();
                json!({
                    "type": "function",
                    "function": {
                        "name": schema.name,
                        "description": schema.description,
                        "parameters": schema.parameters
                    }
                })
            })
            .collect()
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    pub async fn execute(&self, name: &str, ctx: ToolContext, params: Value) -> Result<Value> {
        let tool = self
            .get(name)
            .ok_or_else(|| Error::Tool(format!("Unknown tool: {}", name)))?;

        if let Err(e) = tool.validate(&params) {
            warn!(tool = name, error = %e, "Tool validation failed");
            return Err(e);
        }

        debug!(tool = name, "Executing tool");
        let result = tool.execute(ctx, params).await?;
        let preview = result.to_string();
        debug!(tool = name, result = safe_truncate(&preview, 200), "Tool finished");
        Ok(result)
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
