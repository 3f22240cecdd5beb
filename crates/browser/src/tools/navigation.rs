use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use webnav_core::{Error, Result};

use super::{required_str, Tool, ToolContext, ToolSchema};

const DEFAULT_OPEN_TIMEOUT_SECS: u64 = 3;

pub struct OpenUrlTool;

#[async_trait]
impl Tool for OpenUrlTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "open_url",
            description: "Open a URL in the current tab. Returns the address the page ended up on.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "url": {
                        "type": "string",
                        "description": "Address to open. https:// is assumed when no scheme is given."
                    },
                    "timeout": {
                        "type": "integer",
                        "description": "Seconds to wait for the navigation to commit. Default 3."
                    }
                },
                "required": ["url"]
            }),
        }
    }

    fn validate(&self, params: &Value) -> Result<()> {
        if required_str(params, "url")?.trim().is_empty() {
            return Err(Error::Validation("url must not be empty".to_string()));
        }
        if let Some(timeout) = params.get("timeout") {
            if !timeout.is_null() && timeout.as_u64().is_none() {
                return Err(Error::Validation("timeout must be a non-negative integer".to_string()));
            }
        }
        Ok(())
    }

    async fn execute(&self, ctx: ToolContext, params: Value) -> Result<Value> {
        let url = required_str(&params, "url")?;
        let timeout = params
            .get("timeout")
            .and_then(|v| v.as_u64())
            .unwrap_or(DEFAULT_OPEN_TIMEOUT_SECS);
        Ok(json!(ctx.executor.open_url(url, Duration::from_secs(timeout)).await?))
    }
}

pub struct GetUrlTool;

#[async_trait]
impl Tool for GetUrlTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "get_url",
            description: "Get the address and title of the current page.",
            parameters: json!({
                "type": "object",
                "properties": {}
            }),
        }
    }

    fn validate(&self, _params: &Value) -> Result<()> {
        Ok(())
    }

    async fn execute(&self, ctx: ToolContext, _params: Value) -> Result<Value> {
        Ok(json!(ctx.executor.get_url().await?))
    }
}

pub struct WaitTool;

#[async_trait]
impl Tool for WaitTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "wait",
            description: "Pause before the next action, e.g. while a page finishes loading.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "duration": {
                        "type": "number",
                        "description": "Number of seconds to wait"
                    }
                },
                "required": ["duration"]
            }),
        }
    }

    fn validate(&self, params: &Value) -> Result<()> {
        params
            .get("duration")
            .and_then(|v| v.as_f64())
            .ok_or_else(|| Error::Validation("Missing required parameter: duration".to_string()))?;
        Ok(())
    }

    async fn execute(&self, ctx: ToolContext, params: Value) -> Result<Value> {
        let seconds = params
            .get("duration")
            .and_then(|v| v.as_f64())
            .ok_or_else(|| Error::Validation("Missing required parameter: duration".to_string()))?;
        Ok(json!(ctx.executor.wait(seconds).await?))
    }
}
