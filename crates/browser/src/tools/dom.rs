use async_trait::async_trait;
use serde_json::{json, Value};
use webnav_core::Result;

use super::{required_str, Tool, ToolContext, ToolSchema};
use crate::actions::DomContentType;

pub struct GetDomTool;

#[async_trait]
impl Tool for GetDomTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "get_dom_with_content_type",
            description: "Retrieve the DOM of the current page. 'all_fields' returns every element with its mmid, 'input_fields' only inputs, buttons, links and selects, 'text_only' the visible text of the page. Element ids are only valid until the page changes.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "content_type": {
                        "type": "string",
                        "description": "Kind of content to extract",
                        "enum": ["all_fields", "input_fields", "text_only"]
                    }
                },
                "required": ["content_type"]
            }),
        }
    }

    fn validate(&self, params: &Value) -> Result<()> {
        required_str(params, "content_type")?.parse::<DomContentType>()?;
        Ok(())
    }

    async fn execute(&self, ctx: ToolContext, params: Value) -> Result<Value> {
        let content_type: DomContentType = required_str(&params, "content_type")?.parse()?;
        ctx.executor.get_dom(content_type).await
    }
}
