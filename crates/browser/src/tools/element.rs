//! Tools that act on a single element (or a few) of the current page.

use async_trait::async_trait;
use serde_json::{json, Value};
use webnav_core::{Error, Result};

use super::{optional_seconds, required_str, Tool, ToolContext, ToolSchema};
use crate::actions::EnterTextEntry;

pub struct ClickTool;

#[async_trait]
impl Tool for ClickTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "click",
            description: "Click the element matching the selector, e.g. [mmid='114']. Selecting an <option> sets the value of its <select>. Use wait_before_execution when the previous action is still loading the page.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "selector": {
                        "type": "string",
                        "description": "Query selector of the element, built from its mmid: [mmid='114']"
                    },
                    "wait_before_execution": {
                        "type": "number",
                        "description": "Seconds to wait before clicking. Default 0."
                    }
                },
                "required": ["selector"]
            }),
        }
    }

    fn validate(&self, params: &Value) -> Result<()> {
        required_str(params, "selector")?;
        optional_seconds(params, "wait_before_execution")?;
        Ok(())
    }

    async fn execute(&self, ctx: ToolContext, params: Value) -> Result<Value> {
        let selector = required_str(&params, "selector")?;
        let wait = optional_seconds(&params, "wait_before_execution")?;
        Ok(json!(ctx.executor.click(selector, wait).await?))
    }
}

pub struct EnterTextTool;

#[async_trait]
impl Tool for EnterTextTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "enter_text",
            description: "Replace the content of a text field with the given text. Existing content is cleared first.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "query_selector": {
                        "type": "string",
                        "description": "Query selector of the field, e.g. [mmid='21']"
                    },
                    "text": {
                        "type": "string",
                        "description": "Text to enter"
                    }
                },
                "required": ["query_selector", "text"]
            }),
        }
    }

    fn validate(&self, params: &Value) -> Result<()> {
        required_str(params, "query_selector")?;
        required_str(params, "text")?;
        Ok(())
    }

    async fn execute(&self, ctx: ToolContext, params: Value) -> Result<Value> {
        let selector = required_str(&params, "query_selector")?;
        let text = required_str(&params, "text")?;
        Ok(json!(ctx.executor.enter_text(selector, text).await?))
    }
}

pub struct BulkEnterTextTool;

impl BulkEnterTextTool {
    fn entries(params: &Value) -> Result<Vec<EnterTextEntry>> {
        let entries = params
            .get("entries")
            .ok_or_else(|| Error::Validation("Missing required parameter: entries".to_string()))?;
        serde_json::from_value(entries.clone())
            .map_err(|e| Error::Validation(format!("Invalid entries: {}", e)))
    }
}

#[async_trait]
impl Tool for BulkEnterTextTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "bulk_enter_text",
            description: "Fill several text fields in one call. Prefer this over enter_text when a form has more than one field to fill.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "entries": {
                        "type": "array",
                        "description": "Fields to fill, in order",
                        "items": {
                            "type": "object",
                            "properties": {
                                "query_selector": {"type": "string"},
                                "text": {"type": "string"}
                            },
                            "required": ["query_selector", "text"]
                        }
                    }
                },
                "required": ["entries"]
            }),
        }
    }

    fn validate(&self, params: &Value) -> Result<()> {
        Self::entries(params)?;
        Ok(())
    }

    async fn execute(&self, ctx: ToolContext, params: Value) -> Result<Value> {
        let entries = Self::entries(&params)?;
        let results = ctx.executor.bulk_enter_text(&entries).await?;
        Ok(serde_json::to_value(results)?)
    }
}

pub struct PressKeyCombinationTool;

#[async_trait]
impl Tool for PressKeyCombinationTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "press_key_combination",
            description: "Press a key or key combination on the focused element, e.g. Enter, PageDown, Control+A or Shift+Tab. Modifiers are held while the last key is pressed.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "key_combination": {
                        "type": "string",
                        "description": "Keys joined with '+'"
                    }
                },
                "required": ["key_combination"]
            }),
        }
    }

    fn validate(&self, params: &Value) -> Result<()> {
        crate::keys::KeyCombination::parse(required_str(params, "key_combination")?)?;
        Ok(())
    }

    async fn execute(&self, ctx: ToolContext, params: Value) -> Result<Value> {
        let keys = required_str(&params, "key_combination")?;
        Ok(json!(ctx.executor.press_key_combination(keys).await?))
    }
}

pub struct EnterTextAndClickTool;

#[async_trait]
impl Tool for EnterTextAndClickTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "enter_text_and_click",
            description: "Enter text into one element and then click another, e.g. fill a search box and press its search button. When both selectors are the same the text is submitted with Enter.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "text_selector": {
                        "type": "string",
                        "description": "Query selector of the field to type into"
                    },
                    "text_to_enter": {
                        "type": "string",
                        "description": "Text to enter"
                    },
                    "click_selector": {
                        "type": "string",
                        "description": "Query selector of the element to click afterwards"
                    },
                    "wait_before_click_execution": {
                        "type": "number",
                        "description": "Seconds to wait before clicking. Default 0."
                    }
                },
                "required": ["text_selector", "text_to_enter", "click_selector"]
            }),
        }
    }

    fn validate(&self, params: &Value) -> Result<()> {
        required_str(params, "text_selector")?;
        required_str(params, "text_to_enter")?;
        required_str(params, "click_selector")?;
        optional_seconds(params, "wait_before_click_execution")?;
        Ok(())
    }

    async fn execute(&self, ctx: ToolContext, params: Value) -> Result<Value> {
        let result = ctx
            .executor
            .enter_text_and_click(
                required_str(&params, "text_selector")?,
                required_str(&params, "text_to_enter")?,
                required_str(&params, "click_selector")?,
                optional_seconds(&params, "wait_before_click_execution")?,
            )
            .await?;
        Ok(json!(result))
    }
}

pub struct HoverTool;

#[async_trait]
impl Tool for HoverTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "hover",
            description: "Move the mouse over an element. Useful to reveal drop-down menus and tooltips.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "selector": {
                        "type": "string",
                        "description": "Query selector of the element, e.g. [mmid='114']"
                    }
                },
                "required": ["selector"]
            }),
        }
    }

    fn validate(&self, params: &Value) -> Result<()> {
        required_str(params, "selector")?;
        Ok(())
    }

    async fn execute(&self, ctx: ToolContext, params: Value) -> Result<Value> {
        let selector = required_str(&params, "selector")?;
        Ok(json!(ctx.executor.hover(selector).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_click_validate() {
        let tool = ClickTool;
        assert!(tool.validate(&json!({"selector": "[mmid='1']"})).is_ok());
        assert!(tool
            .validate(&json!({"selector": "[mmid='1']", "wait_before_execution": -1}))
            .is_err());
        assert!(tool.validate(&json!({})).is_err());
    }

    #[test]
    fn test_bulk_entries_validate() {
        let tool = BulkEnterTextTool;
        assert!(tool
            .validate(&json!({"entries": [{"query_selector": "[mmid='1']", "text": "a"}]}))
            .is_ok());
        assert!(tool.validate(&json!({"entries": [{"query_selector": "[mmid='1']"}]})).is_err());
        assert!(tool.validate(&json!({"entries": "nope"})).is_err());
    }

    #[test]
    fn test_press_key_validate() {
        let tool = PressKeyCombinationTool;
        assert!(tool.validate(&json!({"key_combination": "Control+Shift+Tab"})).is_ok());
        assert!(tool.validate(&json!({"key_combination": "Hyper+Q"})).is_err());
    }

    #[test]
    fn test_enter_text_and_click_validate() {
        let tool = EnterTextAndClickTool;
        assert!(tool
            .validate(&json!({
                "text_selector": "[mmid='2']",
                "text_to_enter": "rust",
                "click_selector": "[mmid='3']"
            }))
            .is_ok());
        assert!(tool
            .validate(&json!({"text_selector": "[mmid='2']", "text_to_enter": "rust"}))
            .is_err());
    }
}
