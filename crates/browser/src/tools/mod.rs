pub mod dom;
pub mod element;
pub mod navigation;
pub mod registry;

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use webnav_core::{Error, Result};

use crate::actions::ActionExecutor;

/// Truncate a string to at most `max_chars` bytes on a char boundary.
pub fn safe_truncate(s: &str, max_chars: usize) -> &str {
    if s.len() <= max_chars {
        return s;
    }
    let mut end = max_chars;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Everything a tool needs to act on the browser.
#[derive(Clone)]
pub struct ToolContext {
    pub executor: Arc<ActionExecutor>,
}

impl ToolContext {
    pub fn new(executor: Arc<ActionExecutor>) -> Self {
        Self { executor }
    }
}

pub struct ToolSchema {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn schema(&self) -> ToolSchema;
    fn validate(&self, params: &Value) -> Result<()>;
    async fn execute(&self, ctx: ToolContext, params: Value) -> Result<Value>;
}

pub(crate) fn required_str<'a>(params: &'a Value, key: &str) -> Result<&'a str> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::Validation(format!("Missing required parameter: {}", key)))
}

/// Optional non-negative number of seconds. Absent means zero.
pub(crate) fn optional_seconds(params: &Value, key: &str) -> Result<Duration> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(Duration::ZERO),
        Some(v) => {
            let secs = v
                .as_f64()
                .ok_or_else(|| Error::Validation(format!("Parameter {} must be a number", key)))?;
            if secs < 0.0 {
                return Err(Error::Validation(format!("Parameter {} cannot be negative", key)));
            }
            Duration::try_from_secs_f64(secs)
                .map_err(|e| Error::Validation(format!("Parameter {} is out of range: {}", key, e)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_safe_truncate_char_boundary() {
        assert_eq!(safe_truncate("hello", 10), "hello");
        assert_eq!(safe_truncate("hello", 3), "hel");
        assert_eq!(safe_truncate("héllo", 2), "h");
    }

    #[test]
    fn test_optional_seconds() {
        let params = json!({"wait_before_execution": 1.5, "bad": -2, "text": "x"});
        assert_eq!(
            optional_seconds(&params, "wait_before_execution").unwrap(),
            Duration::from_millis(1500)
        );
        assert_eq!(optional_seconds(&params, "missing").unwrap(), Duration::ZERO);
        assert!(optional_seconds(&params, "bad").is_err());
        assert!(optional_seconds(&params, "text").is_err());
    }

    #[test]
    fn test_optional_seconds_out_of_range() {
        let params = json!({"wait_before_execution": 1e30});
        assert!(matches!(
            optional_seconds(&params, "wait_before_execution"),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_required_str() {
        let params = json!({"selector": "[mmid='1']", "n": 3});
        assert_eq!(required_str(&params, "selector").unwrap(), "[mmid='1']");
        assert!(matches!(required_str(&params, "n"), Err(Error::Validation(_))));
        assert!(required_str(&params, "missing").is_err());
    }
}
