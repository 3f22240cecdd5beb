//! The seam between the engine and a live browser page.
//!
//! Everything above this module talks to `dyn PageHandle`, so actions and tree
//! reconciliation can run against a scripted page in tests.

use async_trait::async_trait;
use base64::Engine;
use serde_json::Value;
use std::sync::Arc;
use webnav_core::{Error, Result};

use crate::cdp::CdpClient;
use crate::keys::KeyStroke;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEventKind {
    Down,
    Up,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseEventKind {
    Moved,
    Pressed,
    Released,
}

impl MouseEventKind {
    fn cdp_type(&self) -> &'static str {
        match self {
            MouseEventKind::Moved => "mouseMoved",
            MouseEventKind::Pressed => "mousePressed",
            MouseEventKind::Released => "mouseReleased",
        }
    }
}

#[async_trait]
pub trait PageHandle: Send + Sync {
    /// Evaluate an expression and return its JSON value.
    async fn evaluate(&self, expression: &str) -> Result<Value>;

    /// Call a function declaration (`(a, b) => ...`) with JSON arguments.
    async fn call_function(&self, declaration: &str, args: &[Value]) -> Result<Value>;

    async fn navigate(&self, url: &str) -> Result<()>;

    /// Raw `Accessibility.getFullAXTree` result (`{"nodes": [...]}`).
    async fn accessibility_tree(&self) -> Result<Value>;

    async fn key_event(&self, kind: KeyEventKind, stroke: &KeyStroke, modifiers: u8) -> Result<()>;

    async fn insert_text(&self, text: &str) -> Result<()>;

    async fn mouse_event(&self, kind: MouseEventKind, x: f64, y: f64) -> Result<()>;

    /// PNG bytes of the current viewport.
    async fn screenshot(&self) -> Result<Vec<u8>>;
}

/// Hands out the page actions should run against.
#[async_trait]
pub trait PageProvider: Send + Sync {
    /// Fails with [`Error::NoActivePage`] when no page is open.
    async fn current_page(&self) -> Result<Arc<dyn PageHandle>>;
}

/// Convert CDP error string to a browser error.
pub(crate) fn cdp_err(e: String) -> Error {
    Error::Browser(format!("CDP: {}", e))
}

/// Build the expression that invokes `declaration` with literal JSON arguments.
pub(crate) fn call_expression(declaration: &str, args: &[Value]) -> String {
    let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
    format!("({})({})", declaration.trim(), args.join(", "))
}

/// Pull the value out of a `Runtime.evaluate` result, surfacing page exceptions.
pub(crate) fn evaluation_value(result: Value) -> Result<Value> {
    if let Some(details) = result.get("exceptionDetails") {
        let text = details
            .get("exception")
            .and_then(|e| e.get("description"))
            .and_then(|d| d.as_str())
            .or_else(|| details.get("text").and_then(|t| t.as_str()))
            .unwrap_or("unknown exception");
        return Err(Error::Browser(format!("Script failed: {}", text)));
    }
    Ok(result
        .get("result")
        .and_then(|r| r.get("value"))
        .cloned()
        .unwrap_or(Value::Null))
}

/// A page target driven over a DevTools connection.
pub struct CdpPage {
    cdp: Arc<CdpClient>,
}

impl CdpPage {
    pub fn new(cdp: Arc<CdpClient>) -> Self {
        Self { cdp }
    }
}

#[async_trait]
impl PageHandle for CdpPage {
    async fn evaluate(&self, expression: &str) -> Result<Value> {
        let result = self.cdp.evaluate_js(expression).await.map_err(cdp_err)?;
        evaluation_value(result)
    }

    async fn call_function(&self, declaration: &str, args: &[Value]) -> Result<Value> {
        self.evaluate(&call_expression(declaration, args)).await
    }

    async fn navigate(&self, url: &str) -> Result<()> {
        let result = self.cdp.navigate(url).await.map_err(cdp_err)?;
        if let Some(error) = result.get("errorText").and_then(|v| v.as_str()) {
            return Err(Error::Browser(format!("Navigation to {} failed: {}", url, error)));
        }
        Ok(())
    }

    async fn accessibility_tree(&self) -> Result<Value> {
        self.cdp.get_accessibility_tree().await.map_err(cdp_err)
    }

    async fn key_event(&self, kind: KeyEventKind, stroke: &KeyStroke, modifiers: u8) -> Result<()> {
        // Control/Alt/Meta chords must not insert the character.
        let chord = modifiers & !crate::keys::MODIFIER_SHIFT != 0;
        let (event_type, text) = match kind {
            KeyEventKind::Down => match stroke.text.as_deref() {
                Some(text) if !chord => ("keyDown", Some(text)),
                _ => ("rawKeyDown", None),
            },
            KeyEventKind::Up => ("keyUp", None),
        };
        self.cdp
            .dispatch_key_event(event_type, &stroke.key, &stroke.code, stroke.key_code, modifiers, text)
            .await
            .map_err(cdp_err)
    }

    async fn insert_text(&self, text: &str) -> Result<()> {
        self.cdp.insert_text(text).await.map_err(cdp_err)
    }

    async fn mouse_event(&self, kind: MouseEventKind, x: f64, y: f64) -> Result<()> {
        let (button, clicks) = match kind {
            MouseEventKind::Moved => ("none", 0),
            MouseEventKind::Pressed | MouseEventKind::Released => ("left", 1),
        };
        self.cdp
            .dispatch_mouse_event(kind.cdp_type(), x, y, button, clicks)
            .await
            .map_err(cdp_err)
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        let data = self.cdp.capture_screenshot().await.map_err(cdp_err)?;
        base64::engine::general_purpose::STANDARD
            .decode(data)
            .map_err(|e| Error::Browser(format!("Invalid screenshot data: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_call_expression() {
        let expr = call_expression("(sel, n) => sel + n", &[json!("[mmid='4']"), json!(2)]);
        assert_eq!(expr, r#"((sel, n) => sel + n)("[mmid='4']", 2)"#);

        let expr = call_expression("() => 1", &[]);
        assert_eq!(expr, "(() => 1)()");
    }

    #[test]
    fn test_evaluation_value() {
        let ok = json!({"result": {"type": "number", "value": 12}});
        assert_eq!(evaluation_value(ok).unwrap(), json!(12));

        let undefined = json!({"result": {"type": "undefined"}});
        assert_eq!(evaluation_value(undefined).unwrap(), Value::Null);

        let thrown = json!({
            "result": {"type": "object"},
            "exceptionDetails": {
                "text": "Uncaught",
                "exception": {"description": "SyntaxError: not a valid selector"}
            }
        });
        let err = evaluation_value(thrown).unwrap_err();
        assert!(err.to_string().contains("not a valid selector"));
    }

    #[test]
    fn test_mouse_event_types() {
        assert_eq!(MouseEventKind::Moved.cdp_type(), "mouseMoved");
        assert_eq!(MouseEventKind::Released.cdp_type(), "mouseReleased");
    }
}
