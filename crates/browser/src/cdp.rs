//! DevTools protocol transport for a single page target.
//!
//! Commands carry an increasing id and are answered by the message with the
//! same id. Everything without an id is an event and goes to the listeners
//! registered for its method (`Runtime.bindingCalled`, `Page.domContentEventFired`).

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, warn};

const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);
const EVENT_BUFFER: usize = 64;

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Value>>>>;
type ListenerMap = Arc<Mutex<HashMap<String, Vec<mpsc::Sender<Value>>>>>;

pub struct CdpClient {
    outgoing: mpsc::Sender<String>,
    pending: PendingMap,
    listeners: ListenerMap,
    next_id: AtomicU64,
    tasks: [JoinHandle<()>; 2],
}

impl CdpClient {
    /// Connect to a page's `webSocketDebuggerUrl`.
    pub async fn connect(ws_url: &str) -> Result<Self, String> {
        let (socket, _) = tokio_tungstenite::connect_async(ws_url)
            .await
            .map_err(|e| format!("Failed to connect to CDP endpoint {}: {}", ws_url, e))?;
        let (mut sink, mut stream) = socket.split();

        let (outgoing, mut queued) = mpsc::channel::<String>(256);
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let listeners: ListenerMap = Arc::new(Mutex::new(HashMap::new()));

        let writer = tokio::spawn(async move {
            while let Some(text) = queued.recv().await {
                if let Err(e) = sink.send(Message::Text(text)).await {
                    error!(error = %e, "CDP socket write failed");
                    break;
                }
            }
        });

        let reader = {
            let pending = pending.clone();
            let listeners = listeners.clone();
            tokio::spawn(async move {
                while let Some(message) = stream.next().await {
                    match message {
                        Ok(Message::Text(text)) => route_message(&text, &pending, &listeners).await,
                        Ok(Message::Close(_)) => {
                            debug!("CDP socket closed by browser");
                            break;
                        }
                        Ok(_) => {}
                        Err(e) => {
                            warn!(error = %e, "CDP socket read failed");
                            break;
                        }
                    }
                }
                // Wake every caller still waiting for an answer.
                pending.lock().await.clear();
            })
        };

        Ok(Self {
            outgoing,
            pending,
            listeners,
            next_id: AtomicU64::new(1),
            tasks: [reader, writer],
        })
    }

    /// Send a command and wait for its result object.
    pub async fn send_command(&self, method: &str, params: Value) -> Result<Value, String> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        if let Err(e) = self.outgoing.send(command_message(id, method, params)).await {
            self.pending.lock().await.remove(&id);
            return Err(format!("Failed to send {}: {}", method, e));
        }

        match tokio::time::timeout(COMMAND_TIMEOUT, rx).await {
            Ok(Ok(response)) => command_result(method, response),
            Ok(Err(_)) => Err(format!("Connection closed before {} was answered", method)),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                Err(format!("{} timed out after {}s", method, COMMAND_TIMEOUT.as_secs()))
            }
        }
    }

    /// Receive the params of every future `method` event.
    pub async fn subscribe_event(&self, method: &str) -> mpsc::Receiver<Value> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        self.listeners
            .lock()
            .await
            .entry(method.to_string())
            .or_default()
            .push(tx);
        rx
    }

    pub async fn enable_domain(&self, domain: &str) -> Result<(), String> {
        self.send_command(&format!("{}.enable", domain), json!({})).await?;
        Ok(())
    }

    /// Expose `window.<name>(payload)` to page scripts; calls surface as
    /// `Runtime.bindingCalled` events.
    pub async fn add_binding(&self, name: &str) -> Result<(), String> {
        self.send_command("Runtime.addBinding", json!({"name": name})).await?;
        Ok(())
    }

    pub async fn navigate(&self, url: &str) -> Result<Value, String> {
        self.send_command("Page.navigate", json!({"url": url})).await
    }

    /// Evaluate in the page, awaiting promises and returning values by value.
    pub async fn evaluate_js(&self, expression: &str) -> Result<Value, String> {
        let params = json!({
            "expression": expression,
            "returnByValue": true,
            "awaitPromise": true,
        });
        self.send_command("Runtime.evaluate", params).await
    }

    /// Base64 PNG of the viewport.
    pub async fn capture_screenshot(&self) -> Result<String, String> {
        let result = self
            .send_command("Page.captureScreenshot", json!({"format": "png"}))
            .await?;
        result
            .get("data")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| "Screenshot returned no data".to_string())
    }

    pub async fn get_accessibility_tree(&self) -> Result<Value, String> {
        self.send_command("Accessibility.getFullAXTree", json!({})).await
    }

    pub async fn dispatch_mouse_event(
        &self,
        event_type: &str,
        x: f64,
        y: f64,
        button: &str,
        click_count: u32,
    ) -> Result<(), String> {
        let params = json!({
            "type": event_type,
            "x": x,
            "y": y,
            "button": button,
            "clickCount": click_count,
        });
        self.send_command("Input.dispatchMouseEvent", params).await?;
        Ok(())
    }

    /// `text` makes the event produce a character; without it the key is a
    /// raw key down.
    pub async fn dispatch_key_event(
        &self,
        event_type: &str,
        key: &str,
        code: &str,
        key_code: u32,
        modifiers: u8,
        text: Option<&str>,
    ) -> Result<(), String> {
        let mut params = json!({
            "type": event_type,
            "key": key,
            "code": code,
            "windowsVirtualKeyCode": key_code,
            "nativeVirtualKeyCode": key_code,
        });
        if modifiers != 0 {
            params["modifiers"] = json!(modifiers);
        }
        if let Some(text) = text {
            params["text"] = json!(text);
            params["unmodifiedText"] = json!(text);
        }
        self.send_command("Input.dispatchKeyEvent", params).await?;
        Ok(())
    }

    /// Insert text at the caret without key events.
    pub async fn insert_text(&self, text: &str) -> Result<(), String> {
        self.send_command("Input.insertText", json!({"text": text})).await?;
        Ok(())
    }

    /// Only meaningful on a browser this process launched.
    pub async fn close_browser(&self) -> Result<(), String> {
        self.send_command("Browser.close", json!({})).await?;
        Ok(())
    }
}

impl Drop for CdpClient {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

fn command_message(id: u64, method: &str, params: Value) -> String {
    json!({"id": id, "method": method, "params": params}).to_string()
}

fn command_result(method: &str, response: Value) -> Result<Value, String> {
    if let Some(error) = response.get("error") {
        let message = error.get("message").and_then(|m| m.as_str()).unwrap_or("unknown error");
        return Err(format!("{} failed: {}", method, message));
    }
    Ok(response.get("result").cloned().unwrap_or(Value::Null))
}

/// Hand one incoming frame to the waiting command or the event listeners.
async fn route_message(text: &str, pending: &PendingMap, listeners: &ListenerMap) {
    let Ok(message) = serde_json::from_str::<Value>(text) else {
        debug!("Ignoring non-JSON CDP frame");
        return;
    };

    if let Some(id) = message.get("id").and_then(|v| v.as_u64()) {
        if let Some(tx) = pending.lock().await.remove(&id) {
            let _ = tx.send(message);
        }
        return;
    }

    let Some(method) = message.get("method").and_then(|v| v.as_str()) else {
        return;
    };
    let mut listeners = listeners.lock().await;
    if let Some(senders) = listeners.get_mut(method) {
        let params = message.get("params").cloned().unwrap_or(Value::Null);
        senders.retain(|tx| !tx.is_closed());
        for tx in senders.iter() {
            if tx.try_send(params.clone()).is_err() {
                warn!(method, "CDP event listener is full, dropping event");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_message() {
        let text = command_message(7, "Runtime.addBinding", json!({"name": "webnavDomChanged"}));
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["id"], 7);
        assert_eq!(value["method"], "Runtime.addBinding");
        assert_eq!(value["params"]["name"], "webnavDomChanged");
    }

    #[test]
    fn test_command_result() {
        let ok = command_result("Page.navigate", json!({"id": 1, "result": {"frameId": "F"}}));
        assert_eq!(ok.unwrap(), json!({"frameId": "F"}));

        let empty = command_result("Page.enable", json!({"id": 2}));
        assert_eq!(empty.unwrap(), Value::Null);

        let err = command_result(
            "Runtime.evaluate",
            json!({"id": 3, "error": {"code": -32000, "message": "Cannot find context"}}),
        );
        assert_eq!(err.unwrap_err(), "Runtime.evaluate failed: Cannot find context");
    }

    #[tokio::test]
    async fn test_route_response_to_pending_command() {
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let listeners: ListenerMap = Arc::new(Mutex::new(HashMap::new()));
        let (tx, rx) = oneshot::channel();
        pending.lock().await.insert(4, tx);

        route_message(r#"{"id": 4, "result": {"ok": true}}"#, &pending, &listeners).await;

        assert_eq!(rx.await.unwrap()["result"]["ok"], true);
        assert!(pending.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_route_event_to_listeners() {
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let listeners: ListenerMap = Arc::new(Mutex::new(HashMap::new()));
        let (tx, mut rx) = mpsc::channel(4);
        let (closed_tx, closed_rx) = mpsc::channel(4);
        drop(closed_rx);
        listeners
            .lock()
            .await
            .insert("Runtime.bindingCalled".to_string(), vec![tx, closed_tx]);

        route_message(
            r#"{"method": "Runtime.bindingCalled", "params": {"name": "webnavDomChanged", "payload": "[]"}}"#,
            &pending,
            &listeners,
        )
        .await;
        route_message(r#"{"method": "Page.loadEventFired", "params": {}}"#, &pending, &listeners).await;
        route_message("not json", &pending, &listeners).await;

        assert_eq!(rx.recv().await.unwrap()["payload"], "[]");
        assert!(rx.try_recv().is_err());
        assert_eq!(listeners.lock().await["Runtime.bindingCalled"].len(), 1);
    }
}
