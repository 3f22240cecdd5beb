use serde::Deserialize;
use serde_json::{json, Value};
use std::str::FromStr;
use std::time::Instant;
use tracing::{debug, info, warn};
use webnav_core::{Error, MessageType, Result};

use super::{ActionExecutor, POLL_INTERVAL};
use crate::mutation::OVERLAY_ELEMENT_ID;
use crate::page::PageHandle;

pub(crate) const READY_STATE_EXPRESSION: &str = "document.readyState";

pub(crate) const TEXT_CONTENT_SCRIPT: &str = r#"(overlayId) => {
    const overlay = document.getElementById(overlayId);
    const previous = overlay ? overlay.style.visibility : null;
    if (overlay) {
        overlay.style.visibility = 'hidden';
    }
    const text = (document.body && document.body.innerText)
        || (document.documentElement && document.documentElement.innerText)
        || '';
    const alts = Array.from(document.querySelectorAll('img')).map(img => img.alt);
    if (overlay) {
        overlay.style.visibility = previous;
    }
    return {text: text, alts: alts};
}"#;

/// What `get_dom_with_content_type` returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomContentType {
    /// Every reconciled element and text node.
    AllFields,
    /// Only inputs, buttons, links and selects.
    InputFields,
    /// Visible text plus image alt texts.
    TextOnly,
}

impl FromStr for DomContentType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "all_fields" => Ok(DomContentType::AllFields),
            "input_fields" => Ok(DomContentType::InputFields),
            "text_only" => Ok(DomContentType::TextOnly),
            other => Err(Error::Validation(format!("Unsupported content_type: {}", other))),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TextContent {
    text: String,
    #[serde(default)]
    alts: Vec<String>,
}

impl ActionExecutor {
    /// Describe the current page. Trees come back as JSON, text as a string.
    pub async fn get_dom(&self, content_type: DomContentType) -> Result<Value> {
        info!(?content_type, "Fetching DOM");
        let started = Instant::now();
        let page = self.page().await?;
        wait_for_non_loading_dom_state(page.as_ref(), self.settings.dom_ready_timeout()).await;

        let (data, message) = match content_type {
            DomContentType::AllFields => (
                self.reconciler.get_tree(page.as_ref(), false).await?.unwrap_or(Value::Null),
                "Fetched all the fields in the DOM",
            ),
            DomContentType::InputFields => match self.reconciler.get_tree(page.as_ref(), true).await? {
                Some(tree) => (tree, "Fetched only input fields in the DOM"),
                None => {
                    return Ok(json!(
                        "Could not fetch input fields. Please consider trying with content_type all_fields."
                    ))
                }
            },
            DomContentType::TextOnly => {
                let text = text_content(page.as_ref()).await?;
                self.reconciler.dump_text("text_only_dom.txt", &text);
                (Value::String(text), "Fetched the text content of the DOM")
            }
        };

        info!(elapsed_ms = started.elapsed().as_millis() as u64, "DOM fetched");
        self.notify(message, MessageType::Action).await;
        Ok(data)
    }
}

/// Poll until the document is past `loading`. Gives up quietly after `timeout`.
pub async fn wait_for_non_loading_dom_state(page: &dyn PageHandle, timeout: std::time::Duration) {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        match page.evaluate(READY_STATE_EXPRESSION).await {
            Ok(state) if state.as_str() != Some("loading") => {
                debug!(state = %state, "Document ready");
                return;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "Could not read document ready state");
                return;
            }
        }
        if tokio::time::Instant::now() >= deadline {
            warn!("Document still loading after timeout, continuing");
            return;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

async fn text_content(page: &dyn PageHandle) -> Result<String> {
    let value = page
        .call_function(TEXT_CONTENT_SCRIPT, &[json!(OVERLAY_ELEMENT_ID)])
        .await?;
    let content: TextContent = serde_json::from_value(value)?;
    Ok(format!(
        "{} Other Alt Texts in the page: {}",
        content.text,
        content.alts.join(" ")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{test_executor, FakePage};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_content_type_parse() {
        assert_eq!("all_fields".parse::<DomContentType>().unwrap(), DomContentType::AllFields);
        assert_eq!("input_fields".parse::<DomContentType>().unwrap(), DomContentType::InputFields);
        assert_eq!("text_only".parse::<DomContentType>().unwrap(), DomContentType::TextOnly);
        assert!(matches!(
            "html".parse::<DomContentType>(),
            Err(Error::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_text_only() {
        let page = Arc::new(FakePage::new());
        page.on(READY_STATE_EXPRESSION, json!("complete"));
        page.on(
            TEXT_CONTENT_SCRIPT,
            json!({"text": "Blue shirt\n$20", "alts": ["front view", "back view"]}),
        );
        let (exec, notifier) = test_executor(page.clone());

        let text = exec.get_dom(DomContentType::TextOnly).await.unwrap();

        assert_eq!(
            text,
            json!("Blue shirt\n$20 Other Alt Texts in the page: front view back view")
        );
        assert_eq!(page.script_args(TEXT_CONTENT_SCRIPT)[0], vec![json!(OVERLAY_ELEMENT_ID)]);
        assert_eq!(
            notifier.messages(),
            vec![("Fetched the text content of the DOM".to_string(), MessageType::Action)]
        );
    }

    #[tokio::test]
    async fn test_input_fields_without_snapshot() {
        let page = Arc::new(FakePage::new());
        page.on(READY_STATE_EXPRESSION, json!("interactive"));
        let (exec, notifier) = test_executor(page.clone());

        let result = exec.get_dom(DomContentType::InputFields).await.unwrap();

        assert_eq!(
            result,
            json!("Could not fetch input fields. Please consider trying with content_type all_fields.")
        );
        assert!(notifier.messages().is_empty());
    }

    #[tokio::test]
    async fn test_all_fields_tree() {
        let page = Arc::new(FakePage::new());
        page.on(READY_STATE_EXPRESSION, json!("complete"));
        page.set_ax_tree(json!({"nodes": [
            {"nodeId": "1", "ignored": false, "role": {"value": "RootWebArea"},
             "name": {"value": "Shop"}, "childIds": ["2"]},
            {"nodeId": "2", "ignored": false, "role": {"value": "StaticText"},
             "name": {"value": "Welcome to the shop"}, "childIds": []}
        ]}));
        let (exec, notifier) = test_executor(page.clone());

        let tree = exec.get_dom(DomContentType::AllFields).await.unwrap();

        assert_eq!(tree["role"], json!("WebArea"));
        assert!(tree.to_string().contains("Welcome to the shop"));
        assert_eq!(notifier.messages()[0].0, "Fetched all the fields in the DOM");
    }

    #[tokio::test]
    async fn test_waits_for_loading_document() {
        let page = FakePage::new();
        let polls = AtomicUsize::new(0);
        page.on_fn(READY_STATE_EXPRESSION, move |_| {
            let n = polls.fetch_add(1, Ordering::SeqCst);
            Ok(json!(if n < 2 { "loading" } else { "complete" }))
        });

        wait_for_non_loading_dom_state(&page, std::time::Duration::from_secs(2)).await;

        assert_eq!(page.script_calls(READY_STATE_EXPRESSION), 3);
    }

    #[tokio::test]
    async fn test_gives_up_on_slow_document() {
        let page = FakePage::new();
        page.on(READY_STATE_EXPRESSION, json!("loading"));
        let started = Instant::now();

        wait_for_non_loading_dom_state(&page, std::time::Duration::from_millis(120)).await;

        assert!(started.elapsed() < std::time::Duration::from_secs(2));
        assert!(page.script_calls(READY_STATE_EXPRESSION) >= 2);
    }
}
