use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info, warn};
use webnav_core::{MessageType, Result};

use super::press_key::press_combination;
use super::{settle_changes, ActionExecutor, ActionOutcome};
use crate::keys::{KeyCombination, KeyStroke};
use crate::page::{KeyEventKind, PageHandle};

pub(crate) const FOCUS_SCRIPT: &str = r#"(selector) => {
    const element = document.querySelector(selector);
    if (!element) {
        throw new Error('Element with selector ' + selector + ' not found');
    }
    element.focus();
    return true;
}"#;

pub(crate) const FILL_SCRIPT: &str = r#"(selector, text) => {
    const element = document.querySelector(selector);
    if (!element) {
        throw new Error('Element with selector ' + selector + ' not found');
    }
    element.value = text.trim();
    element.dispatchEvent(new Event('input', {bubbles: true}));
    element.dispatchEvent(new Event('change', {bubbles: true}));
    return true;
}"#;

/// One field of a bulk text entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnterTextEntry {
    pub query_selector: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkEntryResult {
    pub query_selector: String,
    pub result: String,
}

impl ActionExecutor {
    /// Replace the content of the field matching `selector` with `text`.
    pub async fn enter_text(&self, selector: &str, text: &str) -> Result<String> {
        info!(selector, "Entering text");
        let page = self.page().await?;
        self.capture("enter_text_start", page.as_ref()).await;

        let subscription = self.watcher.subscribe();
        let outcome = self.do_enter_text(page.as_ref(), selector, text).await;
        let changes = settle_changes(subscription, self.settings.settle_window()).await;

        self.capture("enter_text_end", page.as_ref()).await;
        self.notify(&outcome.summary, MessageType::Action).await;

        if let Some(changes) = changes {
            return Ok(format!(
                "{}.\n As a consequence of this action, new elements have appeared in view: {}. This means that the action of entering text {} is not yet executed and needs further interaction. Get all_fields DOM to complete the interaction.",
                outcome.detailed, changes, text
            ));
        }
        Ok(outcome.detailed)
    }

    /// Fill several fields in order. Every entry is attempted and reported.
    pub async fn bulk_enter_text(&self, entries: &[EnterTextEntry]) -> Result<Vec<BulkEntryResult>> {
        info!(count = entries.len(), "Executing bulk text entry");
        let mut results = Vec::with_capacity(entries.len());
        for entry in entries {
            let result = self.enter_text(&entry.query_selector, &entry.text).await?;
            results.push(BulkEntryResult {
                query_selector: entry.query_selector.clone(),
                result,
            });
        }
        Ok(results)
    }

    pub(crate) async fn do_enter_text(&self, page: &dyn PageHandle, selector: &str, text: &str) -> ActionOutcome {
        let element = match self.locate(page, selector).await {
            Ok(Some(element)) => element,
            Ok(None) => {
                let error = format!("Error: Selector {} not found. Unable to continue.", selector);
                return ActionOutcome::failure(error.clone(), error);
            }
            Err(e) => return entry_failure(selector, &e),
        };
        self.scroll_into_view(page, selector).await;
        self.wait_visible(page, selector).await;

        if let Err(e) = self.type_into(page, selector, text).await {
            return entry_failure(selector, &e);
        }

        info!(selector, "Text set successfully");
        let summary = format!(
            "Success. Text \"{}\" set successfully in the element with selector {}",
            text, selector
        );
        let detailed = format!("{} and outer HTML: {}.", summary, element.opening_tag);
        ActionOutcome::success(summary, detailed)
    }

    /// Focus, select all, delete, then type character by character. Falls
    /// back to assigning the value when keyboard input fails.
    async fn type_into(&self, page: &dyn PageHandle, selector: &str, text: &str) -> Result<()> {
        let step = self.settings.step_delay();
        page.call_function(FOCUS_SCRIPT, &[json!(selector)]).await?;

        let typed = async {
            tokio::time::sleep(step).await;
            press_combination(page, &KeyCombination::parse("Control+a")?).await?;
            tokio::time::sleep(step).await;
            press_combination(page, &KeyCombination::parse("Backspace")?).await?;
            tokio::time::sleep(step).await;
            debug!(selector, "Focused element, typing text");
            type_text(page, text, self.settings.keystroke_delay()).await
        }
        .await;

        if let Err(e) = typed {
            warn!(selector, error = %e, "Keyboard input failed, assigning value instead");
            page.call_function(FILL_SCRIPT, &[json!(selector), json!(text)]).await?;
        }

        page.call_function(FOCUS_SCRIPT, &[json!(selector)]).await?;
        Ok(())
    }
}

fn entry_failure(selector: &str, e: &webnav_core::Error) -> ActionOutcome {
    warn!(selector, error = %e, "Error entering text");
    let error = format!("Error entering text in selector {}.", selector);
    let detailed = format!("{} Error: {}", error, e);
    ActionOutcome::failure(error, detailed)
}

/// Type `text` as key presses. Characters without a key on a US layout are
/// inserted directly.
async fn type_text(page: &dyn PageHandle, text: &str, delay: Duration) -> Result<()> {
    for c in text.chars() {
        match KeyStroke::for_char(c) {
            Some(stroke) => {
                page.key_event(KeyEventKind::Down, &stroke, 0).await?;
                page.key_event(KeyEventKind::Up, &stroke, 0).await?;
            }
            None => page.insert_text(&c.to_string()).await?,
        }
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{LOCATE_SCRIPT, SCROLL_SCRIPT, VISIBLE_SCRIPT};
    use crate::mutation::DomChange;
    use crate::testing::{test_executor, FakePage, PageCall};
    use std::sync::Arc;

    fn text_field(page: &FakePage) {
        page.on(LOCATE_SCRIPT, json!({"tag": "input", "opening_tag": "<input id=\"q\" type=\"text\">"}));
    }

    #[tokio::test]
    async fn test_enter_text_types_after_clearing() {
        let page = Arc::new(FakePage::new());
        text_field(&page);
        let (exec, notifier) = test_executor(page.clone());

        let result = exec.enter_text("[mmid='4']", "Hi é").await.unwrap();

        assert_eq!(
            result,
            "Success. Text \"Hi é\" set successfully in the element with selector [mmid='4'] and outer HTML: <input id=\"q\" type=\"text\">."
        );
        assert_eq!(page.keys_pressed(), vec!["Control", "a", "Backspace", "H", "i", " "]);
        assert!(page.calls().contains(&PageCall::InsertText("é".into())));
        assert_eq!(page.script_calls(SCROLL_SCRIPT), 1);
        assert!(page.script_calls(VISIBLE_SCRIPT) >= 1);
        assert_eq!(page.script_calls(FOCUS_SCRIPT), 2);
        assert_eq!(page.script_calls(FILL_SCRIPT), 0);
        assert_eq!(
            notifier.messages()[0].0,
            "Success. Text \"Hi é\" set successfully in the element with selector [mmid='4']"
        );
    }

    #[tokio::test]
    async fn test_enter_text_missing_selector() {
        let page = Arc::new(FakePage::new());
        let (exec, _) = test_executor(page.clone());

        let result = exec.enter_text("[mmid='40']", "x").await.unwrap();

        assert_eq!(result, "Error: Selector [mmid='40'] not found. Unable to continue.");
        assert!(page.keys_pressed().is_empty());
    }

    #[tokio::test]
    async fn test_focus_failure_reported() {
        let page = Arc::new(FakePage::new());
        text_field(&page);
        page.on_fn(FOCUS_SCRIPT, |_| Err(webnav_core::Error::Browser("detached".into())));
        let (exec, _) = test_executor(page.clone());

        let result = exec.enter_text("[mmid='4']", "x").await.unwrap();

        assert_eq!(
            result,
            "Error entering text in selector [mmid='4']. Error: Browser error: detached"
        );
    }

    #[tokio::test]
    async fn test_enter_text_with_autocomplete() {
        let page = Arc::new(FakePage::new());
        text_field(&page);
        let (exec, _) = test_executor(page.clone());
        let watcher = exec.watcher().clone();
        page.on_input(move |call| {
            if matches!(call, PageCall::Key { key, .. } if key == "n") {
                watcher.publish(vec![DomChange {
                    tag: "UL".into(),
                    content: "London".into(),
                }]);
            }
        });

        let result = exec.enter_text("[mmid='4']", "Lon").await.unwrap();

        assert!(result.contains("and outer HTML: <input id=\"q\" type=\"text\">..\n As a consequence of this action"));
        assert!(result.contains("the action of entering text Lon is not yet executed"));
    }

    #[tokio::test]
    async fn test_bulk_enter_text() {
        let page = Arc::new(FakePage::new());
        text_field(&page);
        let (exec, _) = test_executor(page.clone());

        let entries = vec![
            EnterTextEntry {
                query_selector: "[mmid='1']".into(),
                text: "ada".into(),
            },
            EnterTextEntry {
                query_selector: "[mmid='2']".into(),
                text: "secret".into(),
            },
        ];
        let results = exec.bulk_enter_text(&entries).await.unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].query_selector, "[mmid='1']");
        assert_eq!(results[1].query_selector, "[mmid='2']");
        assert!(results[1].result.starts_with("Success. Text \"secret\""));
        assert_eq!(
            serde_json::to_value(&results[0]).unwrap()["query_selector"],
            json!("[mmid='1']")
        );
    }
}
