use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info, warn};
use webnav_core::{Error, MessageType, Result};

use super::{settle_changes, ActionExecutor, ActionOutcome, OUTER_HTML_ATTRIBUTES};
use crate::page::{MouseEventKind, PageHandle};

pub(crate) const ARIA_EXPANDED_SCRIPT: &str = r#"(selector) => {
    const element = document.querySelector(selector);
    return element ? element.getAttribute('aria-expanded') : null;
}"#;

pub(crate) const JS_CLICK_SCRIPT: &str = r#"(selector) => {
    const element = document.querySelector(selector);
    if (!element) {
        throw new Error('Element with selector ' + selector + ' not found');
    }
    if (element.tagName.toLowerCase() === 'a') {
        element.target = '_self';
    }
    element.click();
    return true;
}"#;

pub(crate) const SELECT_OPTION_SCRIPT: &str = r#"(selector, attributes) => {
    const option = document.querySelector(selector);
    const select = option ? option.closest('select') : null;
    if (!select) {
        throw new Error('Option ' + selector + ' is not inside a select element');
    }
    select.value = option.value;
    select.dispatchEvent(new Event('input', {bubbles: true}));
    select.dispatchEvent(new Event('change', {bubbles: true}));
    let openingTag = '<select';
    for (const attr of attributes) {
        const value = select.getAttribute(attr);
        if (value) {
            openingTag += ' ' + attr + '="' + value + '"';
        }
    }
    return {value: option.value, opening_tag: openingTag + '>'};
}"#;

/// Appended when `aria-expanded` flips to true. It does not carry
/// `PAGE_CHANGE_MARKER`, so on its own it does not end a batch of calls.
const MENU_APPEARED_NOTE: &str = ". Very important: As a consequence a menu has appeared where you may need to make further selection. Very important: Get all_fields DOM to complete the action.";

#[derive(Debug, Deserialize)]
struct SelectedOption {
    value: String,
    opening_tag: String,
}

impl ActionExecutor {
    /// Click the element matching `selector`, waiting `wait_before` first.
    pub async fn click(&self, selector: &str, wait_before: Duration) -> Result<String> {
        info!(selector, "Executing click");
        let page = self.page().await?;
        self.capture("click_start", page.as_ref()).await;

        let subscription = self.watcher.subscribe();
        let outcome = self.do_click(page.as_ref(), selector, wait_before).await;
        let changes = settle_changes(subscription, self.settings.settle_window()).await;

        self.capture("click_end", page.as_ref()).await;
        self.notify(&outcome.summary, MessageType::Action).await;

        if let Some(changes) = changes {
            return Ok(format!(
                "Success: {}.\n As a consequence of this action, new elements have appeared in view: {}. This means that the action to click {} is not yet executed and needs further interaction. Get all_fields DOM to complete the interaction.",
                outcome.summary, changes, selector
            ));
        }
        Ok(outcome.detailed)
    }

    /// Click without notifications or change tracking.
    pub(crate) async fn do_click(&self, page: &dyn PageHandle, selector: &str, wait_before: Duration) -> ActionOutcome {
        if !wait_before.is_zero() {
            tokio::time::sleep(wait_before).await;
        }
        match self.try_click(page, selector).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(selector, error = %e, "Unable to click element");
                let summary = format!(
                    "Unable to click element with selector: \"{}\" since the selector is invalid. Proceed by retrieving DOM again.",
                    selector
                );
                let detailed = format!("{}. Error: {}", summary, e);
                ActionOutcome::failure(summary, detailed)
            }
        }
    }

    async fn try_click(&self, page: &dyn PageHandle, selector: &str) -> Result<ActionOutcome> {
        let element = self
            .locate(page, selector)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Element with selector: \"{}\" not found", selector)))?;

        self.scroll_into_view(page, selector).await;
        self.wait_visible(page, selector).await;

        if element.tag == "option" {
            let selected = page
                .call_function(SELECT_OPTION_SCRIPT, &[json!(selector), json!(OUTER_HTML_ATTRIBUTES)])
                .await?;
            let selected: SelectedOption = serde_json::from_value(selected)?;
            info!(value = %selected.value, "Select menu option selected");
            let summary = format!("Select menu option \"{}\" selected", selected.value);
            let detailed = format!(
                "{}. The select element's outer HTML is: {}.",
                summary, selected.opening_tag
            );
            return Ok(ActionOutcome::success(summary, detailed));
        }

        let expanded_before = self.aria_expanded(page, selector).await;
        let mut message = match self.native_click(page, selector).await {
            Ok(()) => format!("Executed click on element with selector: {}", selector),
            Err(e) => {
                debug!(selector, error = %e, "Native click failed, falling back to JavaScript click");
                self.javascript_click(page, selector).await?
            }
        };
        let expanded_after = self.aria_expanded(page, selector).await;
        if expanded_before.as_deref() == Some("false") && expanded_after.as_deref() == Some("true") {
            message.push_str(MENU_APPEARED_NOTE);
        }

        let detailed = format!("{} The clicked element's outer HTML is: {}.", message, element.opening_tag);
        Ok(ActionOutcome::success(message, detailed))
    }

    /// Press and release the left button at the element centre.
    async fn native_click(&self, page: &dyn PageHandle, selector: &str) -> Result<()> {
        let bounds = self
            .element_box(page, selector, true)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Element with selector {} not found", selector)))?;
        if bounds.is_empty() {
            return Err(Error::Browser(format!("Element with selector {} has no size", selector)));
        }
        page.mouse_event(MouseEventKind::Moved, bounds.x, bounds.y).await?;
        page.mouse_event(MouseEventKind::Pressed, bounds.x, bounds.y).await?;
        page.mouse_event(MouseEventKind::Released, bounds.x, bounds.y).await?;
        Ok(())
    }

    async fn javascript_click(&self, page: &dyn PageHandle, selector: &str) -> Result<String> {
        info!(selector, "Executing JavaScript click");
        page.call_function(JS_CLICK_SCRIPT, &[json!(selector)]).await?;
        Ok(format!("Executed JavaScript Click on element with selector: {}", selector))
    }

    async fn aria_expanded(&self, page: &dyn PageHandle, selector: &str) -> Option<String> {
        match page.call_function(ARIA_EXPANDED_SCRIPT, &[json!(selector)]).await {
            Ok(value) => value.as_str().map(str::to_string),
            Err(e) => {
                debug!(selector, error = %e, "Could not read aria-expanded");
                None
            }
        }
    }
}
